//! Built-in grievance forms, addressable as `/forms/<name>`.

use std::collections::BTreeMap;

use super::document::{Control, DependentRule, Document};

/// Whether `name` is a valid form name (`[A-Za-z0-9_]+`).
pub fn is_valid_form_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Named form documents.  Loading returns a fresh copy each time.
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: BTreeMap<String, Document>,
}

impl FormCatalog {
    /// The four grievance forms.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert("infrastructure", infrastructure());
        catalog.insert("corruption", corruption());
        catalog.insert("funds", funds());
        catalog.insert("govt_service", govt_service());
        catalog
    }

    /// Register (or replace) a form.  Invalid names are rejected.
    pub fn insert(&mut self, name: &str, doc: Document) -> bool {
        if !is_valid_form_name(name) {
            log::warn!("form: refusing catalog entry with invalid name {name:?}");
            return false;
        }
        self.forms.insert(name.to_string(), doc);
        true
    }

    /// A fresh copy of the form called `name`.
    pub fn load(&self, name: &str) -> Option<Document> {
        if !is_valid_form_name(name) {
            return None;
        }
        self.forms.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

fn contact_fields() -> Vec<Control> {
    vec![
        Control::text("full_name").required(),
        Control::input("email", "email").required(),
        Control::input("mobile", "tel").required(),
    ]
}

fn closing_fields(mut controls: Vec<Control>) -> Vec<Control> {
    controls.push(Control::file("supporting_document"));
    controls.push(Control::checkbox("declaration").required());
    controls.push(Control::other("button", "submit_grievance"));
    controls
}

fn infrastructure() -> Document {
    let mut controls = contact_fields();
    controls.extend([
        Control::textarea("address"),
        Control::textarea("issue_description").required(),
        Control::text("issue_location").required(),
        Control::select(
            "issue_duration",
            &[
                ("", "Select duration"),
                ("less_than_week", "Less than a week"),
                ("one_to_four_weeks", "1-4 weeks"),
                ("one_to_six_months", "1-6 months"),
                ("six_to_twelve_months", "6-12 months"),
                ("more_than_year", "More than a year"),
            ],
        )
        .required(),
    ]);
    Document::new(closing_fields(controls))
}

fn corruption() -> Document {
    let mut controls = contact_fields();
    controls.extend([
        Control::text("department").required(),
        Control::text("official_name"),
        Control::input("incident_date", "date").required(),
        Control::textarea("incident_details").required(),
        Control::textarea("witnesses"),
    ]);
    Document::new(closing_fields(controls))
}

fn funds() -> Document {
    let mut controls = contact_fields();
    controls.extend([
        Control::text("scheme_name").required(),
        Control::input("application_date", "date"),
        Control::input("amount_requested", "number"),
        Control::textarea("purpose"),
        Control::select(
            "current_status",
            &[
                ("", "Select status"),
                ("not_applied", "Not applied yet"),
                ("application_submitted", "Application submitted"),
                ("application_under_review", "Application under review"),
                ("application_approved", "Application approved, funds not received"),
                ("partial_funds", "Partial funds received"),
                ("application_rejected", "Application rejected"),
                ("other", "Other"),
            ],
        )
        .required(),
        Control::textarea("issue_details").required(),
    ]);
    Document::new(closing_fields(controls))
}

fn govt_service() -> Document {
    let mut controls = contact_fields();
    controls.extend([
        Control::select(
            "service_type",
            &[
                ("", "Select service"),
                ("aadhar", "Aadhar Card"),
                ("pan", "PAN Card"),
                ("voter_id", "Voter ID"),
                ("passport", "Passport"),
                ("driving_license", "Driving License"),
                ("birth_certificate", "Birth Certificate"),
                ("death_certificate", "Death Certificate"),
                ("income_certificate", "Income Certificate"),
                ("caste_certificate", "Caste Certificate"),
                ("property_registration", "Property Registration"),
                ("water_connection", "Water Connection"),
                ("electricity_connection", "Electricity Connection"),
                ("other", "Other"),
            ],
        )
        .required(),
        Control::text("other_service").hidden(),
        Control::text("application_number"),
        Control::input("application_date", "date"),
        Control::textarea("issue_details").required(),
        Control::radio("prior_followup", "no"),
        Control::radio("prior_followup", "phone"),
        Control::radio("prior_followup", "email"),
        Control::radio("prior_followup", "visit"),
        Control::radio("prior_followup", "multiple"),
    ]);
    Document::new(closing_fields(controls)).with_rule(DependentRule {
        trigger: "service_type".into(),
        equals: "other".into(),
        target: "other_service".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::document::ControlKind;
    use crate::form::form_type::FormType;

    #[test]
    fn form_names() {
        assert!(is_valid_form_name("govt_service"));
        assert!(is_valid_form_name("Form2"));
        assert!(!is_valid_form_name(""));
        assert!(!is_valid_form_name("../etc"));
        assert!(!is_valid_form_name("a-b"));
    }

    #[test]
    fn builtin_forms_load_fresh_copies() {
        let catalog = FormCatalog::builtin();
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["corruption", "funds", "govt_service", "infrastructure"]
        );

        let mut a = catalog.load("infrastructure").unwrap();
        let id = a.find("full_name")[0];
        a.get_mut(id).unwrap().value = "changed".into();
        let b = catalog.load("infrastructure").unwrap();
        assert_eq!(b.first("full_name").unwrap().value, "");
    }

    #[test]
    fn unknown_and_invalid_names_not_found() {
        let catalog = FormCatalog::builtin();
        assert!(catalog.load("scholarship").is_none());
        assert!(catalog.load("../funds").is_none());
        assert!(!FormCatalog::default().insert("bad name", Document::default()));
    }

    #[test]
    fn every_form_has_declaration_and_upload() {
        let catalog = FormCatalog::builtin();
        for name in ["infrastructure", "corruption", "funds", "govt_service"] {
            let doc = catalog.load(name).unwrap();
            assert_eq!(doc.first("declaration").unwrap().kind, ControlKind::Checkbox);
            assert_eq!(doc.first("supporting_document").unwrap().kind, ControlKind::File);
        }
    }

    #[test]
    fn builtin_forms_identify_by_fields() {
        let catalog = FormCatalog::builtin();
        let cases = [
            ("infrastructure", FormType::Infrastructure),
            ("corruption", FormType::Corruption),
            ("funds", FormType::Funds),
            ("govt_service", FormType::GovernmentService),
        ];
        for (name, expected) in cases {
            let doc = catalog.load(name).unwrap();
            assert_eq!(FormType::identify("/page", Some(&doc)), expected);
        }
    }
}
