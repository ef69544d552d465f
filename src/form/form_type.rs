//! Identify which grievance form a loaded page is.

use serde::{Deserialize, Serialize};

use super::document::Document;

/// The grievance categories the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Infrastructure,
    Corruption,
    Funds,
    GovernmentService,
    #[serde(alias = "unknown_form")]
    Unknown,
}

impl FormType {
    /// Identify a form from its address path, falling back to the fields it
    /// contains.
    ///
    /// ```
    /// use voice_form_assistant::form::FormType;
    ///
    /// assert_eq!(FormType::identify("/forms/govt_service", None), FormType::GovernmentService);
    /// assert_eq!(FormType::identify("/forms/misc", None), FormType::Unknown);
    /// ```
    pub fn identify(path: &str, doc: Option<&Document>) -> Self {
        const BY_PATH: [(&str, FormType); 4] = [
            ("infrastructure", FormType::Infrastructure),
            ("corruption", FormType::Corruption),
            ("funds", FormType::Funds),
            ("govt_service", FormType::GovernmentService),
        ];
        const BY_FIELD: [(&str, FormType); 4] = [
            ("issue_location", FormType::Infrastructure),
            ("official_name", FormType::Corruption),
            ("scheme_name", FormType::Funds),
            ("service_type", FormType::GovernmentService),
        ];

        let path = path.to_ascii_lowercase();
        if let Some((_, ty)) = BY_PATH.iter().find(|(needle, _)| path.contains(needle)) {
            return *ty;
        }
        doc.and_then(|doc| {
            BY_FIELD
                .iter()
                .find(|(field, _)| doc.has_field(field))
                .map(|(_, ty)| *ty)
        })
        .unwrap_or(FormType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Infrastructure => "infrastructure",
            FormType::Corruption => "corruption",
            FormType::Funds => "funds",
            FormType::GovernmentService => "government_service",
            FormType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
