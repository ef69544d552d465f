//! In-memory model of a loaded form document.
//!
//! A [`Document`] is an ordered list of named [`Control`]s plus the
//! dependent-field rules that run when a control emits a change
//! notification.  Control kinds form a closed set ([`ControlKind`]); markup
//! that is not a form control the binder understands maps to
//! [`ControlKind::Unsupported`].

// ---------------------------------------------------------------------------
// ControlKind
// ---------------------------------------------------------------------------

/// Closed set of control kinds the binder distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Any `<input>` whose value is set verbatim (`text`, `number`, `date`,
    /// `email`, `tel`, `hidden`, …).
    Text { input_type: String },
    /// `<textarea>`.
    TextArea,
    /// `<select>` (single choice).
    Select,
    /// `<input type="checkbox">`.
    Checkbox,
    /// `<input type="radio">`.
    Radio,
    /// `<input type="file">`; cannot be set programmatically.
    File,
    /// Any other named element (`button`, `output`, `fieldset`, …).
    Unsupported { tag: String },
}

impl ControlKind {
    /// Classify an element from its tag name and `type` attribute.
    ///
    /// ```
    /// use voice_form_assistant::form::ControlKind;
    ///
    /// assert_eq!(ControlKind::from_markup("INPUT", Some("Checkbox")), ControlKind::Checkbox);
    /// assert_eq!(ControlKind::from_markup("select", None), ControlKind::Select);
    /// assert!(matches!(ControlKind::from_markup("input", None), ControlKind::Text { .. }));
    /// ```
    pub fn from_markup(tag: &str, input_type: Option<&str>) -> Self {
        let tag = tag.to_ascii_lowercase();
        let input_type = input_type
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string());

        match tag.as_str() {
            "select" => ControlKind::Select,
            "textarea" => ControlKind::TextArea,
            "input" => match input_type.as_str() {
                "checkbox" => ControlKind::Checkbox,
                "radio" => ControlKind::Radio,
                "file" => ControlKind::File,
                _ => ControlKind::Text { input_type },
            },
            _ => ControlKind::Unsupported { tag },
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            ControlKind::Text { input_type } => input_type,
            ControlKind::TextArea => "textarea",
            ControlKind::Select => "select",
            ControlKind::Checkbox => "checkbox",
            ControlKind::Radio => "radio",
            ControlKind::File => "file",
            ControlKind::Unsupported { tag } => tag,
        }
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// One `<option>` of a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    /// Display text.
    pub text: String,
}

/// Handle to a control inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(usize);

/// A named form control and its live state.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub name: String,
    pub kind: ControlKind,
    /// Current value for text-like controls; the submitted value for
    /// checkboxes and radios.
    pub value: String,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    /// Index into `options`.
    pub selected: Option<usize>,
    /// Not displayed (a dependent field that is not revealed).
    pub hidden: bool,
    pub required: bool,
    /// Disabled controls are skipped on submission.
    pub disabled: bool,
}

impl Control {
    fn new(name: &str, kind: ControlKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: String::new(),
            checked: false,
            options: Vec::new(),
            selected: None,
            hidden: false,
            required: false,
            disabled: false,
        }
    }

    /// `<input type=…>` of any text-like type.
    pub fn input(name: &str, input_type: &str) -> Self {
        Self::new(name, ControlKind::from_markup("input", Some(input_type)))
    }

    pub fn text(name: &str) -> Self {
        Self::input(name, "text")
    }

    pub fn textarea(name: &str) -> Self {
        Self::new(name, ControlKind::TextArea)
    }

    /// A select with `(value, text)` options; like a browser, the first
    /// option starts selected.
    pub fn select(name: &str, options: &[(&str, &str)]) -> Self {
        let mut control = Self::new(name, ControlKind::Select);
        control.options = options
            .iter()
            .map(|(value, text)| SelectOption {
                value: value.to_string(),
                text: text.to_string(),
            })
            .collect();
        control.selected = if control.options.is_empty() { None } else { Some(0) };
        control
    }

    /// A checkbox submitting the default value `"on"`.
    pub fn checkbox(name: &str) -> Self {
        let mut control = Self::new(name, ControlKind::Checkbox);
        control.value = "on".into();
        control
    }

    pub fn radio(name: &str, value: &str) -> Self {
        let mut control = Self::new(name, ControlKind::Radio);
        control.value = value.to_string();
        control
    }

    pub fn file(name: &str) -> Self {
        Self::new(name, ControlKind::File)
    }

    /// A named element that is not a supported control.
    pub fn other(tag: &str, name: &str) -> Self {
        Self::new(name, ControlKind::from_markup(tag, None))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// Value of the selected option, for selects.
    pub fn selected_value(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.options.get(i))
            .map(|o| o.value.as_str())
    }

    /// The value a dependent rule compares against.
    fn current_value(&self) -> Option<&str> {
        match self.kind {
            ControlKind::Select => self.selected_value(),
            ControlKind::Checkbox | ControlKind::Radio => {
                self.checked.then_some(self.value.as_str())
            }
            _ => Some(self.value.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// DependentRule
// ---------------------------------------------------------------------------

/// Reveal `target` (and make it required) while `trigger` has the value
/// `equals`; otherwise hide it, un-require it and clear it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentRule {
    pub trigger: String,
    pub equals: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A loaded form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    controls: Vec<Control>,
    rules: Vec<DependentRule>,
    changes: Vec<ControlId>,
}

impl Document {
    pub fn new(controls: Vec<Control>) -> Self {
        Self {
            controls,
            rules: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: DependentRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// All controls whose name equals `name`, in document order.
    pub fn find(&self, name: &str) -> Vec<ControlId> {
        self.controls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == name)
            .map(|(i, _)| ControlId(i))
            .collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.controls.iter().any(|c| c.name == name)
    }

    pub fn get(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0)
    }

    pub fn get_mut(&mut self, id: ControlId) -> Option<&mut Control> {
        self.controls.get_mut(id.0)
    }

    /// First control named `name`.
    pub fn first(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn controls(&self) -> impl Iterator<Item = (ControlId, &Control)> {
        self.controls.iter().enumerate().map(|(i, c)| (ControlId(i), c))
    }

    /// Check a radio button, unchecking the rest of its group.
    pub fn check_radio(&mut self, id: ControlId) {
        let Some(name) = self.get(id).map(|c| c.name.clone()) else {
            return;
        };
        for (i, control) in self.controls.iter_mut().enumerate() {
            if control.kind == ControlKind::Radio && control.name == name {
                control.checked = i == id.0;
            }
        }
    }

    /// Emit a change notification for `id` and run the dependent rules it
    /// triggers.
    pub fn dispatch_change(&mut self, id: ControlId) {
        let Some(control) = self.get(id) else {
            return;
        };
        let name = control.name.clone();
        let value = control.current_value().map(str::to_string);
        self.changes.push(id);

        let triggered: Vec<DependentRule> = self
            .rules
            .iter()
            .filter(|r| r.trigger == name)
            .cloned()
            .collect();

        for rule in triggered {
            let reveal = value.as_deref() == Some(rule.equals.as_str());
            for target in self.controls.iter_mut().filter(|c| c.name == rule.target) {
                target.hidden = !reveal;
                target.required = reveal;
                if !reveal {
                    target.value.clear();
                }
            }
            log::debug!(
                "form: {} {} after change of {name}",
                rule.target,
                if reveal { "revealed" } else { "hidden" }
            );
        }
    }

    /// Controls that emitted change notifications, oldest first.
    pub fn change_notifications(&self) -> &[ControlId] {
        &self.changes
    }
}
