use crate::errors::CameraError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Control name to integer value, the shape controls take in a setup.
pub type ControlValues = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub value: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlKind {
    Integer {
        min: i64,
        max: i64,
        step: i64,
        default: i64,
    },
    Boolean {
        default: i64,
    },
    Menu {
        min: i64,
        max: i64,
        default: i64,
        options: Vec<MenuEntry>,
    },
}

/// One device-exposed tunable setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    name: String,
    kind: ControlKind,
    value: i64,
    inactive: bool,
}

impl Control {
    /// Integer range control. A `[0, 1]` range is a boolean and is stored as one.
    pub fn integer(
        name: impl Into<String>,
        value: i64,
        min: i64,
        max: i64,
        step: i64,
        default: i64,
    ) -> Self {
        let kind = if min == 0 && max == 1 {
            ControlKind::Boolean { default }
        } else {
            ControlKind::Integer {
                min,
                max,
                step,
                default,
            }
        };
        Self {
            name: name.into(),
            kind,
            value,
            inactive: false,
        }
    }

    pub fn boolean(name: impl Into<String>, value: i64, default: i64) -> Self {
        Self {
            name: name.into(),
            kind: ControlKind::Boolean { default },
            value,
            inactive: false,
        }
    }

    pub fn menu(name: impl Into<String>, value: i64, min: i64, max: i64, default: i64) -> Self {
        Self {
            name: name.into(),
            kind: ControlKind::Menu {
                min,
                max,
                default,
                options: Vec::new(),
            },
            value,
            inactive: false,
        }
    }

    pub fn with_inactive(mut self, inactive: bool) -> Self {
        self.inactive = inactive;
        self
    }

    /// Append a menu option. Ignored for non-menu controls.
    pub fn add_option(&mut self, value: i64, label: impl Into<String>) {
        if let ControlKind::Menu { options, .. } = &mut self.kind {
            options.push(MenuEntry {
                value,
                label: label.into(),
            });
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn default_value(&self) -> i64 {
        match self.kind {
            ControlKind::Integer { default, .. }
            | ControlKind::Boolean { default }
            | ControlKind::Menu { default, .. } => default,
        }
    }

    pub fn options(&self) -> &[MenuEntry] {
        match &self.kind {
            ControlKind::Menu { options, .. } => options,
            _ => &[],
        }
    }

    pub fn is_inactive(&self) -> bool {
        self.inactive
    }

    /// Whether a UI should let the user edit this control right now.
    pub fn is_sensitive(&self) -> bool {
        !self.inactive
    }

    pub(crate) fn set_value(&mut self, value: i64) {
        self.value = value;
    }

    pub(crate) fn set_inactive(&mut self, inactive: bool) {
        self.inactive = inactive;
    }

    /// Writing this control may change which other controls are active.
    pub fn affects_others(&self) -> bool {
        self.name.contains("auto")
    }

    pub fn validate(&self, value: i64) -> Result<(), CameraError> {
        let accepted = match &self.kind {
            ControlKind::Integer { min, max, .. } => (*min..=*max).contains(&value),
            ControlKind::Boolean { .. } => value == 0 || value == 1,
            ControlKind::Menu {
                min, max, options, ..
            } => {
                if options.is_empty() {
                    (*min..=*max).contains(&value)
                } else {
                    options.iter().any(|o| o.value == value)
                }
            }
        };

        if accepted {
            Ok(())
        } else {
            Err(CameraError::InvalidControlValue {
                name: self.name.clone(),
                value,
            })
        }
    }
}
