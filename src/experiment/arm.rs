//! Experiment arms

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical label of the control arm
pub const CONTROL_LABEL: &str = "control_group";

/// Canonical label of the treatment arm
pub const TREATMENT_LABEL: &str = "treatment";

/// One variant of an A/B test.
///
/// The two canonical roles are recognized from their labels; any other label
/// is an additional variant compared pairwise against control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arm {
    /// `control_group`
    Control,
    /// `treatment`
    Treatment,
    /// Any other arm label
    Variant(String),
}

impl Arm {
    /// Parse an arm from its dataset label
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            CONTROL_LABEL => Self::Control,
            TREATMENT_LABEL => Self::Treatment,
            other => Self::Variant(other.to_string()),
        }
    }

    /// Dataset label of this arm
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Control => CONTROL_LABEL,
            Self::Treatment => TREATMENT_LABEL,
            Self::Variant(label) => label,
        }
    }

    /// True for the control arm
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Control)
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for Arm {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl Serialize for Arm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Arm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}
