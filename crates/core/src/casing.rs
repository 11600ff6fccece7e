use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Casing {
    #[default]
    Lowercase,
    Uppercase,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CasingError {
    #[error("invalid casing: {0:?} (expected \"lowercase\" or \"uppercase\")")]
    Invalid(String),
}

impl Casing {
    pub fn as_str(self) -> &'static str {
        match self {
            Casing::Lowercase => "lowercase",
            Casing::Uppercase => "uppercase",
        }
    }

    /// The mode's own name written in that mode, e.g. `UPPERCASE`.
    pub fn display_label(self) -> String {
        apply_casing(self.as_str(), self)
    }
}

impl fmt::Display for Casing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Casing {
    type Err = CasingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lowercase" => Ok(Casing::Lowercase),
            "uppercase" => Ok(Casing::Uppercase),
            other => Err(CasingError::Invalid(other.to_string())),
        }
    }
}

pub fn apply_casing(text: &str, casing: Casing) -> String {
    match casing {
        Casing::Lowercase => text.to_lowercase(),
        Casing::Uppercase => text.to_uppercase(),
    }
}
