use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordering of an index page by record id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrder {
    Asc,
    #[default]
    Desc,
}

impl RecordOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOrder::Asc => "asc",
            RecordOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for RecordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("invalid record order {0:?}, expected \"asc\" or \"desc\"")]
pub struct InvalidOrderError(pub String);

impl FromStr for RecordOrder {
    type Err = InvalidOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(RecordOrder::Asc),
            "desc" => Ok(RecordOrder::Desc),
            _ => Err(InvalidOrderError(s.to_owned())),
        }
    }
}
