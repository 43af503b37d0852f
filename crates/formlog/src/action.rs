//! The closed set of actions the dispatcher understands.

use std::fmt;
use std::str::FromStr;

use crate::error::DispatchError;

/// A dispatcher action, identified on the wire by its camelCase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Validate a document and append it.
    Submit,
    /// Every record in index order.
    GetRecords,
    /// One record by index.
    GetRecord,
    /// Log metadata.
    GetInfo,
}

impl Action {
    /// All actions, in wire-name order.
    pub const ALL: [Action; 4] = [
        Action::Submit,
        Action::GetRecords,
        Action::GetRecord,
        Action::GetInfo,
    ];

    /// The wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::GetRecords => "getRecords",
            Action::GetRecord => "getRecord",
            Action::GetInfo => "getInfo",
        }
    }
}

impl FromStr for Action {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
