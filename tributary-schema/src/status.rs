use serde::{Deserialize, Serialize};

/// Outcome of one sync attempt as recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(SyncStatus::Success),
            "ERROR" => Some(SyncStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status label read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSyncStatusError(pub String);

impl std::fmt::Display for ParseSyncStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown sync status `{}`", self.0)
    }
}

impl std::error::Error for ParseSyncStatusError {}

impl TryFrom<String> for SyncStatus {
    type Error = ParseSyncStatusError;

    fn try_from(value: String) -> Result<Self, ParseSyncStatusError> {
        SyncStatus::parse(&value).ok_or(ParseSyncStatusError(value))
    }
}
