use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source type of a synced resource.
///
/// The discriminant is part of every actor key and every plan row, so it is immutable once a
/// resource has been initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(alias = "CODE_HOST", alias = "github")]
    CodeHost,
    #[serde(alias = "WORKSPACE", alias = "notion")]
    Workspace,
    #[serde(alias = "WEBSITE", alias = "web")]
    Website,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::CodeHost => "code_host",
            ProviderKind::Workspace => "workspace",
            ProviderKind::Website => "website",
        }
    }

    /// Default `category` attached to content items from this source.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderKind::CodeHost => "code",
            ProviderKind::Workspace => "document",
            ProviderKind::Website => "webpage",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderKindError(pub String);

impl fmt::Display for ParseProviderKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider type `{}`", self.0)
    }
}

impl std::error::Error for ParseProviderKindError {}

impl FromStr for ProviderKind {
    type Err = ParseProviderKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code_host" | "github" => Ok(ProviderKind::CodeHost),
            "workspace" | "notion" => Ok(ProviderKind::Workspace),
            "website" | "web" => Ok(ProviderKind::Website),
            _ => Err(ParseProviderKindError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = ParseProviderKindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
