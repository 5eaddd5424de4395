use crate::error::TributaryError;
use std::fmt;

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(resource_id: &str) -> Result<Self, TributaryError> {
        let mut parts = resource_id.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None)
                if !owner.trim().is_empty() && !name.trim().is_empty() =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(TributaryError::invalid(format!(
                "code-host resource id must look like `owner/name`, got `{resource_id}`"
            ))),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
