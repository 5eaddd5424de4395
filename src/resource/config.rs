use crate::error::TributaryError;
use crate::providers::validate_resource_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tributary_schema::ProviderKind;

/// Durable configuration of one resource. Only its owning actor writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Empty until the first successful initialization.
    pub resource_id: String,
    pub provider_type: ProviderKind,
    /// Subscribers in insertion order, no duplicates.
    pub user_ids: Vec<String>,
    pub cadence_secs: u64,
    /// Opaque provider cursor; empty means "never synced".
    pub cursor: String,
}

impl ResourceConfig {
    pub fn empty(provider_type: ProviderKind, cadence_secs: u64) -> Self {
        Self {
            resource_id: String::new(),
            provider_type,
            user_ids: Vec::new(),
            cadence_secs,
            cursor: String::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.resource_id.is_empty()
    }

    /// Subscriber pulls run on behalf of.
    pub fn first_user(&self) -> Option<&str> {
        self.user_ids.first().map(String::as_str)
    }

    /// Apply `patch` and validate the result. `self` is left untouched on error.
    pub fn merge(&self, patch: &ResourcePatch) -> Result<ResourceConfig, TributaryError> {
        if let Some(kind) = patch.provider_type
            && kind != self.provider_type
        {
            return Err(TributaryError::invalid(format!(
                "providerType is immutable: resource is {}, patch asks for {kind}",
                self.provider_type
            )));
        }

        let mut next = self.clone();
        if let Some(resource_id) = &patch.resource_id {
            next.resource_id = resource_id.clone();
        }
        for user_id in &patch.user_ids {
            next.push_user(user_id);
        }
        if let Some(cadence_secs) = patch.cadence_secs {
            next.cadence_secs = cadence_secs;
        }
        if let Some(cursor) = &patch.cursor {
            next.cursor = cursor.clone();
        }

        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> Result<(), TributaryError> {
        if self.resource_id.is_empty() {
            return Err(TributaryError::invalid("resourceId is required"));
        }
        validate_resource_id(self.provider_type, &self.resource_id)?;
        if self.cadence_secs == 0 {
            return Err(TributaryError::invalid("cadenceSecs must be greater than zero"));
        }
        Ok(())
    }

    /// Append `user_id` unless empty or already present. Returns whether it was added.
    pub fn push_user(&mut self, user_id: &str) -> bool {
        let user_id = user_id.trim();
        if user_id.is_empty() || self.user_ids.iter().any(|u| u == user_id) {
            return false;
        }
        self.user_ids.push(user_id.to_string());
        true
    }
}

/// Partial update applied by `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    pub resource_id: Option<String>,
    pub provider_type: Option<ProviderKind>,
    /// Appended to the existing subscribers.
    #[serde(default)]
    pub user_ids: Vec<String>,
    pub cadence_secs: Option<u64>,
    pub cursor: Option<String>,
}

/// What the actor persists under its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub config: ResourceConfig,
    /// Armed single-shot wake, if any.
    pub next_wake_at: Option<DateTime<Utc>>,
}

impl ResourceRecord {
    pub fn empty(provider_type: ProviderKind, cadence_secs: u64) -> Self {
        Self {
            config: ResourceConfig::empty(provider_type, cadence_secs),
            next_wake_at: None,
        }
    }
}

/// Durable key of the actor owning `(kind, resource_id)`.
pub fn actor_key(kind: ProviderKind, resource_id: &str) -> String {
    format!("{kind}:{resource_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(resource_id: &str) -> ResourcePatch {
        ResourcePatch {
            resource_id: Some(resource_id.to_string()),
            provider_type: Some(ProviderKind::CodeHost),
            ..Default::default()
        }
    }

    #[test]
    fn merge_validates_resource_id_format() {
        let base = ResourceConfig::empty(ProviderKind::CodeHost, 3600);
        assert!(base.merge(&patch("acme/widgets")).is_ok());
        for bad in ["acme", "acme/", "/widgets", "a/b/c", ""] {
            let err = base.merge(&patch(bad)).expect_err(bad);
            assert!(matches!(err, TributaryError::InvalidConfiguration(_)), "{bad}");
        }
    }

    #[test]
    fn provider_type_is_immutable() {
        let base = ResourceConfig::empty(ProviderKind::CodeHost, 3600);
        let mut p = patch("acme/widgets");
        p.provider_type = Some(ProviderKind::Website);
        assert!(matches!(
            base.merge(&p),
            Err(TributaryError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let base = ResourceConfig::empty(ProviderKind::CodeHost, 3600);
        let mut p = patch("acme/widgets");
        p.cadence_secs = Some(0);
        assert!(base.merge(&p).is_err());
    }

    #[test]
    fn users_are_deduplicated_in_insertion_order() {
        let base = ResourceConfig::empty(ProviderKind::CodeHost, 3600);
        let mut p = patch("acme/widgets");
        p.user_ids = vec!["bob".into(), "alice".into(), "bob".into(), "".into()];
        let merged = base.merge(&p).expect("merge");
        assert_eq!(merged.user_ids, vec!["bob", "alice"]);
        assert_eq!(merged.first_user(), Some("bob"));
    }

    #[test]
    fn merge_keeps_cursor_unless_patched() {
        let mut base = ResourceConfig::empty(ProviderKind::CodeHost, 3600);
        base.resource_id = "acme/widgets".into();
        base.cursor = "abc123".into();
        let merged = base.merge(&ResourcePatch::default()).expect("merge");
        assert_eq!(merged.cursor, "abc123");
    }

    #[test]
    fn record_round_trips_as_camel_case() {
        let record = ResourceRecord::empty(ProviderKind::Website, 60);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["config"]["providerType"], "website");
        assert_eq!(json["config"]["cadenceSecs"], 60);
        assert!(json["nextWakeAt"].is_null());
    }
}
