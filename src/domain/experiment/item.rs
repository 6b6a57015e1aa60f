//! Recommended items and the experiment stamp attached to them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Key under which the experiment stamp is embedded in an item
pub const EXPERIMENT_KEY: &str = "experiment";

/// Experiment provenance attached to every item of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemExperimentStamp {
    #[serde(rename = "id")]
    pub experiment_id: String,
    pub feature: String,
    pub name: String,
    #[serde(rename = "type")]
    pub experiment_type: String,
    pub variation_index: usize,
    /// 1-based position in the resolver output
    pub result_rank: usize,
    pub correlation_id: String,
}

/// Opaque, map-like item record produced by a resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    /// Create an empty item
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an item carrying only an `itemId`
    pub fn with_id(item_id: impl Into<String>) -> Self {
        Self::new().with_field("itemId", item_id.into())
    }

    /// Set a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `itemId` field, when present as a string
    pub fn item_id(&self) -> Option<&str> {
        self.0.get("itemId").and_then(Value::as_str)
    }

    /// Embed the experiment stamp, replacing any previous one
    pub fn stamp(&mut self, stamp: &ItemExperimentStamp) -> Result<(), DomainError> {
        let value = serde_json::to_value(stamp)
            .map_err(|e| DomainError::internal(format!("Failed to serialize stamp: {}", e)))?;
        self.0.insert(EXPERIMENT_KEY.to_string(), value);
        Ok(())
    }

    /// Read the embedded experiment stamp back
    pub fn experiment(&self) -> Option<ItemExperimentStamp> {
        self.0
            .get(EXPERIMENT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Item {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
