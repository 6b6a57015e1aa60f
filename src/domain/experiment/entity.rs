//! Experiment domain entities

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::resolver::ItemResolver;
use super::validation::{validate_experiment_id, validate_identity, ExperimentValidationError};

/// Config key holding the exposure count
pub const EXPOSURES_KEY: &str = "exposures";

/// Config key holding the conversion count
pub const CONVERSIONS_KEY: &str = "conversions";

/// Experiment type reported for Thompson-sampling experiments
pub const MAB_EXPERIMENT_TYPE: &str = "mab";

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Create a new experiment ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_experiment_id(&id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for String {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ExperimentIdentity
// ============================================================================

/// Identity fields of an experiment, as reported in exposure events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentIdentity {
    pub id: String,
    pub feature: String,
    pub name: String,
    #[serde(rename = "type")]
    pub experiment_type: String,
}

// ============================================================================
// VariationConfig
// ============================================================================

/// Shared, mutable configuration of a single variation
///
/// Holds the `exposures` and `conversions` counts next to arbitrary
/// attributes loaded with the experiment. The counts are atomics: every
/// concurrent request that selects the variation increments `exposures`
/// in place.
#[derive(Debug, Default)]
pub struct VariationConfig {
    exposures: AtomicU64,
    conversions: AtomicU64,
    attributes: Map<String, Value>,
}

impl VariationConfig {
    /// Create a config with zero counts and no attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with the given counts
    pub fn with_counts(exposures: u64, conversions: u64) -> Self {
        Self {
            exposures: AtomicU64::new(exposures),
            conversions: AtomicU64::new(conversions),
            attributes: Map::new(),
        }
    }

    /// Attach an extra attribute (e.g. a display name)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != EXPOSURES_KEY && key != CONVERSIONS_KEY {
            self.attributes.insert(key, value.into());
        }
        self
    }

    /// Current exposure count
    pub fn exposures(&self) -> u64 {
        self.exposures.load(Ordering::Acquire)
    }

    /// Current conversion count
    pub fn conversions(&self) -> u64 {
        self.conversions.load(Ordering::Acquire)
    }

    /// Extra attributes, excluding the counts
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Atomically increment the exposure count, returning the new value
    pub fn increment_exposures(&self) -> u64 {
        self.exposures
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Atomically record one conversion, returning the new value
    ///
    /// Conversions are attributed outside the selection path; this is the
    /// write hook for that collaborator.
    pub fn record_conversion(&self) -> u64 {
        self.conversions
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Point-in-time copy of the config as a JSON object, counts included
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut map = self.attributes.clone();
        map.insert(EXPOSURES_KEY.to_string(), Value::from(self.exposures()));
        map.insert(CONVERSIONS_KEY.to_string(), Value::from(self.conversions()));
        map
    }
}

impl Clone for VariationConfig {
    fn clone(&self) -> Self {
        Self {
            exposures: AtomicU64::new(self.exposures()),
            conversions: AtomicU64::new(self.conversions()),
            attributes: self.attributes.clone(),
        }
    }
}

impl From<Map<String, Value>> for VariationConfig {
    fn from(mut map: Map<String, Value>) -> Self {
        let exposures = map.remove(EXPOSURES_KEY).map(|v| coerce_count(&v)).unwrap_or(0);
        let conversions = map
            .remove(CONVERSIONS_KEY)
            .map(|v| coerce_count(&v))
            .unwrap_or(0);

        Self {
            exposures: AtomicU64::new(exposures),
            conversions: AtomicU64::new(conversions),
            attributes: map,
        }
    }
}

impl Serialize for VariationConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VariationConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}

/// Coerce a loosely typed config value into a non-negative count
///
/// Integers pass through, floats and numeric strings are truncated,
/// negatives clamp to zero and anything else counts as zero.
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v
            } else if n.as_i64().is_some() {
                0
            } else {
                n.as_f64().map(float_to_count).unwrap_or(0)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(float_to_count))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn float_to_count(v: f64) -> u64 {
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        // `as` saturates at u64::MAX
        v.trunc() as u64
    }
}

// ============================================================================
// Variation
// ============================================================================

/// One arm of the experiment: its shared config and the resolver producing its items
#[derive(Clone)]
pub struct Variation {
    index: usize,
    config: Arc<VariationConfig>,
    resolver: Arc<dyn ItemResolver>,
}

impl Variation {
    /// Position of the variation within its experiment
    pub fn index(&self) -> usize {
        self.index
    }

    /// Shared config, including the live counts
    pub fn config(&self) -> &VariationConfig {
        &self.config
    }

    /// Shared handle to the config, for collaborators that update counts
    pub fn config_handle(&self) -> Arc<VariationConfig> {
        Arc::clone(&self.config)
    }

    /// Resolver producing this variation's items
    pub fn resolver(&self) -> &Arc<dyn ItemResolver> {
        &self.resolver
    }
}

impl fmt::Debug for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variation")
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// Experiment configuration handed to the selector
///
/// Owns the identity fields and the ordered variations. Variation indices
/// are assigned on insertion and stay stable for the experiment's lifetime.
#[derive(Debug, Clone)]
pub struct Experiment {
    id: ExperimentId,
    feature: String,
    name: String,
    experiment_type: String,
    variations: Vec<Variation>,
}

impl Experiment {
    /// Create a new experiment with no variations
    pub fn new(
        id: ExperimentId,
        feature: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ExperimentValidationError> {
        let feature = feature.into();
        let name = name.into();
        validate_identity(&feature, &name)?;

        Ok(Self {
            id,
            feature,
            name,
            experiment_type: MAB_EXPERIMENT_TYPE.to_string(),
            variations: Vec::new(),
        })
    }

    /// Override the reported experiment type
    pub fn with_type(mut self, experiment_type: impl Into<String>) -> Self {
        self.experiment_type = experiment_type.into();
        self
    }

    /// Append a variation; its index is its position in the list
    pub fn with_variation(mut self, config: VariationConfig, resolver: Arc<dyn ItemResolver>) -> Self {
        self.add_variation(config, resolver);
        self
    }

    /// Append a variation, returning its index
    pub fn add_variation(&mut self, config: VariationConfig, resolver: Arc<dyn ItemResolver>) -> usize {
        let index = self.variations.len();
        self.variations.push(Variation {
            index,
            config: Arc::new(config),
            resolver,
        });
        index
    }

    pub fn id(&self) -> &ExperimentId {
        &self.id
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn experiment_type(&self) -> &str {
        &self.experiment_type
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    /// Get a variation by index
    pub fn variation(&self, index: usize) -> Option<&Variation> {
        self.variations.get(index)
    }

    /// Identity fields for events and item stamps
    pub fn identity(&self) -> ExperimentIdentity {
        ExperimentIdentity {
            id: self.id.to_string(),
            feature: self.feature.clone(),
            name: self.name.clone(),
            experiment_type: self.experiment_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::MockItemResolver;
    use serde_json::json;

    fn resolver() -> Arc<dyn ItemResolver> {
        Arc::new(MockItemResolver::new())
    }

    mod experiment_id_tests {
        use super::*;

        #[test]
        fn test_valid_id() {
            let id = ExperimentId::new("exp-1").unwrap();
            assert_eq!(id.as_str(), "exp-1");
            assert_eq!(id.to_string(), "exp-1");
        }

        #[test]
        fn test_invalid_id() {
            assert!(ExperimentId::new("").is_err());
            assert!(ExperimentId::new("a~b").is_err());
        }

        #[test]
        fn test_deserialize_validates() {
            let ok: Result<ExperimentId, _> = serde_json::from_value(json!("exp-1"));
            assert!(ok.is_ok());

            let bad: Result<ExperimentId, _> = serde_json::from_value(json!("exp~1"));
            assert!(bad.is_err());
        }
    }

    mod variation_config_tests {
        use super::*;

        #[test]
        fn test_counts_from_map() {
            let config: VariationConfig = serde_json::from_value(json!({
                "exposures": 10,
                "conversions": 9,
                "campaign_arn": "arn:aws:personalize:campaign/a"
            }))
            .unwrap();

            assert_eq!(config.exposures(), 10);
            assert_eq!(config.conversions(), 9);
            assert_eq!(
                config.attributes().get("campaign_arn"),
                Some(&json!("arn:aws:personalize:campaign/a"))
            );
            assert!(!config.attributes().contains_key(EXPOSURES_KEY));
        }

        #[test]
        fn test_absent_counts_default_to_zero() {
            let config: VariationConfig = serde_json::from_value(json!({"type": "product"})).unwrap();

            assert_eq!(config.exposures(), 0);
            assert_eq!(config.conversions(), 0);
        }

        #[test]
        fn test_loose_counts_are_coerced() {
            let config: VariationConfig = serde_json::from_value(json!({
                "exposures": "12",
                "conversions": 3.9
            }))
            .unwrap();

            assert_eq!(config.exposures(), 12);
            assert_eq!(config.conversions(), 3);
        }

        #[test]
        fn test_coerce_count() {
            assert_eq!(coerce_count(&json!(7)), 7);
            assert_eq!(coerce_count(&json!(-4)), 0);
            assert_eq!(coerce_count(&json!(-2.5)), 0);
            assert_eq!(coerce_count(&json!(" 8.7 ")), 8);
            assert_eq!(coerce_count(&json!("n/a")), 0);
            assert_eq!(coerce_count(&json!(null)), 0);
            assert_eq!(coerce_count(&json!(true)), 0);
        }

        #[test]
        fn test_increment_exposures_returns_new_value() {
            let config = VariationConfig::with_counts(10, 9);

            assert_eq!(config.increment_exposures(), 11);
            assert_eq!(config.exposures(), 11);
            assert_eq!(config.conversions(), 9);
        }

        #[test]
        fn test_snapshot_includes_counts() {
            let config = VariationConfig::with_counts(4, 1).with_attribute("algorithm", "similar");
            config.record_conversion();

            let snapshot = config.snapshot();
            assert_eq!(snapshot.get("exposures"), Some(&json!(4)));
            assert_eq!(snapshot.get("conversions"), Some(&json!(2)));
            assert_eq!(snapshot.get("algorithm"), Some(&json!("similar")));
        }

        #[test]
        fn test_with_attribute_ignores_count_keys() {
            let config = VariationConfig::with_counts(5, 0).with_attribute("exposures", 100);

            assert_eq!(config.exposures(), 5);
            assert!(config.attributes().is_empty());
        }
    }

    mod experiment_tests {
        use super::*;

        #[test]
        fn test_variations_are_indexed_in_order() {
            let experiment = Experiment::new(
                ExperimentId::new("exp-1").unwrap(),
                "home_product_recs",
                "personalize-vs-popular",
            )
            .unwrap()
            .with_variation(VariationConfig::new(), resolver())
            .with_variation(VariationConfig::with_counts(3, 1), resolver());

            assert_eq!(experiment.variations().len(), 2);
            assert_eq!(experiment.variations()[0].index(), 0);
            assert_eq!(experiment.variations()[1].index(), 1);
            assert_eq!(experiment.variation(1).unwrap().config().exposures(), 3);
            assert!(experiment.variation(2).is_none());
        }

        #[test]
        fn test_identity() {
            let experiment = Experiment::new(
                ExperimentId::new("exp-1").unwrap(),
                "home_product_recs",
                "personalize-vs-popular",
            )
            .unwrap();

            let identity = experiment.identity();
            assert_eq!(identity.id, "exp-1");
            assert_eq!(identity.experiment_type, MAB_EXPERIMENT_TYPE);

            let json = serde_json::to_value(&identity).unwrap();
            assert_eq!(json["type"], "mab");
        }

        #[test]
        fn test_empty_feature_rejected() {
            let result = Experiment::new(ExperimentId::new("exp-1").unwrap(), "", "name");
            assert_eq!(result.unwrap_err(), ExperimentValidationError::EmptyFeature);
        }

        #[test]
        fn test_clone_shares_variation_counts() {
            let experiment = Experiment::new(ExperimentId::new("exp-1").unwrap(), "f", "n")
                .unwrap()
                .with_variation(VariationConfig::new(), resolver())
                .with_variation(VariationConfig::new(), resolver());

            let copy = experiment.clone();
            copy.variations()[1].config().increment_exposures();

            assert_eq!(experiment.variations()[1].config().exposures(), 1);
        }
    }
}
