//! Bandit selection service
//!
//! Routes a recommendation request to one variation of an experiment using
//! Thompson sampling, records the exposure and stamps the returned items so
//! later conversions can be attributed.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use crate::domain::experiment::{
    CorrelationId, Experiment, ExposureEvent, ExposureLedger, GetItemsRequest, Item,
    ItemExperimentStamp, SelectionOutcome,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::{
    ArmCounts, InMemoryExposureLedger, PosteriorSampler, TelemetryEmitter,
};
use crate::infrastructure::observability::{record_get_items_duration, record_selection};

/// Minimum number of variations an experiment needs to be sampled
pub const MIN_VARIATIONS: usize = 2;

/// Thompson-sampling selector bound to one experiment
///
/// Safe to share across tasks; every method takes `&self`.
#[derive(Debug)]
pub struct BanditSelector {
    experiment: Arc<Experiment>,
    sampler: Arc<PosteriorSampler>,
    ledger: Arc<dyn ExposureLedger>,
    telemetry: TelemetryEmitter,
}

impl BanditSelector {
    /// Create a selector with an entropy-seeded sampler, the in-memory
    /// ledger and no snapshot store
    pub fn new(experiment: Arc<Experiment>) -> Self {
        Self {
            experiment,
            sampler: Arc::new(PosteriorSampler::new()),
            ledger: Arc::new(InMemoryExposureLedger::new()),
            telemetry: TelemetryEmitter::disabled(),
        }
    }

    pub fn with_sampler(mut self, sampler: PosteriorSampler) -> Self {
        self.sampler = Arc::new(sampler);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn ExposureLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryEmitter) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn experiment(&self) -> &Arc<Experiment> {
        &self.experiment
    }

    /// Return the chosen variation's items, each stamped with its experiment
    /// provenance
    pub async fn get_items(&self, request: GetItemsRequest) -> Result<Vec<Item>, DomainError> {
        Ok(self.select(request).await?.items)
    }

    /// Pick a variation, record the exposure and resolve its items
    pub async fn select(&self, request: GetItemsRequest) -> Result<SelectionOutcome, DomainError> {
        let started = Instant::now();
        let experiment_id = self.experiment.id().as_str();

        Self::validate(&request)?;

        let variations = self.experiment.variations();
        if variations.len() < MIN_VARIATIONS {
            return Err(DomainError::precondition_failed(format!(
                "Experiment '{}' needs at least {} variations, has {}",
                experiment_id,
                MIN_VARIATIONS,
                variations.len()
            )));
        }

        let counts: Vec<ArmCounts> = variations.iter().map(ArmCounts::of).collect();
        let draw = self
            .sampler
            .select(&counts)
            .ok_or_else(|| DomainError::internal("Sampler returned no variation"))?;
        let variation_index = draw.selected;

        debug!(
            experiment_id,
            user_id = %request.user_id,
            variation_index,
            theta = ?draw.theta,
            "Selected variation"
        );

        self.telemetry
            .record_snapshot(experiment_id, &counts, &draw.theta)
            .await;

        let variation = self.experiment.variation(variation_index).ok_or_else(|| {
            DomainError::internal(format!(
                "Sampled variation {} missing from experiment '{}'",
                variation_index, experiment_id
            ))
        })?;

        let exposures = self.ledger.increment(&self.experiment, variation_index).await?;
        debug!(experiment_id, variation_index, exposures, "Recorded exposure");

        let mut items = variation
            .resolver()
            .get_items(request.resolve_request())
            .await?;

        let identity = self.experiment.identity();
        for (position, item) in items.iter_mut().enumerate() {
            let result_rank = position + 1;
            let correlation_id = CorrelationId::generate(
                experiment_id,
                request.user_id.as_str(),
                variation_index,
                result_rank,
            );

            item.stamp(&ItemExperimentStamp {
                experiment_id: identity.id.clone(),
                feature: identity.feature.clone(),
                name: identity.name.clone(),
                experiment_type: identity.experiment_type.clone(),
                variation_index,
                result_rank,
                correlation_id: correlation_id.to_string(),
            })?;
        }

        if let Some(tracker) = &request.tracker {
            let event = ExposureEvent::new(
                request.user_id.as_str(),
                identity,
                variation,
                request.timestamp.unwrap_or_else(Utc::now),
            );
            self.telemetry.emit_exposure(tracker.as_ref(), &event).await;
        }

        record_selection(experiment_id, variation_index);
        record_get_items_duration(experiment_id, started.elapsed());

        Ok(SelectionOutcome {
            variation_index,
            items,
        })
    }

    fn validate(request: &GetItemsRequest) -> Result<(), DomainError> {
        if request.user_id.is_empty() {
            return Err(DomainError::invalid_argument("user_id is required"));
        }

        if request.num_results == 0 {
            return Err(DomainError::invalid_argument(
                "num_results must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{
        ExperimentId, ExposureTracker, ItemResolver, MockExposureTracker, MockItemResolver,
        ResolveRequest, TelemetrySnapshot, VariationConfig, VariationCounts,
    };
    use crate::infrastructure::experiment::StorageExposureLedger;
    use crate::domain::storage::mock::MockStorage;
    use crate::domain::storage::Storage;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::tracker::InMemoryExposureTracker;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn resolver_returning(prefix: &'static str) -> Arc<dyn ItemResolver> {
        let mut resolver = MockItemResolver::new();
        resolver.expect_get_items().returning(move |req: ResolveRequest| {
            Ok((1..=req.num_results)
                .map(|n| Item::with_id(format!("{}-{}", prefix, n)))
                .collect())
        });
        Arc::new(resolver)
    }

    fn unused_resolver() -> Arc<dyn ItemResolver> {
        let mut resolver = MockItemResolver::new();
        resolver.expect_get_items().times(0);
        Arc::new(resolver)
    }

    fn experiment(counts: &[(u64, u64)]) -> Arc<Experiment> {
        let mut experiment = Experiment::new(
            ExperimentId::new("exp-1").unwrap(),
            "home_product_recs",
            "personalize-vs-popular",
        )
        .unwrap();

        for (n, (exposures, conversions)) in counts.iter().enumerate() {
            let prefix = if n == 0 { "a" } else { "b" };
            experiment.add_variation(
                VariationConfig::with_counts(*exposures, *conversions)
                    .with_attribute("name", format!("variation-{}", n)),
                resolver_returning(prefix),
            );
        }

        Arc::new(experiment)
    }

    fn exposures(experiment: &Experiment) -> Vec<u64> {
        experiment
            .variations()
            .iter()
            .map(|v| v.config().exposures())
            .collect()
    }

    #[tokio::test]
    async fn test_ab_scenario() {
        let experiment = experiment(&[(10, 9), (10, 1)]);
        let snapshots = Arc::new(InMemoryStorage::<TelemetrySnapshot>::new());
        let tracker = Arc::new(InMemoryExposureTracker::new());
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_sampler(PosteriorSampler::with_seed(11))
            .with_telemetry(TelemetryEmitter::new(snapshots.clone()));

        let request = GetItemsRequest::new("u1")
            .with_num_results(3)
            .with_tracker(tracker.clone());
        let outcome = selector.select(request).await.unwrap();

        let chosen = outcome.variation_index;
        let other = 1 - chosen;
        assert_eq!(experiment.variations()[chosen].config().exposures(), 11);
        assert_eq!(experiment.variations()[other].config().exposures(), 10);

        assert_eq!(outcome.items.len(), 3);
        for (n, item) in outcome.items.iter().enumerate() {
            let stamp = item.experiment().unwrap();
            assert_eq!(stamp.experiment_id, "exp-1");
            assert_eq!(stamp.feature, "home_product_recs");
            assert_eq!(stamp.name, "personalize-vs-popular");
            assert_eq!(stamp.experiment_type, "mab");
            assert_eq!(stamp.variation_index, chosen);
            assert_eq!(stamp.result_rank, n + 1);
            assert_eq!(stamp.correlation_id, format!("exp-1~u1~{}~{}", chosen, n + 1));
        }

        let stored = snapshots.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].exposures, vec![10, 10]);
        assert_eq!(stored[0].conversions, vec![9, 1]);
        assert_eq!(stored[0].theta.len(), 2);

        let events = tracker.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attributes.user_id, "u1");
        assert_eq!(events[0].attributes.variation_index, chosen);
        assert_eq!(events[0].attributes.variation["exposures"], 11);
        assert_eq!(events[0].attributes.experiment.id, "exp-1");
    }

    #[tokio::test]
    async fn test_resolver_receives_request_parameters() {
        let mut resolver = MockItemResolver::new();
        resolver
            .expect_get_items()
            .withf(|req: &ResolveRequest| {
                req.user_id == "u1"
                    && req.product_id.as_deref() == Some("p-9")
                    && req.num_results == 2
                    && req.filter_values == Some(serde_json::json!({"category": "shoes"}))
            })
            .returning(|_| Ok(vec![Item::with_id("x"), Item::with_id("y")]));
        let resolver: Arc<dyn ItemResolver> = Arc::new(resolver);

        let experiment = Experiment::new(ExperimentId::new("exp-1").unwrap(), "f", "n")
            .unwrap()
            .with_variation(VariationConfig::new(), Arc::clone(&resolver))
            .with_variation(VariationConfig::new(), resolver);
        let selector = BanditSelector::new(Arc::new(experiment));

        let items = selector
            .get_items(
                GetItemsRequest::new("u1")
                    .with_current_item("p-9")
                    .with_num_results(2)
                    .with_filter_values(serde_json::json!({"category": "shoes"})),
            )
            .await
            .unwrap();

        assert_eq!(items[0].item_id(), Some("x"));
        assert_eq!(items[1].item_id(), Some("y"));
    }

    #[tokio::test]
    async fn test_single_variation_fails_without_side_effects() {
        let experiment = Arc::new(
            Experiment::new(ExperimentId::new("exp-1").unwrap(), "f", "n")
                .unwrap()
                .with_variation(VariationConfig::with_counts(4, 1), unused_resolver()),
        );
        let snapshots = Arc::new(MockStorage::<TelemetrySnapshot>::new());
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_telemetry(TelemetryEmitter::new(snapshots.clone()));

        let result = selector.get_items(GetItemsRequest::new("u1")).await;

        assert!(matches!(result, Err(DomainError::PreconditionFailed { .. })));
        assert_eq!(exposures(&experiment), vec![4]);
        assert_eq!(snapshots.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_fail_without_side_effects() {
        let experiment = Arc::new(
            Experiment::new(ExperimentId::new("exp-1").unwrap(), "f", "n")
                .unwrap()
                .with_variation(VariationConfig::with_counts(1, 0), unused_resolver())
                .with_variation(VariationConfig::with_counts(2, 0), unused_resolver()),
        );
        let snapshots = Arc::new(MockStorage::<TelemetrySnapshot>::new());
        let mut tracker = MockExposureTracker::new();
        tracker.expect_log_exposure().times(0);
        let tracker: Arc<dyn ExposureTracker> = Arc::new(tracker);
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_telemetry(TelemetryEmitter::new(snapshots.clone()));

        for request in [
            GetItemsRequest::new(""),
            GetItemsRequest::new("u1").with_num_results(0),
        ] {
            let result = selector.select(request.with_tracker(Arc::clone(&tracker))).await;
            let err = result.unwrap_err();
            assert!(matches!(err, DomainError::InvalidArgument { .. }));
            assert!(err.is_request_rejection());
        }

        assert_eq!(exposures(&experiment), vec![1, 2]);
        assert_eq!(snapshots.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_user_id_is_accepted() {
        let experiment = experiment(&[(0, 0), (0, 0)]);
        let selector = BanditSelector::new(Arc::clone(&experiment));

        let outcome = selector
            .select(GetItemsRequest::new(" ").with_num_results(1))
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(exposures(&experiment).iter().sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn test_resolver_error_propagates_unchanged() {
        let mut failing = MockItemResolver::new();
        failing
            .expect_get_items()
            .returning(|_| Err(DomainError::resolver("personalize", "throttled")));
        let failing: Arc<dyn ItemResolver> = Arc::new(failing);

        let experiment = Experiment::new(ExperimentId::new("exp-1").unwrap(), "f", "n")
            .unwrap()
            .with_variation(VariationConfig::new(), Arc::clone(&failing))
            .with_variation(VariationConfig::new(), failing);
        let selector = BanditSelector::new(Arc::new(experiment));

        let result = selector.get_items(GetItemsRequest::new("u1")).await;

        match result {
            Err(DomainError::Resolver { resolver, message }) => {
                assert_eq!(resolver, "personalize");
                assert_eq!(message, "throttled");
            }
            other => panic!("expected resolver error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_invisible_to_caller() {
        let experiment = experiment(&[(3, 1), (3, 2)]);
        let snapshots = Arc::new(MockStorage::<TelemetrySnapshot>::new().with_error("table missing"));
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_telemetry(TelemetryEmitter::new(snapshots.clone()));

        let items = selector
            .get_items(GetItemsRequest::new("u1").with_num_results(2))
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(snapshots.write_attempts(), 1);
        assert_eq!(exposures(&experiment).iter().sum::<u64>(), 7);
    }

    #[tokio::test]
    async fn test_ledger_write_failure_is_invisible_to_caller() {
        let experiment = experiment(&[(10, 9), (10, 1)]);
        let storage = Arc::new(MockStorage::<VariationCounts>::new().with_error("down"));
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_sampler(PosteriorSampler::with_seed(11))
            .with_ledger(Arc::new(StorageExposureLedger::new(storage)));

        let items = selector
            .get_items(GetItemsRequest::new("u1").with_num_results(3))
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(exposures(&experiment).iter().sum::<u64>(), 21);
    }

    #[tokio::test]
    async fn test_tracker_failure_is_invisible_to_caller() {
        let mut tracker = MockExposureTracker::new();
        tracker
            .expect_log_exposure()
            .times(1)
            .returning(|_| Err(DomainError::telemetry_write("collector down")));
        let selector = BanditSelector::new(experiment(&[(0, 0), (0, 0)]));

        let items = selector
            .get_items(
                GetItemsRequest::new("u1")
                    .with_num_results(1)
                    .with_tracker(Arc::new(tracker)),
            )
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_event_uses_request_timestamp() {
        let tracker = Arc::new(InMemoryExposureTracker::new());
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let selector = BanditSelector::new(experiment(&[(0, 0), (0, 0)]));

        selector
            .get_items(
                GetItemsRequest::new("u1")
                    .with_timestamp(at)
                    .with_tracker(tracker.clone()),
            )
            .await
            .unwrap();

        assert_eq!(tracker.events()[0].event_timestamp, at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_symmetric_without_data() {
        let experiment = experiment(&[(0, 0), (0, 0)]);
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_sampler(PosteriorSampler::with_seed(2024));
        let requests = 2_000;

        let mut first = 0;
        for _ in 0..requests {
            let outcome = selector
                .select(GetItemsRequest::new("u1").with_num_results(1))
                .await
                .unwrap();
            if outcome.variation_index == 0 {
                first += 1;
            }
        }

        let share = first as f64 / requests as f64;
        assert!((0.4..0.6).contains(&share), "got share {}", share);
        assert_eq!(exposures(&experiment).iter().sum::<u64>(), requests);
    }

    #[tokio::test]
    async fn test_concentrates_on_better_variation() {
        let experiment = experiment(&[(100, 0), (100, 100)]);
        let selector = BanditSelector::new(Arc::clone(&experiment))
            .with_sampler(PosteriorSampler::with_seed(99));

        for _ in 0..200 {
            selector
                .select(GetItemsRequest::new("u1").with_num_results(1))
                .await
                .unwrap();
        }

        let counts = exposures(&experiment);
        assert!(counts[1] - 100 > counts[0] - 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_selections_lose_no_updates() {
        let experiment = experiment(&[(5, 1), (5, 1)]);
        let selector = Arc::new(BanditSelector::new(Arc::clone(&experiment)));
        let requests = 200;

        let handles: Vec<_> = (0..requests)
            .map(|n| {
                let selector = Arc::clone(&selector);
                tokio::spawn(async move {
                    selector
                        .select(GetItemsRequest::new(format!("u{}", n)).with_num_results(1))
                        .await
                })
            })
            .collect();

        let mut chosen = [0u64; 2];
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            chosen[outcome.variation_index] += 1;
        }

        assert_eq!(exposures(&experiment), vec![5 + chosen[0], 5 + chosen[1]]);
        assert_eq!(chosen.iter().sum::<u64>(), requests);
    }

    #[tokio::test]
    async fn test_correlation_ids_unique_across_users() {
        let selector = BanditSelector::new(experiment(&[(0, 0), (0, 0)]));
        let mut seen = HashSet::new();

        for user in ["u1", "u2", "u3"] {
            let items = selector
                .get_items(GetItemsRequest::new(user).with_num_results(5))
                .await
                .unwrap();

            let ranks: Vec<usize> = items
                .iter()
                .map(|i| i.experiment().unwrap().result_rank)
                .collect();
            assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

            for item in items {
                assert!(seen.insert(item.experiment().unwrap().correlation_id));
            }
        }

        assert_eq!(seen.len(), 15);
    }
}
