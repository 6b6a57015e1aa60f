//! Simulate command - synthetic traffic through a bandit experiment
//!
//! Every variation gets a known conversion rate. After each selection a
//! conversion is drawn with the chosen variation's rate and recorded on its
//! config, standing in for the attribution system that would normally do it.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::experiment::{
    Experiment, ExperimentId, ExposureTracker, GetItemsRequest, Item, ItemResolver,
    ResolveRequest, VariationConfig,
};
use crate::domain::DomainError;
use crate::infrastructure::logging;
use crate::infrastructure::observability::init_metrics;
use crate::infrastructure::services::BanditSelector;

/// Arguments for the simulate command
#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// True conversion rate of each variation, comma-separated
    #[arg(long, value_delimiter = ',', default_value = "0.04,0.06")]
    pub rates: Vec<f64>,

    /// Number of selections to run
    #[arg(long, default_value_t = 1_000)]
    pub requests: usize,

    /// Selections in flight at once
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Items requested per selection
    #[arg(long, default_value_t = 5)]
    pub num_results: usize,

    /// RNG seed (overrides sampler.seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Experiment id used for counters and correlation ids
    #[arg(long, default_value = "simulation")]
    pub experiment_id: String,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of one simulated variation
#[derive(Debug, Clone, Serialize)]
pub struct VariationSummary {
    pub index: usize,
    pub true_rate: f64,
    pub exposures: u64,
    pub conversions: u64,
    pub observed_rate: f64,
    pub share: f64,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub experiment_id: String,
    pub requests: usize,
    pub failed_requests: usize,
    pub best_variation: Option<usize>,
    pub variations: Vec<VariationSummary>,
}

/// Resolver producing placeholder items for one variation
#[derive(Debug)]
struct SyntheticResolver {
    name: String,
}

#[async_trait]
impl ItemResolver for SyntheticResolver {
    async fn get_items(&self, request: ResolveRequest) -> Result<Vec<Item>, DomainError> {
        Ok((1..=request.num_results)
            .map(|n| {
                Item::with_id(format!("{}-{}", self.name, n))
                    .with_field("resolver", self.name.clone())
            })
            .collect())
    }
}

/// Run the simulate command
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    if args.seed.is_some() {
        config.sampler.seed = args.seed;
    }

    logging::init_logging(&config.logging);
    let metrics = init_metrics(&config.metrics);

    validate_args(&args)?;

    let experiment = Arc::new(build_experiment(&args.experiment_id, &args.rates)?);
    let selector = crate::create_selector(&config, Arc::clone(&experiment)).await?;
    let tracker = crate::create_tracker(&config.telemetry)?;

    info!(
        experiment_id = %args.experiment_id,
        variations = args.rates.len(),
        requests = args.requests,
        concurrency = args.concurrency,
        "Starting simulation"
    );

    let summary = simulate(&selector, tracker, &args).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if config.metrics.render_on_exit {
        if let Some(metrics) = metrics {
            println!("{}", metrics.render());
        }
    }

    Ok(())
}

fn validate_args(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.rates.len() < 2 {
        anyhow::bail!("At least 2 conversion rates are required");
    }

    if let Some(rate) = args.rates.iter().find(|r| !(0.0..=1.0).contains(*r)) {
        anyhow::bail!("Conversion rate {} is outside [0, 1]", rate);
    }

    if args.concurrency == 0 {
        anyhow::bail!("Concurrency must be at least 1");
    }

    if args.num_results == 0 {
        anyhow::bail!("num-results must be at least 1");
    }

    Ok(())
}

fn build_experiment(experiment_id: &str, rates: &[f64]) -> anyhow::Result<Experiment> {
    let mut experiment = Experiment::new(
        ExperimentId::new(experiment_id)?,
        "simulated_recommendations",
        format!("{}-arm simulation", rates.len()),
    )?;

    for (index, rate) in rates.iter().enumerate() {
        let name = format!("variation-{}", index);
        let config = VariationConfig::new()
            .with_attribute("name", name.clone())
            .with_attribute("true_rate", *rate);

        experiment.add_variation(config, Arc::new(SyntheticResolver { name }));
    }

    Ok(experiment)
}

async fn simulate(
    selector: &BanditSelector,
    tracker: Option<Arc<dyn ExposureTracker>>,
    args: &SimulateArgs,
) -> SimulationSummary {
    let experiment = selector.experiment();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    let mut completed = 0;
    let mut failed = 0;

    while completed + failed < args.requests {
        let offset = completed + failed;
        let batch = (args.requests - offset).min(args.concurrency);

        let selections = (0..batch).map(|n| {
            let mut request =
                GetItemsRequest::new(format!("user-{}", offset + n)).with_num_results(args.num_results);
            if let Some(tracker) = &tracker {
                request = request.with_tracker(Arc::clone(tracker));
            }
            selector.select(request)
        });

        for result in join_all(selections).await {
            match result {
                Ok(outcome) => {
                    completed += 1;
                    if rng.gen_bool(args.rates[outcome.variation_index]) {
                        if let Some(variation) = experiment.variation(outcome.variation_index) {
                            variation.config().record_conversion();
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(error = %e, "Simulated selection failed");
                }
            }
        }
    }

    summarize(experiment, &args.rates, completed, failed)
}

fn summarize(
    experiment: &Experiment,
    rates: &[f64],
    requests: usize,
    failed_requests: usize,
) -> SimulationSummary {
    let total: u64 = experiment
        .variations()
        .iter()
        .map(|v| v.config().exposures())
        .sum();

    let variations: Vec<VariationSummary> = experiment
        .variations()
        .iter()
        .map(|v| {
            let exposures = v.config().exposures();
            let conversions = v.config().conversions();
            VariationSummary {
                index: v.index(),
                true_rate: rates.get(v.index()).copied().unwrap_or_default(),
                exposures,
                conversions,
                observed_rate: ratio(conversions, exposures),
                share: ratio(exposures, total),
            }
        })
        .collect();

    let best_variation = variations
        .iter()
        .max_by_key(|v| v.exposures)
        .filter(|v| v.exposures > 0)
        .map(|v| v.index);

    SimulationSummary {
        experiment_id: experiment.id().to_string(),
        requests,
        failed_requests,
        best_variation,
        variations,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn print_summary(summary: &SimulationSummary) {
    println!(
        "Experiment {} - {} requests ({} failed)",
        summary.experiment_id, summary.requests, summary.failed_requests
    );
    println!(
        "{:>9}  {:>9}  {:>9}  {:>11}  {:>9}  {:>7}",
        "variation", "true rate", "exposures", "conversions", "observed", "share"
    );

    for v in &summary.variations {
        let marker = if summary.best_variation == Some(v.index) { "*" } else { "" };
        println!(
            "{:>9}  {:>9.4}  {:>9}  {:>11}  {:>9.4}  {:>6.1}%{}",
            v.index,
            v.true_rate,
            v.exposures,
            v.conversions,
            v.observed_rate,
            v.share * 100.0,
            marker
        );
    }
}
