//! Thompson sampling over a Beta-Bernoulli model
//!
//! Each variation's conversion rate gets a `Beta(conversions + 1,
//! exposures + 1)` posterior (uniform prior). One draw per variation, the
//! largest draw wins.
//!
//! Ties go to the lowest index. Exact ties are practically impossible with
//! continuous draws, but the rule is fixed so seeded runs are reproducible.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};

use crate::domain::experiment::Variation;

/// Exposure and conversion counts of one variation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmCounts {
    pub exposures: u64,
    pub conversions: u64,
}

impl ArmCounts {
    pub fn new(exposures: u64, conversions: u64) -> Self {
        Self {
            exposures,
            conversions,
        }
    }

    /// Read the live counts of a variation
    pub fn of(variation: &Variation) -> Self {
        let config = variation.config();
        Self::new(config.exposures(), config.conversions())
    }

    /// Beta shape parameters of the posterior
    pub fn posterior_params(&self) -> (f64, f64) {
        (self.conversions as f64 + 1.0, self.exposures as f64 + 1.0)
    }

    /// Mean of the posterior
    pub fn posterior_mean(&self) -> f64 {
        let (alpha, beta) = self.posterior_params();
        alpha / (alpha + beta)
    }
}

/// Draws and choice behind one selection
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorDraw {
    /// One sample per variation, index-aligned with the input counts
    pub theta: Vec<f64>,
    /// Index of the largest sample
    pub selected: usize,
}

/// Thompson sampler shared by concurrent requests
///
/// Unseeded samplers draw from the calling thread's RNG, so requests never
/// contend. A seeded sampler funnels every draw through one locked `StdRng`
/// to keep runs reproducible.
#[derive(Debug)]
pub struct PosteriorSampler {
    source: RngSource,
}

#[derive(Debug)]
enum RngSource {
    Thread,
    Seeded(Mutex<StdRng>),
}

impl PosteriorSampler {
    /// Create a sampler backed by the thread-local RNG
    pub fn new() -> Self {
        Self {
            source: RngSource::Thread,
        }
    }

    /// Create a sampler with a fixed seed (reproducible)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            source: RngSource::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Create a sampler from an optional seed
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    /// Draw one posterior sample per variation
    pub fn draw(&self, counts: &[ArmCounts]) -> Vec<f64> {
        match &self.source {
            RngSource::Thread => draw_all(&mut rand::thread_rng(), counts),
            RngSource::Seeded(rng) => {
                // A panic elsewhere cannot leave the RNG in an invalid state
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                draw_all(&mut *rng, counts)
            }
        }
    }

    /// Draw and pick the variation with the largest sample
    ///
    /// Returns `None` only for an empty input.
    pub fn select(&self, counts: &[ArmCounts]) -> Option<PosteriorDraw> {
        let theta = self.draw(counts);
        let selected = argmax_first(&theta)?;
        Some(PosteriorDraw { theta, selected })
    }
}

impl Default for PosteriorSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the maximum value; the first one wins on ties, NaN never wins
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, &v) in values.iter().enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, b)) if v > b || (b.is_nan() && !v.is_nan()) => best = Some((i, v)),
            _ => {}
        }
    }

    best.map(|(i, _)| i)
}

fn draw_all<R: Rng + ?Sized>(rng: &mut R, counts: &[ArmCounts]) -> Vec<f64> {
    counts
        .iter()
        .map(|c| {
            let (alpha, beta) = c.posterior_params();
            sample_beta(rng, alpha, beta)
        })
        .collect()
}

fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    match Beta::new(alpha, beta) {
        Ok(dist) => dist.sample(rng),
        // Unreachable for shapes >= 1; fall back to the posterior mean
        Err(_) => alpha / (alpha + beta),
    }
}
