//! Infrastructure services

mod bandit_service;

pub use bandit_service::{BanditSelector, MIN_VARIATIONS};
