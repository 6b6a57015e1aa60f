//! Infrastructure layer - Sampler, ledgers, storage, trackers and services

pub mod experiment;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
pub mod tracker;
