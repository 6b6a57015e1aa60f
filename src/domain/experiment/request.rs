//! Request and outcome types of the selection operation

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::item::Item;
use super::resolver::ResolveRequest;
use super::tracker::ExposureTracker;

/// Number of items requested when the caller does not say
pub const DEFAULT_NUM_RESULTS: usize = 10;

/// A recommendation request routed through an experiment
#[derive(Clone)]
pub struct GetItemsRequest {
    pub user_id: String,
    pub current_item_id: Option<String>,
    pub item_list: Option<Vec<String>>,
    pub num_results: usize,
    /// Receives the exposure event; no event is emitted when absent
    pub tracker: Option<Arc<dyn ExposureTracker>>,
    pub filter_values: Option<Value>,
    pub context: Option<Value>,
    /// Event time; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
    pub promotion: Option<Value>,
}

impl GetItemsRequest {
    /// Create a request for `user_id` with default settings
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_item_id: None,
            item_list: None,
            num_results: DEFAULT_NUM_RESULTS,
            tracker: None,
            filter_values: None,
            context: None,
            timestamp: None,
            promotion: None,
        }
    }

    pub fn with_current_item(mut self, item_id: impl Into<String>) -> Self {
        self.current_item_id = Some(item_id.into());
        self
    }

    pub fn with_item_list(mut self, items: Vec<String>) -> Self {
        self.item_list = Some(items);
        self
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ExposureTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_filter_values(mut self, filter_values: Value) -> Self {
        self.filter_values = Some(filter_values);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_promotion(mut self, promotion: Value) -> Self {
        self.promotion = Some(promotion);
        self
    }

    /// Parameters forwarded to the chosen resolver
    pub fn resolve_request(&self) -> ResolveRequest {
        ResolveRequest {
            user_id: self.user_id.clone(),
            product_id: self.current_item_id.clone(),
            product_list: self.item_list.clone(),
            num_results: self.num_results,
            filter_values: self.filter_values.clone(),
            context: self.context.clone(),
            promotion: self.promotion.clone(),
        }
    }
}

impl fmt::Debug for GetItemsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetItemsRequest")
            .field("user_id", &self.user_id)
            .field("current_item_id", &self.current_item_id)
            .field("item_list", &self.item_list)
            .field("num_results", &self.num_results)
            .field("tracker", &self.tracker.is_some())
            .field("filter_values", &self.filter_values)
            .field("context", &self.context)
            .field("timestamp", &self.timestamp)
            .field("promotion", &self.promotion)
            .finish()
    }
}

/// Result of one selection: the chosen variation and its annotated items
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub variation_index: usize,
    pub items: Vec<Item>,
}
