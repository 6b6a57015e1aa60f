//! Item resolver capability: one variation's recommendation algorithm

use async_trait::async_trait;
use serde_json::Value;

use super::item::Item;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Parameters forwarded unchanged to the chosen variation's resolver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveRequest {
    pub user_id: String,
    /// Item the user is currently looking at
    pub product_id: Option<String>,
    /// Candidate items to rerank, if any
    pub product_list: Option<Vec<String>>,
    pub num_results: usize,
    pub filter_values: Option<Value>,
    pub context: Option<Value>,
    pub promotion: Option<Value>,
}

/// Produces recommended items for a variation
///
/// Implementations are trusted to return at most `num_results` items, in
/// ranked order. Their errors reach the caller of the selector unchanged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Resolve recommended items
    async fn get_items(&self, request: ResolveRequest) -> Result<Vec<Item>, DomainError>;
}
