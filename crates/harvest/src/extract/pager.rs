//! Offset pagination over a collection that reports its total size.

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{HarvestError, Result};
use crate::fetch::{Endpoint, FetchOutcome, Fetcher, Keys, Request};

/// A JSON object record.
pub type Record = Map<String, Value>;

/// Collects every record of a paginated endpoint.
///
/// The first page (offset 0) reports `total_results`; the remaining pages
/// are requested together and concatenated in offset order, whatever order
/// they complete in.
#[derive(Clone)]
pub struct PaginatedCollector {
    fetcher: Fetcher,
    endpoint: Endpoint,
    keys: Keys,
    results_key: String,
    page_size: usize,
    total_key: String,
    limit_param: String,
    offset_param: String,
}

impl PaginatedCollector {
    pub fn new(
        fetcher: Fetcher,
        endpoint: Endpoint,
        results_key: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            fetcher,
            endpoint,
            keys: Keys::new(),
            results_key: results_key.into(),
            page_size: page_size.max(1),
            total_key: "total_results".to_string(),
            limit_param: "limit".to_string(),
            offset_param: "offset".to_string(),
        }
    }

    /// Keys used to fill the endpoint's templates.
    pub fn with_keys(mut self, keys: Keys) -> Self {
        self.keys = keys;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offsets of every page after the first.
    pub fn remaining_offsets(&self, total: usize) -> Vec<usize> {
        (1..)
            .map(|page| page * self.page_size)
            .take_while(|offset| *offset < total)
            .collect()
    }

    fn page_request(&self, offset: usize) -> Result<Request> {
        Ok(self
            .endpoint
            .render(&self.keys)?
            .with_param(self.limit_param.as_str(), self.page_size.to_string())
            .with_param(self.offset_param.as_str(), offset.to_string()))
    }

    /// Fetch all pages.
    ///
    /// Fails if the first page cannot be fetched. A 204 on the first page is
    /// an empty collection. A later page that fails contributes no records.
    pub async fn collect_all(&self) -> Result<Vec<Record>> {
        let first = self.page_request(0)?;
        let payload = match self.fetcher.fetch_outcome(&first).await {
            FetchOutcome::Json(payload) => payload,
            FetchOutcome::Empty => return Ok(Vec::new()),
            FetchOutcome::Failed => {
                return Err(HarvestError::FirstPageUnavailable(first.to_string()));
            }
        };

        let total = payload
            .get(&self.total_key)
            .and_then(Value::as_u64)
            .map(|t| t as usize)
            .unwrap_or(0);
        let mut records = self.records(&payload);

        let offsets = self.remaining_offsets(total);
        info!(
            total,
            pages = offsets.len() + 1,
            page_size = self.page_size,
            "collecting pages"
        );

        let requests = offsets
            .iter()
            .map(|offset| self.page_request(*offset))
            .collect::<Result<Vec<_>>>()?;
        let pages = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        for (offset, page) in offsets.iter().zip(pages) {
            match page {
                Some(payload) => records.extend(self.records(&payload)),
                None => warn!(offset, "page dropped"),
            }
        }

        Ok(records)
    }

    fn records(&self, payload: &Value) -> Vec<Record> {
        match payload.get(&self.results_key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect(),
            Some(Value::Object(item)) => vec![item.clone()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchConfig, MockTransport};
    use std::sync::Arc;

    fn collector(page_size: usize) -> PaginatedCollector {
        let fetcher = Fetcher::new(Arc::new(MockTransport::new()), &FetchConfig::default());
        PaginatedCollector::new(
            fetcher,
            Endpoint::new("https://x", "/stations.json"),
            "fuel_stations",
            page_size,
        )
    }

    #[test]
    fn test_remaining_offsets() {
        assert_eq!(collector(50).remaining_offsets(120), vec![50, 100]);
        assert_eq!(collector(50).remaining_offsets(100), vec![50]);
        assert!(collector(50).remaining_offsets(50).is_empty());
        assert!(collector(50).remaining_offsets(0).is_empty());
    }

    #[test]
    fn test_page_request_params() {
        let request = collector(50).page_request(100).unwrap();
        assert_eq!(request.to_string(), "https://x/stations.json?limit=50&offset=100");
    }
}
