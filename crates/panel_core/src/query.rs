//! Shared query cache keyed by (search term, scope id).
//!
//! One cache instance is shared process-wide across panel instances; entries
//! are never owned exclusively by one consumer, so invalidation by another
//! consumer of the same key must be tolerated.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::CompanyId,
    protocol::{CodeListQuery, HsCodeRecord},
};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::RecordTransport;

/// Identity of one cacheable fetch. Any change to either component is a
/// distinct cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub search: String,
    pub scope: Option<CompanyId>,
}

impl QueryKey {
    pub fn new(search: impl Into<String>, scope: Option<CompanyId>) -> Self {
        Self {
            search: search.into(),
            scope,
        }
    }

    /// Filters sent to the list endpoint; empty components are omitted.
    pub fn to_list_query(&self) -> CodeListQuery {
        CodeListQuery {
            customer: self.scope.map(|company| company.0),
            search: (!self.search.is_empty()).then(|| self.search.clone()),
        }
    }
}

#[derive(Default)]
struct CacheEntry {
    records: Vec<HsCodeRecord>,
    has_data: bool,
    stale: bool,
    /// Sequence number of the most recently initiated fetch for this key.
    /// A response is applied only while its sequence number still owns the
    /// entry; superseded responses are discarded at resolution time.
    last_seq: u64,
    inflight: Option<u64>,
    waiters: Vec<oneshot::Sender<Vec<HsCodeRecord>>>,
}

/// De-duplicating cache of list fetches. Cheap to clone; clones share one
/// underlying entry map.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, CacheEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successful result for the key; empty if nothing has resolved yet.
    pub async fn records(&self, key: &QueryKey) -> Vec<HsCodeRecord> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|entry| entry.records.clone())
            .unwrap_or_default()
    }

    /// A fetch is in flight and no data has ever resolved for the key.
    pub async fn is_loading(&self, key: &QueryKey) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|entry| entry.inflight.is_some() && !entry.has_data)
            .unwrap_or(false)
    }

    /// A fetch for the key is in flight, regardless of whether stale data
    /// is currently shown.
    pub async fn is_fetching(&self, key: &QueryKey) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|entry| entry.inflight.is_some())
            .unwrap_or(false)
    }

    /// Mark the entry stale so the next `fetch` performs a network read.
    pub async fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Resolve the key to records, reading from the network at most once:
    /// fresh cached data is returned directly and concurrent callers for
    /// the same key share the single in-flight fetch.
    pub async fn fetch(
        &self,
        api: &dyn RecordTransport,
        key: &QueryKey,
    ) -> Result<Vec<HsCodeRecord>> {
        let seq = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();
            if entry.inflight.is_some() {
                let (tx, rx) = oneshot::channel();
                entry.waiters.push(tx);
                drop(entries);
                debug!(search = %key.search, "joining in-flight fetch");
                return Ok(rx.await.unwrap_or_default());
            }
            if entry.has_data && !entry.stale {
                return Ok(entry.records.clone());
            }
            entry.last_seq += 1;
            entry.inflight = Some(entry.last_seq);
            entry.last_seq
        };
        self.run_fetch(api, key, seq).await
    }

    /// Force a new network read for the key, superseding any in-flight
    /// fetch. Used for manual refresh and after successful mutations.
    pub async fn refetch(
        &self,
        api: &dyn RecordTransport,
        key: &QueryKey,
    ) -> Result<Vec<HsCodeRecord>> {
        let seq = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();
            entry.last_seq += 1;
            entry.inflight = Some(entry.last_seq);
            entry.last_seq
        };
        self.run_fetch(api, key, seq).await
    }

    async fn run_fetch(
        &self,
        api: &dyn RecordTransport,
        key: &QueryKey,
        seq: u64,
    ) -> Result<Vec<HsCodeRecord>> {
        let result = api.list(&key.to_list_query()).await;

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.clone()).or_default();
        if entry.inflight != Some(seq) {
            // A newer fetch owns this entry; whatever we got back is stale.
            debug!(search = %key.search, seq, "discarding superseded fetch result");
            return Ok(entry.records.clone());
        }
        entry.inflight = None;
        match result {
            Ok(records) => {
                entry.records = records.clone();
                entry.has_data = true;
                entry.stale = false;
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(records.clone());
                }
                Ok(records)
            }
            Err(err) => {
                // Keep the last-known-good result in place; the caller
                // surfaces the failure without clearing displayed data.
                warn!(search = %key.search, "list fetch failed: {err}");
                let snapshot = entry.records.clone();
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(snapshot.clone());
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
