use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use super::*;
use shared::domain::RecordId;
use shared::protocol::HsCodeData;

struct Scripted {
    delay: Duration,
    result: Result<Vec<HsCodeRecord>>,
}

impl Scripted {
    fn ok(records: Vec<HsCodeRecord>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(records),
        }
    }

    fn ok_after(delay: Duration, records: Vec<HsCodeRecord>) -> Self {
        Self {
            delay,
            result: Ok(records),
        }
    }

    fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(anyhow!(message.to_string())),
        }
    }
}

/// Transport that replays a fixed script of list responses, recording the
/// queries it was asked for.
struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<CodeListQuery>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl RecordTransport for ScriptedTransport {
    async fn list(&self, query: &CodeListQuery) -> Result<Vec<HsCodeRecord>> {
        let step = {
            let mut script = self.script.lock().await;
            let step = script.pop_front();
            self.calls.lock().await.push(query.clone());
            step
        };
        let step = step.ok_or_else(|| anyhow!("scripted transport exhausted"))?;
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.result
    }

    async fn create(&self, _data: &HsCodeData) -> Result<HsCodeRecord> {
        Err(anyhow!("not scripted"))
    }

    async fn update(&self, _pk: RecordId, _data: &HsCodeData) -> Result<HsCodeRecord> {
        Err(anyhow!("not scripted"))
    }

    async fn delete(&self, _pk: RecordId) -> Result<()> {
        Err(anyhow!("not scripted"))
    }
}

fn record(pk: i64, code: &str) -> HsCodeRecord {
    HsCodeRecord {
        pk: RecordId(pk),
        code: code.to_string(),
        description: String::new(),
        category: None,
        category_detail: None,
        customer: None,
        customer_detail: None,
        notes: String::new(),
    }
}

#[tokio::test]
async fn cached_result_is_reused_without_a_second_read() {
    let api = ScriptedTransport::new(vec![Scripted::ok(vec![record(1, "8471.30")])]);
    let cache = QueryCache::new();
    let key = QueryKey::new("", None);

    let first = cache.fetch(api.as_ref(), &key).await.expect("first fetch");
    let second = cache.fetch(api.as_ref(), &key).await.expect("cached fetch");

    assert_eq!(first, second);
    assert_eq!(api.call_count().await, 1);
}

#[tokio::test]
async fn concurrent_fetches_for_one_key_share_a_single_read() {
    let api = ScriptedTransport::new(vec![Scripted::ok_after(
        Duration::from_millis(50),
        vec![record(1, "8471.30")],
    )]);
    let cache = QueryCache::new();
    let key = QueryKey::new("84", None);

    let (a, b) = tokio::join!(cache.fetch(api.as_ref(), &key), cache.fetch(api.as_ref(), &key));

    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(api.call_count().await, 1);
}

#[tokio::test]
async fn refetch_supersedes_an_inflight_fetch() {
    let api = ScriptedTransport::new(vec![
        Scripted::ok_after(Duration::from_millis(200), vec![record(1, "stale")]),
        Scripted::ok_after(Duration::from_millis(10), vec![record(2, "current")]),
    ]);
    let cache = QueryCache::new();
    let key = QueryKey::new("code", None);

    let slow = {
        let cache = cache.clone();
        let api = Arc::clone(&api);
        let key = key.clone();
        tokio::spawn(async move { cache.fetch(api.as_ref(), &key).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    cache.refetch(api.as_ref(), &key).await.expect("refetch");
    slow.await.expect("join").expect("slow fetch");

    // The slow response resolved last but was superseded; only the refetch
    // result may be applied.
    assert_eq!(cache.records(&key).await, vec![record(2, "current")]);
    assert!(!cache.is_fetching(&key).await);
}

#[tokio::test]
async fn failed_refetch_retains_last_good_records() {
    let api = ScriptedTransport::new(vec![
        Scripted::ok(vec![record(1, "8471.30")]),
        Scripted::err("backend unavailable"),
    ]);
    let cache = QueryCache::new();
    let key = QueryKey::new("", None);

    cache.fetch(api.as_ref(), &key).await.expect("initial fetch");
    let failed = cache.refetch(api.as_ref(), &key).await;

    assert!(failed.is_err());
    assert_eq!(cache.records(&key).await, vec![record(1, "8471.30")]);
    assert!(!cache.is_fetching(&key).await);
}

#[tokio::test]
async fn invalidated_entry_is_read_again_on_next_fetch() {
    let api = ScriptedTransport::new(vec![
        Scripted::ok(vec![record(1, "old")]),
        Scripted::ok(vec![record(1, "new")]),
    ]);
    let cache = QueryCache::new();
    let key = QueryKey::new("", None);

    cache.fetch(api.as_ref(), &key).await.expect("first fetch");
    cache.invalidate(&key).await;
    cache.fetch(api.as_ref(), &key).await.expect("second fetch");

    assert_eq!(cache.records(&key).await, vec![record(1, "new")]);
    assert_eq!(api.call_count().await, 2);
}

#[tokio::test]
async fn loading_is_only_reported_before_first_data() {
    let api = ScriptedTransport::new(vec![
        Scripted::ok_after(Duration::from_millis(80), vec![record(1, "8471.30")]),
        Scripted::ok_after(Duration::from_millis(80), vec![record(1, "8471.30")]),
    ]);
    let cache = QueryCache::new();
    let key = QueryKey::new("", None);

    let first = {
        let cache = cache.clone();
        let api = Arc::clone(&api);
        let key = key.clone();
        tokio::spawn(async move { cache.fetch(api.as_ref(), &key).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.is_loading(&key).await);
    assert!(cache.is_fetching(&key).await);
    first.await.expect("join").expect("first fetch");

    let second = {
        let cache = cache.clone();
        let api = Arc::clone(&api);
        let key = key.clone();
        tokio::spawn(async move { cache.refetch(api.as_ref(), &key).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Stale data is still shown while the refetch runs.
    assert!(!cache.is_loading(&key).await);
    assert!(cache.is_fetching(&key).await);
    second.await.expect("join").expect("refetch");
}

#[tokio::test]
async fn scope_and_search_form_distinct_cache_entries() {
    let api = ScriptedTransport::new(vec![
        Scripted::ok(vec![record(1, "global")]),
        Scripted::ok(vec![record(2, "scoped")]),
    ]);
    let cache = QueryCache::new();
    let global = QueryKey::new("84", None);
    let scoped = QueryKey::new("84", Some(CompanyId(12)));

    cache.fetch(api.as_ref(), &global).await.expect("global");
    cache.fetch(api.as_ref(), &scoped).await.expect("scoped");

    assert_eq!(api.call_count().await, 2);
    let calls = api.calls.lock().await;
    assert_eq!(calls[0].customer, None);
    assert_eq!(calls[1].customer, Some(12));
    drop(calls);
    assert_eq!(cache.records(&global).await, vec![record(1, "global")]);
    assert_eq!(cache.records(&scoped).await, vec![record(2, "scoped")]);
}

#[test]
fn empty_filters_are_omitted_from_the_list_query() {
    let key = QueryKey::new("", None);
    let query = key.to_list_query();
    assert_eq!(query.customer, None);
    assert_eq!(query.search, None);

    let key = QueryKey::new("84", Some(CompanyId(12)));
    let query = key.to_list_query();
    assert_eq!(query.customer, Some(12));
    assert_eq!(query.search.as_deref(), Some("84"));
}
