#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tributary::bootstrap::Services;
use tributary::config::Config;
use tributary::db::DbActorHandle;
use tributary::error::TributaryError;
use tributary::providers::{Provider, ProviderSet, PullOptions, PullResult};
use tributary::sink::MemorySink;
use tributary_schema::{ContentItem, ContentMetadata, ProviderKind};

/// Fresh on-disk sqlite database per test.
pub async fn temp_db(tag: &str) -> DbActorHandle {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "tributary-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));

    let database_url = format!("sqlite:{}", temp_path.display());
    tributary::db::spawn(&database_url)
        .await
        .expect("failed to spawn db actor")
}

/// Services over `providers` with an in-memory sink.
pub fn services(db: DbActorHandle, providers: ProviderSet) -> (Services, Arc<MemorySink>) {
    let cfg = Config::default();
    let sink = Arc::new(MemorySink::new());
    let services = Services::assemble(&cfg, db, providers, sink.clone());
    (services, sink)
}

pub fn provider_set(providers: Vec<Arc<dyn Provider>>) -> ProviderSet {
    let mut set = ProviderSet::new();
    for provider in providers {
        set.register(provider);
    }
    set
}

/// Poll `check` until it yields `Some`, panicking after five seconds.
pub async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Always fails with a non-retryable upstream error.
pub struct FailingProvider {
    pub kind: ProviderKind,
    pub calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn pull(&self, _opts: PullOptions) -> Result<PullResult, TributaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TributaryError::UpstreamPayload("upstream unavailable".to_string()))
    }
}

/// Emits the same files on every pull and reports a fixed cursor.
pub struct StaticProvider {
    pub kind: ProviderKind,
    pub paths: Vec<String>,
    pub cursor: String,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(kind: ProviderKind, paths: &[&str], cursor: &str) -> Self {
        Self {
            kind,
            paths: paths.iter().map(|p| p.to_string()).collect(),
            cursor: cursor.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn pull(&self, opts: PullOptions) -> Result<PullResult, TributaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = self
            .paths
            .iter()
            .map(|path| {
                let meta = ContentMetadata::new(self.kind, opts.resource_id.as_str(), path.as_str(), None);
                ContentItem::with_header("content", "text/plain", opts.user_id.clone(), meta)
            })
            .collect();
        Ok(PullResult {
            items,
            new_cursor: Some(self.cursor.clone()),
        })
    }
}
