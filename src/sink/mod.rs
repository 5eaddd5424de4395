//! Downstream content store.

mod http;
mod memory;

pub use http::HttpSink;
pub use memory::MemorySink;

use crate::config::Config;
use crate::error::TributaryError;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use tracing::info;
use tributary_schema::ContentItem;

#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Store one item and return its downstream id.
    async fn upload_one(&self, item: &ContentItem) -> Result<String, TributaryError>;

    /// Upload every item with at most `concurrency` requests in flight.
    ///
    /// Ids come back in item order. The first failure fails the whole batch; items already
    /// stored stay stored.
    async fn upload(
        &self,
        items: &[ContentItem],
        concurrency: usize,
    ) -> Result<Vec<String>, TributaryError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let uploads: Vec<_> = items.iter().map(|item| self.upload_one(item)).collect();
        stream::iter(uploads)
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}

/// HTTP sink when `sink.url` is configured, in-memory dry run otherwise.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn ContentSink>, TributaryError> {
    match &cfg.sink.url {
        Some(url) => {
            info!(sink_url = %url, sink_token = cfg.sink.token.is_some(), "Content sink: http");
            Ok(Arc::new(HttpSink::new(
                url.clone(),
                cfg.sink.token.clone(),
                &cfg.providers.defaults.client_settings(),
            )?))
        }
        None => {
            info!("Content sink: in-memory (dry run, sink.url unset)");
            Ok(Arc::new(MemorySink::new()))
        }
    }
}
