use crate::error::TributaryError;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tributary_schema::ContentItem;

use super::ContentSink;

/// Keeps uploaded items in memory. Used for dry runs and tests.
#[derive(Default)]
pub struct MemorySink {
    items: Mutex<Vec<ContentItem>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn items(&self) -> Vec<ContentItem> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[async_trait]
impl ContentSink for MemorySink {
    async fn upload_one(&self, item: &ContentItem) -> Result<String, TributaryError> {
        let mut items = self.items.lock().await;
        items.push(item.clone());
        Ok(format!("mem-{}", items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_schema::{ContentMetadata, ProviderKind};

    fn item(path: &str) -> ContentItem {
        let meta = ContentMetadata::new(ProviderKind::CodeHost, "acme/widgets", path, None);
        ContentItem::with_header("body", "text/plain", None, meta)
    }

    #[tokio::test]
    async fn empty_upload_is_a_no_op() {
        let sink = MemorySink::new();
        assert!(sink.upload(&[], 4).await.expect("upload").is_empty());
        assert_eq!(sink.len().await, 0);
    }

    #[tokio::test]
    async fn upload_keeps_every_item() {
        let sink = MemorySink::new();
        let ids = sink
            .upload(&[item("a.rs"), item("b.rs"), item("c.rs")], 2)
            .await
            .expect("upload");
        assert_eq!(ids.len(), 3);
        let mut paths: Vec<String> = sink
            .items()
            .await
            .iter()
            .map(|i| i.path().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
    }
}
