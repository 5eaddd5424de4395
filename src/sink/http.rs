use crate::config::ClientSettings;
use crate::error::TributaryError;
use crate::providers::http::UPSTREAM_BODY_PREVIEW_CHARS;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use std::time::Duration;
use tributary_schema::ContentItem;
use url::Url;

use super::ContentSink;

/// Posts one JSON item per request to the ingestion endpoint, retrying server errors.
pub struct HttpSink {
    client: reqwest::Client,
    url: Url,
    token: Option<String>,
    retry_policy: ExponentialBuilder,
}

impl HttpSink {
    pub fn new(
        url: Url,
        token: Option<String>,
        settings: &ClientSettings,
    ) -> Result<Self, TributaryError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("tributary/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60));
        if let Some(proxy_url) = settings.proxy.clone() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(settings.retry_min_delay)
            .with_max_delay(settings.retry_min_delay * 8)
            .with_max_times(settings.retry_max_times)
            .with_jitter();

        Ok(Self {
            client: builder.build()?,
            url,
            token: token.filter(|t| !t.trim().is_empty()),
            retry_policy,
        })
    }

    async fn post_json_with_retry(
        &self,
        item: &ContentItem,
    ) -> Result<reqwest::Response, reqwest::Error> {
        (|| async {
            let mut request = self.client.post(self.url.clone()).json(item);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let resp = request.send().await?;

            if resp.status().is_server_error() {
                let status = resp.status();
                let err = match resp.error_for_status_ref() {
                    Err(err) => err,
                    Ok(_) => return Ok(resp),
                };

                let body_preview = match resp.bytes().await {
                    Ok(bytes) => {
                        let raw_body = String::from_utf8_lossy(&bytes);
                        format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
                    }
                    Err(e) => format!("<failed to read body: {e}>"),
                };

                tracing::debug!(
                    %status,
                    url = %self.url,
                    body = %body_preview,
                    "[sink] Upstream server error (will retry)"
                );

                return Err(err);
            }

            Ok(resp)
        })
        .retry(self.retry_policy)
        .await
    }
}

#[async_trait]
impl ContentSink for HttpSink {
    async fn upload_one(&self, item: &ContentItem) -> Result<String, TributaryError> {
        let resp = self
            .post_json_with_retry(item)
            .await
            .map_err(|e| TributaryError::Sink(format!("{} upload failed: {e}", item.path())))?;

        if !resp.status().is_success() {
            return Err(TributaryError::Sink(format!(
                "{} rejected with status {}",
                item.path(),
                resp.status()
            )));
        }

        // `{"id": "..."}` when the store reports one.
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(body
            .get("id")
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| item.path().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderDefaults;
    use tributary_schema::{ContentMetadata, ProviderKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item() -> ContentItem {
        let meta = ContentMetadata::new(ProviderKind::Website, "https://example.com", "/", None);
        ContentItem::with_header("hello", "text/plain", Some("u1".into()), meta)
    }

    fn sink(server: &MockServer) -> HttpSink {
        let mut settings = ProviderDefaults::default().client_settings();
        settings.retry_min_delay = Duration::from_millis(1);
        let url = Url::parse(&format!("{}/ingest", server.uri())).expect("url");
        HttpSink::new(url, Some("secret".into()), &settings).expect("sink")
    }

    #[tokio::test]
    async fn posts_item_and_returns_reported_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "doc-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ids = sink(&server).upload(&[item()], 2).await.expect("upload");
        assert_eq!(ids, vec!["doc-1"]);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 7})))
            .mount(&server)
            .await;

        let id = sink(&server).upload_one(&item()).await.expect("upload");
        assert_eq!(id, "7");
    }

    #[tokio::test]
    async fn client_errors_fail_the_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let err = sink(&server).upload_one(&item()).await.expect_err("rejected");
        assert!(matches!(err, TributaryError::Sink(_)));
    }
}
