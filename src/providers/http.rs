use crate::config::ClientSettings;
use crate::error::{IsRetryable, TributaryError};
use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 256;

/// reqwest client plus the rate-limit retry policy of one provider.
#[derive(Clone)]
pub struct UpstreamClient {
    provider: &'static str,
    client: reqwest::Client,
    retry_policy: ExponentialBuilder,
}

impl UpstreamClient {
    pub fn new(
        provider: &'static str,
        settings: &ClientSettings,
        user_agent: &str,
    ) -> Result<Self, TributaryError> {
        let mut headers = HeaderMap::new();
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60));

        if let Some(proxy_url) = settings.proxy.clone() {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())?;
            builder = builder.proxy(proxy);
        }

        if !settings.enable_multiplexing {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));

            builder = builder
                .http1_only()
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Duration::from_secs(0));
        } else {
            builder = builder.http2_adaptive_window(true);
        }

        let client = builder.default_headers(headers).build()?;

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(settings.retry_min_delay)
            .with_max_delay(settings.retry_min_delay * 8)
            .with_max_times(settings.retry_max_times)
            .with_jitter();

        Ok(Self {
            provider,
            client,
            retry_policy,
        })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send a request, retrying only on HTTP 429. Any other status is returned as is.
    pub async fn send_raw<F>(&self, build: F) -> Result<reqwest::Response, TributaryError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let build = &build;
        let client = &self.client;
        let provider = self.provider;

        (move || async move {
            let resp = build(client).send().await?;
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                return Err(TributaryError::UpstreamStatus {
                    status: resp.status(),
                    url: resp.url().to_string(),
                });
            }
            Ok(resp)
        })
        .retry(self.retry_policy)
        .when(|err: &TributaryError| err.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(provider, "[{provider}] rate limited, retrying in {:?}: {}", dur, err);
        })
        .await
    }

    /// Like [`send_raw`](Self::send_raw) but non-2xx statuses become `UpstreamStatus`.
    pub async fn send<F>(&self, build: F) -> Result<reqwest::Response, TributaryError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let resp = self.send_raw(build).await?;
        ensure_success(self.provider, resp).await
    }
}

/// Turn a non-2xx response into `UpstreamStatus`, logging a body preview.
pub async fn ensure_success(
    provider: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, TributaryError> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let url = resp.url().to_string();
    let body_preview = match resp.bytes().await {
        Ok(bytes) => {
            let raw_body = String::from_utf8_lossy(&bytes);
            format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
        }
        Err(e) => format!("<failed to read body: {e}>"),
    };

    debug!(
        provider,
        %status,
        url = %url,
        body = %body_preview,
        "[{provider}] Upstream error response"
    );

    Err(TributaryError::UpstreamStatus { status, url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderDefaults;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(retries: usize) -> UpstreamClient {
        let mut settings = ProviderDefaults::default().client_settings();
        settings.retry_max_times = retries;
        settings.retry_min_delay = Duration::from_millis(1);
        UpstreamClient::new("test", &settings, "tributary-test").expect("client builds")
    }

    #[tokio::test]
    async fn rate_limits_are_retried_then_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let url = format!("{}/limited", server.uri());
        let resp = fast_client(3)
            .send(|c| c.get(&url))
            .await
            .expect("eventually succeeds");
        assert_eq!(resp.text().await.expect("body"), "ok");
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/broken", server.uri());
        let err = fast_client(3)
            .send(|c| c.get(&url))
            .await
            .expect_err("fails");
        assert!(matches!(
            err,
            TributaryError::UpstreamStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_budget_surfaces_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/always", server.uri());
        let err = fast_client(2)
            .send(|c| c.get(&url))
            .await
            .expect_err("budget exhausted");
        assert!(err.is_retryable());
    }
}
