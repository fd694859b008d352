// crates/network/src/client.rs
//! JSON-over-HTTP client bound to one upstream service

use crate::error::{NetworkError, NetworkResult};
use bookshelf_resilience::{with_retry, RetryPolicy};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Sent as `Authorization: Bearer ...` when set
    pub bearer_token: Option<String>,
    /// Retry policy for idempotent requests
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Bookshelf/{}", env!("CARGO_PKG_VERSION")),
            bearer_token: None,
            retry_policy: RetryPolicy::new(3).with_initial_delay(Duration::from_millis(200)),
        }
    }
}

/// A downloaded body together with its declared content type
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// HTTP client for a single base URL
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    base_url: Url,
    config: ClientConfig,
}

impl Client {
    /// Creates a client for `base_url` with default configuration
    pub fn new(base_url: &str) -> NetworkResult<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    /// Creates a client for `base_url` with custom configuration
    pub fn with_config(base_url: &str, config: ClientConfig) -> NetworkResult<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(NetworkError::InvalidUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| NetworkError::InvalidUrl(format!("invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let inner = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner,
            base_url,
            config,
        })
    }

    /// The base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path relative to the base URL
    pub fn url(&self, path: &str) -> NetworkResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// GET returning decoded JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self
            .send(Method::GET, &url, true, |b| b.query(query))
            .await?;
        decode(&url, response).await
    }

    /// POST that only reads state on the server, retried like a GET
    pub async fn post_query<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self
            .send(Method::POST, &url, true, |b| b.json(body))
            .await?;
        decode(&url, response).await
    }

    /// POST with side effects, never retried
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self
            .send(Method::POST, &url, false, |b| b.json(body))
            .await?;
        decode(&url, response).await
    }

    /// PUT with a JSON body and query string
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self
            .send(Method::PUT, &url, true, |b| b.query(query).json(body))
            .await?;
        decode(&url, response).await
    }

    /// PATCH with a JSON body
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self
            .send(Method::PATCH, &url, true, |b| b.json(body))
            .await?;
        decode(&url, response).await
    }

    /// DELETE returning decoded JSON
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T> {
        let url = self.url(path)?;
        let response = self.send(Method::DELETE, &url, true, |b| b).await?;
        decode(&url, response).await
    }

    /// GET returning the raw body
    pub async fn get_bytes(&self, path: &str) -> NetworkResult<Download> {
        let url = self.url(path)?;
        let response = self.send(Method::GET, &url, true, |b| b).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(Download {
            bytes,
            content_type,
        })
    }

    async fn send<F>(
        &self,
        method: Method,
        url: &Url,
        idempotent: bool,
        build: F,
    ) -> NetworkResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let policy = if idempotent {
            self.config.retry_policy.clone()
        } else {
            RetryPolicy::no_retry()
        };

        with_retry(&policy, NetworkError::is_retryable, || {
            let request = build(self.inner.request(method.clone(), url.clone()));
            let method = method.clone();
            async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_timeout() {
                        NetworkError::Timeout
                    } else {
                        NetworkError::Http(e)
                    }
                })?;
                log::debug!("{} {} {}", method, url, response.status());
                check_status(response).await
            }
        })
        .await
    }
}

async fn check_status(response: Response) -> NetworkResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> NetworkResult<T> {
    let bytes = response.bytes().await?;
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(body).map_err(|e| NetworkError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.bearer_token.is_none());
        assert_eq!(config.retry_policy.max_attempts(), 3);
    }

    #[test]
    fn test_client_creation() {
        assert!(Client::new("http://127.0.0.1:7700").is_ok());
        assert!(matches!(
            Client::new("not a url"),
            Err(NetworkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_url_joining_keeps_base_path() {
        let client = Client::new("http://calibre.local:8083/prefix").unwrap();
        let url = client.url("/cdb/cmd/list/0").unwrap();
        assert_eq!(url.as_str(), "http://calibre.local:8083/prefix/cdb/cmd/list/0");

        let root = Client::new("http://127.0.0.1:7700").unwrap();
        assert_eq!(
            root.url("indexes/library/search").unwrap().as_str(),
            "http://127.0.0.1:7700/indexes/library/search"
        );
    }

    #[test]
    fn test_bearer_token_accepted() {
        let config = ClientConfig {
            bearer_token: Some("masterKey".to_string()),
            ..ClientConfig::default()
        };
        assert!(Client::with_config("http://127.0.0.1:7700", config).is_ok());
    }
}
