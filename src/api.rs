use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::AUTHORIZATION;
use reqwest::{Certificate, Client, Identity, RequestBuilder, StatusCode};
use url::Url;

use crate::error::TransportError;
use crate::models::splunk::JobHandle;

/// Raw access to the three search-job endpoints. Each call is exactly one
/// round trip; interpreting the returned documents is left to the caller.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Create a job; returns the submit response document.
    async fn submit(&self, query: &str) -> Result<String, TransportError>;

    /// Returns the job's status document.
    async fn poll_status(&self, handle: &JobHandle) -> Result<String, TransportError>;

    /// Returns the job's result document.
    async fn fetch_results(
        &self,
        handle: &JobHandle,
        fields: &[String],
        max_results: Option<NonZeroU32>,
    ) -> Result<String, TransportError>;
}

#[async_trait]
impl<T: SearchTransport + ?Sized> SearchTransport for &T {
    async fn submit(&self, query: &str) -> Result<String, TransportError> {
        (**self).submit(query).await
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<String, TransportError> {
        (**self).poll_status(handle).await
    }

    async fn fetch_results(
        &self,
        handle: &JobHandle,
        fields: &[String],
        max_results: Option<NonZeroU32>,
    ) -> Result<String, TransportError> {
        (**self).fetch_results(handle, fields, max_results).await
    }
}

#[async_trait]
impl<T: SearchTransport + ?Sized> SearchTransport for Arc<T> {
    async fn submit(&self, query: &str) -> Result<String, TransportError> {
        (**self).submit(query).await
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<String, TransportError> {
        (**self).poll_status(handle).await
    }

    async fn fetch_results(
        &self,
        handle: &JobHandle,
        fields: &[String],
        max_results: Option<NonZeroU32>,
    ) -> Result<String, TransportError> {
        (**self).fetch_results(handle, fields, max_results).await
    }
}

#[derive(Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    /// Bearer authentication token.
    Token(String),
    /// Session key from `services/auth/login`.
    SessionKey(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Auth::Token(_) => f.write_str("Token(***)"),
            Auth::SessionKey(_) => f.write_str("SessionKey(***)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustMode {
    #[default]
    Strict,
    /// Accept self-signed or otherwise unverifiable server certificates.
    AcceptSelfSigned,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth: Auth,
    pub trust_mode: TrustMode,
    /// Extra PEM root certificates to trust.
    pub ca_bundle: Option<PathBuf>,
    /// PEM file holding a client certificate and private key, for mutual TLS.
    pub client_identity: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            trust_mode: TrustMode::Strict,
            ca_bundle: None,
            client_identity: None,
            request_timeout: None,
        }
    }

    pub fn with_trust_mode(mut self, trust_mode: TrustMode) -> Self {
        self.trust_mode = trust_mode;
        self
    }
}

/// reqwest-backed transport. Cloning shares the underlying connection pool,
/// so one client can serve many concurrent searches.
#[derive(Clone)]
pub struct SplunkClient {
    base_url: Url,
    auth: Auth,
    client: Client,
}

impl SplunkClient {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut builder = Client::builder();
        if config.trust_mode == TrustMode::AcceptSelfSigned {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ca_bundle {
            let certs = Certificate::from_pem_bundle(&read_pem(path)?).map_err(TransportError::Build)?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if let Some(path) = &config.client_identity {
            let identity = Identity::from_pem(&read_pem(path)?).map_err(TransportError::Build)?;
            builder = builder.identity(identity);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Build)?;

        Ok(Self {
            base_url,
            auth: config.auth.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Cannot-be-a-base URLs are rejected in `parse_base_url`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Token(token) => request.bearer_auth(token),
            Auth::SessionKey(key) => request.header(AUTHORIZATION, format!("Splunk {}", key)),
        }
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("Splunk rejected credentials for {}: {}", url, status);
            return Err(TransportError::Unauthorized { status, body: text });
        }
        if !status.is_success() {
            error!("Splunk API Error {} from {}: {}", status, url, text);
            return Err(TransportError::Status { status, body: text });
        }

        Ok(text)
    }
}

#[async_trait]
impl SearchTransport for SplunkClient {
    async fn submit(&self, query: &str) -> Result<String, TransportError> {
        let url = self.endpoint(&["services", "search", "jobs"]);
        let search = normalize_query(query);
        debug!("Submitting search: {}", search);

        let request = self.client.post(url.clone()).form(&[("search", search.as_str())]);
        self.send(request, &url).await
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<String, TransportError> {
        let url = self.endpoint(&["services", "search", "jobs", handle.as_str()]);
        let request = self.client.get(url.clone());
        self.send(request, &url).await
    }

    async fn fetch_results(
        &self,
        handle: &JobHandle,
        fields: &[String],
        max_results: Option<NonZeroU32>,
    ) -> Result<String, TransportError> {
        let url = self.endpoint(&["services", "search", "v2", "jobs", handle.as_str(), "results"]);

        let mut params: Vec<(&str, String)> = vec![("output_mode", "json".to_string())];
        params.extend(fields.iter().map(|f| ("f", f.clone())));
        if let Some(count) = max_results {
            params.push(("count", count.to_string()));
        }

        let request = self.client.get(url.clone()).query(&params);
        self.send(request, &url).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }
    Ok(url)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::Certificate {
        path: path.to_path_buf(),
        source,
    })
}

/// Splunk only accepts searches that start with a generating command.
pub fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    let has_command = trimmed.starts_with('|')
        || trimmed
            .split_whitespace()
            .next()
            .is_some_and(|first| first.eq_ignore_ascii_case("search"));
    if has_command {
        trimmed.to_string()
    } else {
        format!("search {}", trimmed)
    }
}
