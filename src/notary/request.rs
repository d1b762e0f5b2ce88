//! What the notary is asked to fetch and what it may disclose.

use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid registry url: {0}")]
    InvalidUrl(String),

    #[error("registry url must use https, got {0}")]
    InsecureScheme(String),

    #[error("registry host {0} is not allowed by this notary")]
    HostNotAllowed(String),
}

/// One registry lookup: `POST <url>` with `{"nuip": <n>, "ip": <client_ip>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRequest {
    pub url: String,
    pub nuip: u64,
    pub client_ip: String,
}

impl RegistryRequest {
    /// Parse and check the target URL, returning it with its host name.
    pub fn target(&self) -> Result<(Url, String), RequestError> {
        let url = Url::parse(&self.url).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "https" {
            return Err(RequestError::InsecureScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| RequestError::InvalidUrl(format!("{} has no host", self.url)))?
            .to_string();
        Ok((url, host))
    }

    pub fn body(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Lookup<'a> {
            nuip: u64,
            ip: &'a str,
        }

        serde_json::to_vec(&Lookup {
            nuip: self.nuip,
            ip: &self.client_ip,
        })
        .unwrap_or_default()
    }

    /// Render the request bytes the notary records as the sent transcript.
    pub fn render(&self) -> Result<Vec<u8>, RequestError> {
        let (url, host) = self.target()?;
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        let body = self.body();

        let mut out = format!(
            "POST {} HTTP/1.1\r\nhost: {}\r\ncontent-type: application/json\r\nconnection: close\r\ncontent-length: {}\r\n\r\n",
            path,
            host,
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// Template the service stamps registry requests from.
#[derive(Debug, Clone)]
pub struct RegistryTemplate {
    url: String,
    client_ip: String,
}

impl RegistryTemplate {
    pub fn new(url: impl Into<String>, client_ip: impl Into<String>) -> Result<Self, RequestError> {
        let template = Self {
            url: url.into(),
            client_ip: client_ip.into(),
        };
        template.request_for(0).target()?;
        Ok(template)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_for(&self, nuip: u64) -> RegistryRequest {
        RegistryRequest {
            url: self.url.clone(),
            nuip,
            client_ip: self.client_ip.clone(),
        }
    }
}

/// Top-level JSON response fields the notary reveals or commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosurePolicy {
    pub reveal: Vec<String>,
    pub commit: Vec<String>,
}

impl Default for DisclosurePolicy {
    fn default() -> Self {
        Self {
            reveal: vec!["nuip".to_string()],
            commit: vec!["vigencia".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizeRequest {
    pub request: RegistryRequest,
    #[serde(default)]
    pub disclosure: DisclosurePolicy,
}

impl NotarizeRequest {
    pub fn new(request: RegistryRequest) -> Self {
        Self {
            request,
            disclosure: DisclosurePolicy::default(),
        }
    }
}
