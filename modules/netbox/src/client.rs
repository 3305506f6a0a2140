use crate::{Collection, Inventory, InventoryError, Query, Record, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection settings for the NetBox REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetboxConfig {
    pub url: String,
    pub token: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    pub page_limit: usize,
}

impl NetboxConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        NetboxConfig { url: url.into(), token: token.into(), verify_tls: true, timeout_secs: 30, page_limit: 1000 }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

/// Blocking REST client. Every call is one round trip on the calling thread.
pub struct NetboxClient {
    http: Client,
    api: Url,
    page_limit: usize,
}

impl NetboxClient {
    pub fn new(cfg: &NetboxConfig) -> Result<Self> {
        let api = api_root(&cfg.url)?;
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Token {}", cfg.token))
            .map_err(|e| InventoryError::Config(format!("invalid API token: {}", e)))?;
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .user_agent(format!("ipf-netbox/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InventoryError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(NetboxClient { http, api, page_limit: cfg.page_limit.max(1) })
    }

    fn collection_url(&self, collection: Collection) -> Result<Url> {
        self.api
            .join(collection.path())
            .map_err(|e| InventoryError::Config(format!("bad collection path {}: {}", collection.path(), e)))
    }

    fn record_url(&self, collection: Collection, id: u64) -> Result<Url> {
        let base = self.collection_url(collection)?;
        base.join(&format!("{}/", id))
            .map_err(|e| InventoryError::Config(format!("bad record path {}: {}", id, e)))
    }

    fn send<T: DeserializeOwned>(&self, method: &'static str, url: &Url, req: RequestBuilder) -> Result<Option<T>> {
        debug!("{} {}", method, url);
        let resp = req
            .send()
            .map_err(|source| InventoryError::Transport { url: url.to_string(), source })?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|source| InventoryError::Transport { url: url.to_string(), source })?;
        if !status.is_success() {
            return Err(InventoryError::Status { method, url: url.to_string(), status: status.as_u16(), body });
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| InventoryError::Decode { url: url.to_string(), source })
    }

    /// Follow `next` links until the listing is exhausted.
    fn list(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        let mut url = self.collection_url(collection)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &self.page_limit.to_string());
            for (k, v) in query.pairs() {
                pairs.append_pair(k, v);
            }
        }
        let mut out = Vec::new();
        loop {
            let page: Option<Page<Record>> = self.send("GET", &url, self.http.get(url.clone()))?;
            let Some(page) = page else { break };
            out.extend(page.results);
            match page.next {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| InventoryError::Config(format!("bad next link {}: {}", next, e)))?;
                }
                None => break,
            }
        }
        Ok(out)
    }
}

impl Inventory for NetboxClient {
    fn all(&self, collection: Collection) -> Result<Vec<Record>> {
        self.list(collection, &Query::new())
    }

    /// A 404 here means the record is gone. Listings keep 404 as an error.
    fn get(&self, collection: Collection, id: u64) -> Result<Option<Record>> {
        let url = self.record_url(collection, id)?;
        match self.send("GET", &url, self.http.get(url.clone())) {
            Err(InventoryError::Status { status: 404, .. }) => Ok(None),
            other => other,
        }
    }

    fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        self.list(collection, query)
    }

    fn create(&self, collection: Collection, attrs: Value) -> Result<Record> {
        let url = self.collection_url(collection)?;
        match self.send::<Record>("POST", &url, self.http.post(url.clone()).json(&attrs)) {
            Ok(Some(r)) => Ok(r),
            Ok(None) => Err(InventoryError::Create { collection, reason: "empty response".into() }),
            Err(InventoryError::Status { status: 400, body, .. }) => Err(InventoryError::Create { collection, reason: body }),
            Err(e) => Err(e),
        }
    }

    fn update(&self, collection: Collection, id: u64, attrs: Value) -> Result<Record> {
        let url = self.record_url(collection, id)?;
        self.send::<Record>("PATCH", &url, self.http.patch(url.clone()).json(&attrs))?
            .ok_or(InventoryError::NotFound { collection, id })
    }

    fn delete(&self, collection: Collection, id: u64) -> Result<()> {
        let url = self.record_url(collection, id)?;
        match self.send::<Value>("DELETE", &url, self.http.delete(url.clone())) {
            Ok(_) => Ok(()),
            Err(InventoryError::Status { status: 404, .. }) => Err(InventoryError::NotFound { collection, id }),
            Err(e) => Err(e),
        }
    }
}

/// `http://host:8000` and `http://host:8000/` both become `http://host:8000/api/`.
fn api_root(base: &str) -> Result<Url> {
    let mut base = base.trim().to_string();
    if base.is_empty() {
        return Err(InventoryError::Config("netbox url is empty".into()));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .and_then(|u| u.join("api/"))
        .map_err(|e| InventoryError::Config(format!("invalid netbox url {}: {}", base, e)))
}
