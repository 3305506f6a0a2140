//! IP Fabric inventory tables: device and interface listings.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEVICE_COLUMNS: &[&str] =
    &["hostname", "siteName", "vendor", "platform", "model", "devType", "loginIp", "snHw"];

pub const INTERFACE_COLUMNS: &[&str] =
    &["hostname", "intName", "nameOriginal", "dscr", "l1", "l2", "reason", "primaryIp", "loginIp"];

#[derive(Debug, Error)]
pub enum IpFabricError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("unable to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid ip fabric configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IpFabricError>;

/// A row of the `inventory/devices` table. Every column may be null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dev_type: Option<String>,
    #[serde(default)]
    pub login_ip: Option<String>,
    #[serde(default)]
    pub sn_hw: Option<String>,
}

/// A row of the `inventory/interfaces` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredInterface {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub int_name: Option<String>,
    #[serde(default)]
    pub name_original: Option<String>,
    #[serde(default)]
    pub dscr: Option<String>,
    #[serde(default)]
    pub l1: Option<String>,
    #[serde(default)]
    pub l2: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub primary_ip: Option<String>,
    #[serde(default)]
    pub login_ip: Option<String>,
}

/// Where discovered devices and interfaces come from.
pub trait DiscoverySource {
    fn list_devices(&self, filters: &Value) -> Result<Vec<DiscoveredDevice>>;
    fn list_interfaces(&self) -> Result<Vec<DiscoveredInterface>>;
}

/// Connection settings for the IP Fabric API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpFabricConfig {
    pub url: String,
    pub token: String,
    /// `$last`, `$prev`, `$lastLocked` or a snapshot uuid.
    pub snapshot: String,
    pub verify_tls: bool,
    pub api_version: String,
    pub page_limit: usize,
    pub timeout_secs: u64,
}

impl IpFabricConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        IpFabricConfig {
            url: url.into(),
            token: token.into(),
            snapshot: "$last".into(),
            verify_tls: true,
            api_version: "v6.0".into(),
            page_limit: 1000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TablePage {
    data: Vec<Value>,
    #[serde(rename = "_meta", default)]
    meta: Option<Meta>,
}

pub struct IpFabricClient {
    http: Client,
    api: Url,
    snapshot: String,
    page_limit: usize,
}

impl IpFabricClient {
    pub fn new(cfg: &IpFabricConfig) -> Result<Self> {
        let api = api_root(&cfg.url, &cfg.api_version)?;
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&cfg.token)
            .map_err(|e| IpFabricError::Config(format!("invalid API token: {}", e)))?;
        headers.insert("X-API-Token", token);
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .user_agent(format!("ipf-netbox/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IpFabricError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(IpFabricClient { http, api, snapshot: cfg.snapshot.clone(), page_limit: cfg.page_limit.max(1) })
    }

    /// Fetch every row of a table, one page per request.
    pub fn fetch_table(&self, table: &str, columns: &[&str], filters: &Value) -> Result<Vec<Value>> {
        let url = self
            .api
            .join(&format!("tables/{}", table.trim_start_matches('/')))
            .map_err(|e| IpFabricError::Config(format!("bad table path {}: {}", table, e)))?;
        let mut rows = Vec::new();
        loop {
            let body = table_request(columns, filters, &self.snapshot, rows.len(), self.page_limit);
            debug!("POST {} start={}", url, rows.len());
            let resp = self
                .http
                .post(url.clone())
                .json(&body)
                .send()
                .map_err(|source| IpFabricError::Transport { url: url.to_string(), source })?;
            let status = resp.status();
            let text = resp
                .text()
                .map_err(|source| IpFabricError::Transport { url: url.to_string(), source })?;
            if !status.is_success() {
                return Err(IpFabricError::Status { url: url.to_string(), status: status.as_u16(), body: text });
            }
            let page: TablePage = serde_json::from_str(&text)
                .map_err(|source| IpFabricError::Decode { what: format!("{} page", table), source })?;
            let got = page.data.len();
            rows.extend(page.data);
            let total = page.meta.and_then(|m| m.count);
            if got == 0 || got < self.page_limit || total.map_or(false, |t| rows.len() >= t) {
                break;
            }
        }
        Ok(rows)
    }
}

impl DiscoverySource for IpFabricClient {
    fn list_devices(&self, filters: &Value) -> Result<Vec<DiscoveredDevice>> {
        let rows = self.fetch_table("inventory/devices", DEVICE_COLUMNS, filters)?;
        decode_rows(rows, "devices")
    }

    fn list_interfaces(&self) -> Result<Vec<DiscoveredInterface>> {
        let rows = self.fetch_table("inventory/interfaces", INTERFACE_COLUMNS, &json!({}))?;
        decode_rows(rows, "interfaces")
    }
}

fn table_request(columns: &[&str], filters: &Value, snapshot: &str, start: usize, limit: usize) -> Value {
    json!({
        "columns": columns,
        "filters": filters,
        "snapshot": snapshot,
        "pagination": {"start": start, "limit": limit},
    })
}

fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>> {
    serde_json::from_value(Value::Array(rows))
        .map_err(|source| IpFabricError::Decode { what: what.to_string(), source })
}

/// Devices from a JSON array, as exported from the inventory table.
pub fn parse_devices(s: &str) -> Result<Vec<DiscoveredDevice>> {
    serde_json::from_str(s).map_err(|source| IpFabricError::Decode { what: "devices file".into(), source })
}

/// Interfaces from a JSON array.
pub fn parse_interfaces(s: &str) -> Result<Vec<DiscoveredInterface>> {
    serde_json::from_str(s).map_err(|source| IpFabricError::Decode { what: "interfaces file".into(), source })
}

fn api_root(base: &str, version: &str) -> Result<Url> {
    let mut base = base.trim().to_string();
    if base.is_empty() {
        return Err(IpFabricError::Config("ip fabric url is empty".into()));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    let version = version.trim_matches('/');
    Url::parse(&base)
        .and_then(|u| u.join(&format!("api/{}/", version)))
        .map_err(|e| IpFabricError::Config(format!("invalid ip fabric url {}: {}", base, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    /// One canned JSON reply per connection; returns the request bodies seen.
    fn serve(listener: TcpListener, replies: Vec<String>) -> thread::JoinHandle<Vec<Value>> {
        thread::spawn(move || {
            let mut bodies = Vec::new();
            for body in replies {
                let (mut stream, _) = listener.accept().unwrap();
                bodies.push(read_body(&mut stream));
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
            bodies
        })
    }

    fn read_body(stream: &mut TcpStream) -> Value {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed before sending a full request");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            let Some(end) = text.find("\r\n\r\n") else { continue };
            let len = text[..end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return serde_json::from_slice(&buf[end + 4..end + 4 + len]).unwrap();
            }
        }
    }

    fn client_for(listener: &TcpListener, page_limit: usize) -> IpFabricClient {
        let mut cfg = IpFabricConfig::new(format!("http://{}", listener.local_addr().unwrap()), "secret");
        cfg.page_limit = page_limit;
        IpFabricClient::new(&cfg).unwrap()
    }

    #[test]
    fn fetch_table_pages_until_short_page() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = client_for(&listener, 2);
        let server = serve(
            listener,
            vec![
                r#"{"data": [{"hostname": "a"}, {"hostname": "b"}], "_meta": {"count": 3}}"#.to_string(),
                r#"{"data": [{"hostname": "c"}], "_meta": {"count": 3}}"#.to_string(),
            ],
        );
        let devs = client.list_devices(&json!({})).unwrap();
        let names: Vec<_> = devs.iter().filter_map(|d| d.hostname.as_deref()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let bodies = server.join().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["pagination"]["start"], 0);
        assert_eq!(bodies[1]["pagination"]["start"], 2);
        assert_eq!(bodies[1]["pagination"]["limit"], 2);
        assert_eq!(bodies[1]["snapshot"], "$last");
    }

    #[test]
    fn fetch_table_stops_at_reported_count() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = client_for(&listener, 2);
        // a full page that already reaches the total ends the loop without a third request
        let server = serve(
            listener,
            vec![
                r#"{"data": [{"hostname": "a"}, {"hostname": "b"}], "_meta": {"count": 4}}"#.to_string(),
                r#"{"data": [{"hostname": "c"}, {"hostname": "d"}], "_meta": {"count": 4}}"#.to_string(),
            ],
        );
        let rows = client.fetch_table("inventory/devices", DEVICE_COLUMNS, &json!({})).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn device_rows_decode_with_nulls() {
        let devs = parse_devices(
            r#"[{"hostname": "SW1", "siteName": "HQ", "vendor": "Cisco", "platform": "IOS-XE",
                 "model": "", "devType": "switch", "loginIp": "10.0.0.1", "snHw": "ABC123"},
                {"hostname": "fw1", "siteName": null, "vendor": "paloalto"}]"#,
        )
        .unwrap();
        assert_eq!(devs.len(), 2);
        assert_eq!(devs[0].site_name.as_deref(), Some("HQ"));
        assert_eq!(devs[0].dev_type.as_deref(), Some("switch"));
        assert_eq!(devs[1].site_name, None);
        assert_eq!(devs[1].sn_hw, None);
    }

    #[test]
    fn interface_rows_decode() {
        let intfs = parse_interfaces(
            r#"[{"hostname": "SW1", "intName": "Gi1/0/1", "nameOriginal": "GigabitEthernet1/0/1",
                 "dscr": null, "l1": "down", "l2": "down", "reason": "admin",
                 "primaryIp": "10.0.0.1", "loginIp": "10.0.0.1", "extra": 1}]"#,
        )
        .unwrap();
        assert_eq!(intfs[0].name_original.as_deref(), Some("GigabitEthernet1/0/1"));
        assert_eq!(intfs[0].dscr, None);
        assert_eq!(intfs[0].primary_ip, intfs[0].login_ip);
    }

    #[test]
    fn bad_file_is_decode_error() {
        assert!(matches!(parse_devices("{"), Err(IpFabricError::Decode { .. })));
    }

    #[test]
    fn api_root_includes_version() {
        assert_eq!(api_root("https://ipf.lab", "v6.0").unwrap().as_str(), "https://ipf.lab/api/v6.0/");
        assert_eq!(api_root("https://ipf.lab/", "/v6.0/").unwrap().as_str(), "https://ipf.lab/api/v6.0/");
        assert!(api_root(" ", "v6.0").is_err());
    }

    #[test]
    fn table_request_carries_snapshot_and_paging() {
        let body = table_request(DEVICE_COLUMNS, &json!({"siteName": ["eq", "HQ"]}), "$last", 1000, 500);
        assert_eq!(body["snapshot"], "$last");
        assert_eq!(body["pagination"]["start"], 1000);
        assert_eq!(body["pagination"]["limit"], 500);
        assert_eq!(body["columns"][0], "hostname");
        assert_eq!(body["filters"]["siteName"][1], "HQ");
    }
}
