use anyhow::{anyhow, Context, Result};
use clap::Args;
use ipfabric::IpFabricConfig;
use netbox::NetboxConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG: &str = "ipf-netbox.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct IpFabricSection {
    pub url: Option<String>,
    pub token: Option<String>,
    pub snapshot: Option<String>,
    pub verify_tls: Option<bool>,
    pub api_version: Option<String>,
    pub page_limit: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct NetboxSection {
    pub url: Option<String>,
    pub token: Option<String>,
    pub verify_tls: Option<bool>,
    pub page_limit: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub ipfabric: Option<IpFabricSection>,
    pub netbox: Option<NetboxSection>,
}

/// Connection flags; each one wins over the config file.
#[derive(Debug, Default, Clone, Args)]
pub struct ConnectionArgs {
    /// IP Fabric base URL
    #[arg(long, env = "IPF_URL", global = true)]
    pub ipf_url: Option<String>,
    /// IP Fabric API token
    #[arg(long, env = "IPF_TOKEN", global = true, hide_env_values = true)]
    pub ipf_token: Option<String>,
    /// IP Fabric snapshot: $last, $prev, $lastLocked or a snapshot id
    #[arg(long, env = "IPF_SNAPSHOT", global = true)]
    pub ipf_snapshot: Option<String>,
    /// Skip TLS certificate verification for IP Fabric
    #[arg(long, global = true, default_value_t = false)]
    pub ipf_insecure: bool,
    /// NetBox base URL
    #[arg(long, env = "NB_URL", global = true)]
    pub netbox_url: Option<String>,
    /// NetBox API token
    #[arg(long, env = "NB_TOKEN", global = true, hide_env_values = true)]
    pub netbox_token: Option<String>,
    /// Skip TLS certificate verification for NetBox
    #[arg(long, global = true, default_value_t = false)]
    pub netbox_insecure: bool,
}

/// Load the YAML config. Without a path, `./ipf-netbox.yaml` is used when present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("missing {}: set it in the config file, by flag or by environment", what))
}

impl Config {
    pub fn netbox(&self, args: &ConnectionArgs) -> Result<NetboxConfig> {
        let file = self.netbox.clone().unwrap_or_default();
        let url = required(args.netbox_url.clone().or(file.url), "netbox url")?;
        let token = required(args.netbox_token.clone().or(file.token), "netbox token")?;
        let mut cfg = NetboxConfig::new(url, token);
        if let Some(v) = file.verify_tls { cfg.verify_tls = v; }
        if args.netbox_insecure { cfg.verify_tls = false; }
        if let Some(v) = file.page_limit { cfg.page_limit = v; }
        if let Some(v) = file.timeout_secs { cfg.timeout_secs = v; }
        Ok(cfg)
    }

    pub fn ipfabric(&self, args: &ConnectionArgs) -> Result<IpFabricConfig> {
        let file = self.ipfabric.clone().unwrap_or_default();
        let url = required(args.ipf_url.clone().or(file.url), "ip fabric url")?;
        let token = required(args.ipf_token.clone().or(file.token), "ip fabric token")?;
        let mut cfg = IpFabricConfig::new(url, token);
        if let Some(v) = args.ipf_snapshot.clone().or(file.snapshot) { cfg.snapshot = v; }
        if let Some(v) = file.verify_tls { cfg.verify_tls = v; }
        if args.ipf_insecure { cfg.verify_tls = false; }
        if let Some(v) = file.api_version { cfg.api_version = v; }
        if let Some(v) = file.page_limit { cfg.page_limit = v; }
        if let Some(v) = file.timeout_secs { cfg.timeout_secs = v; }
        Ok(cfg)
    }
}
