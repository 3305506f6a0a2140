use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ipfabric::{DiscoverySource, IpFabricClient};
use netbox::{Collection, MemoryInventory, NetboxClient};
use output::{OutputFormat, OutputOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod config;
mod logging;
mod output;

use config::{Config, ConnectionArgs};

fn parse_collection(s: &str) -> Result<Collection, String> { s.parse() }

fn parse_org_collection(s: &str) -> Result<Collection, String> {
    let c: Collection = s.parse()?;
    if c.is_org_object() { Ok(c) } else { Err(format!("{} is not a name-and-slug collection", c)) }
}

#[derive(Debug, Parser)]
#[command(name = "ipf-netbox", version, about = "Reconcile IP Fabric inventory into NetBox")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./ipf-netbox.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    /// Output format: text, json, or jsonl
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Output file (overwrites). Stdout if omitted.
    #[arg(long, value_name = "FILE", global = true)]
    out: Option<PathBuf>,
    /// Write CSV instead of text/json when --out is provided
    #[arg(long, global = true, default_value_t = false)]
    csv: bool,
    #[command(flatten)]
    conn: ConnectionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Create discovered devices (and their sites, platforms, types, roles) in NetBox
    Devices {
        /// IP Fabric table filter as JSON, e.g. '{"siteName": ["eq", "HQ"]}'
        #[arg(long, value_name = "JSON")]
        filter: Option<String>,
        /// Read discovered devices from a JSON array instead of IP Fabric
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Run against an in-memory copy of NetBox; nothing is written
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Create discovered interfaces and bind management addresses
    Interfaces {
        /// Read discovered interfaces from a JSON array instead of IP Fabric
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Run against an in-memory copy of NetBox; nothing is written
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Add sites, manufacturers, platforms or device-roles by name
    Add {
        #[arg(value_parser = parse_org_collection)]
        collection: Collection,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Add device types given as vendor:model
    AddDeviceTypes {
        #[arg(required = true, value_name = "VENDOR:MODEL")]
        specs: Vec<String>,
    },
    /// Delete records by name (by model for device-types, by address for ip-addresses)
    Delete {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List the display names of a collection
    List {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
    },
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn dry_copy(client: &NetboxClient) -> Result<MemoryInventory> {
    info!("copying netbox into memory for a dry run");
    Ok(MemoryInventory::snapshot_of(client, &Collection::ALL)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let opts = OutputOptions { format: cli.format, out: cli.out.clone(), csv: cli.csv };
    if let Commands::Version = cli.command {
        println!("ipf-netbox {} (core {})", env!("CARGO_PKG_VERSION"), ipf_netbox_core::version());
        return Ok(());
    }

    let cfg: Config = config::load_config(cli.config.as_deref())?;
    let nb = NetboxClient::new(&cfg.netbox(&cli.conn)?)?;

    match cli.command {
        Commands::Version => {}
        Commands::Devices { filter, input, dry_run } => {
            let discovered = match input {
                Some(path) => ipfabric::parse_devices(&read_input(&path)?)?,
                None => {
                    let filters = match filter {
                        Some(f) => serde_json::from_str(&f).context("--filter must be a JSON object")?,
                        None => serde_json::json!({}),
                    };
                    IpFabricClient::new(&cfg.ipfabric(&cli.conn)?)?.list_devices(&filters)?
                }
            };
            info!("{} devices discovered", discovered.len());
            let sync = if dry_run {
                reconcile::sync_devices(&dry_copy(&nb)?, &discovered)?
            } else {
                reconcile::sync_devices(&nb, &discovered)?
            };
            output::write_report(&sync.report, &opts)?;
            if let Some(devices) = &sync.devices {
                info!("{} devices in netbox", devices.len());
            }
            warn_on_failures(&sync.report);
        }
        Commands::Interfaces { input, dry_run } => {
            let discovered = match input {
                Some(path) => ipfabric::parse_interfaces(&read_input(&path)?)?,
                None => IpFabricClient::new(&cfg.ipfabric(&cli.conn)?)?.list_interfaces()?,
            };
            info!("{} interfaces discovered", discovered.len());
            let report = if dry_run {
                reconcile::sync_interfaces(&dry_copy(&nb)?, &discovered)?
            } else {
                reconcile::sync_interfaces(&nb, &discovered)?
            };
            output::write_report(&report, &opts)?;
            warn_on_failures(&report);
        }
        Commands::Add { collection, names } => {
            let report = reconcile::add_named(&nb, collection, &names)?;
            output::write_report(&report, &opts)?;
            warn_on_failures(&report);
        }
        Commands::AddDeviceTypes { specs } => {
            let types = specs
                .iter()
                .map(|s| reconcile::parse_device_type(s).ok_or_else(|| anyhow!("expected VENDOR:MODEL, got {}", s)))
                .collect::<Result<Vec<_>>>()?;
            let report = reconcile::add_device_types(&nb, &types);
            output::write_report(&report, &opts)?;
            warn_on_failures(&report);
        }
        Commands::Delete { collection, names } => {
            let report = reconcile::delete_named(&nb, collection, &names);
            output::write_report(&report, &opts)?;
            warn_on_failures(&report);
        }
        Commands::List { collection } => {
            let names = reconcile::list(&nb, collection)?;
            let lines = match opts.format {
                OutputFormat::Text => names,
                OutputFormat::Json => vec![serde_json::to_string(&names)?],
                OutputFormat::Jsonl => names.iter().map(|n| serde_json::json!({"name": n}).to_string()).collect(),
            };
            output::write_lines(&lines, opts.out.as_ref())?;
        }
    }
    Ok(())
}

fn warn_on_failures(report: &reconcile::RunReport) {
    if report.has_failures() {
        warn!("{} of {} items failed in run {}", report.summary().failed, report.items.len(), report.run_id);
    }
}
