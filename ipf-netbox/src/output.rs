use anyhow::{anyhow, Result};
use clap::ValueEnum;
use reconcile::{AddressBinding, ItemResult, RunReport};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Jsonl,
}

#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub out: Option<PathBuf>,
    pub csv: bool,
}

fn binding_text(b: &AddressBinding) -> String {
    match b {
        AddressBinding::Bound { address, .. } => format!("bound {}", address),
        AddressBinding::NoAvailable { address } => format!("no available {}", address),
        AddressBinding::Failed { reason } => format!("binding failed: {}", reason),
    }
}

fn text_line(item: &ItemResult) -> String {
    let mut line = format!("{} {} {}", item.kind.as_str(), item.key, item.outcome.status());
    if let Some(id) = item.outcome.id() {
        line.push_str(&format!(" (id {})", id));
    }
    if let Some(reason) = item.outcome.reason() {
        line.push_str(&format!(": {}", reason));
    }
    if let Some(b) = &item.binding {
        line.push_str(&format!(" [{}]", binding_text(b)));
    }
    line
}

/// Render a report as lines in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<Vec<String>> {
    Ok(match format {
        OutputFormat::Text => {
            let s = report.summary();
            let mut lines: Vec<String> = report.items.iter().map(text_line).collect();
            lines.push(format!(
                "{}: {} created, {} existing, {} skipped, {} deleted, {} failed",
                report.operation, s.created, s.existing, s.skipped, s.deleted, s.failed
            ));
            lines
        }
        OutputFormat::Json => vec![serde_json::to_string(report)?],
        OutputFormat::Jsonl => report
            .items
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?,
    })
}

fn write_csv(report: &RunReport, path: &PathBuf) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::fs::File::create(path)?);
    wtr.write_record(["run_id", "kind", "key", "status", "id", "reason", "binding"])?;
    for item in &report.items {
        wtr.write_record([
            report.run_id.to_string(),
            item.kind.as_str().to_string(),
            item.key.clone(),
            item.outcome.status().to_string(),
            item.outcome.id().map(|v| v.to_string()).unwrap_or_default(),
            item.outcome.reason().unwrap_or_default().to_string(),
            item.binding.as_ref().map(binding_text).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_lines(lines: &[String], out: Option<&PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
            let mut w = BufWriter::new(file);
            for l in lines { writeln!(w, "{}", l)?; }
            w.flush()?;
        }
        None => for l in lines { println!("{}", l); },
    }
    Ok(())
}

pub fn write_report(report: &RunReport, opts: &OutputOptions) -> Result<()> {
    if opts.csv {
        let path = opts.out.as_ref().ok_or_else(|| anyhow!("--csv requires --out <file>"))?;
        return write_csv(report, path);
    }
    write_lines(&render(report, opts.format)?, opts.out.as_ref())
}
