//! CLI Tooling
//!
//! Read-only command-line interface: list the directory, fetch single
//! records, and annotate either with live provider counts when a local
//! content-network node is reachable.

use crate::config::{ConfigLoader, Settings};
use crate::directory::DirectoryClient;
use crate::error::DirectoryError;
use crate::listing::ListingFeed;
use crate::logging::init_logging;
use crate::network::kubo::KuboClient;
use crate::network::ContentNetwork;
use crate::provider::{ProviderResolver, ProviderSummary, ResolveCache};
use crate::record::Record;
use crate::types::Cid;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets, Cell, Table};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lodestone - directory of content-addressed records
#[derive(Parser)]
#[command(name = "lodestone")]
#[command(about = "Directory of content-addressed records with live provider counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory server to use (host or full URL)
    #[arg(long, short = 's')]
    pub server: Option<String>,

    /// Content-network node RPC endpoint, e.g. http://127.0.0.1:5001
    #[arg(long)]
    pub ipfs_api: Option<String>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List records, optionally scoped to one owner
    Ls {
        owner: Option<String>,
        /// Resolve provider counts for every listed record
        #[arg(long)]
        providers: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Fetch one record by owner/name key, or look records up by cid
    Get {
        /// `owner/name` key, or a bare cid for reverse lookup
        key: String,
        /// Include body and version history
        #[arg(long)]
        full: bool,
        /// Resolve the record's provider count
        #[arg(long)]
        providers: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Resolved runtime context for one CLI invocation.
pub struct CliContext {
    settings: Settings,
    directory: DirectoryClient,
    cache: Arc<ResolveCache>,
    local_node_id: Option<String>,
}

impl CliContext {
    pub async fn new(cli: &Cli) -> Result<Self> {
        let mut settings =
            ConfigLoader::load(cli.config.as_deref()).context("loading configuration")?;
        if let Some(server) = &cli.server {
            settings.directory_url = normalize_server_url(server);
        }
        if let Some(api) = &cli.ipfs_api {
            settings.ipfs_api_url = Some(api.clone());
        }
        if let Some(level) = &cli.log_level {
            settings.logging.level = level.clone();
        }
        init_logging(Some(&settings.logging))?;

        let directory = DirectoryClient::new(&settings.directory_url)?;
        let (network, local_node_id) = attach_network(settings.ipfs_api_url.as_deref()).await;
        let cache = Arc::new(ResolveCache::new(ProviderResolver::new(network)));

        Ok(Self { settings, directory, cache, local_node_id })
    }

    /// Build a listing feed over this context, for embedding callers.
    pub fn listing_feed(
        self,
    ) -> (ListingFeed, tokio::sync::mpsc::UnboundedReceiver<crate::listing::ProviderUpdate>) {
        ListingFeed::new(
            self.directory,
            self.cache,
            self.local_node_id,
            self.settings.provider_deadline(),
        )
    }

    pub async fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Ls { owner, providers, format } => {
                let records = self.directory.list_entries(owner.as_deref()).await?;
                let summaries = if *providers {
                    if !self.cache.resolver().has_network() {
                        warn!("provider counts requested but no content network is reachable");
                    }
                    Some(self.resolve_all(&records).await)
                } else {
                    None
                };
                match format.as_str() {
                    "json" => Ok(serde_json::to_string_pretty(&records)?),
                    "text" => Ok(render_listing(&records, summaries.as_ref())),
                    other => bail!("unknown format: {}", other),
                }
            }
            Commands::Get { key, full, providers, format } => {
                if let Some((owner, name)) = key.split_once('/') {
                    let record = self.directory.get_entry(owner, name, *full).await?;
                    let summary = if *providers {
                        Some(self.resolve_one(&record.cid).await)
                    } else {
                        None
                    };
                    match format.as_str() {
                        "json" => Ok(serde_json::to_string_pretty(&record)?),
                        "text" => Ok(render_record(&record, summary, *full)),
                        other => bail!("unknown format: {}", other),
                    }
                } else {
                    // No slash: the argument is a cid, reverse lookup.
                    let records = self.directory.find_by_cid(&key.to_string()).await?;
                    match format.as_str() {
                        "json" => Ok(serde_json::to_string_pretty(&records)?),
                        "text" => Ok(render_listing(&records, None)),
                        other => bail!("unknown format: {}", other),
                    }
                }
            }
        }
    }

    async fn resolve_one(&self, cid: &Cid) -> ProviderSummary {
        self.cache
            .resolve(cid, self.local_node_id.clone(), self.settings.provider_deadline())
            .await
    }

    async fn resolve_all(&self, records: &[Record]) -> HashMap<Cid, ProviderSummary> {
        let deadline = self.settings.provider_deadline();
        let lookups = records.iter().map(|record| {
            let cache = Arc::clone(&self.cache);
            let local = self.local_node_id.clone();
            let cid = record.cid.clone();
            async move {
                let summary = cache.resolve(&cid, local, deadline).await;
                (cid, summary)
            }
        });
        futures::future::join_all(lookups).await.into_iter().collect()
    }
}

/// Bare hostnames get https, as the original service expects.
fn normalize_server_url(server: &str) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

/// Try to reach the content-network node. Unreachable or unconfigured is a
/// normal mode: provider counts degrade to unknown, nothing else changes.
async fn attach_network(
    api_url: Option<&str>,
) -> (Option<Arc<dyn ContentNetwork>>, Option<String>) {
    let Some(api_url) = api_url else {
        debug!("no content-network endpoint configured");
        return (None, None);
    };
    let client = match KuboClient::new(api_url) {
        Ok(client) => client,
        Err(e) => {
            warn!(api_url, error = %e, "invalid content-network endpoint");
            return (None, None);
        }
    };
    let client: Arc<dyn ContentNetwork> = Arc::new(client);
    match client.identify().await {
        Ok(id) => (Some(client), Some(id)),
        Err(e) => {
            debug!(api_url, error = %e, "content network unreachable, provider counts unavailable");
            (None, None)
        }
    }
}

fn star_badge(count: u64) -> String {
    if count > 0 {
        format!("★ {}", count)
    } else {
        String::new()
    }
}

fn provider_cells(summary: &ProviderSummary) -> (String, String) {
    let count = match summary.provider_count {
        Some(n) => format!("{} providers", n),
        None => "-".to_string(),
    };
    let here = if summary.local_node_present {
        "pinned here".green().to_string()
    } else {
        String::new()
    };
    (count, here)
}

fn render_listing(records: &[Record], summaries: Option<&HashMap<Cid, ProviderSummary>>) -> String {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);

    let mut header = vec!["KEY", "CID", "NOTE", "STARS"];
    if summaries.is_some() {
        header.push("PROVIDERS");
        header.push("");
    }
    table.set_header(header);

    for record in records {
        let mut row = vec![
            record.identity_key(),
            record.cid.clone(),
            record.note.clone(),
            star_badge(record.star_count).yellow().to_string(),
        ];
        if let Some(summaries) = summaries {
            let summary = summaries
                .get(&record.cid)
                .copied()
                .unwrap_or_else(ProviderSummary::unknown);
            let (count, here) = provider_cells(&summary);
            row.push(count);
            row.push(here);
        }
        table.add_row(row);
    }
    table.to_string()
}

fn render_record(record: &Record, summary: Option<ProviderSummary>, full: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", record.identity_key().bold()));
    out.push_str(&format!("cid:   {}\n", record.cid));
    if !record.note.is_empty() {
        out.push_str(&format!("note:  {}\n", record.note));
    }
    if record.star_count > 0 {
        out.push_str(&format!("stars: {}\n", star_badge(record.star_count)));
    }
    if let Some(summary) = summary {
        let (count, here) = provider_cells(&summary);
        out.push_str(&format!("provs: {}{}{}\n", count, if here.is_empty() { "" } else { " " }, here));
    }
    if full {
        if !record.body.is_empty() {
            out.push('\n');
            out.push_str(&record.body);
            out.push('\n');
        }
        if !record.history.is_empty() {
            out.push('\n');
            out.push_str(&render_history(record));
        }
    }
    out
}

fn render_history(record: &Record) -> String {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["", "CID", "DATE"]);

    for version in &record.history {
        let is_current = record
            .current_version()
            .map(|current| current.cid == version.cid)
            .unwrap_or(false);
        let marker = if is_current { "*".green().to_string() } else { String::new() };
        let date = version
            .parsed_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| version.date.clone());
        table.add_row(vec![Cell::new(marker), Cell::new(&version.cid), Cell::new(date)]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Version;

    fn sample_record() -> Record {
        Record {
            owner: "alice".to_string(),
            name: "notes".to_string(),
            cid: "Qm2".to_string(),
            note: "weekly notes".to_string(),
            body: String::new(),
            star_count: 3,
            history: vec![
                Version { cid: "Qm1".to_string(), date: "2020-01-01".to_string() },
                Version { cid: "Qm2".to_string(), date: "2020-02-01".to_string() },
            ],
        }
    }

    #[test]
    fn normalize_server_url_adds_https_to_bare_hosts() {
        assert_eq!(normalize_server_url("directory.example.com"), "https://directory.example.com");
        assert_eq!(normalize_server_url("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn listing_shows_key_and_star_badge() {
        let out = render_listing(&[sample_record()], None);
        assert!(out.contains("alice/notes"));
        assert!(out.contains("★ 3"));
    }

    #[test]
    fn listing_shows_unknown_providers_as_dash() {
        let summaries = HashMap::from([("Qm2".to_string(), ProviderSummary::unknown())]);
        let out = render_listing(&[sample_record()], Some(&summaries));
        assert!(out.contains('-'));
        assert!(!out.contains("providers"));
    }

    #[test]
    fn history_marks_only_the_current_version() {
        let record = sample_record();
        let out = render_history(&record);
        let lines: Vec<&str> = out.lines().collect();
        let qm1 = lines.iter().find(|l| l.contains("Qm1")).unwrap();
        let qm2 = lines.iter().find(|l| l.contains("Qm2")).unwrap();
        assert!(!qm1.contains('*'));
        assert!(qm2.contains('*'));
    }

    #[test]
    fn history_marks_nothing_when_current_cid_is_missing() {
        let mut record = sample_record();
        record.cid = "Qm9".to_string();
        let out = render_history(&record);
        assert!(!out.contains('*'));
    }
}
