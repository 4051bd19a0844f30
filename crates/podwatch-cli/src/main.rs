use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use podwatch_client::{CreditsClient, HttpLatencyProbe, IpApiClient, PodRpcFactory};
use podwatch_core::network::compute_network_stats;
use podwatch_core::{
    ClusterReader, DbConfig, HttpConfig, IngestConfig, IngestReport, IngestService, NetworkStats,
    NodeFilter, NodeStatus, PNode, PerformanceTier, TracingReporter, ViewSource,
    censorship_resistance, decentralization, health_score, load_network_config, x_scores,
};
use podwatch_cli::display::{
    NODE_TABLE_HEADER, format_bytes, format_percent, node_row, score_bar, short_key,
};
use podwatch_cli::{Command, Config};
use podwatch_db::{MIGRATOR, NodeRepository};

type Reader =
    ClusterReader<NodeRepository, PodRpcFactory, CreditsClient, IpApiClient, HttpLatencyProbe>;

const RULE: &str = "===========================================================";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Logs go to stderr so stdout stays clean for tables.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::parse();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(DbConfig::from_env().max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let repo = NodeRepository::new(pool);

    match config.command {
        Command::Ingest => {
            let reader = build_reader(repo, config.config)?;
            let report = reader
                .refresh_with_progress(&TracingReporter)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print_ingest_summary(&report);
        }
        Command::Nodes {
            refresh,
            limit,
            status,
            country,
            tier,
        } => {
            let filter = NodeFilter {
                status: status
                    .as_deref()
                    .map(str::parse::<NodeStatus>)
                    .transpose()?,
                country: country.map(|c| c.to_uppercase()),
                tier: tier
                    .as_deref()
                    .map(str::parse::<PerformanceTier>)
                    .transpose()?,
                limit: Some(limit),
                include_absent: false,
            };
            if refresh {
                let reader = build_reader(repo, config.config)?;
                show_nodes_fresh(&reader, &filter).await?;
            } else {
                show_nodes(&repo, &filter).await?;
            }
        }
        Command::Network => {
            show_network(&repo).await?;
        }
        Command::Metrics { top } => {
            show_metrics(&repo, top).await?;
        }
        Command::Notifications { limit } => {
            show_notifications(&repo, limit).await?;
        }
    }

    Ok(())
}

/// Wires the live clients behind the store, as configured in network.toml.
fn build_reader(repo: NodeRepository, config_path: Option<PathBuf>) -> anyhow::Result<Reader> {
    let network_config = load_network_config(config_path)?.ok_or_else(|| {
        anyhow::anyhow!(
            "No configuration file found. Create ~/.config/podwatch/network.toml or use --config"
        )
    })?;

    let seeds = network_config.seed_urls();
    if seeds.is_empty() {
        anyhow::bail!("No enabled [[sources]] in network configuration");
    }
    info!(sources = seeds.len(), "Loaded network configuration");

    let http_config = HttpConfig::default();
    let ingest_config = IngestConfig::from_env().with_seeds(seeds);
    let service = IngestService::with_config(
        repo,
        PodRpcFactory::new(&http_config)?,
        CreditsClient::new(network_config.credits_url(), &http_config)?,
        IpApiClient::new(network_config.geolocation_url(), &http_config)?,
        HttpLatencyProbe::new(ingest_config.probe_timeout)?,
        ingest_config,
    );
    Ok(ClusterReader::new(service))
}

fn print_ingest_summary(report: &IngestReport) {
    let stats = &report.stats;
    let elapsed = report
        .finished_at
        .signed_duration_since(report.started_at)
        .num_milliseconds();

    info!("");
    info!("{}", RULE);
    info!("INGESTION COMPLETE ({} ms)", elapsed);
    info!("{}", RULE);
    info!("  Sources ok / failed: {} / {}", stats.sources_ok, stats.sources_failed);
    info!("  Pods fetched:        {}", stats.fetched);
    info!("  Duplicates:          {}", stats.duplicates);
    info!("  Unique nodes:        {}", stats.unique);
    info!("  With credits:        {}", stats.with_credits);
    info!("  Geolocated:          {}", stats.geolocated);
    info!("  Reachable / probed:  {} / {}", stats.reachable, stats.probed);
    info!("-----------------------------------------------------------");
    info!("  Upserted:            {}", stats.upserted);
    info!("  Marked offline:      {}", stats.marked_offline);
    info!("  Notifications:       {}", stats.notifications);
    info!("  Online now:          {}", report.network.online_nodes);
    info!("{}", RULE);
}

fn print_node_table(nodes: &[PNode]) {
    if nodes.is_empty() {
        println!("\nNo nodes stored yet. Run: podwatch ingest\n");
        return;
    }
    println!();
    println!("{}", NODE_TABLE_HEADER);
    for node in nodes {
        println!("{}", node_row(node));
    }
    println!();
}

async fn show_nodes(repo: &NodeRepository, filter: &NodeFilter) -> anyhow::Result<()> {
    let nodes = repo.list_nodes(filter).await?;
    print_node_table(&nodes);
    Ok(())
}

async fn show_nodes_fresh(reader: &Reader, filter: &NodeFilter) -> anyhow::Result<()> {
    let view = reader
        .view()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    match view.source {
        ViewSource::Cache => info!("Serving stored rows (within staleness window)"),
        ViewSource::Refreshed => info!("Data was stale, re-ingested"),
        ViewSource::StaleCache => warn!("Refresh failed, showing stale rows"),
    }

    let nodes: Vec<_> = view
        .nodes
        .into_iter()
        .filter(|n| filter.matches(n))
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect();
    print_node_table(&nodes);
    Ok(())
}

async fn show_network(repo: &NodeRepository) -> anyhow::Result<()> {
    let stats = match repo.latest_network_stats().await? {
        Some(stats) => stats,
        None => {
            let nodes = repo.list_nodes(&NodeFilter::default()).await?;
            if nodes.is_empty() {
                println!("\nNo nodes stored yet. Run: podwatch ingest\n");
                return Ok(());
            }
            compute_network_stats(&nodes, Utc::now())
        }
    };
    print_network(&stats);
    Ok(())
}

fn print_network(stats: &NetworkStats) {
    println!("\nNetwork Overview (computed {})\n", stats.computed_at);
    println!("  Nodes:                 {}", stats.total_nodes);
    println!(
        "  Online / offline:      {} / {}",
        stats.online_nodes, stats.offline_nodes
    );
    println!("  Public:                {}", stats.public_nodes);
    println!("  Reachable:             {}", stats.reachable_nodes);
    println!("  Countries:             {}", stats.countries);
    println!(
        "  Storage used:          {} of {} ({})",
        format_bytes(stats.total_storage_used),
        format_bytes(stats.total_storage_committed),
        format_percent(stats.storage_utilization)
    );
    println!("  Total credits:         {:.0}", stats.total_credits);
    println!("  Average score:         {:.1}", stats.average_score);
    if let Some(latency) = stats.average_latency_ms {
        println!("  Average latency:       {:.0} ms", latency);
    }
    if let Some(version) = &stats.most_common_version {
        println!("  Most common version:   {}", version);
    }
    if !stats.tier_distribution.is_empty() {
        println!("  Tiers:");
        for (tier, count) in &stats.tier_distribution {
            println!("    {:<10} {}", tier.as_str(), count);
        }
    }
    println!();
}

async fn show_metrics(repo: &NodeRepository, top: usize) -> anyhow::Result<()> {
    let nodes = repo.list_nodes(&NodeFilter::default()).await?;
    if nodes.is_empty() {
        println!("\nNo nodes stored yet. Run: podwatch ingest\n");
        return Ok(());
    }

    let dec = decentralization(&nodes);
    let health = health_score(&nodes);
    let censorship = censorship_resistance(&nodes);

    println!("\nDecentralization {} {:.1}", score_bar(dec.score), dec.score);
    println!(
        "  Countries: {}  Cities: {}  Unknown location: {}",
        dec.unique_countries, dec.unique_cities, dec.unknown_location
    );
    println!(
        "  Nakamoto (country): {}  Credits Gini: {:.3}  HHI: {:.3}",
        dec.nakamoto_coefficient, dec.credits_gini, dec.herfindahl_index
    );
    for share in dec.country_distribution.iter().take(5) {
        println!(
            "    {:<3} {:<20} {:>4}  {}",
            share.country_code,
            share.country,
            share.nodes,
            format_percent(share.share)
        );
    }

    println!(
        "\nHealth           {} {:.1} (grade {})",
        score_bar(health.score),
        health.score,
        health.grade
    );
    let c = &health.components;
    println!(
        "  Online {:.0}  Reachable {:.0}  Latency {:.0}  Consensus {:.0}  Headroom {:.0}",
        c.online, c.reachable, c.latency, c.version_consensus, c.storage_headroom
    );

    println!(
        "\nCensorship res.  {} {:.1} ({})",
        score_bar(censorship.score),
        censorship.score,
        censorship.level
    );
    println!(
        "  Entropy: {:.3}  Top-3 share: {}  Public: {}",
        censorship.country_entropy,
        format_percent(censorship.top3_country_share),
        format_percent(censorship.public_ratio)
    );

    println!("\nTop X-scores");
    for x in x_scores(&nodes).into_iter().take(top) {
        println!(
            "  {:>3}. {:<14} {} {:.1}",
            x.rank,
            short_key(&x.pubkey),
            score_bar(x.score),
            x.score
        );
    }
    println!();
    Ok(())
}

async fn show_notifications(repo: &NodeRepository, limit: usize) -> anyhow::Result<()> {
    let notifications = repo.recent_notifications(limit).await?;
    if notifications.is_empty() {
        println!("\nNo notifications yet.\n");
        return Ok(());
    }
    println!();
    for n in &notifications {
        println!(
            "  {}  {:<15} {}",
            n.created_at.format("%Y-%m-%d %H:%M:%S"),
            n.kind.as_str(),
            n.message
        );
    }
    println!();
    Ok(())
}
