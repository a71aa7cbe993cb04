use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use pubtrend_cli::{CheckpointAction, Command, Config, SyncMode};
use pubtrend_client::OaiPmhClient;
use pubtrend_core::{
    AppError, CheckpointStore, CountRow, FileCheckpointStore, HarvestService, Ranking, RunType,
    SyncMetadataKey, SyncReport, SyncStateHandle, SyncStatus, TracingReporter, TrendService,
    TrendStats, load_settings,
};
use pubtrend_db::CountsRepository;

/// SQLite serializes writers; a handful of connections covers the readers.
const MAX_CONNECTIONS: u32 = 4;

type Harvester = HarvestService<OaiPmhClient, CountsRepository, FileCheckpointStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();

    if let Err(e) = run(config).await {
        match e.downcast_ref::<AppError>() {
            Some(app_err) => error!("{}", app_err.user_message()),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut settings = load_settings(config.config.clone()).context("Failed to load settings")?;
    if let Some(path) = config.checkpoint.clone() {
        settings.harvest.checkpoint_path = path;
    }
    let checkpoints = FileCheckpointStore::new(settings.harvest.checkpoint_path.clone());

    // Checkpoint commands work without a database.
    if let Command::Checkpoint { action } = config.command {
        return handle_checkpoint(&checkpoints, action).await;
    }

    info!("Opening database...");
    let repo = pubtrend_db::connect(&config.database_url, MAX_CONNECTIONS)
        .await
        .context("Failed to open database")?;

    let client = OaiPmhClient::with_config(&settings.harvest.base_url, &settings.http)
        .context("Failed to create OAI-PMH client")?;
    let harvest_service =
        HarvestService::with_config(client, repo.clone(), checkpoints, settings.harvest.clone())
            .with_retry_policy(settings.retry.clone());
    harvest_service
        .seed_categories()
        .await
        .context("Failed to seed categories")?;

    let trend_service = TrendService::new(repo.clone(), harvest_service.mapping().clone());

    match config.command {
        Command::Sync { mode } => {
            handle_sync(&harvest_service, mode).await?;
        }
        Command::Counts {
            category,
            all,
            json,
        } => {
            show_counts(&trend_service, &repo, &category, all, json).await?;
        }
        Command::Stats { category } => {
            let stats = trend_service.stats(&category).await?;
            print_stats(&stats);
        }
        Command::Trends {
            group,
            limit,
            declining,
        } => {
            let ranking = if declining {
                Ranking::Declining
            } else {
                Ranking::Rising
            };
            let ranked = trend_service
                .ranked(group.as_deref(), ranking, limit)
                .await?;
            print_trends(&ranked, ranking);
        }
        Command::Categories => {
            list_categories(&repo).await?;
        }
        Command::LastSync => {
            show_last_sync(&repo).await?;
        }
        Command::Checkpoint { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}

/// Runs a sync with Ctrl+C wired to cancellation.
async fn handle_sync(service: &Harvester, mode: SyncMode) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current request...");
            signal_token.cancel();
        }
    });

    let state = SyncStateHandle::new();
    let report = match mode {
        SyncMode::Full {
            start_year,
            no_resume,
        } => {
            service
                .full_sync(&state, start_year, !no_resume, &TracingReporter, cancel)
                .await?
        }
        SyncMode::Quick => {
            service
                .quick_sync(&state, &TracingReporter, cancel)
                .await?
        }
    };

    print_sync_summary(&report);
    if report.is_cancelled() && report.run_type == RunType::Full {
        info!("Run `pubtrend sync full` again to resume.");
    }
    Ok(())
}

fn print_sync_summary(report: &SyncReport) {
    info!("");
    info!("═══════════════════════════════════════════════════════");
    match report.status {
        SyncStatus::Completed => info!("{} SYNC COMPLETE", report.run_type.as_str().to_uppercase()),
        SyncStatus::CompletedWithErrors => info!(
            "{} SYNC COMPLETE (WITH ERRORS)",
            report.run_type.as_str().to_uppercase()
        ),
        SyncStatus::Cancelled => info!("{} SYNC CANCELLED", report.run_type.as_str().to_uppercase()),
    }
    info!("═══════════════════════════════════════════════════════");
    info!("  Window:              {}", report.window);
    info!(
        "  Sets completed:      {}/{}",
        report.sets_completed, report.sets_total
    );
    if let Some(index) = report.resumed_from {
        info!("  Resumed from set:    {}", index + 1);
    }
    info!("─────────────────────────────────────────────────────");
    info!("  Records seen:        {}", report.records_seen);
    info!("  Counted:             {}", report.records_counted);
    info!("  Skipped:             {}", report.records_skipped);
    info!("  Deleted:             {}", report.records_deleted);
    info!("  Rows written:        {}", report.rows_written);

    if !report.incomplete_sets.is_empty() {
        info!("─────────────────────────────────────────────────────");
        info!("Incomplete sets (partial counts kept):");
        for set in &report.incomplete_sets {
            error!("  - {}", set);
        }
    }
    info!("═══════════════════════════════════════════════════════");
}

async fn show_counts(
    trends: &TrendService<CountsRepository>,
    repo: &CountsRepository,
    category: &str,
    all: bool,
    json: bool,
) -> anyhow::Result<()> {
    let rows = if all {
        trends.stats(category).await?;
        repo.monthly_counts(category).await?
    } else {
        trends.monthly_counts(category).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("\nNo counts stored for {}.", category);
        println!("Run `pubtrend sync full` to harvest.\n");
        return Ok(());
    }

    println!("\nMonthly counts for {}\n", category);
    let max = rows.iter().map(|r| r.count).max().unwrap_or(0);
    for row in &rows {
        println!(
            "  {:04}-{:02}  {:>7}  {}",
            row.year,
            row.month,
            row.count,
            count_bar(row.count, max, 40)
        );
    }
    println!("\n  Total: {}\n", total_count(&rows));
    Ok(())
}

fn total_count(rows: &[CountRow]) -> u64 {
    rows.iter().map(|r| r.count).sum()
}

// floor so a tiny month never shows a full cell
fn count_bar(count: u64, max: u64, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = ((count as f64 / max as f64) * width as f64).floor() as usize;
    "█".repeat(filled.min(width))
}

fn print_stats(stats: &TrendStats) {
    println!("\n{} ({})\n", stats.category_name, stats.category_id);
    println!("  Total papers:          {}", stats.total_papers);
    println!("  Average per month:     {:.1}", stats.average_monthly);
    println!("  Hype score:            {}", format_percent(stats.hype_score));
    println!(
        "  Recent growth:         {}",
        format_percent(stats.recent_growth_percent)
    );
    println!("  Trend:                 {}", stats.trend_direction);
    println!();
}

fn print_trends(ranked: &[TrendStats], ranking: Ranking) {
    if ranked.is_empty() {
        println!("\nNo categories with stored counts yet.\n");
        return;
    }

    let title = match ranking {
        Ranking::Rising => "Fastest growing categories",
        Ranking::Declining => "Fastest shrinking categories",
    };
    println!("\n{}\n", title);
    for (i, stats) in ranked.iter().enumerate() {
        println!(
            "{:>3}. {:<10} {:>9}  {:<10} {}",
            i + 1,
            stats.category_id,
            format_percent(stats.hype_score),
            stats.trend_direction,
            stats.category_name
        );
    }
    println!();
}

fn format_percent(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.1}%", value)
    } else {
        format!("{:.1}%", value)
    }
}

async fn list_categories(repo: &CountsRepository) -> anyhow::Result<()> {
    let categories = repo.list_categories().await?;

    let (groups, members): (Vec<_>, Vec<_>) = categories
        .iter()
        .partition(|c| c.parent_category.is_none());

    println!();
    for group in &groups {
        println!("{} ({})", group.name, group.id);
        for category in members
            .iter()
            .filter(|c| c.parent_category.as_deref() == Some(group.id.as_str()))
        {
            println!("  {:<10} {}", category.id, category.name);
        }
        println!();
    }
    Ok(())
}

async fn show_last_sync(repo: &CountsRepository) -> anyhow::Result<()> {
    println!("\nSync history\n");
    for (label, key) in [
        ("Last sync", SyncMetadataKey::LastSync),
        ("Last full sync", SyncMetadataKey::LastFullSync),
        ("Last quick sync", SyncMetadataKey::LastQuickSync),
    ] {
        let value = repo
            .last_sync_time(key)
            .await?
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {:<18} {}", format!("{}:", label), value);
    }
    println!("  {:<18} {}", "Stored rows:", repo.count_rows().await?);
    println!();
    Ok(())
}

async fn handle_checkpoint(
    checkpoints: &FileCheckpointStore,
    action: CheckpointAction,
) -> anyhow::Result<()> {
    match action {
        CheckpointAction::Show => match checkpoints.load().await? {
            Some(checkpoint) => {
                println!("\nCheckpoint at {}\n", checkpoints.path().display());
                println!("  Run type:       {}", checkpoint.run_type);
                println!("  Window:         {}", checkpoint.window);
                println!("  Next set index: {}", checkpoint.next_set_index);
                if let Some(set) = &checkpoint.current_set {
                    println!("  Current set:    {}", set);
                }
                println!("  Counted so far: {}", checkpoint.buckets.total());
                println!(
                    "  Saved at:       {}",
                    checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                println!();
            }
            None => println!("No checkpoint at {}", checkpoints.path().display()),
        },
        CheckpointAction::Clear => {
            checkpoints.clear().await?;
            info!("Checkpoint cleared: {}", checkpoints.path().display());
        }
    }
    Ok(())
}
