//! Mailreplay - Replays a mailbox scenario through the state engine
//!
//! Loads a JSON scenario (mailbox contents plus an input script), runs it
//! against the in-memory transport and prints the notifications and the
//! final visible rows.

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use mailbox::{MailboxView, NoticeLevel, PageCache, RecordingNotifier};

mod scenario;

use scenario::{Runner, Scenario};

#[derive(Debug, Parser)]
#[command(name = "mailreplay", about = "Replay a mailbox scenario against an in-memory backend")]
struct Args {
    /// Scenario JSON file
    scenario: PathBuf,

    /// Engine config file (default: scenario config, then ~/.config/mailstate/mailstate.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final rows as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let scenario: Scenario = config::load_json_file(&args.scenario)?;
    let engine_config = scenario::engine_config(args.config.as_deref(), scenario.config.as_ref())?;
    info!(
        "Replaying {} steps for {} ({} items, {} batching)",
        scenario.steps.len(),
        scenario.user_id,
        scenario.items.len(),
        engine_config.batch_strategy
    );

    let transport = Arc::new(scenario.transport());
    let notifier = Arc::new(RecordingNotifier::new());
    let view = MailboxView::new(
        scenario.session(),
        transport.clone(),
        Arc::new(PageCache::new()),
        notifier.clone(),
        engine_config,
    );

    let mut runner = Runner::new(view, transport);
    for step in &scenario.steps {
        runner.run(step).await?;
    }
    let failed = runner.settle().await?;
    if failed > 0 {
        warn!("{} background mark-read calls failed", failed);
    }

    for notice in notifier.notices() {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
            NoticeLevel::Info => "info",
        };
        println!("[{}] {}", tag, notice.message);
    }

    let rows = runner.view.rows();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let selection = runner.view.selection();
        for row in &rows {
            let unread = if row.is_unread { "*" } else { " " };
            let picked = if selection.is_bulk_selected(&row.id) { "+" } else { " " };
            println!("{}{} {:<12} {}", unread, picked, row.id.as_str(), row.subject);
        }
    }
    Ok(())
}
