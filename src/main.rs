use anyhow::Result;
use clap::{Parser, Subcommand};
use livesync::presentation::cli_summary::print_snapshot;
use livesync::{AppConfig, LogLevel, RowMap, SnapshotListener};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "livesync",
    about = "Livesync — watch a table query stay in sync with live changes."
)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the orders list, optionally filtered by creating user.
    Orders {
        #[arg(long)]
        user: Option<String>,
    },
    /// Watch the update log of one order.
    Track { order_id: i64 },
}

struct PrintListener {
    title: String,
}

impl SnapshotListener for PrintListener {
    fn snapshot_changed(&self, rows: &[RowMap]) {
        print_snapshot(&self.title, rows);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    livesync::init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let cfg = AppConfig::load(&cli.config)?;

    let mut sync = match &cli.command {
        Command::Orders { user } => {
            let listener = Arc::new(PrintListener {
                title: match user {
                    Some(u) => format!("ORDERS — {}", u),
                    None => "ORDERS".to_string(),
                },
            });
            livesync::watch_orders(&cfg, user.as_deref(), listener).await?
        }
        Command::Track { order_id } => {
            let listener = Arc::new(PrintListener {
                title: format!("ORDER {} UPDATES", order_id),
            });
            livesync::watch_order_updates(&cfg, *order_id, listener).await?
        }
    };

    println!("Watching {} — press Ctrl-C to stop", sync.channel());
    tokio::signal::ctrl_c().await?;
    sync.deactivate().await?;

    Ok(())
}
