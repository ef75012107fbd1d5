use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use cycles_api::cycles::{CycleOrdering, CycleStatsReader, DEFAULT_ORDER_BY, PgCycleStatsReader};

#[derive(Parser, Debug)]
#[command(
    name = "cycle_report",
    about = "Print per-cycle issue statistics for a workspace as JSON"
)]
struct Args {
    /// Workspace slug to report on.
    #[arg(long)]
    workspace: String,

    /// Sort key, optionally prefixed with `-` for descending order.
    #[arg(long, default_value = DEFAULT_ORDER_BY)]
    order_by: String,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let ordering: CycleOrdering = match args.order_by.parse() {
        Ok(ordering) => ordering,
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(2);
        }
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let reader = PgCycleStatsReader::new(pool);
    let cycles = reader.list_cycle_stats(&args.workspace, ordering).await?;

    if cycles.is_empty() {
        log::warn!("no active cycles found for workspace '{}'", args.workspace);
    }

    let json = if args.compact {
        serde_json::to_string(&cycles)?
    } else {
        serde_json::to_string_pretty(&cycles)?
    };
    println!("{json}");

    Ok(())
}
