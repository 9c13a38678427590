use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};

use factbook_scraper::config::Config;
use factbook_scraper::convert;
use factbook_scraper::weekly::{self, WeeklyAggregator};
use factbook_scraper::SnapshotIndex;

#[derive(Parser)]
#[command(
    name = "factbook_scraper",
    about = "Converts factbook HTML captures to JSON and merges them into weekly documents"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert unconverted HTML captures to JSON
    Convert,
    /// Write one consolidated document per fully elapsed Monday
    Weekly,
    /// Convert + aggregate in one pipeline
    Run,
    /// Show snapshot index statistics
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let result = match cli.command {
        Commands::Convert => {
            let stats = convert::convert(&config.country_html_root, &config.country_json_root)?;
            print_convert_stats(&stats);
            Ok(())
        }
        Commands::Weekly => {
            let index = SnapshotIndex::build(&config.country_html_root)?;
            let stats = WeeklyAggregator::new(&index, &config).run(Utc::now())?;
            print_weekly_stats(&stats);
            Ok(())
        }
        Commands::Run => {
            // Phase 1: convert new captures
            let t_convert = Instant::now();
            let stats = convert::convert(&config.country_html_root, &config.country_json_root)?;
            println!(
                "Converted {} pages in {:.1}s",
                stats.converted,
                t_convert.elapsed().as_secs_f64()
            );

            // Phase 2: weekly aggregation
            let index = SnapshotIndex::build(&config.country_html_root)?;
            let stats = WeeklyAggregator::new(&index, &config).run(Utc::now())?;
            print_weekly_stats(&stats);
            Ok(())
        }
        Commands::Stats => {
            let index = SnapshotIndex::build(&config.country_html_root)?;
            let dates = index.dates();
            println!("Capture dates: {}", dates.len());
            if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                println!("First:         {}", first.label);
                println!("Last:          {}", last.label);
            }
            println!("Countries:     {}", index.country_count());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_convert_stats(stats: &convert::ConvertStats) {
    println!(
        "Done: {} files ({} converted, {} skipped, {} errors).",
        stats.total, stats.converted, stats.skipped, stats.errors
    );
}

fn print_weekly_stats(stats: &weekly::WeeklyStats) {
    println!(
        "Done: {} weeks ({} written, {} skipped).",
        stats.weeks, stats.written, stats.skipped
    );
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
