//! Command-line interface for the equity analysis pipeline

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use equilens_analysis::{AnalysisConfig, AnalysisPipeline, Depth};
use equilens_llm::providers::OpenAIProvider;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "equilens")]
#[command(about = "Single-ticker equity analysis", long_about = None)]
struct Args {
    /// Ticker symbol to analyze
    ticker: String,

    /// Analysis date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Analysis depth: basic, standard or comprehensive
    #[arg(long, default_value = "standard")]
    depth: Depth,

    /// Text-generation model
    #[arg(long)]
    model: Option<String>,

    /// Print the run record as JSON instead of markdown
    #[arg(long)]
    json: bool,

    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize tracing subscriber, honoring `RUST_LOG` when set
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut builder = AnalysisConfig::builder().with_env_api_key();
    if let Some(model) = args.model {
        builder = builder.model(model);
    }
    let config = builder.build().context("invalid configuration")?;

    let generator = Arc::new(
        OpenAIProvider::from_env().context("failed to build the text-generation provider")?,
    );
    let pipeline = AnalysisPipeline::new(config, generator).await?;

    let date = args.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    info!("Analyzing {} as of {} ({})", args.ticker, date, args.depth);
    let run = pipeline.analyze(&args.ticker, date, args.depth).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!("{}", run.render_markdown());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["equilens", "AAPL"]).unwrap();
        assert_eq!(args.ticker, "AAPL");
        assert_eq!(args.depth, Depth::Standard);
        assert_eq!(args.date, None);
        assert!(!args.json);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_full() {
        let args = Args::try_parse_from([
            "equilens",
            "600519",
            "--date",
            "2024-06-28",
            "--depth",
            "comprehensive",
            "--model",
            "gpt-4o",
            "--json",
        ])
        .unwrap();

        assert_eq!(args.ticker, "600519");
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 6, 28));
        assert_eq!(args.depth, Depth::Comprehensive);
        assert_eq!(args.model.as_deref(), Some("gpt-4o"));
        assert!(args.json);
    }

    #[test]
    fn test_args_reject_unknown_depth() {
        let result = Args::try_parse_from(["equilens", "AAPL", "--depth", "exhaustive"]);
        assert!(result.is_err());
    }
}
