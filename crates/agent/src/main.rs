//! Moneta trading agent binary.
//!
//! Usage:
//!   moneta create --dir agents/alpha --name alpha --cash 10000 --symbols AAPL,GOOGL,MSFT
//!   moneta run --dir agents/alpha
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - OpenAI API key for decisions and news summaries
//! - `NEWS_API_KEY` - NewsAPI.org key (news_provider: newsapi)
//! - `WORLD_NEWS_API_KEY` - World News API key (news_provider: worldnews)
//! - `RUST_LOG` - Log filter (default: info)

use moneta_agent::{AgentState, TradingAgent};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("--help");

    let mut dir: Option<PathBuf> = None;
    let mut name = "agent01".to_string();
    let mut cash: f64 = 1000.0;
    let mut symbols: Vec<String> = vec!["AAPL".into(), "GOOGL".into(), "MSFT".into()];

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--cash" | "-c" => {
                if i + 1 < args.len() {
                    cash = args[i + 1].parse().expect("Invalid cash amount");
                    i += 1;
                }
            }
            "--symbols" | "-s" => {
                if i + 1 < args.len() {
                    symbols = args[i + 1]
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    match command {
        "create" => {
            let dir = dir.ok_or_else(|| anyhow::anyhow!("create requires --dir"))?;
            let state = AgentState::create(&dir, &name, cash, symbols)?;
            println!(
                "Created agent '{}' in {} with {:.2} EUR across {} symbols",
                state.name,
                dir.display(),
                cash,
                state.symbols.len()
            );
        }
        "run" => {
            let dir = dir.ok_or_else(|| anyhow::anyhow!("run requires --dir"))?;
            let mut agent = TradingAgent::bootstrap(dir)?;
            agent.run().await?;
        }
        "--help" | "-h" | "help" => {
            print_usage();
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Moneta trading agent");
    println!();
    println!("Usage: moneta <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  create    Set up a new agent directory");
    println!("  run       Execute one reflect-then-decide cycle");
    println!();
    println!("Options:");
    println!("  -d, --dir <DIR>          Agent directory (required)");
    println!("  -n, --name <NAME>        Agent name for create (default: agent01)");
    println!("  -c, --cash <EUR>         Starting cash for create (default: 1000)");
    println!("  -s, --symbols <LIST>     Comma-separated tickers (default: AAPL,GOOGL,MSFT)");
    println!("  -h, --help               Show this help message");
    println!();
    println!("Environment variables:");
    println!("  OPENAI_API_KEY           OpenAI API key for decisions and news summaries");
    println!("  NEWS_API_KEY             NewsAPI.org key (news_provider: newsapi)");
    println!("  WORLD_NEWS_API_KEY       World News API key (news_provider: worldnews)");
    println!("  RUST_LOG                 Log filter (default: info)");
}
