use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Relay Integration Testing Tool")]
struct Cli {
    /// Base URL of the relay (e.g., http://localhost:4000)
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Attach to a thread and receive a posted event
    ConnectionTest,
    /// Receive events posted before attaching, in order
    BufferedDelivery,
    /// Check that a second attach replaces the first
    Reconnect,
    /// Check that closing a thread ends its stream
    CloseThread,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let base_url = cli.base_url.trim_end_matches('/').to_string();
    let api_client = ApiClient::new(reqwest::Client::new(), base_url.clone());
    println!("{} Testing relay at {}", "→".blue(), base_url);

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&api_client).await?);
        }
        ScenarioChoice::BufferedDelivery => {
            results.push(scenarios::test_buffered_delivery(&api_client).await?);
        }
        ScenarioChoice::Reconnect => {
            results.push(scenarios::test_reconnect(&api_client).await?);
        }
        ScenarioChoice::CloseThread => {
            results.push(scenarios::test_close_thread(&api_client).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&api_client).await?);
            results.push(scenarios::test_buffered_delivery(&api_client).await?);
            results.push(scenarios::test_reconnect(&api_client).await?);
            results.push(scenarios::test_close_thread(&api_client).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
