use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "clockwork-cli")]
#[command(about = "Inspect requests captured by a running Clockwork monitor", long_about = None)]
struct Cli {
    /// Base URL of the monitored app
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Data API path
    #[arg(short, long, default_value = "/__clockwork")]
    path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent requests with metrics
    Snapshot,
    /// Show rolling metrics only
    Metrics,
    /// Show the most recent request in full
    Latest,
    /// Show one request by id
    Request { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!(
        "{}/{}",
        cli.url.trim_end_matches('/'),
        cli.path.trim_matches('/')
    );

    let url = match &cli.command {
        Commands::Snapshot => base,
        Commands::Metrics => format!("{base}/metrics"),
        Commands::Latest => format!("{base}/latest"),
        Commands::Request { id } => format!("{base}/{id}"),
    };

    let res = client.get(url).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: data API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
