use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the smart gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Admin API key, when the gateway requires one.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-instance health score, error rate, latency and circuit state
    Health,
    /// Force an instance's circuit closed
    ResetCircuit {
        instance: String,
    },
    /// Show an instance's circuit record
    Circuit {
        instance: String,
    },
    /// List registered instances
    Instances {
        #[arg(long)]
        service_type: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Health => client.get(format!("{}/api/admin/health", base)),
        Commands::ResetCircuit { instance } => {
            client.post(format!("{}/api/admin/reset-circuit/{}", base, instance))
        }
        Commands::Circuit { instance } => client.get(format!("{}/api/admin/circuits/{}", base, instance)),
        Commands::Instances { service_type, region } => {
            let mut query = Vec::new();
            if let Some(service_type) = service_type {
                query.push(("service_type", service_type));
            }
            if let Some(region) = region {
                query.push(("region", region));
            }
            client.get(format!("{}/api/admin/instances", base)).query(&query)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
