use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use waypost::session::KeyPair;

#[derive(Parser)]
#[command(name = "waypost-cli")]
#[command(about = "Management CLI for the waypost server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "WAYPOST_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// List registered routes in dispatch order
    Routes,
    /// Inspect in-memory sessions
    Sessions,
    /// Print a fresh session key pair as a TOML snippet
    Keygen {
        /// Sign only; omit the encryption key
        #[arg(long)]
        no_encrypt: bool,

        /// Store section the keys are for
        #[arg(long, default_value = "cookie")]
        store: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = match cli.command {
        Commands::Status => "status",
        Commands::Routes => "routes",
        Commands::Sessions => "sessions",
        Commands::Keygen { no_encrypt, store } => {
            print_keys(&store, !no_encrypt);
            return Ok(());
        }
    };

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = client
        .get(format!("{}/admin/{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

fn print_keys(store: &str, encrypt: bool) {
    let keys = KeyPair::generate(encrypt);
    println!("[[sessions.{}.keys]]", store);
    println!("hash_key = \"{}\"", STANDARD.encode(keys.hash_key()));
    if let Some(block) = keys.block_key() {
        println!("block_key = \"{}\"", STANDARD.encode(block));
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
