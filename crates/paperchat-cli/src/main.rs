use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paperchat", version, about = "Chat with your PDFs over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and the PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the status of a running server
    Status,

    /// Create the config and uploads directories
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up API keys and PORT from a local .env, if present.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config_loader = paperchat_config::ConfigLoader::new()?;
    let config = config_loader.load()?;

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config_loader.ensure_dirs(&config)?;

            let server = paperchat_gateway::GatewayServer::new(config);
            server.run().await?;
        }
        Commands::Status => {
            let url = format!(
                "http://{}:{}/api/status",
                config.gateway.host, config.gateway.port
            );

            let resp = reqwest::get(&url).await.map_err(|_| {
                anyhow::anyhow!(
                    "server is not running at {}:{}",
                    config.gateway.host,
                    config.gateway.port
                )
            })?;

            let body = resp.json::<serde_json::Value>().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Init => {
            config_loader.ensure_dirs(&config)?;
            println!(
                "Config directory: {}",
                config_loader.config_dir().display()
            );
            println!("Uploads directory: {}", config.uploads_dir.display());
            println!("Directories created. Edit config.yml to get started.");
        }
    }

    Ok(())
}
