use clap::Parser;
use ermgate::{config, server};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// ermgate - an ERM-aware relational data gateway for PostgreSQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP server host address
    #[arg(long, default_value = "0.0.0.0")]
    http_host: String,

    /// HTTP server port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Default result limit when the request carries none
    #[arg(long)]
    default_limit: Option<u64>,

    /// Path of the catalog registry YAML file
    #[arg(long)]
    registry: Option<String>,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            http_host: cli.http_host,
            http_port: cli.http_port,
            default_limit: cli.default_limit,
            registry: cli.registry,
        }
    }
}

#[tokio::main]
async fn main() {
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("\nermgate v{}\n", env!("CARGO_PKG_VERSION"));

    let cli_config: config::CliConfig = cli.into();
    let config = match config::ServerConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    server::run_with_config(config).await;
}
