use bourse_exchange::{Exchange, ExchangeConfig};

fn print_help() {
    eprintln!(
        r#"Bourse - spot exchange core

USAGE:
    bourse [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run with the default BTC_USDT and ETH_USDT markets
    bourse

    # Run with config file
    bourse --config demos/bourse.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path);
            ExchangeConfig::from_file(&path)?
        }
        None => {
            log::info!("No config file given, using default markets");
            ExchangeConfig::with_default_markets()
        }
    };
    log::info!("Exchange: {}", config.name);
    log::info!("Currencies: {}", config.currencies.len());
    log::info!("Pairs: {}", config.pairs.len());
    log::info!("Accounts: {}", config.accounts.len());

    let exchange = Exchange::new(config)?;
    exchange.start();

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    exchange.shutdown();

    Ok(())
}
