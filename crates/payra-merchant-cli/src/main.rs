use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payra::units::{self, DEFAULT_DISPLAY_PRECISION};
use payra::{
    AbiRegistry, HttpRpcTransport, Network, OrderService, PayraConfig, PayraError,
    SignatureGenerator, SignatureRequest,
};

#[derive(Parser)]
#[command(
    name = "payra",
    version,
    about = "Sign Payra orders and query their payment status"
)]
struct Cli {
    /// ABI document to use instead of the embedded one.
    #[arg(long, env = "PAYRA_ABI_PATH", global = true)]
    abi: Option<PathBuf>,

    /// Seconds to wait for an RPC response.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the signature the Payra contract checks for an order.
    Sign(SignArgs),
    /// Fetch paid flag, token, amount, fee and timestamp of an order.
    OrderDetails(OrderArgs),
    /// Fetch only the paid flag of an order.
    IsPaid(OrderArgs),
    /// Convert a token amount to base units.
    ToWei(ToWeiArgs),
    /// Convert base units to a token amount.
    FromWei(FromWeiArgs),
}

#[derive(Args)]
struct SignArgs {
    #[arg(long, env = "PAYRA_NETWORK")]
    network: String,
    /// ERC-20 token contract the payer will use.
    #[arg(long)]
    token: String,
    #[arg(long)]
    order_id: String,
    /// Amount in base units.
    #[arg(long)]
    amount_wei: String,
    /// Unix seconds; defaults to now.
    #[arg(long)]
    timestamp: Option<u64>,
    #[arg(long)]
    payer: String,
}

#[derive(Args)]
struct OrderArgs {
    #[arg(long, env = "PAYRA_NETWORK")]
    network: String,
    #[arg(long)]
    order_id: String,
}

#[derive(Args)]
struct ToWeiArgs {
    #[arg(long, env = "PAYRA_NETWORK")]
    network: String,
    /// Token symbol, e.g. USDT.
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    amount: String,
}

#[derive(Args)]
struct FromWeiArgs {
    #[arg(long, env = "PAYRA_NETWORK")]
    network: String,
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    amount_wei: String,
    #[arg(long, default_value_t = DEFAULT_DISPLAY_PRECISION)]
    precision: u8,
}

#[derive(Serialize)]
struct ConversionResponse {
    success: bool,
    error: Option<String>,
    value: Option<String>,
    decimals: Option<u8>,
}

impl ConversionResponse {
    fn from_result(result: Result<(String, u8), PayraError>) -> Self {
        match result {
            Ok((value, decimals)) => Self {
                success: true,
                error: None,
                value: Some(value),
                decimals: Some(decimals),
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                value: None,
                decimals: None,
            },
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PayraError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn load_abi(config: &PayraConfig, override_path: Option<PathBuf>) -> Result<AbiRegistry, PayraError> {
    match override_path.or_else(|| config.abi_path.clone()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading ABI document");
            AbiRegistry::from_file(path)
        }
        None => AbiRegistry::embedded(),
    }
}

async fn run(cli: Cli) -> Result<bool, PayraError> {
    let mut config = PayraConfig::from_env()?;
    if let Some(secs) = cli.timeout {
        config = config.with_rpc_timeout(std::time::Duration::from_secs(secs));
    }
    let config = Arc::new(config);

    match cli.command {
        Commands::Sign(args) => {
            let request = SignatureRequest {
                token_address: args.token,
                order_id: args.order_id,
                amount_wei: args.amount_wei,
                timestamp: args.timestamp.unwrap_or_else(now_secs),
                payer_address: args.payer,
            };
            let response = SignatureGenerator::new(config)
                .generate_signature_response(&args.network, &request);
            print_json(&response)?;
            Ok(response.is_success())
        }
        Commands::OrderDetails(args) => {
            let abi = Arc::new(load_abi(&config, cli.abi)?);
            let transport = HttpRpcTransport::new(config.connect_timeout, config.rpc_timeout)?;
            let service = OrderService::new(config, abi, transport);
            let response = service.get_order_details(&args.network, &args.order_id).await;
            print_json(&response)?;
            Ok(response.success)
        }
        Commands::IsPaid(args) => {
            let abi = Arc::new(load_abi(&config, cli.abi)?);
            let transport = HttpRpcTransport::new(config.connect_timeout, config.rpc_timeout)?;
            let service = OrderService::new(config, abi, transport);
            let response = service.is_order_paid(&args.network, &args.order_id).await;
            print_json(&response)?;
            Ok(response.success)
        }
        Commands::ToWei(args) => {
            let result = Network::new(&args.network).and_then(|network| {
                let decimals = config.token_decimals(&network, &args.symbol);
                units::to_wei(&args.amount, decimals).map(|v| (v.to_string(), decimals))
            });
            let response = ConversionResponse::from_result(result);
            print_json(&response)?;
            Ok(response.success)
        }
        Commands::FromWei(args) => {
            let result = Network::new(&args.network).and_then(|network| {
                let decimals = config.token_decimals(&network, &args.symbol);
                let amount = payra::abi::parse_uint(args.amount_wei.trim())?;
                units::from_wei(amount, decimals, args.precision).map(|v| (v, decimals))
            });
            let response = ConversionResponse::from_result(result);
            print_json(&response)?;
            Ok(response.success)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "payra command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
