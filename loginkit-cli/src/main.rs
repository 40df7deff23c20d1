//! `loginkit`: drives the login handshake from a terminal.
//!
//! State (session, pending nonce and epoch) lives in a directory of small files, so
//! `login` and `callback` can run as separate invocations the way a browser would
//! leave the page and come back.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use loginkit_core::{
    storage::{keys::EPOCH_KEY, FileStore, KeyValueStore},
    AuthBridge, BridgeConfig, CallArg, DefaultConfig, Environment, LoginOutcome, Navigator,
    SimulationOutcome,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loginkit", version)]
#[command(about = "Log in with an OAuth identity token and dry-run ledger calls", long_about = None)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Enable debug logging (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct BridgeArgs {
    /// JSON bridge configuration. Takes precedence over `--env`.
    #[arg(long, global = true, env = "LOGINKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Network whose defaults to use when no configuration file is given
    #[arg(long, global = true, env = "LOGINKIT_ENV", default_value = "devnet")]
    env: Environment,

    /// OAuth client id registered with the identity provider
    #[arg(long, global = true, env = "LOGINKIT_CLIENT_ID")]
    client_id: Option<String>,

    /// Redirect URI registered with the identity provider
    #[arg(
        long,
        global = true,
        env = "LOGINKIT_REDIRECT_URI",
        default_value = "http://localhost:3000/auth/callback"
    )]
    redirect_uri: String,

    /// Directory holding the session and the pending login attempt
    #[arg(long, global = true, env = "LOGINKIT_STATE_DIR")]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a login and print the authorization URL
    Login,
    /// Complete a login with the redirect fragment (or the whole redirect URL)
    Callback {
        /// e.g. `#id_token=eyJ...&authuser=0`
        fragment: String,
    },
    /// Show the current session and any pending login attempt
    Status,
    /// Remove the session and any pending login attempt
    Logout,
    /// Find or create the registry for an address
    Registry {
        /// Owner address, `0x`-prefixed
        address: String,
    },
    /// Build a move call and dry-run it
    Simulate {
        /// Function of the configured module, or `package::module::function`
        function: String,
        /// Positional argument as `kind:value`, kind one of object, u64, bool,
        /// string, address, bytes (hex). Repeat in call order.
        #[arg(long = "arg", value_parser = parse_call_arg)]
        args: Vec<CallArg>,
        /// Sender; defaults to the session address
        #[arg(long)]
        sender: Option<String>,
        /// Extra referenced objects besides the object arguments
        #[arg(long = "reference")]
        references: Vec<String>,
    },
}

/// Logs navigations instead of driving a browser.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, url: String) {
        tracing::info!(%url, "navigate");
    }
}

fn parse_call_arg(raw: &str) -> Result<CallArg, String> {
    let (kind, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected kind:value, got {raw}"))?;
    match kind {
        "object" => Ok(CallArg::object(value)),
        "u64" => value
            .parse()
            .map(CallArg::u64)
            .map_err(|e| format!("{value}: {e}")),
        "bool" => value
            .parse()
            .map(CallArg::bool)
            .map_err(|e| format!("{value}: {e}")),
        "string" => Ok(CallArg::string(value)),
        "address" => Ok(CallArg::address(value)),
        "bytes" => hex::decode(value.trim_start_matches("0x"))
            .map(CallArg::bytes)
            .map_err(|e| format!("{value}: {e}")),
        other => Err(format!("unknown argument kind {other}")),
    }
}

fn state_dir(args: &BridgeArgs) -> Result<PathBuf> {
    if let Some(dir) = &args.state_dir {
        return Ok(dir.clone());
    }
    dirs::data_dir()
        .map(|dir| dir.join("loginkit"))
        .ok_or_else(|| eyre!("no data directory on this platform, pass --state-dir"))
}

fn load_config(args: &BridgeArgs) -> Result<BridgeConfig> {
    if let Some(path) = &args.config {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        return Ok(BridgeConfig::from_json(&json)?);
    }
    let client_id = args
        .client_id
        .as_deref()
        .ok_or_else(|| eyre!("--client-id (or LOGINKIT_CLIENT_ID) is required without --config"))?;
    Ok(BridgeConfig::from_environment(args.env, client_id, &args.redirect_uri)?)
}

fn print_simulation(simulation: &SimulationOutcome) -> Result<()> {
    let status = match &simulation.status {
        loginkit_core::ExecutionStatus::Success => "success".to_string(),
        loginkit_core::ExecutionStatus::Failure { error } => format!("failure: {error}"),
    };
    let report = serde_json::json!({
        "target": simulation.target,
        "sender": simulation.sender,
        "status": status,
        "gas": {
            "computationCost": simulation.gas.computation_cost,
            "storageCost": simulation.gas.storage_cost,
            "storageRebate": simulation.gas.storage_rebate,
            "net": simulation.gas.net_cost(),
        },
        "events": simulation.event_count,
        "txBytes": simulation.tx_bytes,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_login(outcome: &LoginOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&outcome.session)?);
    println!("registry: {}", outcome.registry_id);
    print_simulation(&outcome.simulation)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "loginkit_core=debug,loginkit=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.bridge)?;
    let dir = state_dir(&cli.bridge)?;
    let store = Arc::new(
        FileStore::open(&dir).wrap_err_with(|| format!("opening {}", dir.display()))?,
    );
    tracing::debug!(state_dir = %dir.display(), "using file store");
    let bridge =
        AuthBridge::with_config(config, store.clone(), Arc::new(TerminalNavigator), None)?;

    match cli.command {
        Command::Login => {
            let url = bridge.login().await?;
            println!("{url}");
        }
        Command::Callback { fragment } => {
            let outcome = bridge.complete_login(&fragment).await?;
            print_login(&outcome)?;
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&bridge.session())?);
            if let Some(epoch) = store.read(EPOCH_KEY.to_string())? {
                println!("pending login started at epoch {epoch}");
            }
        }
        Command::Logout => {
            bridge.logout()?;
            println!("logged out");
        }
        Command::Registry { address } => {
            let registry = bridge.ensure_registry(&address).await?;
            println!("{registry}");
        }
        Command::Simulate {
            function,
            args,
            sender,
            references,
        } => {
            let sender = match sender {
                Some(sender) => sender,
                None => bridge
                    .session()
                    .address()
                    .map(ToString::to_string)
                    .ok_or_else(|| eyre!("not logged in, pass --sender"))?,
            };
            let mut referenced: Vec<String> = args
                .iter()
                .filter_map(|arg| match arg {
                    CallArg::Object { id } => Some(id.clone()),
                    CallArg::Pure { .. } => None,
                })
                .collect();
            referenced.extend(references);
            let simulation = bridge
                .build_and_simulate(&function, args, &sender, referenced)
                .await?;
            print_simulation(&simulation)?;
        }
    }
    Ok(())
}
