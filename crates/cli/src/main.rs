//! softphone-bridge operator tool
//!
//! - `probe` lists candidate network paths and the one the selector would bind
//! - `bind` prints the preferred bind address (empty line when none)
//! - `simulate` drives one call through the bridge and prints every host command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, info_span, Instrument};

use softphone_bridge_core::{
    BridgeConfig, CallId, CallInvitation, CommandReceiver, InterfaceEnumerator, NetworkPathSelector,
    SignalingBridge, SystemInterfaces, TransportKind,
};
use softphone_infra_common::logging::{log_welcome, parse_log_level};
use softphone_infra_common::{setup_logging, LoggingConfig};

const APP_NAME: &str = "softphone-bridge";

#[derive(Parser, Debug)]
#[command(author, version, about = "Softphone signaling bridge tool", long_about = None)]
struct Cli {
    /// Configuration file (TOML); SOFTPHONE_BRIDGE__* variables override it
    #[arg(short, long, global = true, env = "SOFTPHONE_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Annotate log lines with source file and line
    #[arg(long, global = true)]
    log_source: bool,

    /// Log when spans open and close
    #[arg(long, global = true)]
    log_spans: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List candidate network paths and the selected one
    Probe {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the local address outbound sockets should bind to
    Bind {
        /// Print the full transport binding instead (0 = UDP, 1 = TCP, 2 = TLS)
        #[arg(long)]
        transport: Option<i32>,

        #[arg(long, default_value_t = 0)]
        port: u16,
    },

    /// Drive a call through the bridge and print the host commands it emits
    Simulate {
        /// Call id; a random one when omitted
        #[arg(long)]
        call_id: Option<String>,

        #[arg(long, value_enum, default_value_t = Flow::Answer)]
        flow: Flow,

        #[arg(long, default_value = "Test Caller")]
        caller: String,

        #[arg(long, default_value = "1000")]
        handle: String,

        #[arg(long)]
        video: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Flow {
    /// Accept, hang up, confirm teardown
    Answer,
    Decline,
    /// Let the call ring out
    Timeout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(logging_config(&cli)?)?;
    log_welcome(APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::load(cli.config.as_deref()).context("Failed to load bridge configuration")?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Probe { json } => probe(json),
        Commands::Bind { transport, port } => bind(config, transport, port),
        Commands::Simulate {
            call_id,
            flow,
            caller,
            handle,
            video,
        } => {
            let call_id = call_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut invitation = CallInvitation::new(call_id, caller, handle);
            if video {
                invitation = invitation.with_video();
            }
            let span = info_span!("simulate", call_id = %invitation.call_id, ?flow);
            simulate(config, invitation, flow).instrument(span).await
        }
    }
}

fn logging_config(cli: &Cli) -> Result<LoggingConfig> {
    let mut logging = LoggingConfig::new(parse_log_level(&cli.log_level)?, APP_NAME);
    if cli.json_logs {
        logging = logging.with_json();
    }
    if cli.log_source {
        logging = logging.with_source_locations();
    }
    if cli.log_spans {
        logging = logging.with_span_events();
    }
    Ok(logging)
}

fn probe(json: bool) -> Result<()> {
    let candidates = SystemInterfaces
        .list_candidate_paths()
        .context("Failed to enumerate network interfaces")?;
    let chosen = NetworkPathSelector::select_path(&candidates);

    if json {
        let report = serde_json::json!({
            "candidates": candidates,
            "selected": chosen,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<16} {:<40} {:<9} {:>4}  eligible", "interface", "address", "kind", "rank");
    for path in &candidates {
        let eligible = path.is_up && !path.is_loopback && path.is_private_ipv4();
        println!(
            "{:<16} {:<40} {:<9} {:>4}  {}",
            path.interface_id,
            path.local_address.to_string(),
            path.kind.to_string(),
            path.rank(),
            if eligible { "yes" } else { "no" }
        );
    }
    match chosen {
        Some(path) => println!("\nselected: {}", path),
        None => println!("\nselected: none (no usable path)"),
    }
    Ok(())
}

fn bind(config: BridgeConfig, transport: Option<i32>, port: u16) -> Result<()> {
    let (bridge, _commands) = SignalingBridge::builder().config(config).build()?;

    match transport {
        Some(code) => {
            let binding = bridge.transport_binding(TransportKind::from_code(code), port);
            println!("{}", serde_json::to_string(&binding)?);
        }
        None => println!("{}", bridge.bind_to_preferred_network()),
    }
    Ok(())
}

async fn simulate(config: BridgeConfig, invitation: CallInvitation, flow: Flow) -> Result<()> {
    let (bridge, mut commands) = SignalingBridge::builder().config(config).build()?;
    let call_id: CallId = invitation.call_id.clone();

    bridge.on_token_issued(format!("simulated-{}", uuid::Uuid::new_v4()));
    info!(%call_id, ?flow, "Simulating call");

    bridge.on_invitation_received(invitation).await?;
    print_commands(&mut commands)?;

    match flow {
        Flow::Answer => {
            bridge.accept(&call_id).await?;
            print_commands(&mut commands)?;
            bridge.end(&call_id).await?;
            print_commands(&mut commands)?;
            bridge.teardown_confirmed(&call_id).await?;
        }
        Flow::Decline => {
            bridge.decline(&call_id).await?;
        }
        Flow::Timeout => {
            bridge.timeout(&call_id).await?;
        }
    }
    print_commands(&mut commands)?;

    if let Some(session) = bridge.machine().session(&call_id).await {
        info!(%call_id, state = %session.state, "Simulation finished");
    }
    bridge.shutdown().await;
    Ok(())
}

fn print_commands(commands: &mut CommandReceiver) -> Result<()> {
    for command in commands.drain() {
        println!("{}", serde_json::to_string(&command)?);
    }
    Ok(())
}
