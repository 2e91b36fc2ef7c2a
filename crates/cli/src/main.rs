//! SecOps CLI - Main entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use secops_cli::commands::{self, MetaAction};
use secops_cli::AppContext;
use secops_core::Address;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "secops")]
#[command(about = "SecOps - time-locked operations with signed fast path", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Engine config file (defaults to <data>/secops.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity submitting the command
    #[arg(long = "as", global = true)]
    caller: Option<Address>,

    #[command(subcommand)]
    command: Commands,
}

/// Shared arguments describing the guarded action
#[derive(clap::Args)]
struct ActionArgs {
    /// Identity the action acts upon
    #[arg(long)]
    target: Address,
    /// Operation type name, e.g. OWNERSHIP_UPDATE
    #[arg(long)]
    op_type: String,
    /// Function signature for STANDARD execution, e.g. "withdraw(uint256)"
    #[arg(long)]
    selector: Option<String>,
    /// Hex-encoded parameters appended to the selector
    #[arg(long)]
    params: Option<String>,
    /// Hex-encoded call data for RAW execution
    #[arg(long)]
    raw: Option<String>,
    #[arg(long, default_value = "0")]
    value: u128,
    #[arg(long, default_value = "100000")]
    gas_limit: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    Keygen {
        /// Output file path
        #[arg(long, default_value = "signer.key")]
        output: PathBuf,
    },

    /// Initialize the instance with its protected roles
    Init {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        broadcaster: Address,
        #[arg(long)]
        recovery: Address,
    },

    /// Request a guarded action (starts the time lock)
    Request {
        #[command(flatten)]
        action: ActionArgs,
    },

    /// Execute a pending transaction after its release time
    Approve { tx_id: u64 },

    /// Cancel a pending transaction
    Cancel { tx_id: u64 },

    /// Sign a meta-transaction envelope
    Sign {
        /// Key file produced by `keygen`
        #[arg(long)]
        key: PathBuf,
        /// Seconds until the signature expires
        #[arg(long, default_value = "3600")]
        valid_for: i64,
        /// Output file for the envelope JSON
        #[arg(long, default_value = "envelope.json")]
        output: PathBuf,
        #[command(subcommand)]
        command: SignCommand,
    },

    /// Submit a signed approval envelope
    MetaApprove { envelope: PathBuf },

    /// Submit a signed cancellation envelope
    MetaCancel { envelope: PathBuf },

    /// Submit a signed envelope for a new request, executing it immediately
    RequestAndApprove { envelope: PathBuf },

    /// Show a transaction record and its notifications
    Show { tx_id: u64 },

    /// List pending transactions
    Pending,

    /// List transactions in an id range
    History {
        #[arg(long, default_value = "1")]
        from: u64,
        #[arg(long)]
        to: Option<u64>,
    },

    /// Show roles, signers and counters
    Roles,

    /// Assign a custom role
    AddRole { name: String, holder: Address },

    /// Manage the authorized-signer set
    Signer {
        #[command(subcommand)]
        command: SignerCommand,
    },

    /// Manage supported operation types
    OpType {
        #[command(subcommand)]
        command: OpTypeCommand,
    },

    /// Change the time lock for new requests
    TimeLock { secs: u64 },
}

#[derive(Subcommand)]
enum SignCommand {
    /// Approve or cancel an existing pending transaction
    Existing {
        tx_id: u64,
        #[arg(long, value_enum, default_value = "approve")]
        action: MetaAction,
    },
    /// A new request for `request-and-approve`
    New {
        /// Requester of the new request (defaults to --as)
        #[arg(long)]
        requester: Option<Address>,
        #[command(flatten)]
        action: ActionArgs,
    },
}

#[derive(Subcommand)]
enum SignerCommand {
    Add { signer: Address },
    Remove { signer: Address },
}

#[derive(Subcommand)]
enum OpTypeCommand {
    Add { name: String },
    Remove { name: String },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Keygen { output } = &cli.command {
        return commands::keygen(output);
    }

    let mut ctx = AppContext::new(&cli.data, cli.config.as_deref())?;
    let caller = || cli.caller.context("This command needs --as <address>");

    match &cli.command {
        Commands::Keygen { .. } => Ok(()),

        Commands::Init {
            owner,
            broadcaster,
            recovery,
        } => commands::init(&mut ctx, *owner, *broadcaster, *recovery),

        Commands::Request { action } => {
            let execution = commands::execution_options(
                action.selector.as_deref(),
                action.params.as_deref(),
                action.raw.as_deref(),
            )?;
            commands::request(
                &mut ctx,
                caller()?,
                action.target,
                &action.op_type,
                execution,
                action.value,
                action.gas_limit,
            )
        }

        Commands::Approve { tx_id } => commands::approve(&mut ctx, caller()?, *tx_id),

        Commands::Cancel { tx_id } => commands::cancel(&mut ctx, caller()?, *tx_id),

        Commands::Sign {
            key,
            valid_for,
            output,
            command,
        } => match command {
            SignCommand::Existing { tx_id, action } => {
                commands::sign(&ctx, key, *tx_id, *action, *valid_for, output)
            }
            SignCommand::New { requester, action } => {
                let execution = commands::execution_options(
                    action.selector.as_deref(),
                    action.params.as_deref(),
                    action.raw.as_deref(),
                )?;
                let requester = match requester {
                    Some(requester) => *requester,
                    None => caller()?,
                };
                commands::sign_new(
                    &ctx,
                    key,
                    requester,
                    action.target,
                    &action.op_type,
                    execution,
                    action.value,
                    action.gas_limit,
                    *valid_for,
                    output,
                )
            }
        },

        Commands::MetaApprove { envelope } => commands::meta_approve(&mut ctx, caller()?, envelope),

        Commands::MetaCancel { envelope } => commands::meta_cancel(&mut ctx, caller()?, envelope),

        Commands::RequestAndApprove { envelope } => {
            commands::request_and_approve(&mut ctx, caller()?, envelope)
        }

        Commands::Show { tx_id } => commands::show(&ctx, *tx_id),

        Commands::Pending => commands::pending(&ctx),

        Commands::History { from, to } => commands::history(&ctx, *from, *to),

        Commands::Roles => commands::roles(&ctx),

        Commands::AddRole { name, holder } => commands::add_role(&mut ctx, caller()?, name, *holder),

        Commands::Signer { command } => match command {
            SignerCommand::Add { signer } => commands::add_signer(&mut ctx, caller()?, *signer),
            SignerCommand::Remove { signer } => commands::remove_signer(&mut ctx, caller()?, *signer),
        },

        Commands::OpType { command } => match command {
            OpTypeCommand::Add { name } => commands::add_operation_type(&mut ctx, caller()?, name),
            OpTypeCommand::Remove { name } => commands::remove_operation_type(&mut ctx, caller()?, name),
        },

        Commands::TimeLock { secs } => commands::set_time_lock(&mut ctx, caller()?, *secs),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // One correlation id per invocation, carried on every log line
    let span = tracing::info_span!("secops", correlation_id = %Uuid::new_v4());

    // SQLite and the journal are blocking
    tokio::task::spawn_blocking(move || span.in_scope(|| run(cli))).await?
}
