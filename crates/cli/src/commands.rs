//! CLI commands

use anyhow::Context;
use chrono::Duration;
use secops_core::{functions, Address, OperationType, RoleId, Selector};
use secops_journal::JournalReader;
use secops_signature::{LocalSigner, MetaTransaction, Signer};
use secops_store::{ExecutionOptions, TxRecord};
use serde_json::json;
use std::path::Path;

use crate::context::AppContext;

/// Which entry point a signed envelope is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetaAction {
    Approve,
    Cancel,
}

impl MetaAction {
    pub fn function_name(&self) -> &'static str {
        match self {
            MetaAction::Approve => functions::TX_APPROVAL_WITH_META_TX,
            MetaAction::Cancel => functions::TX_CANCELLATION_WITH_META_TX,
        }
    }
}

/// Build execution options from command line arguments
///
/// `--selector` with optional `--params` gives STANDARD, `--raw` gives RAW,
/// neither gives NONE.
pub fn execution_options(
    selector: Option<&str>,
    params: Option<&str>,
    raw: Option<&str>,
) -> anyhow::Result<ExecutionOptions> {
    match (selector, raw) {
        (Some(_), Some(_)) => anyhow::bail!("--selector and --raw are mutually exclusive"),
        (Some(signature), None) => {
            let params = params.map(decode_hex).transpose()?.unwrap_or_default();
            Ok(ExecutionOptions::standard(Selector::from_signature(signature), params))
        }
        (None, Some(raw)) => Ok(ExecutionOptions::raw(decode_hex(raw)?)),
        (None, None) => Ok(ExecutionOptions::None),
    }
}

fn decode_hex(value: &str) -> anyhow::Result<Vec<u8>> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).with_context(|| format!("Invalid hex: {value}"))
}

fn load_key(path: &Path) -> anyhow::Result<LocalSigner> {
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read key file {}", path.display()))?;
    Ok(LocalSigner::from_hex(&key)?)
}

fn read_envelope(path: &Path) -> anyhow::Result<MetaTransaction> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read envelope {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_envelope(envelope: &MetaTransaction, output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, serde_json::to_string_pretty(envelope)?)?;
    println!("✅ Signed envelope written to {}", output.display());
    println!("   Signer:  {}", envelope.params.signer);
    println!("   Nonce:   {}", envelope.params.nonce);
    println!("   Message: {}", envelope.message);
    Ok(())
}

fn print_record(record: &TxRecord) {
    println!(
        "#{:<4} {:<9} {} → {} (releases {})",
        record.tx_id, record.status, record.requester, record.target, record.release_time
    );
}

/// Generate a new signing key
pub fn keygen(output: &Path) -> anyhow::Result<()> {
    let signer = LocalSigner::generate();
    std::fs::write(output, signer.secret_hex())?;

    println!("✅ Generated signing key");
    println!("   Private key saved to: {}", output.display());
    println!("   Address: {}", signer.address());
    Ok(())
}

/// Create the instance
pub fn init(
    ctx: &mut AppContext,
    owner: Address,
    broadcaster: Address,
    recovery: Address,
) -> anyhow::Result<()> {
    let time_lock = ctx.config().time_lock_period_secs;
    let engine = ctx.initialize(owner, broadcaster, recovery)?;

    println!("✅ Engine initialized at {}", engine.instance_address());
    println!("   Owner:       {owner}");
    println!("   Broadcaster: {broadcaster}");
    println!("   Recovery:    {recovery}");
    println!("   Time lock:   {time_lock}s");
    Ok(())
}

/// Create a PENDING record
#[allow(clippy::too_many_arguments)]
pub fn request(
    ctx: &mut AppContext,
    caller: Address,
    target: Address,
    operation_type: &str,
    execution: ExecutionOptions,
    value: u128,
    gas_limit: u64,
) -> anyhow::Result<()> {
    let record = ctx.engine_mut()?.tx_request(
        caller,
        target,
        OperationType::named(operation_type),
        execution,
        value,
        gas_limit,
    )?;

    println!("✅ Requested transaction #{}", record.tx_id);
    println!("   Releases at {}", record.release_time);
    Ok(())
}

/// Delayed approval
pub fn approve(ctx: &mut AppContext, caller: Address, tx_id: u64) -> anyhow::Result<()> {
    let record = ctx.engine_mut()?.tx_delayed_approval(caller, tx_id)?;
    println!("✅ Transaction #{} is {}", record.tx_id, record.status);
    Ok(())
}

pub fn cancel(ctx: &mut AppContext, caller: Address, tx_id: u64) -> anyhow::Result<()> {
    let record = ctx.engine_mut()?.tx_cancellation(caller, tx_id)?;
    println!("✅ Transaction #{} cancelled", record.tx_id);
    Ok(())
}

/// Sign an envelope for an existing PENDING record
pub fn sign(
    ctx: &AppContext,
    key: &Path,
    tx_id: u64,
    action: MetaAction,
    valid_for_secs: i64,
    output: &Path,
) -> anyhow::Result<()> {
    let signer = load_key(key)?;
    let engine = ctx.engine()?;

    let params = engine.meta_tx_params(
        action.function_name(),
        engine.now() + Duration::seconds(valid_for_secs),
        0,
        signer.address(),
    );
    let envelope = engine
        .generate_unsigned_meta_transaction_for_existing(tx_id, params)?
        .sign_with(&signer);

    write_envelope(&envelope, output)
}

/// Sign an envelope for `request-and-approve`
#[allow(clippy::too_many_arguments)]
pub fn sign_new(
    ctx: &AppContext,
    key: &Path,
    requester: Address,
    target: Address,
    operation_type: &str,
    execution: ExecutionOptions,
    value: u128,
    gas_limit: u64,
    valid_for_secs: i64,
    output: &Path,
) -> anyhow::Result<()> {
    let signer = load_key(key)?;
    let engine = ctx.engine()?;

    let params = engine.meta_tx_params(
        functions::REQUEST_AND_APPROVE,
        engine.now() + Duration::seconds(valid_for_secs),
        0,
        signer.address(),
    );
    let envelope = engine
        .generate_unsigned_meta_transaction_for_new(
            requester,
            target,
            OperationType::named(operation_type),
            execution,
            value,
            gas_limit,
            params,
        )?
        .sign_with(&signer);

    write_envelope(&envelope, output)
}

pub fn meta_approve(ctx: &mut AppContext, caller: Address, envelope: &Path) -> anyhow::Result<()> {
    let envelope = read_envelope(envelope)?;
    let record = ctx.engine_mut()?.tx_approval_with_meta_tx(caller, &envelope)?;
    println!("✅ Transaction #{} is {} (meta-approved)", record.tx_id, record.status);
    Ok(())
}

pub fn meta_cancel(ctx: &mut AppContext, caller: Address, envelope: &Path) -> anyhow::Result<()> {
    let envelope = read_envelope(envelope)?;
    let record = ctx.engine_mut()?.tx_cancellation_with_meta_tx(caller, &envelope)?;
    println!("✅ Transaction #{} cancelled (meta)", record.tx_id);
    Ok(())
}

pub fn request_and_approve(
    ctx: &mut AppContext,
    caller: Address,
    envelope: &Path,
) -> anyhow::Result<()> {
    let envelope = read_envelope(envelope)?;
    let record = ctx.engine_mut()?.request_and_approve(caller, &envelope)?;
    println!("✅ Transaction #{} requested and {}", record.tx_id, record.status);
    Ok(())
}

/// Print one record and its journal trail as JSON
pub fn show(ctx: &AppContext, tx_id: u64) -> anyhow::Result<()> {
    let record = ctx.engine()?.get_tx_record(tx_id)?;

    let notifications = if ctx.journal_path().exists() {
        JournalReader::from_directory(ctx.journal_path())?.for_tx(tx_id)?
    } else {
        Vec::new()
    };

    let output = json!({
        "record": record,
        "notifications": notifications,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn pending(ctx: &AppContext) -> anyhow::Result<()> {
    let records = ctx.engine()?.get_pending_transactions()?;
    if records.is_empty() {
        println!("No pending transactions");
        return Ok(());
    }

    println!("Pending transactions ({}):", records.len());
    for record in &records {
        print_record(record);
    }
    Ok(())
}

pub fn history(ctx: &AppContext, from: u64, to: Option<u64>) -> anyhow::Result<()> {
    let engine = ctx.engine()?;
    let to = to.unwrap_or_else(|| engine.get_current_tx_id());
    for record in &engine.get_transaction_history(from, to)? {
        print_record(record);
    }
    Ok(())
}

/// Protected roles, signers, catalog and counters
pub fn roles(ctx: &AppContext) -> anyhow::Result<()> {
    let engine = ctx.engine()?;

    println!("Owner:       {}", engine.owner());
    println!("Broadcaster: {}", engine.broadcaster());
    println!("Recovery:    {}", engine.recovery());
    for (role, holder) in engine.role_registry().roles() {
        if !secops_access::RoleRegistry::is_protected(role) {
            println!("Role {role}: {holder}");
        }
    }

    let signers = engine.get_authorized_signers();
    println!("Authorized signers ({}):", signers.len());
    for signer in signers {
        println!("  {signer}");
    }

    println!("Operation types: {}", engine.get_supported_operation_types().len());
    println!("Time lock:       {}s", engine.get_time_lock_period());
    println!("Current tx id:   {}", engine.get_current_tx_id());
    println!("Nonce:           {}", engine.get_nonce());
    Ok(())
}

pub fn add_signer(ctx: &mut AppContext, caller: Address, signer: Address) -> anyhow::Result<()> {
    ctx.engine_mut()?.add_authorized_signer(caller, signer)?;
    println!("✅ Authorized signer {signer}");
    Ok(())
}

pub fn remove_signer(ctx: &mut AppContext, caller: Address, signer: Address) -> anyhow::Result<()> {
    ctx.engine_mut()?.remove_authorized_signer(caller, signer)?;
    println!("✅ Revoked signer {signer}");
    Ok(())
}

pub fn add_operation_type(ctx: &mut AppContext, caller: Address, name: &str) -> anyhow::Result<()> {
    ctx.engine_mut()?
        .add_operation_type(caller, OperationType::named(name))?;
    println!("✅ Added operation type {name}");
    Ok(())
}

pub fn remove_operation_type(ctx: &mut AppContext, caller: Address, name: &str) -> anyhow::Result<()> {
    ctx.engine_mut()?
        .remove_operation_type(caller, OperationType::named(name))?;
    println!("✅ Removed operation type {name}");
    Ok(())
}

pub fn add_role(ctx: &mut AppContext, caller: Address, name: &str, holder: Address) -> anyhow::Result<()> {
    ctx.engine_mut()?.add_role(caller, RoleId::named(name), holder)?;
    println!("✅ Role {name} assigned to {holder}");
    Ok(())
}

pub fn set_time_lock(ctx: &mut AppContext, caller: Address, secs: u64) -> anyhow::Result<()> {
    ctx.engine_mut()?.update_time_lock_period(caller, secs)?;
    println!("✅ Time lock set to {secs}s");
    Ok(())
}
