//! Integration tests for the SecOps CLI
//!
//! These drive the commands against a temp data directory, the way the
//! binary does, and check the persisted state afterwards.

use secops_cli::commands::{self, MetaAction};
use secops_cli::AppContext;
use secops_core::Address;
use secops_signature::{LocalSigner, Signer};
use secops_store::{ExecutionOptions, TxStatus};
use tempfile::TempDir;

const BROADCASTER: Address = Address::from_low_u64(0xb0);
const RECOVERY: Address = Address::from_low_u64(0xc0);
const TARGET: Address = Address::from_low_u64(0x7a);

fn owner_key(dir: &TempDir) -> (std::path::PathBuf, Address) {
    let path = dir.path().join("owner.key");
    commands::keygen(&path).unwrap();
    let key = std::fs::read_to_string(&path).unwrap();
    let address = LocalSigner::from_hex(&key).unwrap().address();
    (path, address)
}

fn withdraw() -> ExecutionOptions {
    commands::execution_options(Some("withdraw(uint256)"), Some("0x01"), None).unwrap()
}

/// Test: init → request → sign → meta-approve, then reopen
#[test]
fn test_meta_approval_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    let (key, owner) = owner_key(&temp_dir);

    let mut ctx = AppContext::new(&data, None).unwrap();
    assert!(!ctx.is_initialized());

    commands::init(&mut ctx, owner, BROADCASTER, RECOVERY).unwrap();
    commands::add_operation_type(&mut ctx, owner, "TRANSFER").unwrap();
    commands::request(&mut ctx, owner, TARGET, "TRANSFER", withdraw(), 0, 50_000).unwrap();

    // Default time lock is a day
    assert!(commands::approve(&mut ctx, owner, 1).is_err());

    let envelope = temp_dir.path().join("approve.json");
    commands::sign(&ctx, &key, 1, MetaAction::Approve, 600, &envelope).unwrap();

    // Only the broadcaster relays
    assert!(commands::meta_approve(&mut ctx, owner, &envelope).is_err());
    commands::meta_approve(&mut ctx, BROADCASTER, &envelope).unwrap();

    // Replay is rejected
    assert!(commands::meta_approve(&mut ctx, BROADCASTER, &envelope).is_err());
    commands::show(&ctx, 1).unwrap();
    drop(ctx);

    let ctx = AppContext::new(&data, None).unwrap();
    let engine = ctx.engine().unwrap();
    assert_eq!(engine.get_tx_record(1).unwrap().status, TxStatus::Completed);
    assert_eq!(engine.get_nonce(), 1);
    assert!(ctx.journal_path().exists());
}

#[test]
fn test_request_and_approve_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let (key, owner) = owner_key(&temp_dir);
    let mut ctx = AppContext::new(temp_dir.path(), None).unwrap();
    commands::init(&mut ctx, owner, BROADCASTER, RECOVERY).unwrap();

    let envelope = temp_dir.path().join("new.json");
    commands::sign_new(
        &ctx,
        &key,
        owner,
        TARGET,
        "TIMELOCK_UPDATE",
        withdraw(),
        0,
        50_000,
        600,
        &envelope,
    )
    .unwrap();
    commands::request_and_approve(&mut ctx, BROADCASTER, &envelope).unwrap();

    let engine = ctx.engine().unwrap();
    assert_eq!(engine.get_current_tx_id(), 1);
    assert_eq!(engine.get_tx_record(1).unwrap().status, TxStatus::Completed);
}

#[test]
fn test_meta_cancel_and_admin_commands() {
    let temp_dir = TempDir::new().unwrap();
    let (key, owner) = owner_key(&temp_dir);
    let delegate = Address::from_low_u64(0xde);
    let mut ctx = AppContext::new(temp_dir.path(), None).unwrap();
    commands::init(&mut ctx, owner, BROADCASTER, RECOVERY).unwrap();

    commands::add_signer(&mut ctx, owner, delegate).unwrap();
    assert!(commands::add_signer(&mut ctx, owner, delegate).is_err());
    commands::remove_signer(&mut ctx, owner, delegate).unwrap();
    commands::add_role(&mut ctx, owner, "AUDITOR_ROLE", delegate).unwrap();
    commands::set_time_lock(&mut ctx, owner, 60).unwrap();

    commands::request(&mut ctx, owner, TARGET, "OWNERSHIP_UPDATE", ExecutionOptions::None, 0, 0).unwrap();
    let envelope = temp_dir.path().join("cancel.json");
    commands::sign(&ctx, &key, 1, MetaAction::Cancel, 600, &envelope).unwrap();
    commands::meta_cancel(&mut ctx, BROADCASTER, &envelope).unwrap();

    commands::pending(&ctx).unwrap();
    commands::history(&ctx, 1, None).unwrap();
    commands::roles(&ctx).unwrap();

    let engine = ctx.engine().unwrap();
    assert_eq!(engine.get_tx_record(1).unwrap().status, TxStatus::Cancelled);
    assert_eq!(engine.get_time_lock_period(), 60);
    assert!(engine.get_authorized_signers().is_empty());
}

#[test]
fn test_commands_need_initialized_engine() {
    let temp_dir = TempDir::new().unwrap();
    let mut ctx = AppContext::new(temp_dir.path(), None).unwrap();

    assert!(commands::pending(&ctx).is_err());
    assert!(commands::cancel(&mut ctx, BROADCASTER, 1).is_err());

    let owner = Address::from_low_u64(0x01);
    commands::init(&mut ctx, owner, BROADCASTER, RECOVERY).unwrap();
    assert!(commands::init(&mut ctx, owner, BROADCASTER, RECOVERY).is_err());
}

#[test]
fn test_config_file_is_honored() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("secops.json"),
        r#"{"time_lock_period_secs": 120, "journal_enabled": false}"#,
    )
    .unwrap();

    let mut ctx = AppContext::new(temp_dir.path(), None).unwrap();
    commands::init(&mut ctx, Address::from_low_u64(0x01), BROADCASTER, RECOVERY).unwrap();

    assert_eq!(ctx.engine().unwrap().get_time_lock_period(), 120);
    assert!(!ctx.journal_path().exists());
}
