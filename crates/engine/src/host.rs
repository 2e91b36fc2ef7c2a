//! Host interfaces
//!
//! What the engine consumes from its environment: a clock, a primitive
//! that invokes the guarded action on a target, and a payment rail. Each
//! comes with an in-memory implementation for tests and simulation; the
//! in-memory types are cheap handles, so a test keeps a clone to inspect
//! or steer them after handing one to the engine.

use chrono::{DateTime, Duration, Utc};
use secops_core::{Address, Bytes32};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Source of `now`
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// The guarded action reverted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invocation reverted: {reason}")]
pub struct InvocationFailure {
    pub reason: String,
    /// Bytes returned with the revert, stored as the record result
    pub revert_data: Vec<u8>,
}

impl InvocationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            revert_data: reason.as_bytes().to_vec(),
            reason,
        }
    }
}

/// Executes prepared call data against a target
pub trait TargetInvoker: Send {
    fn invoke(
        &mut self,
        target: Address,
        value: u128,
        gas_limit: u64,
        call_data: &[u8],
    ) -> Result<Vec<u8>, InvocationFailure>;
}

/// One call seen by a [`RecordingInvoker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: Address,
    pub value: u128,
    pub gas_limit: u64,
    pub call_data: Vec<u8>,
}

#[derive(Debug, Default)]
struct InvokerState {
    calls: Vec<Invocation>,
    reverting: HashSet<Address>,
}

/// Invoker that records calls and answers with the digest of the call data
#[derive(Debug, Clone, Default)]
pub struct RecordingInvoker {
    state: Arc<Mutex<InvokerState>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `target` revert
    pub fn revert_on(&self, target: Address) {
        lock(&self.state).reverting.insert(target);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.state).calls.clone()
    }
}

impl TargetInvoker for RecordingInvoker {
    fn invoke(
        &mut self,
        target: Address,
        value: u128,
        gas_limit: u64,
        call_data: &[u8],
    ) -> Result<Vec<u8>, InvocationFailure> {
        let mut state = lock(&self.state);
        state.calls.push(Invocation {
            target,
            value,
            gas_limit,
            call_data: call_data.to_vec(),
        });

        if state.reverting.contains(&target) {
            return Err(InvocationFailure::new(format!("target {target} reverted")));
        }
        Ok(Bytes32::digest(call_data).as_bytes().to_vec())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RailError {
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Funds held by the engine instance
pub trait PaymentRail: Send {
    fn native_balance(&self) -> u128;

    fn token_balance(&self, token: Address) -> u128;

    fn transfer_native(&mut self, to: Address, amount: u128) -> Result<(), RailError>;

    fn transfer_token(&mut self, token: Address, to: Address, amount: u128) -> Result<(), RailError>;

    /// Current fee rate, compared against an envelope's fee ceiling
    fn fee_rate(&self) -> u128;
}

/// A transfer made by an [`InMemoryRail`]; `token` is `None` for native
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub token: Option<Address>,
    pub to: Address,
    pub amount: u128,
}

#[derive(Debug, Default)]
struct RailState {
    native: u128,
    tokens: HashMap<Address, u128>,
    transfers: Vec<Transfer>,
    fee_rate: u128,
    reject_native: bool,
    reject_token: bool,
}

/// Ledger of balances kept in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRail {
    state: Arc<Mutex<RailState>>,
}

impl InMemoryRail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(amount: u128) -> Self {
        let rail = Self::new();
        rail.set_native_balance(amount);
        rail
    }

    pub fn set_native_balance(&self, amount: u128) {
        lock(&self.state).native = amount;
    }

    pub fn set_token_balance(&self, token: Address, amount: u128) {
        lock(&self.state).tokens.insert(token, amount);
    }

    pub fn set_fee_rate(&self, rate: u128) {
        lock(&self.state).fee_rate = rate;
    }

    /// Make native transfers fail at the transport level
    pub fn reject_native_transfers(&self, reject: bool) {
        lock(&self.state).reject_native = reject;
    }

    /// Make token transfers fail at the transport level
    pub fn reject_token_transfers(&self, reject: bool) {
        lock(&self.state).reject_token = reject;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        lock(&self.state).transfers.clone()
    }
}

impl PaymentRail for InMemoryRail {
    fn native_balance(&self) -> u128 {
        lock(&self.state).native
    }

    fn token_balance(&self, token: Address) -> u128 {
        lock(&self.state).tokens.get(&token).copied().unwrap_or(0)
    }

    fn transfer_native(&mut self, to: Address, amount: u128) -> Result<(), RailError> {
        let mut state = lock(&self.state);
        if state.reject_native {
            return Err(RailError::Rejected("native transfers disabled".to_string()));
        }
        if state.native < amount {
            return Err(RailError::InsufficientFunds {
                needed: amount,
                available: state.native,
            });
        }
        state.native -= amount;
        state.transfers.push(Transfer {
            token: None,
            to,
            amount,
        });
        Ok(())
    }

    fn transfer_token(&mut self, token: Address, to: Address, amount: u128) -> Result<(), RailError> {
        let mut state = lock(&self.state);
        if state.reject_token {
            return Err(RailError::Rejected("token transfers disabled".to_string()));
        }
        let available = state.tokens.get(&token).copied().unwrap_or(0);
        if available < amount {
            return Err(RailError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        state.tokens.insert(token, available - amount);
        state.transfers.push(Transfer {
            token: Some(token),
            to,
            amount,
        });
        Ok(())
    }

    fn fee_rate(&self) -> u128 {
        lock(&self.state).fee_rate
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
