//! The execution engine
//!
//! Owns the registries and counters of one instance and drives records
//! through `PENDING → {COMPLETED | FAILED | CANCELLED}`.
//!
//! Every entry point follows the same flow:
//! Gate → (Verify signature) → Validate → (Execute) → Commit → Notify
//!
//! Nothing is mutated before the commit: transitions work on copies, the
//! copies are written in one SQLite transaction, and only then replace the
//! in-memory state. A rejected call therefore leaves no trace.

use crate::config::{time_lock_delay, EngineConfig, MAX_TIME_LOCK_PERIOD_SECS};
use crate::error::EngineError;
use crate::host::{Clock, InvocationFailure, PaymentRail, TargetInvoker};
use crate::internal::{address_word, u64_word, InternalCall};
use chrono::{DateTime, Utc};
use secops_access::{AccessError, OperationCatalog, PermissionGate, RoleRegistry};
use secops_core::{functions, roles, Address, Bytes32, OperationType, RoleId, Selector};
use secops_journal::{ApprovalPath, EngineEvent, JournalWriter};
use secops_signature::{
    verify_signature, AuthorizationContext, CryptoProvider, MetaTransaction, MetaTxParams,
    Secp256k1Provider,
};
use secops_store::{
    Changeset, ExecutionOptions, InstanceMeta, PaymentDetails, StateStore, TxRecord, TxStatus,
};
use std::sync::Arc;

/// Selector an envelope names for an engine entry point
pub fn handler_selector(function_name: &str) -> Selector {
    Selector::from_signature(function_name)
}

/// Everything the engine consumes from its environment
pub struct Host {
    pub clock: Arc<dyn Clock>,
    pub invoker: Box<dyn TargetInvoker>,
    pub rail: Box<dyn PaymentRail>,
    pub crypto: Box<dyn CryptoProvider>,
    pub journal: Option<JournalWriter>,
}

impl Host {
    /// Host with secp256k1 signatures and no journal
    pub fn new(
        clock: impl Clock + 'static,
        invoker: impl TargetInvoker + 'static,
        rail: impl PaymentRail + 'static,
    ) -> Self {
        Self {
            clock: Arc::new(clock),
            invoker: Box::new(invoker),
            rail: Box::new(rail),
            crypto: Box::new(Secp256k1Provider::new()),
            journal: None,
        }
    }

    pub fn with_crypto(mut self, crypto: impl CryptoProvider + 'static) -> Self {
        self.crypto = Box::new(crypto);
        self
    }

    pub fn with_journal(mut self, journal: JournalWriter) -> Self {
        self.journal = Some(journal);
        self
    }
}

/// Writes accumulated while a transition is being prepared
struct Staged {
    meta: InstanceMeta,
    roles: Option<RoleRegistry>,
    events: Vec<EngineEvent>,
}

impl Staged {
    fn new(meta: InstanceMeta) -> Self {
        Self {
            meta,
            roles: None,
            events: Vec::new(),
        }
    }

    fn finish(self, record: TxRecord) -> (Changeset, Vec<EngineEvent>) {
        let mut changes = Changeset::new().record(record).meta(self.meta);
        changes.roles = self.roles;
        (changes, self.events)
    }
}

/// One engine instance
pub struct Engine {
    store: StateStore,
    host: Host,
    meta: InstanceMeta,
    roles: RoleRegistry,
    catalog: OperationCatalog,
    gate: PermissionGate,
}

impl Engine {
    /// Create a new instance in an empty store
    pub fn initialize(
        mut store: StateStore,
        host: Host,
        config: &EngineConfig,
        owner: Address,
        broadcaster: Address,
        recovery: Address,
    ) -> Result<Self, EngineError> {
        if store.is_initialized()? {
            return Err(EngineError::AlreadyInitialized);
        }
        if config.time_lock().is_none() {
            return Err(EngineError::InvalidTimeLock);
        }
        if config.instance_address.is_zero() {
            return Err(EngineError::InvalidInstanceAddress);
        }

        let roles = RoleRegistry::with_protected(owner, broadcaster, recovery)?;
        let catalog = OperationCatalog::with_types(secops_core::operation_types::defaults());
        let gate = PermissionGate::with_defaults();
        let meta = InstanceMeta {
            chain_id: config.chain_id,
            instance_address: config.instance_address,
            time_lock_secs: config.time_lock_period_secs,
            current_tx_id: 0,
            nonce: 0,
        };

        store.commit(
            &Changeset::new()
                .meta(meta.clone())
                .roles(roles.clone())
                .catalog(catalog.clone())
                .gate(gate.clone()),
        )?;

        let mut engine = Self {
            store,
            host,
            meta,
            roles,
            catalog,
            gate,
        };

        tracing::info!(
            %owner,
            %broadcaster,
            %recovery,
            chain_id = config.chain_id,
            time_lock_secs = config.time_lock_period_secs,
            "Engine initialized"
        );
        engine.publish(vec![EngineEvent::Initialized {
            owner,
            broadcaster,
            recovery,
            time_lock_secs: config.time_lock_period_secs,
        }]);

        Ok(engine)
    }

    /// Reload a previously initialized instance
    pub fn open(store: StateStore, host: Host) -> Result<Self, EngineError> {
        let snapshot = store.load_snapshot()?.ok_or(EngineError::NotInitialized)?;

        tracing::info!(
            current_tx_id = snapshot.meta.current_tx_id,
            nonce = snapshot.meta.nonce,
            "Engine opened"
        );

        Ok(Self {
            store,
            host,
            meta: snapshot.meta,
            roles: snapshot.roles,
            catalog: snapshot.catalog,
            gate: snapshot.gate,
        })
    }

    // === Transitions ===

    /// Create a PENDING record
    pub fn tx_request(
        &mut self,
        caller: Address,
        target: Address,
        operation_type: OperationType,
        execution: ExecutionOptions,
        value: u128,
        gas_limit: u64,
    ) -> Result<TxRecord, EngineError> {
        self.check(functions::TX_REQUEST, &caller)?;

        let record = self.build_request(caller, target, operation_type, execution, value, gas_limit)?;

        let mut meta = self.meta.clone();
        meta.current_tx_id = record.tx_id;

        self.apply(
            Changeset::new().record(record.clone()).meta(meta),
            vec![requested(&record)],
        )?;

        tracing::info!(
            tx_id = record.tx_id,
            requester = %caller,
            target = %target,
            release_time = %record.release_time,
            "Transaction requested"
        );
        Ok(record)
    }

    /// Execute a PENDING record once its release time has passed
    pub fn tx_delayed_approval(&mut self, caller: Address, tx_id: u64) -> Result<TxRecord, EngineError> {
        self.check(functions::TX_DELAYED_APPROVAL, &caller)?;

        let mut record = self.load_pending(tx_id)?;
        let now = self.now();
        if now < record.release_time {
            return Err(EngineError::TooEarly {
                tx_id,
                release_time: record.release_time,
                now,
            });
        }

        let mut staged = Staged::new(self.meta.clone());
        self.execute(&mut record, &mut staged)?;
        staged.events.push(EngineEvent::TxExecuted {
            tx_id,
            status: record.status,
            path: ApprovalPath::Delayed,
            nonce: None,
        });

        let (changes, events) = staged.finish(record.clone());
        self.apply(changes, events)?;
        Ok(record)
    }

    /// Cancel a PENDING record
    pub fn tx_cancellation(&mut self, caller: Address, tx_id: u64) -> Result<TxRecord, EngineError> {
        self.check(functions::TX_CANCELLATION, &caller)?;

        let mut record = self.load_pending(tx_id)?;
        record.status = TxStatus::Cancelled;

        self.apply(
            Changeset::new().record(record.clone()),
            vec![EngineEvent::TxCancelled { tx_id, nonce: None }],
        )?;

        tracing::info!(tx_id, %caller, "Transaction cancelled");
        Ok(record)
    }

    /// Cancel a PENDING record on a signer's authority
    pub fn tx_cancellation_with_meta_tx(
        &mut self,
        caller: Address,
        envelope: &MetaTransaction,
    ) -> Result<TxRecord, EngineError> {
        self.check(functions::TX_CANCELLATION_WITH_META_TX, &caller)?;

        let signer = self.verify(functions::TX_CANCELLATION_WITH_META_TX, envelope)?;
        let tx_id = envelope.record.tx_id;
        let mut record = self.load_pending(tx_id)?;
        ensure_same_record(&record, &envelope.record)?;

        let mut meta = self.meta.clone();
        let nonce = meta.nonce;
        meta.nonce += 1;
        record.status = TxStatus::Cancelled;

        self.apply(
            Changeset::new().record(record.clone()).meta(meta),
            vec![EngineEvent::TxCancelled {
                tx_id,
                nonce: Some(nonce),
            }],
        )?;

        tracing::info!(tx_id, %signer, relayer = %caller, nonce, "Transaction cancelled by meta-transaction");
        Ok(record)
    }

    /// Execute a PENDING record on a signer's authority, skipping the time lock
    pub fn tx_approval_with_meta_tx(
        &mut self,
        caller: Address,
        envelope: &MetaTransaction,
    ) -> Result<TxRecord, EngineError> {
        self.check(functions::TX_APPROVAL_WITH_META_TX, &caller)?;

        let signer = self.verify(functions::TX_APPROVAL_WITH_META_TX, envelope)?;
        let tx_id = envelope.record.tx_id;
        let mut record = self.load_pending(tx_id)?;
        ensure_same_record(&record, &envelope.record)?;

        let mut staged = Staged::new(self.meta.clone());
        let nonce = staged.meta.nonce;
        staged.meta.nonce += 1;

        self.execute(&mut record, &mut staged)?;
        staged.events.push(EngineEvent::TxExecuted {
            tx_id,
            status: record.status,
            path: ApprovalPath::MetaTx,
            nonce: Some(nonce),
        });

        let (changes, events) = staged.finish(record.clone());
        self.apply(changes, events)?;

        tracing::info!(tx_id, %signer, relayer = %caller, nonce, "Meta-transaction approved");
        Ok(record)
    }

    /// Request and meta-approve in one atomic step
    ///
    /// The envelope's record supplies the request parameters and must
    /// name the id the new record will receive.
    pub fn request_and_approve(
        &mut self,
        caller: Address,
        envelope: &MetaTransaction,
    ) -> Result<TxRecord, EngineError> {
        self.check(functions::REQUEST_AND_APPROVE, &caller)?;

        let signer = self.verify(functions::REQUEST_AND_APPROVE, envelope)?;
        let embedded = &envelope.record;
        if embedded.payment.is_some() {
            return Err(EngineError::UnexpectedPayment);
        }

        let mut record = self.build_request(
            embedded.requester,
            embedded.target,
            embedded.operation_type,
            embedded.execution.clone(),
            embedded.value,
            embedded.gas_limit,
        )?;
        if !record.same_operation(embedded) {
            return Err(EngineError::RecordMismatch(record.tx_id));
        }

        let mut staged = Staged::new(self.meta.clone());
        let nonce = staged.meta.nonce;
        staged.meta.nonce += 1;
        staged.meta.current_tx_id = record.tx_id;
        staged.events.push(requested(&record));

        self.execute(&mut record, &mut staged)?;
        staged.events.push(EngineEvent::TxExecuted {
            tx_id: record.tx_id,
            status: record.status,
            path: ApprovalPath::RequestAndApprove,
            nonce: Some(nonce),
        });

        let (changes, events) = staged.finish(record.clone());
        self.apply(changes, events)?;

        tracing::info!(tx_id = record.tx_id, %signer, relayer = %caller, nonce, "Requested and approved");
        Ok(record)
    }

    /// Transfer the payment an envelope attaches to a PENDING record
    ///
    /// Both legs are checked against the balances before any transfer; the
    /// payment is attached only when every requested leg went through.
    /// Once the checks pass the envelope is spent, even if a leg fails.
    pub fn execute_payment(
        &mut self,
        caller: Address,
        envelope: &MetaTransaction,
    ) -> Result<TxRecord, EngineError> {
        self.check(functions::EXECUTE_PAYMENT, &caller)?;

        let signer = self.verify(functions::EXECUTE_PAYMENT, envelope)?;
        let tx_id = envelope.record.tx_id;
        let mut record = self.load_pending(tx_id)?;
        if record.payment.is_some() {
            return Err(EngineError::PaymentAlreadyAttached(tx_id));
        }
        if !record.same_operation(&envelope.record) {
            return Err(EngineError::RecordMismatch(tx_id));
        }
        let payment = envelope
            .record
            .payment
            .clone()
            .ok_or(EngineError::MissingPayment)?;

        self.check_payment(&payment)?;

        // The nonce is spent before funds move, so no later failure can
        // reopen the envelope for a second transfer
        let mut meta = self.meta.clone();
        let nonce = meta.nonce;
        meta.nonce += 1;
        self.apply(Changeset::new().meta(meta), Vec::new())?;

        self.transfer(&payment)?;

        record.payment = Some(payment.clone());
        self.apply(
            Changeset::new().record(record.clone()),
            vec![EngineEvent::PaymentExecuted {
                tx_id,
                payment: payment.clone(),
                nonce,
            }],
        )?;

        tracing::info!(
            tx_id,
            %signer,
            relayer = %caller,
            recipient = %payment.recipient,
            native_amount = payment.native_amount,
            token_amount = payment.token_amount,
            "Payment executed"
        );
        Ok(record)
    }

    // === Administration ===

    pub fn add_role(&mut self, caller: Address, role: RoleId, holder: Address) -> Result<(), EngineError> {
        self.check(functions::ADD_ROLE, &caller)?;

        let mut roles = self.roles.clone();
        roles.add_role(role, holder)?;
        self.apply(Changeset::new().roles(roles), vec![EngineEvent::RoleAdded { role, holder }])
    }

    pub fn remove_role(&mut self, caller: Address, role: RoleId) -> Result<(), EngineError> {
        self.check(functions::REMOVE_ROLE, &caller)?;

        let mut roles = self.roles.clone();
        let holder = roles.remove_role(role)?;
        self.apply(Changeset::new().roles(roles), vec![EngineEvent::RoleRemoved { role, holder }])
    }

    /// Re-assign a custom role
    ///
    /// Protected roles only change through their time-locked operation types.
    pub fn update_role(&mut self, caller: Address, role: RoleId, holder: Address) -> Result<(), EngineError> {
        self.check(functions::UPDATE_ROLE, &caller)?;
        if RoleRegistry::is_protected(&role) {
            return Err(AccessError::ProtectedRole(role).into());
        }

        let mut roles = self.roles.clone();
        let previous = roles.update_role(role, holder)?;
        self.apply(
            Changeset::new().roles(roles),
            vec![EngineEvent::RoleUpdated {
                role,
                previous,
                holder,
            }],
        )
    }

    pub fn add_authorized_signer(&mut self, caller: Address, signer: Address) -> Result<(), EngineError> {
        self.check(functions::ADD_AUTHORIZED_SIGNER, &caller)?;

        let mut roles = self.roles.clone();
        roles.add_authorized_signer(signer)?;
        self.apply(Changeset::new().roles(roles), vec![EngineEvent::SignerAuthorized { signer }])
    }

    pub fn remove_authorized_signer(&mut self, caller: Address, signer: Address) -> Result<(), EngineError> {
        self.check(functions::REMOVE_AUTHORIZED_SIGNER, &caller)?;

        let mut roles = self.roles.clone();
        roles.remove_authorized_signer(signer)?;
        self.apply(Changeset::new().roles(roles), vec![EngineEvent::SignerRevoked { signer }])
    }

    pub fn add_operation_type(
        &mut self,
        caller: Address,
        operation_type: OperationType,
    ) -> Result<(), EngineError> {
        self.check(functions::ADD_OPERATION_TYPE, &caller)?;

        let mut catalog = self.catalog.clone();
        catalog.add(operation_type)?;
        self.apply(
            Changeset::new().catalog(catalog),
            vec![EngineEvent::OperationTypeAdded { operation_type }],
        )
    }

    /// Remove an operation type; existing records keep theirs
    pub fn remove_operation_type(
        &mut self,
        caller: Address,
        operation_type: OperationType,
    ) -> Result<(), EngineError> {
        self.check(functions::REMOVE_OPERATION_TYPE, &caller)?;

        let mut catalog = self.catalog.clone();
        catalog.remove(operation_type)?;
        self.apply(
            Changeset::new().catalog(catalog),
            vec![EngineEvent::OperationTypeRemoved { operation_type }],
        )
    }

    /// Replace the roles allowed to call a function
    pub fn set_allowed_roles(
        &mut self,
        caller: Address,
        function_name: &str,
        allowed: Vec<RoleId>,
    ) -> Result<(), EngineError> {
        self.check(functions::SET_ALLOWED_ROLES, &caller)?;

        let mut gate = self.gate.clone();
        gate.set_allowed_roles(function_name, allowed.clone());
        self.apply(
            Changeset::new().gate(gate),
            vec![EngineEvent::PermissionsUpdated {
                function: functions::id(function_name),
                roles: allowed,
            }],
        )
    }

    /// Change the delay applied to records created from now on
    pub fn update_time_lock_period(&mut self, caller: Address, secs: u64) -> Result<(), EngineError> {
        self.check(functions::UPDATE_TIME_LOCK_PERIOD, &caller)?;
        if time_lock_delay(secs).is_none() {
            return Err(EngineError::InvalidTimeLock);
        }

        let mut meta = self.meta.clone();
        let previous_secs = meta.time_lock_secs;
        meta.time_lock_secs = secs;
        self.apply(
            Changeset::new().meta(meta),
            vec![EngineEvent::TimeLockUpdated {
                previous_secs,
                time_lock_secs: secs,
            }],
        )
    }

    // === Envelope construction ===

    /// Envelope parameters bound to this instance and its current nonce
    pub fn meta_tx_params(
        &self,
        function_name: &str,
        deadline: DateTime<Utc>,
        max_fee_ceiling: u128,
        signer: Address,
    ) -> MetaTxParams {
        MetaTxParams {
            chain_id: self.meta.chain_id,
            handler_address: self.meta.instance_address,
            handler_selector: handler_selector(function_name),
            nonce: self.meta.nonce,
            deadline,
            max_fee_ceiling,
            signer,
        }
    }

    /// Unsigned envelope for a PENDING record
    pub fn generate_unsigned_meta_transaction_for_existing(
        &self,
        tx_id: u64,
        params: MetaTxParams,
    ) -> Result<MetaTransaction, EngineError> {
        let record = self.load_pending(tx_id)?;
        Ok(MetaTransaction::unsigned(record, params))
    }

    /// Unsigned envelope for `request_and_approve`, predicting the next id
    #[allow(clippy::too_many_arguments)]
    pub fn generate_unsigned_meta_transaction_for_new(
        &self,
        requester: Address,
        target: Address,
        operation_type: OperationType,
        execution: ExecutionOptions,
        value: u128,
        gas_limit: u64,
        params: MetaTxParams,
    ) -> Result<MetaTransaction, EngineError> {
        let record = self.build_request(requester, target, operation_type, execution, value, gas_limit)?;
        Ok(MetaTransaction::unsigned(record, params))
    }

    /// Unsigned envelope attaching a payment to a PENDING record
    pub fn generate_unsigned_payment_meta_transaction(
        &self,
        tx_id: u64,
        payment: PaymentDetails,
        params: MetaTxParams,
    ) -> Result<MetaTransaction, EngineError> {
        let mut record = self.load_pending(tx_id)?;
        if record.payment.is_some() {
            return Err(EngineError::PaymentAlreadyAttached(tx_id));
        }
        record.payment = Some(payment);
        Ok(MetaTransaction::unsigned(record, params))
    }

    /// Digest an external signing tool must sign for `envelope`
    pub fn generate_message_hash(&self, envelope: &MetaTransaction) -> Bytes32 {
        envelope.digest()
    }

    // === Read-only accessors ===

    pub fn get_tx_record(&self, tx_id: u64) -> Result<TxRecord, EngineError> {
        self.store.find(tx_id)?.ok_or(EngineError::TxNotFound(tx_id))
    }

    pub fn get_current_tx_id(&self) -> u64 {
        self.meta.current_tx_id
    }

    pub fn get_nonce(&self) -> u64 {
        self.meta.nonce
    }

    pub fn is_operation_type_supported(&self, operation_type: &OperationType) -> bool {
        self.catalog.is_supported(operation_type)
    }

    pub fn get_pending_transactions(&self) -> Result<Vec<TxRecord>, EngineError> {
        Ok(self.store.list_by_status(TxStatus::Pending)?)
    }

    /// Records `from..=to`; both bounds must name existing ids
    pub fn get_transaction_history(&self, from: u64, to: u64) -> Result<Vec<TxRecord>, EngineError> {
        if from == 0 || from > to || to > self.meta.current_tx_id {
            return Err(EngineError::InvalidRange { from, to });
        }
        Ok(self.store.list_range(from, to)?)
    }

    pub fn get_supported_operation_types(&self) -> Vec<OperationType> {
        self.catalog.iter().copied().collect()
    }

    pub fn get_authorized_signers(&self) -> Vec<Address> {
        self.roles.authorized_signers().copied().collect()
    }

    pub fn get_role_holder(&self, role: &RoleId) -> Option<Address> {
        self.roles.holder(role)
    }

    pub fn has_role(&self, role: &RoleId, identity: &Address) -> bool {
        self.roles.has_role(role, identity)
    }

    pub fn get_allowed_roles(&self, function_name: &str) -> Vec<RoleId> {
        self.gate.allowed_roles(function_name).to_vec()
    }

    pub fn get_time_lock_period(&self) -> u64 {
        self.meta.time_lock_secs
    }

    pub fn owner(&self) -> Address {
        self.roles.owner()
    }

    pub fn broadcaster(&self) -> Address {
        self.roles.broadcaster()
    }

    pub fn recovery(&self) -> Address {
        self.roles.recovery()
    }

    pub fn chain_id(&self) -> u64 {
        self.meta.chain_id
    }

    pub fn instance_address(&self) -> Address {
        self.meta.instance_address
    }

    pub fn role_registry(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.host.clock.now()
    }

    // === Internals ===

    fn check(&self, function_name: &str, caller: &Address) -> Result<(), EngineError> {
        Ok(self.gate.check_permission(function_name, caller, &self.roles)?)
    }

    fn load_pending(&self, tx_id: u64) -> Result<TxRecord, EngineError> {
        let record = self.get_tx_record(tx_id)?;
        if !record.is_pending() {
            return Err(EngineError::WrongStatus {
                tx_id,
                status: record.status,
            });
        }
        Ok(record)
    }

    /// The record a request would create right now, without persisting it
    fn build_request(
        &self,
        requester: Address,
        target: Address,
        operation_type: OperationType,
        execution: ExecutionOptions,
        value: u128,
        gas_limit: u64,
    ) -> Result<TxRecord, EngineError> {
        if target.is_zero() {
            return Err(EngineError::InvalidTarget);
        }
        self.catalog.ensure_supported(&operation_type)?;

        let release_time = time_lock_delay(self.meta.time_lock_secs)
            .and_then(|delay| self.now().checked_add_signed(delay))
            .ok_or(EngineError::InvalidTimeLock)?;
        Ok(TxRecord::pending(
            self.meta.current_tx_id + 1,
            release_time,
            requester,
            target,
            operation_type,
            execution,
            value,
            gas_limit,
        ))
    }

    /// Check `envelope` as received by the entry point `function_name`
    fn verify(&self, function_name: &str, envelope: &MetaTransaction) -> Result<Address, EngineError> {
        let ctx = AuthorizationContext {
            chain_id: self.meta.chain_id,
            handler_address: self.meta.instance_address,
            handler_selector: handler_selector(function_name),
            nonce: self.meta.nonce,
            now: self.now(),
            fee_rate: self.host.rail.fee_rate(),
        };
        Ok(verify_signature(
            envelope,
            &ctx,
            &self.catalog,
            &self.roles,
            self.host.crypto.as_ref(),
        )?)
    }

    /// Run the guarded action and settle the record
    ///
    /// A reverted invocation is recorded as FAILED, not returned as an error.
    fn execute(&mut self, record: &mut TxRecord, staged: &mut Staged) -> Result<(), EngineError> {
        let call_data = match &record.execution {
            ExecutionOptions::None => {
                return Err(EngineError::UnsupportedExecutionKind(record.tx_id));
            }
            ExecutionOptions::Standard { .. } | ExecutionOptions::Raw { .. } => {
                record.execution.payload()
            }
        };

        let outcome = if record.target == self.meta.instance_address {
            self.invoke_internal(record, &call_data, staged)
        } else {
            self.host
                .invoker
                .invoke(record.target, record.value, record.gas_limit, &call_data)
        };

        match outcome {
            Ok(result) => {
                record.status = TxStatus::Completed;
                record.result = result;
                tracing::info!(tx_id = record.tx_id, target = %record.target, "Transaction completed");
            }
            Err(failure) => {
                record.status = TxStatus::Failed;
                record.result = failure.revert_data;
                tracing::warn!(
                    tx_id = record.tx_id,
                    target = %record.target,
                    reason = %failure.reason,
                    "Transaction failed"
                );
            }
        }
        Ok(())
    }

    fn invoke_internal(
        &self,
        record: &TxRecord,
        call_data: &[u8],
        staged: &mut Staged,
    ) -> Result<Vec<u8>, InvocationFailure> {
        let call = InternalCall::decode(call_data).map_err(InvocationFailure::new)?;
        if call.operation_type() != record.operation_type {
            return Err(InvocationFailure::new(format!(
                "{} requires operation type {}",
                call.signature(),
                call.operation_type()
            )));
        }

        let (role, holder) = match call {
            InternalCall::UpdateTimeLockPeriod(secs) => {
                if time_lock_delay(secs).is_none() {
                    return Err(InvocationFailure::new(format!(
                        "time lock period must be between 1 and {MAX_TIME_LOCK_PERIOD_SECS} seconds"
                    )));
                }
                let previous_secs = staged.meta.time_lock_secs;
                staged.meta.time_lock_secs = secs;
                staged.events.push(EngineEvent::TimeLockUpdated {
                    previous_secs,
                    time_lock_secs: secs,
                });
                return Ok(u64_word(previous_secs).to_vec());
            }
            InternalCall::TransferOwnership(holder) => (roles::owner(), holder),
            InternalCall::UpdateBroadcaster(holder) => (roles::broadcaster(), holder),
            InternalCall::UpdateRecovery(holder) => (roles::recovery(), holder),
        };

        let mut registry = self.roles.clone();
        let previous = registry
            .update_role(role, holder)
            .map_err(|e| InvocationFailure::new(e.to_string()))?;
        staged.roles = Some(registry);
        staged.events.push(EngineEvent::RoleUpdated {
            role,
            previous,
            holder,
        });
        Ok(address_word(&previous).to_vec())
    }

    fn check_payment(&self, payment: &PaymentDetails) -> Result<(), EngineError> {
        if payment.is_empty() {
            return Err(EngineError::MissingPayment);
        }
        if payment.recipient.is_zero() {
            return Err(EngineError::InvalidRecipient);
        }

        if payment.native_amount > 0 {
            let available = self.host.rail.native_balance();
            if available < payment.native_amount {
                return Err(EngineError::InsufficientBalance {
                    needed: payment.native_amount,
                    available,
                });
            }
        }

        if payment.token_amount > 0 {
            if payment.token_address.is_zero() {
                return Err(EngineError::InvalidTokenAddress);
            }
            let available = self.host.rail.token_balance(payment.token_address);
            if available < payment.token_amount {
                return Err(EngineError::InsufficientTokenBalance {
                    token: payment.token_address,
                    needed: payment.token_amount,
                    available,
                });
            }
        }
        Ok(())
    }

    fn transfer(&mut self, payment: &PaymentDetails) -> Result<(), EngineError> {
        if payment.native_amount > 0 {
            self.host
                .rail
                .transfer_native(payment.recipient, payment.native_amount)
                .map_err(|e| EngineError::TransferFailed(e.to_string()))?;
        }
        if payment.token_amount > 0 {
            self.host
                .rail
                .transfer_token(payment.token_address, payment.recipient, payment.token_amount)
                .map_err(|e| {
                    tracing::warn!(error = %e, "Token leg failed after native leg");
                    EngineError::TokenTransferFailed(e.to_string())
                })?;
        }
        Ok(())
    }

    /// Commit, then swap in the committed state, then notify
    fn apply(&mut self, changes: Changeset, events: Vec<EngineEvent>) -> Result<(), EngineError> {
        self.store.commit(&changes)?;

        let Changeset {
            meta,
            roles,
            catalog,
            gate,
            ..
        } = changes;
        if let Some(meta) = meta {
            self.meta = meta;
        }
        if let Some(roles) = roles {
            self.roles = roles;
        }
        if let Some(catalog) = catalog {
            self.catalog = catalog;
        }
        if let Some(gate) = gate {
            self.gate = gate;
        }

        self.publish(events);
        Ok(())
    }

    fn publish(&mut self, events: Vec<EngineEvent>) {
        let now = self.now();
        for event in events {
            tracing::debug!(kind = event.kind(), tx_id = ?event.tx_id(), "Notification");
            if let Some(journal) = self.host.journal.as_mut() {
                // State is already committed; the journal is an audit trail
                if let Err(e) = journal.append(event, now) {
                    tracing::warn!(error = %e, "Failed to journal notification");
                }
            }
        }
    }
}

fn requested(record: &TxRecord) -> EngineEvent {
    EngineEvent::TxRequested {
        tx_id: record.tx_id,
        requester: record.requester,
        target: record.target,
        operation_type: record.operation_type,
        release_time: record.release_time,
    }
}

/// The envelope must describe the stored record exactly
fn ensure_same_record(stored: &TxRecord, embedded: &TxRecord) -> Result<(), EngineError> {
    if !stored.same_operation(embedded) || stored.payment != embedded.payment {
        return Err(EngineError::RecordMismatch(stored.tx_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record() -> TxRecord {
        TxRecord::pending(
            1,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Address::from_low_u64(1),
            Address::from_low_u64(2),
            OperationType::named("TRANSFER"),
            ExecutionOptions::raw(vec![1, 2, 3]),
            0,
            21_000,
        )
    }

    #[test]
    fn test_same_record_ignores_engine_fields() {
        let stored = record();
        let mut embedded = record();
        embedded.release_time += Duration::seconds(5);
        embedded.status = TxStatus::Completed;
        assert!(ensure_same_record(&stored, &embedded).is_ok());

        embedded.payment = Some(PaymentDetails::native(Address::from_low_u64(3), 1));
        assert!(matches!(
            ensure_same_record(&stored, &embedded),
            Err(EngineError::RecordMismatch(1))
        ));
    }

    #[test]
    fn test_staged_finish_includes_roles_only_when_touched() {
        let meta = InstanceMeta {
            chain_id: 1,
            instance_address: Address::from_low_u64(9),
            time_lock_secs: 60,
            current_tx_id: 1,
            nonce: 0,
        };
        let (changes, events) = Staged::new(meta.clone()).finish(record());
        assert!(changes.roles.is_none());
        assert_eq!(changes.meta, Some(meta));
        assert_eq!(changes.records.len(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn test_handler_selector_matches_signature_selector() {
        assert_eq!(
            handler_selector(functions::TX_APPROVAL_WITH_META_TX),
            Selector::from_signature("txApprovalWithMetaTx")
        );
    }
}
