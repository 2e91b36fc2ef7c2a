//! SQLite storage for records, registries and counters

use crate::record::{ExecutionKind, ExecutionOptions, PaymentDetails, RecordError, TxRecord, TxStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use secops_access::{OperationCatalog, PermissionGate, RoleRegistry};
use secops_core::{Address, FunctionId, OperationType, RoleId};
use std::path::Path;
use thiserror::Error;

/// Errors from the state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Transaction record not found: {0}")]
    NotFound(u64),

    #[error("Corrupt column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Counters and settings of one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMeta {
    pub chain_id: u64,
    pub instance_address: Address,
    pub time_lock_secs: u64,
    /// Highest assigned tx id (0 before the first request)
    pub current_tx_id: u64,
    /// Protocol-wide meta-transaction nonce
    pub nonce: u64,
}

/// Everything needed to rebuild an engine on startup
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub meta: InstanceMeta,
    pub roles: RoleRegistry,
    pub catalog: OperationCatalog,
    pub gate: PermissionGate,
}

/// The writes of one state transition, applied atomically
#[derive(Debug, Default)]
pub struct Changeset {
    pub records: Vec<TxRecord>,
    pub meta: Option<InstanceMeta>,
    pub roles: Option<RoleRegistry>,
    pub catalog: Option<OperationCatalog>,
    pub gate: Option<PermissionGate>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, record: TxRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn meta(mut self, meta: InstanceMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn roles(mut self, roles: RoleRegistry) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn catalog(mut self, catalog: OperationCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn gate(mut self, gate: PermissionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
            && self.meta.is_none()
            && self.roles.is_none()
            && self.catalog.is_none()
            && self.gate.is_none()
    }
}

/// Record counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

const RECORD_COLUMNS: &str = "tx_id, release_time, status, requester, target, operation_type,
     execution_kind, execution_payload, value, gas_limit, result, payment_json";

/// SQLite storage for one engine instance
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (or create) a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tx_records (
                tx_id INTEGER PRIMARY KEY,
                release_time TEXT NOT NULL,
                status TEXT NOT NULL,
                requester TEXT NOT NULL,
                target TEXT NOT NULL,
                operation_type TEXT NOT NULL,
                execution_kind INTEGER NOT NULL,
                execution_payload BLOB NOT NULL,
                value TEXT NOT NULL,
                gas_limit TEXT NOT NULL,
                result BLOB NOT NULL,
                payment_json TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tx_records_status ON tx_records(status);

            CREATE TABLE IF NOT EXISTS roles (
                role_id TEXT PRIMARY KEY,
                holder TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS authorized_signers (
                signer TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS operation_types (
                operation_type TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS function_permissions (
                function_id TEXT PRIMARY KEY,
                roles_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Whether an instance has been initialized in this database
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(self.read_meta_value("chain_id")?.is_some())
    }

    /// Apply all writes of a transition in one SQLite transaction
    pub fn commit(&mut self, changes: &Changeset) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;

        for record in &changes.records {
            write_record(&tx, record)?;
        }
        if let Some(meta) = &changes.meta {
            write_meta(&tx, meta)?;
        }
        if let Some(roles) = &changes.roles {
            write_roles(&tx, roles)?;
        }
        if let Some(catalog) = &changes.catalog {
            write_catalog(&tx, catalog)?;
        }
        if let Some(gate) = &changes.gate {
            write_gate(&tx, gate)?;
        }

        tx.commit()?;
        tracing::debug!(records = changes.records.len(), "State committed");
        Ok(())
    }

    /// Load the full instance state, `None` when never initialized
    pub fn load_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        let Some(meta) = self.load_meta()? else {
            return Ok(None);
        };

        let mut roles = RoleRegistry::new();
        {
            let mut stmt = self.conn.prepare("SELECT role_id, holder FROM roles")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (role, holder) in rows {
                roles
                    .add_role(parse_column::<RoleId>("role_id", &role)?, parse_column("holder", &holder)?)
                    .map_err(|e| StoreError::Corrupt {
                        column: "roles",
                        value: e.to_string(),
                    })?;
            }
        }
        {
            let mut stmt = self.conn.prepare("SELECT signer FROM authorized_signers")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for signer in rows {
                roles
                    .add_authorized_signer(parse_column("signer", &signer)?)
                    .map_err(|e| StoreError::Corrupt {
                        column: "authorized_signers",
                        value: e.to_string(),
                    })?;
            }
        }

        let mut stmt = self.conn.prepare("SELECT operation_type FROM operation_types")?;
        let types = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = OperationCatalog::with_types(
            types
                .iter()
                .map(|t| parse_column::<OperationType>("operation_type", t))
                .collect::<Result<Vec<_>, _>>()?,
        );

        let mut gate = PermissionGate::new();
        let mut stmt = self
            .conn
            .prepare("SELECT function_id, roles_json FROM function_permissions")?;
        let entries = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (function, roles_json) in entries {
            let allowed: Vec<RoleId> = serde_json::from_str(&roles_json)?;
            gate.set_allowed_roles_by_id(parse_column::<FunctionId>("function_id", &function)?, allowed);
        }

        Ok(Some(Snapshot {
            meta,
            roles,
            catalog,
            gate,
        }))
    }

    fn load_meta(&self) -> Result<Option<InstanceMeta>, StoreError> {
        let Some(chain_id) = self.read_meta_value("chain_id")? else {
            return Ok(None);
        };
        let required = |key: &'static str| -> Result<String, StoreError> {
            self.read_meta_value(key)?.ok_or(StoreError::Corrupt {
                column: key,
                value: "missing".to_string(),
            })
        };

        Ok(Some(InstanceMeta {
            chain_id: parse_column("chain_id", &chain_id)?,
            instance_address: parse_column("instance_address", &required("instance_address")?)?,
            time_lock_secs: parse_column("time_lock_secs", &required("time_lock_secs")?)?,
            current_tx_id: parse_column("current_tx_id", &required("current_tx_id")?)?,
            nonce: parse_column("nonce", &required("nonce")?)?,
        }))
    }

    fn read_meta_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    /// Get a record by id
    pub fn get(&self, tx_id: u64) -> Result<TxRecord, StoreError> {
        self.find(tx_id)?.ok_or(StoreError::NotFound(tx_id))
    }

    /// Get a record by id, `None` if it was never created
    pub fn find(&self, tx_id: u64) -> Result<Option<TxRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM tx_records WHERE tx_id = ?1");
        let raw = self
            .conn
            .query_row(&sql, params![tx_id as i64], RawRecord::from_row)
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    /// Records with the given status, oldest first
    pub fn list_by_status(&self, status: TxStatus) -> Result<Vec<TxRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM tx_records WHERE status = ?1 ORDER BY tx_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![status.to_string()], RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecord::into_record).collect()
    }

    /// Records with ids in `from..=to`
    pub fn list_range(&self, from: u64, to: u64) -> Result<Vec<TxRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM tx_records WHERE tx_id BETWEEN ?1 AND ?2 ORDER BY tx_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![from as i64, to as i64], RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecord::into_record).collect()
    }

    pub fn count_by_status(&self, status: TxStatus) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tx_records WHERE status = ?1",
            params![status.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            pending: self.count_by_status(TxStatus::Pending)?,
            completed: self.count_by_status(TxStatus::Completed)?,
            failed: self.count_by_status(TxStatus::Failed)?,
            cancelled: self.count_by_status(TxStatus::Cancelled)?,
        })
    }
}

fn write_record(tx: &Transaction<'_>, record: &TxRecord) -> Result<(), StoreError> {
    let payment_json = record
        .payment
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO tx_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            record.tx_id as i64,
            record.release_time.to_rfc3339(),
            record.status.to_string(),
            record.requester.to_string(),
            record.target.to_string(),
            record.operation_type.to_string(),
            record.execution.kind().as_u8(),
            record.execution.payload(),
            record.value.to_string(),
            record.gas_limit.to_string(),
            record.result,
            payment_json,
        ],
    )?;
    Ok(())
}

fn write_meta(tx: &Transaction<'_>, meta: &InstanceMeta) -> Result<(), StoreError> {
    let pairs = [
        ("chain_id", meta.chain_id.to_string()),
        ("instance_address", meta.instance_address.to_string()),
        ("time_lock_secs", meta.time_lock_secs.to_string()),
        ("current_tx_id", meta.current_tx_id.to_string()),
        ("nonce", meta.nonce.to_string()),
    ];
    for (key, value) in pairs {
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }
    Ok(())
}

fn write_roles(tx: &Transaction<'_>, roles: &RoleRegistry) -> Result<(), StoreError> {
    tx.execute("DELETE FROM roles", [])?;
    for (role, holder) in roles.roles() {
        tx.execute(
            "INSERT INTO roles (role_id, holder) VALUES (?1, ?2)",
            params![role.to_string(), holder.to_string()],
        )?;
    }
    tx.execute("DELETE FROM authorized_signers", [])?;
    for signer in roles.authorized_signers() {
        tx.execute(
            "INSERT INTO authorized_signers (signer) VALUES (?1)",
            params![signer.to_string()],
        )?;
    }
    Ok(())
}

fn write_catalog(tx: &Transaction<'_>, catalog: &OperationCatalog) -> Result<(), StoreError> {
    tx.execute("DELETE FROM operation_types", [])?;
    for operation_type in catalog.iter() {
        tx.execute(
            "INSERT INTO operation_types (operation_type) VALUES (?1)",
            params![operation_type.to_string()],
        )?;
    }
    Ok(())
}

fn write_gate(tx: &Transaction<'_>, gate: &PermissionGate) -> Result<(), StoreError> {
    tx.execute("DELETE FROM function_permissions", [])?;
    for (function, roles) in gate.entries() {
        tx.execute(
            "INSERT INTO function_permissions (function_id, roles_json) VALUES (?1, ?2)",
            params![function.to_string(), serde_json::to_string(roles)?],
        )?;
    }
    Ok(())
}

fn parse_column<T: std::str::FromStr>(column: &'static str, value: &str) -> Result<T, StoreError> {
    value.parse().map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

/// Column values as read, before domain parsing
struct RawRecord {
    tx_id: i64,
    release_time: String,
    status: String,
    requester: String,
    target: String,
    operation_type: String,
    execution_kind: u8,
    execution_payload: Vec<u8>,
    value: String,
    gas_limit: String,
    result: Vec<u8>,
    payment_json: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tx_id: row.get(0)?,
            release_time: row.get(1)?,
            status: row.get(2)?,
            requester: row.get(3)?,
            target: row.get(4)?,
            operation_type: row.get(5)?,
            execution_kind: row.get(6)?,
            execution_payload: row.get(7)?,
            value: row.get(8)?,
            gas_limit: row.get(9)?,
            result: row.get(10)?,
            payment_json: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<TxRecord, StoreError> {
        let release_time = DateTime::parse_from_rfc3339(&self.release_time)
            .map_err(|_| StoreError::Corrupt {
                column: "release_time",
                value: self.release_time.clone(),
            })?
            .with_timezone(&Utc);
        let kind = ExecutionKind::from_u8(self.execution_kind)?;
        let payment: Option<PaymentDetails> = self
            .payment_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(TxRecord {
            tx_id: self.tx_id as u64,
            release_time,
            status: parse_column("status", &self.status)?,
            requester: parse_column("requester", &self.requester)?,
            target: parse_column("target", &self.target)?,
            operation_type: parse_column("operation_type", &self.operation_type)?,
            execution: ExecutionOptions::decode(kind, &self.execution_payload)?,
            value: parse_column("value", &self.value)?,
            gas_limit: parse_column("gas_limit", &self.gas_limit)?,
            result: self.result,
            payment,
        })
    }
}
