//! Streaming transfer from a source query into a destination table.
//!
//! One transfer runs a single sequential control path:
//!
//! ```text
//! Init -> [Wipe] -> (Accumulate -> [Flush])* -> FinalFlush -> Commit
//!                         any failure -> Rollback
//! ```
//!
//! Rows stream from the source through the type map, accumulate into a
//! bounded batch and are written with one multi-row INSERT per batch inside
//! a single destination transaction. With a skip policy, each write runs
//! under a savepoint so a matching failure discards only that batch.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::validate_request;
use crate::core::traits::Transaction;
use crate::core::value::Batch;
use crate::dialect::InsertBuilder;
use crate::error::{FerryError, Result};
use crate::executor::{cancellable, Executor};
use crate::result::ResultSet;
use crate::typemap::TypeMap;

/// Where rows come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Registered connection name.
    pub connection: String,

    /// Query producing the rows.
    pub statement: String,
}

/// Where rows go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSpec {
    /// Registered connection name.
    pub connection: String,

    /// Destination table; column names come from the source result set.
    pub table: String,

    /// Empty the table inside the transaction before the first insert.
    #[serde(default)]
    pub wipe: bool,
}

/// Discard batches whose write error contains `message`.
///
/// Matching is a plain substring test on the driver's error text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipPolicy {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub message: String,
}

impl SkipPolicy {
    fn matches(&self, error: &str) -> bool {
        self.enabled && error.contains(&self.message)
    }
}

/// One transfer job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: SourceSpec,

    pub destination: DestinationSpec,

    #[serde(default)]
    pub skip_error: SkipPolicy,

    #[serde(default)]
    pub type_map: TypeMap,

    /// Rows per INSERT statement (values below 1 mean 1).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1000
}

impl TransferRequest {
    /// Load a transfer job from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a transfer job.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let request: TransferRequest = serde_yaml::from_str(yaml)?;
        validate_request(&request)?;
        Ok(request)
    }
}

/// Runs transfers between registered connections.
#[derive(Clone)]
pub struct TransferEngine {
    executor: Executor,
}

impl TransferEngine {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Stream `request.source` into `request.destination`.
    ///
    /// Either every non-skipped batch commits or nothing does. The result is
    /// a `status` result whose rows-affected counts rows of successful
    /// writes only.
    pub async fn transfer(
        &self,
        cancel: &CancellationToken,
        request: &TransferRequest,
    ) -> Result<ResultSet> {
        validate_request(request)?;
        let start = Instant::now();
        let src = &request.source;
        let dst = &request.destination;

        info!(
            "Starting transfer {} -> {}.{} (batch size: {}, wipe: {}, skip: {})",
            src.connection,
            dst.connection,
            dst.table,
            request.batch_size.max(1),
            dst.wipe,
            request.skip_error.enabled
        );

        if request.skip_error.enabled && request.skip_error.message.is_empty() {
            warn!("skip_error.message is empty: every failed batch will be skipped");
        }

        // Init
        self.executor.registry().resolve(&src.connection)?;
        let dest = self.executor.registry().resolve(&dst.connection)?;

        let mut rows = self
            .executor
            .open_stream(cancel, &src.connection, &src.statement, &request.type_map)
            .await?;
        let builder = InsertBuilder::new(&dst.table, &rows.column_names(), dest.placeholder())?;

        let tx = cancellable(cancel, dest.begin())
            .await?
            .map_err(|e| FerryError::transaction(&dst.connection, "begin", e))?;

        let mut writer = BatchWriter {
            tx,
            conn: &dst.connection,
            table: &dst.table,
            builder,
            skip: &request.skip_error,
            savepoint_name: format!("sp_{}", Uuid::new_v4().simple()),
            sized: 0,
            sql: String::new(),
            rows_affected: 0,
            rows_skipped: 0,
            writes: 0,
        };

        let outcome = async {
            if dst.wipe {
                writer.wipe(cancel, &dest.truncate_statement(&dst.table)).await?;
            }

            let mut batch = Batch::new(request.batch_size);
            if batch.capacity() == 1 && !request.skip_error.enabled {
                writer.prepare_single(cancel).await?;
            }

            while let Some(row) = rows.next(cancel).await? {
                batch.push(row);
                if batch.is_full() {
                    writer.flush(cancel, &mut batch).await?;
                }
            }
            writer.flush(cancel, &mut batch).await
        }
        .await;

        let BatchWriter {
            tx,
            rows_affected,
            rows_skipped,
            writes,
            ..
        } = writer;
        rows.close();

        if let Err(e) = outcome {
            warn!("Transfer into {}.{} failed, rolling back: {}", dst.connection, dst.table, e);
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback on '{}' failed: {}", dst.connection, rollback_err);
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| FerryError::transaction(&dst.connection, "commit", e))?;

        let duration = start.elapsed();
        info!(
            "Transfer into {}.{} committed: {} rows in {} writes ({:?})",
            dst.connection, dst.table, rows_affected, writes, duration
        );
        debug!("{}.{}: {} rows skipped", dst.connection, dst.table, rows_skipped);

        Ok(ResultSet::status(rows_affected, duration))
    }
}

/// Writes batches into one open transaction.
struct BatchWriter<'a> {
    tx: Box<dyn Transaction>,
    conn: &'a str,
    table: &'a str,
    builder: InsertBuilder,
    skip: &'a SkipPolicy,
    /// Savepoint name reused by every write of this transfer.
    savepoint_name: String,
    /// Row count `sql` was built for.
    sized: usize,
    sql: String,
    rows_affected: u64,
    rows_skipped: u64,
    writes: usize,
}

impl BatchWriter<'_> {
    async fn wipe(&mut self, cancel: &CancellationToken, statement: &str) -> Result<()> {
        info!("{}: wiping {}", self.conn, self.table);
        cancellable(cancel, self.tx.batch_execute(statement))
            .await?
            .map_err(|e| FerryError::write(self.table, e))
    }

    /// Prepare the single-row statement once for row-at-a-time loads.
    async fn prepare_single(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.resize(1);
        debug!("{}: preparing single-row insert", self.conn);
        cancellable(cancel, self.tx.prepare(&self.sql))
            .await?
            .map_err(|e| FerryError::write(self.table, e))
    }

    fn resize(&mut self, rows: usize) {
        if self.sized != rows {
            self.sql = self.builder.build(rows);
            self.sized = rows;
        }
    }

    /// Write and empty the batch. No-op when it is empty.
    async fn flush(&mut self, cancel: &CancellationToken, batch: &mut Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();
        self.resize(count);
        let params = batch.drain_flat();
        self.writes += 1;

        if !self.skip.enabled {
            cancellable(cancel, self.tx.execute(&self.sql, &params))
                .await?
                .map_err(|e| FerryError::write(self.table, e))?;
            self.rows_affected += count as u64;
            debug!("{}: wrote {} rows into {}", self.conn, count, self.table);
            return Ok(());
        }

        let sql = format!("SAVEPOINT {}", self.savepoint_name);
        self.savepoint(cancel, "savepoint", sql).await?;

        match cancellable(cancel, self.tx.execute(&self.sql, &params)).await? {
            Ok(_) => {
                self.release(cancel).await?;
                self.rows_affected += count as u64;
                debug!("{}: wrote {} rows into {}", self.conn, count, self.table);
            }
            Err(e) if self.skip.matches(&e.to_string()) => {
                warn!(
                    "{}: skipping batch of {} rows into {}: {}",
                    self.conn, count, self.table, e
                );
                self.savepoint(
                    cancel,
                    "rollback to savepoint",
                    format!("ROLLBACK TO SAVEPOINT {}", self.savepoint_name),
                )
                .await?;
                self.release(cancel).await?;
                self.rows_skipped += count as u64;
            }
            Err(e) => return Err(FerryError::write(self.table, e)),
        }

        Ok(())
    }

    /// `ROLLBACK TO` keeps the savepoint open, so it is released on both paths.
    async fn release(&mut self, cancel: &CancellationToken) -> Result<()> {
        let sql = format!("RELEASE SAVEPOINT {}", self.savepoint_name);
        self.savepoint(cancel, "release savepoint", sql).await
    }

    async fn savepoint(
        &mut self,
        cancel: &CancellationToken,
        action: &'static str,
        sql: String,
    ) -> Result<()> {
        cancellable(cancel, self.tx.batch_execute(&sql))
            .await?
            .map_err(|e| FerryError::transaction(self.conn, action, e))
    }
}
