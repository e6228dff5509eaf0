//! Forward-only row stream fed by a driver task.
//!
//! Drivers run the cursor inside a spawned task and push decoded rows through
//! a bounded channel, so the consumer applies backpressure by simply not
//! polling. End of data is the channel closing (`None`), never a sentinel row.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::schema::ColumnDescriptor;
use super::value::Row;
use crate::error::DriverError;

/// Rows buffered between the driver task and the consumer.
pub const STREAM_BUFFER: usize = 256;

type Header = Result<Vec<ColumnDescriptor>, DriverError>;

/// Producer side handed to a driver's cursor task.
pub struct RowSink {
    header: Option<oneshot::Sender<Header>>,
    tx: mpsc::Sender<Result<Row, DriverError>>,
}

impl RowSink {
    /// Publish the result-set columns. Must precede the first row.
    pub fn columns(&mut self, columns: Vec<ColumnDescriptor>) {
        if let Some(header) = self.header.take() {
            let _ = header.send(Ok(columns));
        }
    }

    /// Send one row. Returns `false` once the consumer has gone away.
    pub async fn send(&self, row: Row) -> bool {
        self.tx.send(Ok(row)).await.is_ok()
    }

    /// Report a failure: as the open error if columns were never published,
    /// otherwise as the next stream item.
    pub async fn fail(mut self, err: DriverError) {
        match self.header.take() {
            Some(header) => {
                let _ = header.send(Err(err));
            }
            None => {
                let _ = self.tx.send(Err(err)).await;
            }
        }
    }
}

/// Single-pass, non-restartable stream of decoded rows.
///
/// Dropping the stream aborts the driver task, which releases the cursor and
/// returns the connection to its pool.
pub struct RowStream {
    columns: Vec<ColumnDescriptor>,
    rx: mpsc::Receiver<Result<Row, DriverError>>,
    task: Option<JoinHandle<()>>,
}

impl RowStream {
    /// Spawn `producer` as the cursor task and wait for it to publish columns.
    pub async fn spawn<F, Fut>(producer: F) -> Result<Self, DriverError>
    where
        F: FnOnce(RowSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let (header_tx, header_rx) = oneshot::channel();
        let sink = RowSink {
            header: Some(header_tx),
            tx,
        };
        let task = tokio::spawn(producer(sink));

        match header_rx.await {
            Ok(Ok(columns)) => Ok(Self {
                columns,
                rx,
                task: Some(task),
            }),
            Ok(Err(e)) => {
                task.abort();
                Err(e)
            }
            Err(_) => {
                task.abort();
                Err("row stream ended before reporting columns".into())
            }
        }
    }

    /// Build a stream over rows that are already in memory.
    pub fn from_rows(columns: Vec<ColumnDescriptor>, rows: Vec<Result<Row, DriverError>>) -> Self {
        let (tx, rx) = mpsc::channel(rows.len().max(1));
        for row in rows {
            // Capacity covers every row, so this cannot fail.
            let _ = tx.try_send(row);
        }
        Self {
            columns,
            rx,
            task: None,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Next row, or `None` at end of data.
    pub async fn next(&mut self) -> Option<Result<Row, DriverError>> {
        self.rx.recv().await
    }

    /// Release the cursor before reaching the end.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}
