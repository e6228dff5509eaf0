//! In-memory connection double for engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::schema::ColumnDescriptor;
use crate::core::stream::RowStream;
use crate::core::traits::{Connection, Transaction};
use crate::core::value::{Row, Value};
use crate::dialect::Placeholder;
use crate::error::DriverError;
use crate::typemap::{resolve, TypeMap};

/// Call recorded by a [`MockConnection`] or one of its transactions.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Exec(String),
    Begin,
    Prepare(String),
    Write { sql: String, params: Vec<Value> },
    Batch(String),
    Commit,
    Rollback,
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    writes: usize,
}

/// Connection serving fixed rows and recording every call.
#[derive(Clone)]
pub struct MockConnection {
    placeholder: Placeholder,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    stream_error_after: Option<(usize, String)>,
    failing_writes: Vec<(usize, String)>,
    failing_batches: Vec<(String, String)>,
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            placeholder: Placeholder::Question,
            columns: Vec::new(),
            rows: Vec::new(),
            stream_error_after: None,
            failing_writes: Vec::new(),
            failing_batches: Vec::new(),
            state: Arc::default(),
        }
    }

    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Rows returned by every stream opened on this connection.
    pub fn with_rows(mut self, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Fail the stream with `message` after `n` rows.
    pub fn fail_stream_after(mut self, n: usize, message: &str) -> Self {
        self.stream_error_after = Some((n, message.to_string()));
        self
    }

    /// Fail the `nth` parametrized write (1-based) with `message`.
    pub fn fail_write(mut self, nth: usize, message: &str) -> Self {
        self.failing_writes.push((nth, message.to_string()));
        self
    }

    /// Fail any batch statement starting with `prefix`.
    pub fn fail_batch(mut self, prefix: &str, message: &str) -> Self {
        self.failing_batches.push((prefix.to_string(), message.to_string()));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Row counts of every write, assuming `width` parameters per row.
    pub fn write_sizes(&self, width: usize) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Write { params, .. } => Some(params.len() / width.max(1)),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: Event) {
        self.lock().events.push(event);
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn db_type(&self) -> &str {
        "mock"
    }

    fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    async fn execute(&self, sql: &str) -> Result<u64, DriverError> {
        self.record(Event::Exec(sql.to_string()));
        Ok(1)
    }

    async fn open_stream(&self, _sql: &str, type_map: &TypeMap) -> Result<RowStream, DriverError> {
        let plan = resolve(&self.columns, type_map);
        let mut items: Vec<Result<Row, DriverError>> = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if let Some((n, message)) = &self.stream_error_after {
                if i == *n {
                    items.push(Err(message.clone().into()));
                    break;
                }
            }
            let mut row = row.clone();
            items.push(plan.apply(&mut row).map(|_| row).map_err(Into::into));
        }
        Ok(RowStream::from_rows(self.columns.clone(), items))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        self.record(Event::Begin);
        Ok(Box::new(MockTransaction { conn: self.clone() }))
    }

    async fn ping(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self) {}
}

struct MockTransaction {
    conn: MockConnection,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        let nth = {
            let mut state = self.conn.lock();
            state.writes += 1;
            state.events.push(Event::Write {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            state.writes
        };
        if let Some((_, message)) = self.conn.failing_writes.iter().find(|(n, _)| *n == nth) {
            return Err(message.clone().into());
        }
        Ok(params.len() as u64)
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.conn.record(Event::Batch(sql.to_string()));
        match self
            .conn
            .failing_batches
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
        {
            Some((_, message)) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    async fn prepare(&mut self, sql: &str) -> Result<(), DriverError> {
        self.conn.record(Event::Prepare(sql.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.record(Event::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.record(Event::Rollback);
        Ok(())
    }
}
