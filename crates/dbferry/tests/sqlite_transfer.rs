//! End-to-end transfers between two SQLite databases.

use std::sync::Arc;

use dbferry::{
    Config, DestinationSpec, Executor, FerryError, Registry, SkipPolicy, SourceSpec,
    TransferEngine, TransferRequest, TypeMap,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _dir: TempDir,
    registry: Arc<Registry>,
    executor: Executor,
    cancel: CancellationToken,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            r#"
connections:
  legacy:
    db_type: sqlite
    datasource: "sqlite://{}"
    max_connections: 2
  warehouse:
    db_type: sqlite
    datasource: "sqlite://{}"
    max_connections: 2
"#,
            dir.path().join("legacy.db").display(),
            dir.path().join("warehouse.db").display()
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let registry = Arc::new(Registry::connect(&config).unwrap());
        let executor = Executor::new(registry.clone());
        let fixture = Self {
            _dir: dir,
            registry,
            executor,
            cancel: CancellationToken::new(),
        };

        fixture
            .exec("legacy", "CREATE TABLE customers (id INTEGER NOT NULL, name TEXT, balance TEXT)")
            .await;
        fixture
            .exec(
                "legacy",
                "INSERT INTO customers VALUES (1,'ann','10.50'), (2,'bo',NULL), (3,'cy','0.25'), \
                 (4,'di','7'), (5,'ed','1e2'), (6,'flo','3.00')",
            )
            .await;
        fixture
            .exec(
                "warehouse",
                "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, balance NUMERIC)",
            )
            .await;
        fixture
    }

    async fn exec(&self, conn: &str, sql: &str) {
        self.executor.exec(&self.cancel, conn, sql).await.unwrap();
    }

    async fn ids(&self) -> Vec<String> {
        let rs = self
            .executor
            .query(&self.cancel, "warehouse", "SELECT id FROM customers ORDER BY id", 100)
            .await
            .unwrap();
        rs.rows().iter().map(|r| r[0].clone()).collect()
    }

    fn engine(&self) -> TransferEngine {
        TransferEngine::new(self.executor.clone())
    }
}

fn request(batch_size: usize) -> TransferRequest {
    TransferRequest {
        source: SourceSpec {
            connection: "legacy".into(),
            statement: "SELECT id, name, balance FROM customers ORDER BY id".into(),
        },
        destination: DestinationSpec {
            connection: "warehouse".into(),
            table: "customers".into(),
            wipe: false,
        },
        skip_error: SkipPolicy::default(),
        type_map: TypeMap::default(),
        batch_size,
    }
}

#[tokio::test]
async fn transfers_all_rows_in_batches() {
    let fx = Fixture::new().await;

    let rs = fx.engine().transfer(&fx.cancel, &request(4)).await.unwrap();
    assert_eq!(rs.rows_affected(), 6);
    assert_eq!(rs.columns(), &["status".to_string()]);
    assert_eq!(fx.ids().await, vec!["1", "2", "3", "4", "5", "6"]);

    let names = fx
        .executor
        .query(&fx.cancel, "warehouse", "SELECT name, balance FROM customers WHERE id = 2", 1)
        .await
        .unwrap();
    assert_eq!(names.rows(), &[vec!["bo".to_string(), "".to_string()]]);

    fx.registry.close().await;
}

#[tokio::test]
async fn skips_batches_matching_the_policy() {
    let fx = Fixture::new().await;
    fx.exec("warehouse", "INSERT INTO customers VALUES (3, 'existing', 0)").await;

    let mut req = request(2);
    req.skip_error = SkipPolicy {
        enabled: true,
        message: "UNIQUE constraint failed".into(),
    };

    let rs = fx.engine().transfer(&fx.cancel, &req).await.unwrap();
    assert_eq!(rs.rows_affected(), 4);
    assert_eq!(fx.ids().await, vec!["1", "2", "3", "5", "6"]);

    let existing = fx
        .executor
        .query(&fx.cancel, "warehouse", "SELECT name FROM customers WHERE id = 3", 1)
        .await
        .unwrap();
    assert_eq!(existing.rows()[0][0], "existing");
}

#[tokio::test]
async fn non_matching_failure_leaves_destination_untouched() {
    let fx = Fixture::new().await;
    fx.exec("warehouse", "INSERT INTO customers VALUES (5, 'existing', 0)").await;

    let mut req = request(2);
    req.skip_error = SkipPolicy {
        enabled: true,
        message: "no such column".into(),
    };

    let err = fx.engine().transfer(&fx.cancel, &req).await.unwrap_err();
    assert!(matches!(err, FerryError::WriteFailed { .. }));
    assert!(err.to_string().contains("UNIQUE"));
    assert_eq!(fx.ids().await, vec!["5"]);
}

#[tokio::test]
async fn wipe_replaces_existing_rows() {
    let fx = Fixture::new().await;
    fx.exec("warehouse", "INSERT INTO customers VALUES (99, 'stale', 0)").await;

    let mut req = request(1000);
    req.destination.wipe = true;

    fx.engine().transfer(&fx.cancel, &req).await.unwrap();
    assert_eq!(fx.ids().await, vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn single_row_batches() {
    let fx = Fixture::new().await;

    let rs = fx.engine().transfer(&fx.cancel, &request(1)).await.unwrap();
    assert_eq!(rs.rows_affected(), 6);
    assert_eq!(fx.ids().await.len(), 6);
}

#[tokio::test]
async fn type_map_coerces_destination_fields() {
    let fx = Fixture::new().await;

    let req = TransferRequest::from_yaml(
        r#"
source:
  connection: legacy
  statement: SELECT id, name, balance FROM customers WHERE balance IS NOT NULL ORDER BY id
destination:
  connection: warehouse
  table: customers
batch_size: 10
type_map:
  enabled: true
  destination:
    name: { type: string, nullable: true, template: "c-{{.}}" }
    balance: { type: number, nullable: true }
"#,
    )
    .unwrap();

    let rs = fx.engine().transfer(&fx.cancel, &req).await.unwrap();
    assert_eq!(rs.rows_affected(), 5);

    let out = fx
        .executor
        .query(&fx.cancel, "warehouse", "SELECT name FROM customers ORDER BY id", 10)
        .await
        .unwrap();
    assert_eq!(out.rows()[0][0], "c-ann");
    assert_eq!(out.rows()[4][0], "c-flo");
}

#[tokio::test]
async fn malformed_number_aborts_transfer() {
    let fx = Fixture::new().await;
    fx.exec("legacy", "INSERT INTO customers VALUES (7, 'gus', 'n/a')").await;

    let mut req = request(10);
    req.type_map.enabled = true;
    req.type_map.destination.insert(
        "balance".into(),
        serde_yaml::from_str("{ type: number, nullable: true }").unwrap(),
    );

    let err = fx.engine().transfer(&fx.cancel, &req).await.unwrap_err();
    assert!(matches!(err, FerryError::ParseFailed { ref field, .. } if field == "balance"));
    assert!(fx.ids().await.is_empty());
}

#[tokio::test]
async fn unknown_connection_is_not_found() {
    let fx = Fixture::new().await;
    let mut req = request(10);
    req.source.connection = "nowhere".into();

    let err = fx.engine().transfer(&fx.cancel, &req).await.unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
