//! Data access gateway.
//!
//! One process-wide connection handle is opened lazily on first use and then
//! shared by every caller. Reads through [`Gateway::query`] degrade to an empty
//! result when the store is unreachable; writes through [`Gateway::execute`]
//! run inside a transaction and report a [`WriteOutcome`] instead of raising.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    QueryResult, Statement, TransactionTrait, Value,
};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    /// Apply pending migrations right after the first successful connect
    pub auto_migrate: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
            auto_migrate: true,
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            auto_migrate: cfg.auto_migrate,
        }
    }
}

/// Opens a connection pool with the given settings.
pub async fn establish_connection(config: &DbConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("club_db.max_connections", config.max_connections as f64);
    info!(
        max_connections = config.max_connections,
        "Connecting to database"
    );

    Database::connect(opt).await
}

/// Runs the embedded schema migrations.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<(), DbErr> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(conn, None).await;

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Result of a write submitted through [`Gateway::execute`].
#[derive(Debug)]
pub enum WriteOutcome {
    Committed { rows_affected: u64 },
    Failed(ServiceError),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Committed { .. })
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            WriteOutcome::Committed { rows_affected } => *rows_affected,
            WriteOutcome::Failed(_) => 0,
        }
    }

    pub fn into_result(self) -> Result<u64, ServiceError> {
        match self {
            WriteOutcome::Committed { rows_affected } => Ok(rows_affected),
            WriteOutcome::Failed(err) => Err(err),
        }
    }
}

/// Shared, lazily connected access point to the relational store.
#[derive(Debug)]
pub struct Gateway {
    config: DbConfig,
    conn: RwLock<Option<DatabaseConnection>>,
}

impl Gateway {
    /// Creates a gateway that connects on first use.
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            conn: RwLock::new(None),
        }
    }

    /// Wraps an already opened connection.
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            config: DbConfig::default(),
            conn: RwLock::new(Some(conn)),
        }
    }

    /// Returns the shared connection, opening it if needed.
    ///
    /// A failed attempt leaves the slot empty so the next call retries.
    pub async fn connection(&self) -> Result<DatabaseConnection, ServiceError> {
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.conn.write().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = establish_connection(&self.config).await.map_err(|e| {
            counter!("club_db.connection_failures", 1);
            warn!(error = %e, "Database unreachable");
            ServiceError::ConnectionUnavailable(e.to_string())
        })?;

        if self.config.auto_migrate {
            run_migrations(&conn)
                .await
                .map_err(|e| ServiceError::ConnectionUnavailable(format!("migrations failed: {e}")))?;
        }

        info!("Database connection established");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Checks that the store answers.
    pub async fn ping(&self) -> Result<(), ServiceError> {
        let start = Instant::now();
        let conn = self.connection().await?;
        let result = conn.ping().await.map_err(|e| {
            counter!("club_db.connection_failures", 1);
            ServiceError::ConnectionUnavailable(e.to_string())
        });
        if result.is_ok() {
            gauge!("club_db.connection_latency", start.elapsed().as_millis() as f64);
        }
        result
    }

    /// Runs a read with bound parameters, surfacing every failure.
    pub async fn try_query(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<QueryResult>, ServiceError> {
        let conn = self.connection().await?;
        let start = Instant::now();
        let stmt = Statement::from_sql_and_values(conn.get_database_backend(), sql, params);
        debug!(sql = %sql, "Executing query");

        let rows = conn.query_all(stmt).await.map_err(|e| {
            counter!("club_db.query.error", 1);
            error!(error = %e, "Query failed");
            ServiceError::QueryFailed(e)
        })?;

        histogram!("club_db.query.duration", start.elapsed());
        counter!("club_db.query.ok", 1);
        Ok(rows)
    }

    /// Runs a read with bound parameters; any failure yields no rows.
    ///
    /// `query` and [`Gateway::execute`] are the degrade-mode facade: they never
    /// return an error. Services use the `try_*` forms, [`Gateway::transaction`]
    /// and [`Gateway::read_or_default`] so that only an unreachable store
    /// degrades and other failures reach the caller.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Vec<QueryResult> {
        match self.try_query(sql, params).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Read degraded to empty result");
                Vec::new()
            }
        }
    }

    /// Runs a write with bound parameters inside its own transaction.
    pub async fn try_execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, ServiceError> {
        self.try_execute_batch(vec![(sql.to_string(), params)]).await
    }

    /// Runs several writes in one transaction; either all apply or none do.
    pub async fn try_execute_batch(
        &self,
        statements: Vec<(String, Vec<Value>)>,
    ) -> Result<u64, ServiceError> {
        self.transaction(move |txn| {
            Box::pin(async move {
                let backend = txn.get_database_backend();
                let mut rows = 0;
                for (sql, params) in statements {
                    let stmt = Statement::from_sql_and_values(backend, sql, params);
                    rows += txn.execute(stmt).await?.rows_affected();
                }
                Ok(rows)
            })
        })
        .await
    }

    /// Runs a write and reports the outcome without raising. See [`Gateway::query`].
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> WriteOutcome {
        match self.try_execute(sql, params).await {
            Ok(rows_affected) => WriteOutcome::Committed { rows_affected },
            Err(e) => {
                warn!(error = %e, "Write failed");
                WriteOutcome::Failed(e)
            }
        }
    }

    /// Runs `f` inside a transaction that commits on `Ok` and rolls back on `Err`.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>>
            + Send,
        T: Send + 'static,
    {
        let conn = self.connection().await?;
        let transaction_id = Uuid::new_v4();
        let start = Instant::now();

        debug!(transaction_id = %transaction_id, "Starting database transaction");
        counter!("club_db.transaction.started", 1);

        let result = conn.transaction(f).await;

        let elapsed = start.elapsed();
        histogram!("club_db.transaction.duration", elapsed);

        match &result {
            Ok(_) => {
                counter!("club_db.transaction.committed", 1);
                debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
            }
            Err(_) => {
                counter!("club_db.transaction.rolled_back", 1);
                warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
            }
        }

        result.map_err(|e| match e {
            sea_orm::TransactionError::Connection(e) => ServiceError::QueryFailed(e),
            sea_orm::TransactionError::Transaction(e) => e,
        })
    }

    /// Runs a read through the entity API; an unreachable store yields the default value.
    pub async fn read_or_default<F, T>(&self, operation: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(DatabaseConnection) -> BoxFuture<'static, Result<T, DbErr>>,
        T: Default,
    {
        let conn = match self.connection().await {
            Ok(conn) => conn,
            Err(ServiceError::ConnectionUnavailable(reason)) => {
                warn!(operation = %operation, reason = %reason, "Read degraded to empty result");
                return Ok(T::default());
            }
            Err(e) => return Err(e),
        };

        let start = Instant::now();
        let result = f(conn).await.map_err(|e| {
            error!(operation = %operation, error = %e, "Database operation failed");
            counter!("club_db.operation.error", 1, "operation" => operation.to_string());
            ServiceError::QueryFailed(e)
        });
        histogram!("club_db.operation.duration", start.elapsed(), "operation" => operation.to_string());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn unreachable() -> Gateway {
        Gateway::new(DbConfig {
            url: "sqlite:///definitely/missing/dir/club.db?mode=ro".to_string(),
            connect_timeout: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(1),
            ..Default::default()
        })
    }

    fn scratch(dir: &TempDir) -> Gateway {
        Gateway::new(DbConfig {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("club.db").display()),
            max_connections: 1,
            auto_migrate: false,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn unreachable_store_degrades_reads_and_fails_writes() {
        let gateway = unreachable();

        let rows = gateway.query("SELECT 1", vec![]).await;
        assert!(rows.is_empty());

        let outcome = gateway
            .execute("DELETE FROM orders WHERE id = $1", vec![Uuid::new_v4().into()])
            .await;
        assert!(!outcome.is_success());
        assert_matches!(outcome, WriteOutcome::Failed(ServiceError::ConnectionUnavailable(_)));

        let listed: Vec<u32> = gateway
            .read_or_default("list", |_conn| Box::pin(async { Ok(vec![1]) }))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn parameters_are_bound_not_interpolated() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch(&dir);

        gateway
            .try_execute("CREATE TABLE notes (body TEXT NOT NULL)", vec![])
            .await
            .unwrap();
        let hostile = "x'); DROP TABLE notes; --";
        let outcome = gateway
            .execute("INSERT INTO notes (body) VALUES ($1)", vec![hostile.into()])
            .await;
        assert_eq!(outcome.rows_affected(), 1);

        let rows = gateway
            .try_query("SELECT body FROM notes WHERE body = $1", vec![hostile.into()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let body: String = rows[0].try_get("", "body").unwrap();
        assert_eq!(body, hostile);
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_every_statement() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch(&dir);

        gateway
            .try_execute("CREATE TABLE notes (body TEXT NOT NULL)", vec![])
            .await
            .unwrap();

        let result = gateway
            .try_execute_batch(vec![
                ("INSERT INTO notes (body) VALUES ($1)".into(), vec!["first".into()]),
                ("INSERT INTO missing_table (body) VALUES ($1)".into(), vec!["second".into()]),
            ])
            .await;
        assert_matches!(result, Err(ServiceError::QueryFailed(_)));

        let rows = gateway.query("SELECT body FROM notes", vec![]).await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn malformed_statement_is_reported_as_query_failure() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch(&dir);

        let outcome = gateway.execute("UPDATE nowhere SET x = 1", vec![]).await;
        assert_matches!(outcome, WriteOutcome::Failed(ServiceError::QueryFailed(_)));
        assert!(gateway.ping().await.is_ok());
    }
}
