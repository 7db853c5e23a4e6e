use std::sync::Arc;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
use diesel::RunQueryDsl;
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};

use crate::config::{DatabaseConfig as ConfigDatabaseConfig, DbType as ConfigDbType};
#[cfg(feature = "postgres")]
use crate::db::postgres::{PostgresBookingStore, PostgresWebhookLogStore};
use crate::db::{BookingStore, DatabaseError, WebhookLogStore};

#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use diesel::Connection;
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{SqliteBookingStore, SqliteWebhookLogStore};

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    booking_store: Arc<dyn BookingStore>,
    webhook_log_store: Arc<dyn WebhookLogStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &ConfigDatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let connection_string = config.connection_string();
                let max_connections = config.max_connections();
                let min_connections = config.min_connections();

                let manager = ConnectionManager::<PgConnection>::new(connection_string);

                let builder = r2d2::Pool::builder()
                    .max_size(max_connections.unwrap_or(10))
                    .min_idle(Some(min_connections.unwrap_or(1)));

                let pool = builder
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                let booking_store = Arc::new(PostgresBookingStore::new(pool.clone()));
                let webhook_log_store = Arc::new(PostgresWebhookLogStore::new(pool.clone()));

                Ok(Self {
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    booking_store,
                    webhook_log_store,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config
                    .sqlite_path()
                    .ok_or_else(|| DatabaseError::Connection("missing sqlite path".into()))?;
                let path_arc = Arc::new(path.clone());

                let booking_store = Arc::new(SqliteBookingStore::new(path_arc.clone()));
                let webhook_log_store = Arc::new(SqliteWebhookLogStore::new(path_arc));

                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    sqlite_path: Some(path),
                    booking_store,
                    webhook_log_store,
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self
                    .postgres_pool
                    .as_ref()
                    .ok_or_else(|| DatabaseError::Migration("postgres pool missing".into()))?;
                Self::migrate_postgres(pool).await
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self
                    .sqlite_path
                    .as_ref()
                    .ok_or_else(|| DatabaseError::Migration("sqlite path missing".into()))?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "postgres")]
    async fn migrate_postgres(pool: &Pool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id BIGSERIAL PRIMARY KEY,
                    external_booking_id TEXT UNIQUE,
                    ota_reservation_code TEXT,
                    channel TEXT NOT NULL,
                    status TEXT NOT NULL,
                    check_in DATE NOT NULL,
                    check_out DATE NOT NULL,
                    guest_name TEXT,
                    guest_email TEXT,
                    guest_phone TEXT,
                    adults INTEGER NOT NULL DEFAULT 2,
                    children INTEGER NOT NULL DEFAULT 0,
                    total_amount TEXT NOT NULL,
                    currency TEXT NOT NULL,
                    room_id BIGINT,
                    room_category TEXT NOT NULL,
                    room_title TEXT,
                    notes TEXT,
                    provider_meta TEXT,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS webhook_log (
                    id BIGSERIAL PRIMARY KEY,
                    event_type TEXT NOT NULL,
                    event_id TEXT NOT NULL,
                    object_type TEXT NOT NULL,
                    object_id TEXT,
                    payload TEXT NOT NULL,
                    received_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    processed BOOLEAN NOT NULL DEFAULT FALSE,
                    processed_at TIMESTAMP WITH TIME ZONE
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS webhook_errors (
                    id BIGSERIAL PRIMARY KEY,
                    error_message TEXT NOT NULL,
                    error_detail TEXT,
                    payload TEXT,
                    occurred_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_bookings_external_id ON bookings(external_booking_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_check_in ON bookings(check_in)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_log_event_id ON webhook_log(event_id)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_log_processed ON webhook_log(processed)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_errors_occurred ON webhook_errors(occurred_at)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    external_booking_id TEXT UNIQUE,
                    ota_reservation_code TEXT,
                    channel TEXT NOT NULL,
                    status TEXT NOT NULL,
                    check_in TEXT NOT NULL,
                    check_out TEXT NOT NULL,
                    guest_name TEXT,
                    guest_email TEXT,
                    guest_phone TEXT,
                    adults INTEGER NOT NULL DEFAULT 2,
                    children INTEGER NOT NULL DEFAULT 0,
                    total_amount TEXT NOT NULL,
                    currency TEXT NOT NULL,
                    room_id INTEGER,
                    room_category TEXT NOT NULL,
                    room_title TEXT,
                    notes TEXT,
                    provider_meta TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS webhook_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_type TEXT NOT NULL,
                    event_id TEXT NOT NULL,
                    object_type TEXT NOT NULL,
                    object_id TEXT,
                    payload TEXT NOT NULL,
                    received_at TEXT NOT NULL DEFAULT (datetime('now')),
                    processed INTEGER NOT NULL DEFAULT 0,
                    processed_at TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS webhook_errors (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    error_message TEXT NOT NULL,
                    error_detail TEXT,
                    payload TEXT,
                    occurred_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_bookings_external_id ON bookings(external_booking_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_check_in ON bookings(check_in)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_log_event_id ON webhook_log(event_id)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_log_processed ON webhook_log(processed)",
                "CREATE INDEX IF NOT EXISTS idx_webhook_errors_occurred ON webhook_errors(occurred_at)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        self.booking_store.clone()
    }

    pub fn webhook_log_store(&self) -> Arc<dyn WebhookLogStore> {
        self.webhook_log_store.clone()
    }

    #[cfg(feature = "postgres")]
    pub fn pool(&self) -> Option<&Pool> {
        self.postgres_pool.as_ref()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}
