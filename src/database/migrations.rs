use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// Single source of truth for the database schema. The admin/web surface
/// only reads and upserts rows; it never runs migrations.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial schema").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Seed default settings row and episode index").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: Initial schema
/// Creates endpoints, downtime_episodes, settings, and users tables
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            expected_text TEXT,
            status TEXT NOT NULL DEFAULT 'online',
            first_failure_time INTEGER,
            last_checked_at INTEGER,
            last_error TEXT,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    // No foreign key to endpoints: episodes must outlive endpoint deletion,
    // which is why they carry a denormalized name/url snapshot
    conn.execute(
        "CREATE TABLE IF NOT EXISTS downtime_episodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            endpoint_uuid TEXT NOT NULL,
            endpoint_name TEXT NOT NULL,
            endpoint_url TEXT NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            last_error TEXT
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            interval_weekday_minutes INTEGER NOT NULL DEFAULT 60,
            interval_weekend_minutes INTEGER NOT NULL DEFAULT 120,
            alert_threshold_minutes INTEGER NOT NULL DEFAULT 15,
            smtp_host TEXT NOT NULL DEFAULT 'smtp.gmail.com',
            smtp_port INTEGER NOT NULL DEFAULT 465,
            smtp_user TEXT,
            smtp_password TEXT
        )",
        (),
    )
    .await?;

    // User directory, owned by the admin surface. The sweep engine only
    // reads the notification view of it.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            name TEXT,
            email TEXT,
            receive_notifications INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v2: seed the singleton settings row and index open episodes
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", ()).await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_episodes_endpoint
            ON downtime_episodes (endpoint_uuid)",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_episodes_open
            ON downtime_episodes (endpoint_uuid) WHERE end_time IS NULL",
        (),
    )
    .await?;

    Ok(())
}
