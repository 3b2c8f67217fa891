use anyhow::{Result, bail};
use async_trait::async_trait;
use libsql::params;
use tracing::warn;
use uuid::Uuid;

use super::models::{DowntimeEpisode, Endpoint, EndpointStatus, MonitoringSettings, Recipient};
use crate::monitoring::types::EpisodeChange;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Database trait for abstracting storage operations
///
/// The sweep engine is the only writer of endpoint and episode state; the
/// admin surface uses `save_endpoint` for creation/edit and the read methods
/// for display.
#[async_trait]
pub trait Database: Send + Sync {
    /// Get all monitored endpoints
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>>;

    /// Get an endpoint by UUID
    async fn get_endpoint_by_uuid(&self, uuid: Uuid) -> Result<Option<Endpoint>>;

    /// Upsert an endpoint (admin surface)
    async fn save_endpoint(&self, endpoint: &Endpoint) -> Result<i64>;

    /// Delete an endpoint; its episodes are retained (append-only audit log)
    async fn delete_endpoint(&self, uuid: Uuid) -> Result<()>;

    /// Find the currently open downtime episode for an endpoint, if any
    async fn find_open_episode(&self, endpoint_uuid: Uuid) -> Result<Option<DowntimeEpisode>>;

    /// Get recent episodes for an endpoint, newest first (display)
    async fn recent_episodes(&self, endpoint_uuid: Uuid, limit: usize) -> Result<Vec<DowntimeEpisode>>;

    /// Get the global monitoring settings row
    async fn get_settings(&self) -> Result<MonitoringSettings>;

    /// Resolve every opted-in recipient with a non-empty email address
    async fn list_notifiable_recipients(&self) -> Result<Vec<Recipient>>;

    /// Apply all endpoint mutations and episode changes of one sweep in a
    /// single transaction; on failure nothing is committed
    async fn commit_sweep(&self, endpoints: &[Endpoint], episodes: &[EpisodeChange]) -> Result<()>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

const ENDPOINT_COLUMNS: &str = "id, uuid, name, url, expected_text, status, \
     first_failure_time, last_checked_at, last_error, created_at";

const EPISODE_COLUMNS: &str =
    "id, endpoint_uuid, endpoint_name, endpoint_url, start_time, end_time, last_error";

fn endpoint_from_row(row: &libsql::Row) -> Result<Endpoint> {
    let uuid_str: String = row.get(1)?;
    let status_str: String = row.get(5)?;

    Ok(Endpoint {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        name: row.get(2)?,
        url: row.get(3)?,
        expected_text: row.get(4)?,
        status: EndpointStatus::parse(&status_str),
        first_failure_time: row.get::<Option<i64>>(6)?.map(Endpoint::i64_to_timestamp),
        last_checked_at: row.get::<Option<i64>>(7)?.map(Endpoint::i64_to_timestamp),
        last_error: row.get(8)?,
        created_at: Endpoint::i64_to_timestamp(row.get(9)?),
    })
}

fn episode_from_row(row: &libsql::Row) -> Result<DowntimeEpisode> {
    let uuid_str: String = row.get(1)?;

    Ok(DowntimeEpisode {
        id: Some(row.get(0)?),
        endpoint_uuid: Uuid::parse_str(&uuid_str)?,
        endpoint_name: row.get(2)?,
        endpoint_url: row.get(3)?,
        start_time: Endpoint::i64_to_timestamp(row.get(4)?),
        end_time: row.get::<Option<i64>>(5)?.map(Endpoint::i64_to_timestamp),
        last_error: row.get(6)?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints ORDER BY id"))
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut endpoints = Vec::new();

        while let Some(row) = rows.next().await? {
            endpoints.push(endpoint_from_row(&row)?);
        }

        Ok(endpoints)
    }

    async fn get_endpoint_by_uuid(&self, uuid: Uuid) -> Result<Option<Endpoint>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE uuid = ?"))
            .await?;

        let mut rows = stmt.query(params![uuid.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(endpoint_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn save_endpoint(&self, endpoint: &Endpoint) -> Result<i64> {
        let conn = self.get_conn().await?;

        if let Some(id) = endpoint.id {
            conn.execute(
                "UPDATE endpoints SET name = ?, url = ?, expected_text = ?, status = ?,
                    first_failure_time = ?, last_checked_at = ?, last_error = ?
                 WHERE id = ?",
                params![
                    endpoint.name.clone(),
                    endpoint.url.clone(),
                    endpoint.expected_text.clone(),
                    endpoint.status.to_string(),
                    endpoint.first_failure_time.map(Endpoint::timestamp_to_i64),
                    endpoint.last_checked_at.map(Endpoint::timestamp_to_i64),
                    endpoint.last_error.clone(),
                    id
                ],
            )
            .await?;
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO endpoints (uuid, name, url, expected_text, status,
                    first_failure_time, last_checked_at, last_error, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    endpoint.uuid.to_string(),
                    endpoint.name.clone(),
                    endpoint.url.clone(),
                    endpoint.expected_text.clone(),
                    endpoint.status.to_string(),
                    endpoint.first_failure_time.map(Endpoint::timestamp_to_i64),
                    endpoint.last_checked_at.map(Endpoint::timestamp_to_i64),
                    endpoint.last_error.clone(),
                    Endpoint::timestamp_to_i64(endpoint.created_at)
                ],
            )
            .await?;

            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_endpoint(&self, uuid: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;

        // Episodes are deliberately left in place; they carry their own
        // name/url snapshot and remain meaningful after the endpoint is gone
        conn.execute("DELETE FROM endpoints WHERE uuid = ?", params![uuid.to_string()]).await?;
        Ok(())
    }

    async fn find_open_episode(&self, endpoint_uuid: Uuid) -> Result<Option<DowntimeEpisode>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EPISODE_COLUMNS} FROM downtime_episodes
                 WHERE endpoint_uuid = ? AND end_time IS NULL"
            ))
            .await?;

        let mut rows = stmt.query(params![endpoint_uuid.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(episode_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn recent_episodes(&self, endpoint_uuid: Uuid, limit: usize) -> Result<Vec<DowntimeEpisode>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EPISODE_COLUMNS} FROM downtime_episodes
                 WHERE endpoint_uuid = ? ORDER BY start_time DESC LIMIT ?"
            ))
            .await?;

        let mut rows = stmt.query(params![endpoint_uuid.to_string(), limit as i64]).await?;
        let mut episodes = Vec::new();

        while let Some(row) = rows.next().await? {
            episodes.push(episode_from_row(&row)?);
        }

        Ok(episodes)
    }

    async fn get_settings(&self) -> Result<MonitoringSettings> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT interval_weekday_minutes, interval_weekend_minutes,
                    alert_threshold_minutes, smtp_host, smtp_port, smtp_user, smtp_password
                 FROM settings WHERE id = 1",
                (),
            )
            .await?;

        let Some(row) = rows.next().await? else {
            bail!("monitoring settings row is missing; database was not initialized");
        };

        Ok(MonitoringSettings {
            interval_weekday_minutes: row.get(0)?,
            interval_weekend_minutes: row.get(1)?,
            alert_threshold_minutes: row.get(2)?,
            smtp_host: row.get(3)?,
            smtp_port: row.get::<i64>(4)? as u16,
            smtp_user: row.get(5)?,
            smtp_password: row.get(6)?,
        })
    }

    async fn list_notifiable_recipients(&self) -> Result<Vec<Recipient>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT email FROM users
                 WHERE receive_notifications = 1 AND email IS NOT NULL AND TRIM(email) != ''",
                (),
            )
            .await?;

        let mut recipients = Vec::new();
        while let Some(row) = rows.next().await? {
            recipients.push(Recipient { email: row.get(0)? });
        }

        Ok(recipients)
    }

    async fn commit_sweep(&self, endpoints: &[Endpoint], episodes: &[EpisodeChange]) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await?;
        match apply_sweep(&conn, endpoints, episodes).await {
            Ok(()) => {
                conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }
}

/// Apply one sweep's mutations on an already-open transaction
async fn apply_sweep(
    conn: &libsql::Connection,
    endpoints: &[Endpoint],
    episodes: &[EpisodeChange],
) -> Result<()> {
    for endpoint in endpoints {
        conn.execute(
            "UPDATE endpoints SET status = ?, first_failure_time = ?,
                last_checked_at = ?, last_error = ?
             WHERE uuid = ?",
            params![
                endpoint.status.to_string(),
                endpoint.first_failure_time.map(Endpoint::timestamp_to_i64),
                endpoint.last_checked_at.map(Endpoint::timestamp_to_i64),
                endpoint.last_error.clone(),
                endpoint.uuid.to_string()
            ],
        )
        .await?;
    }

    for change in episodes {
        match change {
            EpisodeChange::Open { endpoint_uuid, snapshot, start_time, last_error } => {
                conn.execute(
                    "INSERT INTO downtime_episodes
                        (endpoint_uuid, endpoint_name, endpoint_url, start_time, end_time, last_error)
                     VALUES (?, ?, ?, ?, NULL, ?)",
                    params![
                        endpoint_uuid.to_string(),
                        snapshot.name.clone(),
                        snapshot.url.clone(),
                        Endpoint::timestamp_to_i64(*start_time),
                        last_error.clone()
                    ],
                )
                .await?;
            }
            EpisodeChange::Close { endpoint_uuid, end_time } => {
                let affected = conn
                    .execute(
                        "UPDATE downtime_episodes SET end_time = ?
                         WHERE endpoint_uuid = ? AND end_time IS NULL",
                        params![
                            Endpoint::timestamp_to_i64(*end_time),
                            endpoint_uuid.to_string()
                        ],
                    )
                    .await?;

                // Recovery edge with no open episode is a data inconsistency;
                // report it and accept the missing record rather than fail the sweep
                if affected == 0 {
                    warn!(
                        endpoint = %endpoint_uuid,
                        "recovery observed but no open downtime episode to close"
                    );
                }
            }
        }
    }

    Ok(())
}
