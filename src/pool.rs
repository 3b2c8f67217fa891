use deadpool::managed::{self, Pool, RecycleError, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// deadpool manager for libsql connections
pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.database.connect()
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        // Probe the connection before handing it back out
        let row = conn.query("SELECT 1", ()).await?.next().await?;
        match row {
            Some(_) => Ok(()),
            None => Err(RecycleError::Backend(LibsqlError::QueryReturnedNoRows)),
        }
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;
