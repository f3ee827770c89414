//! MongoDB-backed [`DocumentStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{Document, doc};
use k4_core::config::MongoSinkConfig;
use mongodb::{Client, Database};
use tracing::{info, warn};

use crate::DocumentStore;

/// Build the connection string for a sink config.
///
/// Credentials are included only when both username and password are set,
/// and are percent-encoded.
pub fn connection_uri(cfg: &MongoSinkConfig) -> String {
    match cfg.credentials() {
        Some((user, pass)) => format!(
            "mongodb://{}:{}@{}:{}",
            urlencoding::encode(user),
            urlencoding::encode(pass),
            cfg.host,
            cfg.port
        ),
        None => format!("mongodb://{}:{}", cfg.host, cfg.port),
    }
}

/// Connection string safe for logs.
pub fn redacted_uri(cfg: &MongoSinkConfig) -> String {
    match cfg.credentials() {
        Some((user, _)) => format!("mongodb://{}:***@{}:{}", urlencoding::encode(user), cfg.host, cfg.port),
        None => connection_uri(cfg),
    }
}

/// One client + database handle, owned by a single sink for its lifetime.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and verify the server is reachable with a `ping`.
    ///
    /// The driver connects lazily, so without the ping an unreachable server
    /// would only surface on the first insert.
    pub async fn connect(cfg: &MongoSinkConfig) -> Result<Self> {
        let target = redacted_uri(cfg);
        if cfg.credentials().is_none() && (cfg.username.is_some() || cfg.password.is_some()) {
            warn!("{target}: username and password must both be set to authenticate; connecting without credentials");
        }

        let client = Client::with_uri_str(connection_uri(cfg))
            .await
            .with_context(|| format!("invalid connection string for {target}"))?;
        let db = client.database(&cfg.db);
        db.run_command(doc! { "ping": 1 })
            .await
            .with_context(|| format!("connecting to {target}"))?;

        info!("connected to {target}/{}", cfg.db);
        Ok(Self { db })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        self.db
            .collection::<Document>(collection)
            .insert_many(docs)
            .await
            .with_context(|| format!("insert_many into {}.{collection}", self.db.name()))?;
        Ok(())
    }
}
