use std::sync::Arc;

use chrono::NaiveDate;
use tracing::error;

use medicare_adherence::AdherenceConfig;
use medicare_db::Database;
use medicare_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub storage: Storage,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Base URL photo links are built from, without a trailing slash.
    pub public_url: String,
    pub adherence: AdherenceConfig,
}

impl AppStateInner {
    /// Run blocking DB work off the async runtime.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("blocking task failed"))
            })?
            .map_err(ApiError::Internal)
    }

    /// The server's local calendar day.
    pub fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    pub fn photo_url(&self, file_name: &str) -> String {
        format!("{}/photos/{}", self.public_url.trim_end_matches('/'), file_name)
    }
}
