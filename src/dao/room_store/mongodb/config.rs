use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "watch_together";

/// Parsed connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the URI.
    pub options: ClientOptions,
    /// Database holding the `rooms` and `messages` collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri` and pick the database, defaulting to `watch_together`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DATABASE)
            .to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}
