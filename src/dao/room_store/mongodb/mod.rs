mod config;
mod connection;
mod error;
mod models;
/// [`MongoStore`] and its trait implementations.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoStore;

use crate::dao::storage::StorageError;

pub(crate) const BACKEND: &str = "mongodb";

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(BACKEND, err.to_string(), err)
    }
}
