use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Server error code reported when a unique index rejects a write.
const DUPLICATE_KEY: i32 = 11000;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as provided.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of pings tried.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a room failed.
    #[error("failed to load room `{code}`")]
    LoadRoom {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a room failed.
    #[error("failed to save room `{code}`")]
    SaveRoom {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting a room failed.
    #[error("failed to delete room `{code}`")]
    DeleteRoom {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Scanning for idle rooms failed.
    #[error("failed to list inactive rooms")]
    ListInactive {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Inserting a chat message failed.
    #[error("failed to append chat message to room `{code}`")]
    AppendMessage {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading chat history failed.
    #[error("failed to load chat history of room `{code}`")]
    LoadMessages {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting chat history failed.
    #[error("failed to purge chat history of room `{code}`")]
    PurgeMessages {
        /// Room code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

/// Whether the server rejected the operation because of a unique key clash.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}
