use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const MAX_ATTEMPTS: u32 = 10;
const INITIAL_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Build a client and wait until the server answers a ping, backing off between attempts.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = INITIAL_DELAY;

    while let Err(source) = database.run_command(doc! { "ping": 1 }).await {
        attempts += 1;
        if attempts >= MAX_ATTEMPTS {
            return Err(MongoDaoError::InitialPing { attempts, source });
        }
        debug!(attempts, delay_ms = delay.as_millis() as u64, "MongoDB not reachable yet");
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }

    Ok((client, database))
}
