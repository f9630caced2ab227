//! Startup connection with bounded retry
//!
//! Only process startup retries. Request-path store calls fail once and
//! report the failure.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::db::Store;
use crate::types::ChainhubError;

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Open the database at `path` and ping it, retrying with exponential
/// backoff (500ms doubling, capped at 5s) for up to `max_attempts` tries.
pub async fn connect(path: &Path, max_attempts: u32) -> Result<Store, ChainhubError> {
    let max_attempts = max_attempts.max(1);
    let mut delay = INITIAL_DELAY;
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        match open_and_ping(path) {
            Ok(store) => {
                info!("Database ready after {} attempt(s)", attempt);
                return Ok(store);
            }
            Err(e) => {
                warn!(
                    "Database attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                last_err = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
            delay = next_delay(delay);
        }
    }

    Err(last_err
        .unwrap_or_else(|| ChainhubError::Internal("Database connection failed".into())))
}

fn open_and_ping(path: &Path) -> Result<Store, ChainhubError> {
    let store = Store::open(path)?;
    store.ping()?;
    Ok(store)
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}
