//! Clock helpers shared by the account and policy stores.

use std::time::SystemTime;

/// Seconds since the Unix epoch; 0 if the clock reads earlier
pub fn current_timestamp() -> u64 {
    SystemTime::UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
