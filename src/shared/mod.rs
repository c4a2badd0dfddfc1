pub mod cache;
pub mod errors;
pub mod queue;

use chrono::{DateTime, Utc};

/// Formats an instant the way HTTP date headers (`Expires`) expect it.
pub fn http_date(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
