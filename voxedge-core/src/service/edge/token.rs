//! `Sec-MS-GEC` request token.
//!
//! The service only accepts requests carrying a token derived from the
//! current time, rounded down to five minutes, so a local clock that is off
//! by a few minutes gets every handshake refused with HTTP 403. The refusal
//! carries the server's `Date`, which is used to correct the clock.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::info;

/// Seconds between 1601-01-01 (Windows file time epoch) and 1970-01-01
const WIN_EPOCH_SECS: i64 = 11_644_473_600;
const TOKEN_WINDOW_SECS: i64 = 300;
/// 100-nanosecond intervals per second
const TICKS_PER_SEC: i64 = 10_000_000;

pub fn generate_sec_ms_gec(unix_secs: i64, trusted_client_token: &str) -> String {
    let mut ticks = unix_secs + WIN_EPOCH_SECS;
    ticks -= ticks.rem_euclid(TOKEN_WINDOW_SECS);
    let ticks = ticks as i128 * TICKS_PER_SEC as i128;

    let digest = Sha256::digest(format!("{ticks}{trusted_client_token}").as_bytes());
    format!("{digest:X}")
}

/// Wall clock used for tokens, corrected by whatever skew the server has
/// reported.
#[derive(Debug, Default)]
pub struct DrmClock {
    skew_secs: AtomicI64,
}

impl DrmClock {
    pub fn now(&self) -> i64 {
        Utc::now().timestamp() + self.skew_secs.load(Ordering::Relaxed)
    }

    pub fn skew_secs(&self) -> i64 {
        self.skew_secs.load(Ordering::Relaxed)
    }

    pub fn sec_ms_gec(&self, trusted_client_token: &str) -> String {
        generate_sec_ms_gec(self.now(), trusted_client_token)
    }

    /// Adjusts the skew from an RFC 2822 `Date` header. Returns false when
    /// the header can't be parsed.
    pub fn adjust_from_server_date(&self, date: &str) -> bool {
        let Ok(server_time) = DateTime::parse_from_rfc2822(date) else {
            return false;
        };
        self.adjust_to(server_time.timestamp(), Utc::now().timestamp());
        true
    }

    fn adjust_to(&self, server_secs: i64, local_secs: i64) {
        let skew = server_secs - local_secs;
        let previous = self.skew_secs.swap(skew, Ordering::Relaxed);
        if previous != skew {
            info!(skew_secs = skew, "Adjusted clock skew from server date");
        }
    }
}
