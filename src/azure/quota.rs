//! Throttling quota headers
//!
//! Resource Graph reports the caller's remaining request quota and the time
//! until the quota window resets on every response. See
//! <https://learn.microsoft.com/azure/governance/resource-graph/concepts/guidance-for-throttled-requests>

use chrono::{NaiveTime, Timelike};
use reqwest::header::HeaderMap;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the number of requests left in the current window
pub const QUOTA_REMAINING_HEADER: &str = "x-ms-user-quota-remaining";

/// Header carrying the time until the window resets, as `HH:MM:SS`
pub const QUOTA_RESETS_AFTER_HEADER: &str = "x-ms-user-quota-resets-after";

/// Quota state read from a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReading {
    pub remaining: u32,
    pub reset_after: Duration,
}

impl QuotaReading {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuotaError {
    #[error("header '{0}' missing")]
    MissingHeader(&'static str),

    #[error("failed to parse '{header}': {value:?}")]
    MalformedValue { header: &'static str, value: String },
}

/// Parse the throttling headers of a Resource Graph response
pub fn parse_quota(headers: &HeaderMap) -> Result<QuotaReading, QuotaError> {
    let remaining_raw = header_str(headers, QUOTA_REMAINING_HEADER)?;
    let remaining = remaining_raw
        .trim()
        .parse::<u32>()
        .map_err(|_| QuotaError::MalformedValue {
            header: QUOTA_REMAINING_HEADER,
            value: remaining_raw.to_string(),
        })?;

    let after_raw = header_str(headers, QUOTA_RESETS_AFTER_HEADER)?;
    let time = NaiveTime::parse_from_str(after_raw.trim(), "%H:%M:%S").map_err(|_| {
        QuotaError::MalformedValue {
            header: QUOTA_RESETS_AFTER_HEADER,
            value: after_raw.to_string(),
        }
    })?;

    let reset_after = Duration::from_secs(
        u64::from(time.hour()) * 3600 + u64::from(time.minute()) * 60 + u64::from(time.second()),
    );

    Ok(QuotaReading {
        remaining,
        reset_after,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, QuotaError> {
    let value = headers.get(name).ok_or(QuotaError::MissingHeader(name))?;
    value.to_str().map_err(|_| QuotaError::MalformedValue {
        header: name,
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })
}
