//! The license record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A license record.
///
/// Every field is optional on the vendor side; initialization fills in what
/// is missing and validation rejects inconsistent records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    #[serde(default)]
    pub consumer_amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_type: Option<String>,
    /// Application defined data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    /// Free text for humans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl License {
    /// Makes the license valid for `days` days from its issue date, or from
    /// `now` if it has none yet.
    pub fn set_term(&mut self, days: u32, now: DateTime<Utc>) {
        let start = *self.issued.get_or_insert(now);
        self.not_before = Some(start);
        self.not_after = Some(start + Duration::days(i64::from(days)));
    }

    /// Returns true if `now` lies after the end of the validity window.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after.is_some_and(|not_after| now > not_after)
    }

    /// Returns true if `now` lies before the start of the validity window.
    #[must_use]
    pub fn is_premature_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_some_and(|not_before| now < not_before)
    }
}
