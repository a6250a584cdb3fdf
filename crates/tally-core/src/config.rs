//! # Ledger Configuration
//!
//! Business-rule knobs that are not part of the data.
//!
//! ## Loading Order
//! ```text
//!   LedgerConfig::default()          built-in values
//!          │
//!          ▼
//!   LedgerConfig::from_env()         TALLY_UTC_OFFSET_MINUTES
//!                                    TALLY_CYCLE_TOLERANCE_CENTS
//! ```
//!
//! Reading the environment is the one impurity allowed here; it happens once
//! at startup, never inside a mutation.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Configuration consumed by the ledger and the order processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Offset of the shop's local business day from UTC, in minutes.
    /// Display ids restart at 1 on every local day.
    pub utc_offset_minutes: i32,

    /// A running balance strictly closer to zero than this many minor units
    /// closes a debt cycle. Values below 1 are treated as 1.
    pub cycle_tolerance_cents: i64,

    /// Display id given to synthetic opening-balance orders.
    pub opening_balance_display_id: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            cycle_tolerance_cents: 1,
            opening_balance_display_id: "#OPENING".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(offset) = std::env::var("TALLY_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.utc_offset_minutes = offset;
        }

        if let Some(tolerance) = std::env::var("TALLY_CYCLE_TOLERANCE_CENTS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            config.cycle_tolerance_cents = tolerance.abs();
        }

        config
    }

    /// The debt-cycle tolerance as Money.
    #[inline]
    pub fn cycle_tolerance(&self) -> Money {
        Money::from_cents(self.cycle_tolerance_cents.abs().max(1))
    }

    /// The local business day an instant falls on.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{NaiveDate, TimeZone, Utc};
    /// use tally_core::LedgerConfig;
    ///
    /// let config = LedgerConfig { utc_offset_minutes: 7 * 60, ..Default::default() };
    /// let at = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
    /// assert_eq!(config.business_day(at), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    /// ```
    pub fn business_day(&self, at: DateTime<Utc>) -> NaiveDate {
        // Out-of-range offsets fall back to UTC.
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => at.with_timezone(&offset).date_naive(),
            None => at.date_naive(),
        }
    }
}

/// Formats a display id: `"{seq}.{dd/mm/yy}"`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::config::format_display_id;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
/// assert_eq!(format_display_id(7, day), "7.02/03/24");
/// ```
pub fn format_display_id(seq: i64, day: NaiveDate) -> String {
    format!("{}.{}", seq, day.format("%d/%m/%y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.utc_offset_minutes, 0);
        assert_eq!(config.cycle_tolerance().cents(), 1);
        assert_eq!(config.opening_balance_display_id, "#OPENING");
    }

    #[test]
    fn test_business_day_negative_offset() {
        let config = LedgerConfig {
            utc_offset_minutes: -5 * 60,
            ..Default::default()
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(
            config.business_day(at),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_business_day_invalid_offset_falls_back_to_utc() {
        let config = LedgerConfig {
            utc_offset_minutes: 100_000,
            ..Default::default()
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(config.business_day(at), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LedgerConfig = serde_json::from_str(r#"{"cycle_tolerance_cents": 5}"#).unwrap();
        assert_eq!(config.cycle_tolerance_cents, 5);
        assert_eq!(config.opening_balance_display_id, "#OPENING");
    }
}
