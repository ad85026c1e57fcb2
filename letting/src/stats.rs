//! Rollup types for the landlord and admin dashboards, plus the
//! `YYYY-MM` month window both stats queries take.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, parsed from `YYYY-MM`. Stats queries aggregate
/// payments with `paid_on` inside `[first_day, next_first_day)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid month '{0}': expected YYYY-MM")]
pub struct InvalidMonth(pub String);

impl Month {
    /// The month containing `today` in UTC.
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // year/month validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("validated month")
    }

    pub fn next_first_day(&self) -> NaiveDate {
        if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1).expect("validated month")
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1).expect("validated month")
        }
    }
}

impl FromStr for Month {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s.split_once('-').ok_or_else(|| InvalidMonth(s.into()))?;
        let year: i32 = y.parse().map_err(|_| InvalidMonth(s.into()))?;
        let month: u32 = m.parse().map_err(|_| InvalidMonth(s.into()))?;
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(InvalidMonth(s.into()));
        }
        Ok(Month { year, month })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One landlord's portfolio for a given month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioStats {
    pub month: String,
    pub properties: u64,
    pub units: u64,
    #[serde(rename = "occupiedUnits")]
    pub occupied_units: u64,
    #[serde(rename = "vacantUnits")]
    pub vacant_units: u64,
    #[serde(rename = "activeTenancies")]
    pub active_tenancies: u64,
    /// Sum of rent over active tenancies: what a fully collected month
    /// would bring in.
    #[serde(rename = "expectedRent")]
    pub expected_rent: i64,
    /// Confirmed payment volume with `paid_on` inside the month.
    pub collected: i64,
    pub outstanding: i64,
    #[serde(rename = "collectionRate")]
    pub collection_rate: f64,
    #[serde(rename = "pendingJoinRequests")]
    pub pending_join_requests: u64,
    #[serde(rename = "openMaintenance")]
    pub open_maintenance: u64,
}

/// Platform-wide rollup for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformStats {
    pub month: String,
    pub landlords: u64,
    pub tenants: u64,
    pub properties: u64,
    pub units: u64,
    #[serde(rename = "occupiedUnits")]
    pub occupied_units: u64,
    #[serde(rename = "occupancyRate")]
    pub occupancy_rate: f64,
    #[serde(rename = "activeTenancies")]
    pub active_tenancies: u64,
    #[serde(rename = "pendingJoinRequests")]
    pub pending_join_requests: u64,
    #[serde(rename = "openMaintenance")]
    pub open_maintenance: u64,
    /// Confirmed payment volume with `paid_on` inside the month.
    #[serde(rename = "collectedInMonth")]
    pub collected_in_month: i64,
    #[serde(rename = "paymentsInMonth")]
    pub payments_in_month: u64,
}

/// Collected over expected, clamped to [0, 1]; 1.0 when nothing was due.
pub fn collection_rate(expected: i64, collected: i64) -> f64 {
    if expected <= 0 {
        return 1.0;
    }
    let rate = collected as f64 / expected as f64;
    rate.clamp(0.0, 1.0)
}

/// Expected minus collected, never negative (overpayment carries no debt).
pub fn outstanding(expected: i64, collected: i64) -> i64 {
    (expected - collected).max(0)
}

/// Occupied over total units, 0.0 for an empty portfolio.
pub fn occupancy_rate(units: u64, occupied: u64) -> f64 {
    if units == 0 {
        return 0.0;
    }
    occupied as f64 / units as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_parses_and_formats() {
        let month: Month = "2025-03".parse().unwrap();
        assert_eq!(month, Month { year: 2025, month: 3 });
        assert_eq!(month.to_string(), "2025-03");
        assert_eq!(
            month.first_day(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        assert_eq!(
            month.next_first_day(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let month: Month = "2024-12".parse().unwrap();
        assert_eq!(
            month.next_first_day(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_month_rejects_garbage() {
        assert!("2025".parse::<Month>().is_err());
        assert!("2025-13".parse::<Month>().is_err());
        assert!("2025-00".parse::<Month>().is_err());
        assert!("march".parse::<Month>().is_err());
    }

    #[test]
    fn test_collection_rate_bounds() {
        assert_eq!(collection_rate(0, 0), 1.0);
        assert_eq!(collection_rate(100, 0), 0.0);
        assert_eq!(collection_rate(100, 50), 0.5);
        // Overpayment clamps rather than reporting >100%.
        assert_eq!(collection_rate(100, 150), 1.0);
    }

    #[test]
    fn test_outstanding_never_negative() {
        assert_eq!(outstanding(100, 40), 60);
        assert_eq!(outstanding(100, 140), 0);
    }

    #[test]
    fn test_occupancy_rate() {
        assert_eq!(occupancy_rate(0, 0), 0.0);
        assert_eq!(occupancy_rate(4, 1), 0.25);
    }
}
