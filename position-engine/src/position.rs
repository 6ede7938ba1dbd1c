//! Trader positions as the chart consumes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_core::{Timestamp, TimezoneOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Close,
    Liquidate,
}

/// A trader position as delivered by the positions API. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub id: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub protocol: String,
    pub index_token: String,
    #[serde(default)]
    pub pair: Option<String>,
    pub is_long: bool,
    pub status: PositionStatus,
    pub open_block_time: DateTime<Utc>,
    #[serde(default)]
    pub close_block_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub leverage: f64,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub is_liquidate: bool,
}

impl PositionData {
    pub fn is_closed(&self) -> bool {
        self.status != PositionStatus::Open
    }

    pub fn is_liquidated(&self) -> bool {
        self.is_liquidate || self.status == PositionStatus::Liquidate
    }

    /// Open time in UTC seconds.
    pub fn opened_at(&self) -> Timestamp {
        self.open_block_time.timestamp()
    }

    pub fn closed_at(&self) -> Option<Timestamp> {
        if !self.is_closed() {
            return None;
        }
        self.close_block_time.map(|t| t.timestamp())
    }

    /// Open time in chart time.
    pub fn open_time(&self, tz: TimezoneOffset) -> Timestamp {
        tz.apply(self.opened_at())
    }

    pub fn close_time(&self, tz: TimezoneOffset) -> Option<Timestamp> {
        self.closed_at().map(|t| tz.apply(t))
    }

    pub fn last_activity(&self, tz: TimezoneOffset) -> Timestamp {
        self.close_time(tz).unwrap_or_else(|| self.open_time(tz))
    }

    /// Pair symbol used for candle queries, e.g. `BTC`.
    pub fn symbol(&self) -> &str {
        self.pair
            .as_deref()
            .map(|p| p.split(&['-', '/'][..]).next().unwrap_or(p))
            .unwrap_or(&self.index_token)
    }
}

/// Earliest open among `positions`, in UTC seconds.
pub fn oldest_open(positions: &[PositionData]) -> Option<Timestamp> {
    positions.iter().map(|p| p.opened_at()).min()
}

/// The most recent open or close among `positions`, in chart time.
pub fn latest_activity(positions: &[PositionData], tz: TimezoneOffset) -> Option<Timestamp> {
    positions.iter().map(|p| p.last_activity(tz)).max()
}
