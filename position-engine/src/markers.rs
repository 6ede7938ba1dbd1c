//! Position markers: id scheme, PnL labels and the open/close glyphs drawn
//! over the candles.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_core::{Timestamp, TimezoneOffset};

use crate::position::PositionData;

pub const LONG_COLOR: &str = "#3fb68b";
pub const SHORT_COLOR: &str = "#f0635c";
pub const PROFIT_COLOR: &str = "#3fb68b";
pub const LOSS_COLOR: &str = "#f0635c";
pub const LIQUIDATED_COLOR: &str = "#f7931a";
/// Appended to `#rrggbb` colours of unselected markers while a selection exists.
pub const DIMMED_ALPHA: &str = "59";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerSize {
    Normal,
    Selected,
}

impl MarkerSize {
    pub fn scale(&self) -> f64 {
        match self {
            MarkerSize::Normal => 1.0,
            MarkerSize::Selected => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    Open,
    Close,
}

impl MarkerKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            MarkerKind::Open => "OPEN",
            MarkerKind::Close => "CLOSE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub position: MarkerPosition,
    pub color: String,
    pub size: MarkerSize,
    pub shape: MarkerShape,
    pub text: String,
    pub time: Timestamp,
}

pub fn marker_id(position_id: &str, kind: MarkerKind) -> String {
    format!("{position_id}-{}", kind.suffix())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerId {
    pub position_id: String,
    pub kind: MarkerKind,
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.position_id, self.kind.suffix())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerIdError {
    #[error("marker id is empty")]
    Empty,
    #[error("marker id {0:?} has no OPEN/CLOSE suffix")]
    MissingSuffix(String),
    #[error("marker id {0:?} has an unknown suffix")]
    UnknownKind(String),
}

/// Split `"{position id}-OPEN"` / `"{position id}-CLOSE"`. Position ids may
/// themselves contain dashes.
pub fn parse_marker_id(id: &str) -> Result<MarkerId, MarkerIdError> {
    if id.is_empty() {
        return Err(MarkerIdError::Empty);
    }
    let (position_id, suffix) = id
        .rsplit_once('-')
        .filter(|(p, _)| !p.is_empty())
        .ok_or_else(|| MarkerIdError::MissingSuffix(id.to_string()))?;
    let kind = match suffix {
        "OPEN" => MarkerKind::Open,
        "CLOSE" => MarkerKind::Close,
        _ => return Err(MarkerIdError::UnknownKind(id.to_string())),
    };
    Ok(MarkerId {
        position_id: position_id.to_string(),
        kind,
    })
}

fn is_selected(position: &PositionData, selected: Option<&str>) -> bool {
    match selected {
        Some(sel) => !position.id.is_empty() && sel.contains(position.id.as_str()),
        None => false,
    }
}

fn styled(color: &str, selected: bool, has_selection: bool) -> (String, MarkerSize) {
    if selected {
        (color.to_string(), MarkerSize::Selected)
    } else if has_selection {
        (format!("{color}{DIMMED_ALPHA}"), MarkerSize::Normal)
    } else {
        (color.to_string(), MarkerSize::Normal)
    }
}

/// `+$12.3`, `-$4.0`, `+$1.2K`.
pub fn format_pnl(pnl: f64) -> String {
    let sign = if pnl < 0.0 { "-" } else { "+" };
    let abs = pnl.abs();
    if abs >= 1_000_000.0 {
        format!("{sign}${:.1}M", abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{sign}${:.1}K", abs / 1_000.0)
    } else {
        format!("{sign}${abs:.1}")
    }
}

fn open_marker(position: &PositionData, selected: Option<&str>, tz: TimezoneOffset) -> Marker {
    let base = if position.is_long { LONG_COLOR } else { SHORT_COLOR };
    let (color, size) = styled(base, is_selected(position, selected), selected.is_some());
    Marker {
        id: marker_id(&position.id, MarkerKind::Open),
        position: MarkerPosition::AboveBar,
        color,
        size,
        shape: if position.is_long {
            MarkerShape::ArrowUp
        } else {
            MarkerShape::ArrowDown
        },
        text: if position.is_long { "L" } else { "S" }.to_string(),
        time: position.open_time(tz),
    }
}

fn close_marker(
    position: &PositionData,
    selected: Option<&str>,
    tz: TimezoneOffset,
) -> Option<Marker> {
    let time = position.close_time(tz)?;
    let liquidated = position.is_liquidated();
    let base = if liquidated {
        LIQUIDATED_COLOR
    } else if position.pnl >= 0.0 {
        PROFIT_COLOR
    } else {
        LOSS_COLOR
    };
    let (color, size) = styled(base, is_selected(position, selected), selected.is_some());
    Some(Marker {
        id: marker_id(&position.id, MarkerKind::Close),
        position: MarkerPosition::BelowBar,
        color,
        size,
        shape: MarkerShape::Circle,
        text: if liquidated {
            "LIQ".to_string()
        } else {
            format_pnl(position.pnl)
        },
        time,
    })
}

/// Build the full marker list for the chart series.
///
/// Every position in either list gets an open marker; closed positions also
/// get a close marker. The output is opens followed by closes, stably sorted
/// by time, so equal timestamps keep open-before-close order. The result
/// replaces whatever markers the series had before.
pub fn render_markers(
    open_positions: &[PositionData],
    closed_positions: &[PositionData],
    selected: Option<&str>,
    tz: TimezoneOffset,
) -> Vec<Marker> {
    let selected = selected.filter(|s| !s.is_empty());
    let mut markers: Vec<Marker> = open_positions
        .iter()
        .chain(closed_positions.iter())
        .map(|p| open_marker(p, selected, tz))
        .collect();
    markers.extend(
        closed_positions
            .iter()
            .filter_map(|p| close_marker(p, selected, tz)),
    );
    markers.sort_by_key(|m| m.time);
    markers
}
