//! Target-independent logic of the position chart: the position model,
//! marker rendering rules, time windows, brush math and the view state
//! machine the UI drives.

pub mod brush;
pub mod debounce;
pub mod markers;
pub mod position;
pub mod range;
pub mod view;

pub use brush::{
    close_line, range_to_selection, selection_to_range, BrushInteraction, BrushScale,
    MIN_SELECTION_PX,
};
pub use debounce::{RangeDebouncer, RANGE_DEBOUNCE_MS};
pub use markers::{
    format_pnl, marker_id, parse_marker_id, render_markers, Marker, MarkerId, MarkerIdError,
    MarkerKind, MarkerPosition, MarkerShape, MarkerSize,
};
pub use position::{latest_activity, oldest_open, PositionData, PositionStatus};
pub use range::{
    candle_window, default_range, default_span, max_lookback, overview_window,
    target_position_range,
};
pub use view::{ChartCommand, ChartContext, ChartViewState};
