use ts_core::{Timestamp, VisibleRange};

/// What a click on the chart hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickReport {
    /// Marker under the pointer, if any.
    pub marker_id: Option<String>,
    pub visible_range: VisibleRange,
    pub time: Timestamp,
    pub price: f64,
}

impl ClickReport {
    pub fn hit_marker(&self) -> bool {
        self.marker_id.is_some()
    }
}
