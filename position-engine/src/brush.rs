//! Brush overview math: pixel selections to time ranges and back, plus the
//! close-price line of the strip.

use ts_core::{Candle, HasTimestamp, TimeSeries, Timestamp, VisibleRange};

/// Selections narrower than this are treated as a click and dropped.
pub const MIN_SELECTION_PX: f64 = 2.0;

/// Linear time scale over `[first, last]` of the overview data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushScale {
    pub start: Timestamp,
    pub end: Timestamp,
    pub width: f64,
}

impl BrushScale {
    pub fn new(start: Timestamp, end: Timestamp, width: f64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            width: width.max(0.0),
        }
    }

    pub fn for_series<T: HasTimestamp>(series: &TimeSeries<T>, width: f64) -> Option<Self> {
        let first = series.first()?.ts();
        let last = series.last()?.ts();
        Some(Self::new(first, last, width))
    }

    pub fn x(&self, ts: Timestamp) -> f64 {
        let span = (self.end - self.start) as f64;
        if span <= 0.0 {
            return 0.0;
        }
        let ratio = ((ts - self.start) as f64 / span).clamp(0.0, 1.0);
        ratio * self.width
    }

    pub fn invert(&self, x: f64) -> Timestamp {
        if self.width <= 0.0 {
            return self.start;
        }
        let ratio = (x / self.width).clamp(0.0, 1.0);
        self.start + (ratio * (self.end - self.start) as f64).round() as i64
    }
}

/// Convert a pixel selection into the enclosing candle times.
///
/// `from` snaps forward to the first sample at or after the left edge, `to`
/// snaps backward to the last sample at or before the right edge. Both are
/// clamped into the series, so brushing past either end yields the first or
/// last sample.
pub fn selection_to_range<T: HasTimestamp>(
    series: &TimeSeries<T>,
    scale: &BrushScale,
    selection: (f64, f64),
) -> Option<VisibleRange> {
    let (x0, x1) = if selection.0 <= selection.1 {
        selection
    } else {
        (selection.1, selection.0)
    };
    let i0 = series.index_at_or_after(scale.invert(x0))?;
    let i1 = series.index_at_or_before(scale.invert(x1))?;
    let (lo, hi) = (i0.min(i1), i0.max(i1));
    let data = series.as_slice();
    Some(VisibleRange::new(data[lo].ts(), data[hi].ts()))
}

pub fn range_to_selection(range: VisibleRange, scale: &BrushScale) -> (f64, f64) {
    (scale.x(range.from), scale.x(range.to))
}

/// Polyline of closes scaled into a `width` x `height` box.
pub fn close_line(series: &TimeSeries<Candle>, scale: &BrushScale, height: f64) -> Vec<(f64, f64)> {
    let data = series.as_slice();
    let (lo, hi) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        (lo.min(c.close), hi.max(c.close))
    });
    let span = (hi - lo).max(1e-9);
    data.iter()
        .map(|c| (scale.x(c.time), height - (c.close - lo) / span * height))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Create { anchor: f64 },
    Move { grab: f64, origin: (f64, f64) },
}

/// Pointer handling for a horizontal brush.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrushInteraction {
    width: f64,
    selection: Option<(f64, f64)>,
    drag: Option<Drag>,
}

impl BrushInteraction {
    pub fn new(width: f64) -> Self {
        Self {
            width: width.max(0.0),
            ..Self::default()
        }
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width.max(0.0);
        if let Some((a, b)) = self.selection {
            self.selection = Some((self.clamp(a), self.clamp(b)));
        }
    }

    pub fn selection(&self) -> Option<(f64, f64)> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<(f64, f64)>) {
        self.selection = selection.map(|(a, b)| {
            let (a, b) = (self.clamp(a), self.clamp(b));
            (a.min(b), a.max(b))
        });
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn clamp(&self, x: f64) -> f64 {
        x.clamp(0.0, self.width)
    }

    pub fn pointer_down(&mut self, x: f64) {
        let x = self.clamp(x);
        self.drag = Some(match self.selection {
            Some((a, b)) if x >= a && x <= b => Drag::Move {
                grab: x,
                origin: (a, b),
            },
            _ => {
                self.selection = Some((x, x));
                Drag::Create { anchor: x }
            }
        });
    }

    /// Returns the live selection while dragging.
    pub fn pointer_move(&mut self, x: f64) -> Option<(f64, f64)> {
        let x = self.clamp(x);
        match self.drag? {
            Drag::Create { anchor } => {
                self.selection = Some((anchor.min(x), anchor.max(x)));
            }
            Drag::Move { grab, origin } => {
                let len = origin.1 - origin.0;
                let start = (origin.0 + x - grab).clamp(0.0, (self.width - len).max(0.0));
                self.selection = Some((start, start + len));
            }
        }
        self.selection
    }

    /// Ends the drag. Returns the final selection unless it is too narrow,
    /// in which case the selection is cleared.
    pub fn pointer_up(&mut self, x: f64) -> Option<(f64, f64)> {
        if self.drag.is_none() {
            return None;
        }
        self.pointer_move(x);
        self.drag = None;
        match self.selection {
            Some((a, b)) if b - a >= MIN_SELECTION_PX => Some((a, b)),
            _ => {
                self.selection = None;
                None
            }
        }
    }
}
