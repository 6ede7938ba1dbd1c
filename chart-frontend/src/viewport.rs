use chrono::DateTime;
use position_engine::{Marker, MarkerPosition, MarkerShape};
use ts_core::{Candle, TimeSeries, Timestamp, VisibleRange, DAY, HOUR, MINUTE};

pub const PRICE_AXIS_WIDTH: f64 = 64.0;
pub const TIME_AXIS_HEIGHT: f64 = 24.0;

// Zoom limits, in bars.
const MIN_VISIBLE_BARS: f64 = 10.0;
const MAX_VISIBLE_BARS: f64 = 5_000.0;
const PRICE_PADDING: f64 = 0.1;
const MARKER_MARGIN: f64 = 4.0;
const MARKER_TEXT_HEIGHT: f64 = 12.0;
const HIT_SLOP: f64 = 3.0;

/// Time and price transforms for the plot area (axes excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    width: f64,
    height: f64,
    from: Timestamp,
    to: Timestamp,
    price_min: f64,
    price_max: f64,
    bar_secs: i64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, bar_secs: i64) -> Self {
        let bar_secs = bar_secs.max(1);
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            from: 0,
            to: 120 * bar_secs,
            price_min: 0.0,
            price_max: 1.0,
            bar_secs,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn bar_secs(&self) -> i64 {
        self.bar_secs
    }

    pub fn price_bounds(&self) -> (f64, f64) {
        (self.price_min, self.price_max)
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    pub fn set_bar_secs(&mut self, bar_secs: i64) {
        self.bar_secs = bar_secs.max(1);
    }

    pub fn range(&self) -> VisibleRange {
        VisibleRange {
            from: self.from,
            to: self.to,
        }
    }

    /// Rejects empty or inverted ranges.
    pub fn set_range(&mut self, range: VisibleRange) -> bool {
        if range.from >= range.to {
            return false;
        }
        self.from = range.from;
        self.to = range.to;
        true
    }

    /// Show the last `bars` candles with a little room on the right.
    pub fn fit_last(&mut self, series: &TimeSeries<Candle>, bars: i64) {
        if let Some(last) = series.last() {
            let end = last.time + 3 * self.bar_secs;
            self.from = end - bars.max(1) * self.bar_secs;
            self.to = end;
        }
    }

    fn span(&self) -> f64 {
        (self.to - self.from).max(1) as f64
    }

    pub fn time_to_x(&self, ts: Timestamp) -> f64 {
        (ts - self.from) as f64 / self.span() * self.width
    }

    pub fn x_to_time(&self, x: f64) -> Timestamp {
        let ratio = (x / self.width).clamp(0.0, 1.0);
        self.from + (ratio * self.span()).round() as i64
    }

    pub fn price_to_y(&self, price: f64) -> f64 {
        let range = (self.price_max - self.price_min).max(1e-12);
        self.height - (price - self.price_min) / range * self.height
    }

    pub fn y_to_price(&self, y: f64) -> f64 {
        let range = (self.price_max - self.price_min).max(1e-12);
        self.price_min + (self.height - y) / self.height * range
    }

    /// Pixels per candle.
    pub fn bar_spacing(&self) -> f64 {
        self.width * self.bar_secs as f64 / self.span()
    }

    /// Dragging right reveals older candles.
    pub fn pan_pixels(&mut self, dx: f64) {
        let delta = (dx * self.span() / self.width).round() as i64;
        self.from -= delta;
        self.to -= delta;
    }

    /// Scale the span by `factor`, keeping the time under `x` in place.
    pub fn zoom_at(&mut self, x: f64, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let span = self.span();
        let anchor = self.x_to_time(x);
        let ratio = ((anchor - self.from) as f64 / span).clamp(0.0, 1.0);
        let bar = self.bar_secs as f64;
        let new_span = (span * factor).clamp(bar * MIN_VISIBLE_BARS, bar * MAX_VISIBLE_BARS);
        let new_from = anchor - (ratio * new_span).round() as i64;
        self.from = new_from;
        self.to = new_from + new_span.round() as i64;
    }

    /// Fit the price scale to `candles` and any extra prices (e.g. a price
    /// line). Leaves the scale alone when there is nothing to fit.
    pub fn autoscale(&mut self, candles: &[Candle], extra: &[f64]) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in candles {
            lo = lo.min(c.low);
            hi = hi.max(c.high);
        }
        if !candles.is_empty() {
            for p in extra.iter().filter(|p| p.is_finite()) {
                lo = lo.min(*p);
                hi = hi.max(*p);
            }
        }
        if !(lo.is_finite() && hi.is_finite()) {
            return;
        }
        let pad = if hi - lo < 1e-12 {
            (hi.abs() * 0.01).max(1e-6)
        } else {
            (hi - lo) * PRICE_PADDING
        };
        self.price_min = lo - pad;
        self.price_max = hi + pad;
    }

    /// Candles overlapping the viewport, one bar of slack on each side.
    pub fn visible<'a>(&self, series: &'a TimeSeries<Candle>) -> &'a [Candle] {
        series.range(self.from - self.bar_secs, self.to + self.bar_secs)
    }

    pub fn bar_center_x(&self, bar_start: Timestamp) -> f64 {
        self.time_to_x(bar_start) + self.bar_spacing() / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotCandle {
    pub x: f64,
    pub half_w: f64,
    pub y_open: f64,
    pub y_close: f64,
    pub y_high: f64,
    pub y_low: f64,
    pub up: bool,
}

pub fn plot_candles(vp: &Viewport, candles: &[Candle]) -> Vec<PlotCandle> {
    let half_w = (vp.bar_spacing() * 0.35).clamp(0.5, 12.0);
    candles
        .iter()
        .map(|c| PlotCandle {
            x: vp.bar_center_x(c.time),
            half_w,
            y_open: vp.price_to_y(c.open),
            y_close: vp.price_to_y(c.close),
            y_high: vp.price_to_y(c.high),
            y_low: vp.price_to_y(c.low),
            up: c.close >= c.open,
        })
        .collect()
}

/// Candle whose bucket contains `ts`, if any.
pub fn candle_at(series: &TimeSeries<Candle>, ts: Timestamp, bar_secs: i64) -> Option<&Candle> {
    let idx = series.index_at_or_before(ts)?;
    let candle = &series.as_slice()[idx];
    (ts >= candle.time && ts < candle.time + bar_secs).then_some(candle)
}

/// Decimal places for a price when the caller did not pin one.
pub fn auto_precision(price: f64) -> usize {
    let abs = price.abs();
    if abs >= 1.0 {
        2
    } else if abs >= 0.01 {
        4
    } else {
        6
    }
}

pub fn format_price(price: f64, precision: Option<usize>) -> String {
    let precision = precision.unwrap_or_else(|| auto_precision(price));
    format!("{price:.precision$}")
}

pub fn legend_text(candle: &Candle, precision: Option<usize>) -> String {
    let precision = precision.or(Some(auto_precision(candle.close)));
    format!(
        "O {} H {} L {} C {}",
        format_price(candle.open, precision),
        format_price(candle.high, precision),
        format_price(candle.low, precision),
        format_price(candle.close, precision)
    )
}

fn nice_step(raw: f64) -> f64 {
    if !(raw.is_finite() && raw > 0.0) {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Round-numbered price levels inside `[min, max]`.
pub fn price_ticks(min: f64, max: f64, count: usize) -> Vec<f64> {
    if count == 0 || !(max > min) {
        return Vec::new();
    }
    let step = nice_step((max - min) / count as f64);
    let mut ticks = Vec::new();
    let mut v = (min / step).ceil() * step;
    while v <= max {
        ticks.push(v);
        v += step;
    }
    ticks
}

const TIME_STEPS: [i64; 17] = [
    MINUTE,
    5 * MINUTE,
    15 * MINUTE,
    30 * MINUTE,
    HOUR,
    2 * HOUR,
    4 * HOUR,
    6 * HOUR,
    12 * HOUR,
    DAY,
    2 * DAY,
    7 * DAY,
    14 * DAY,
    30 * DAY,
    90 * DAY,
    180 * DAY,
    365 * DAY,
];

/// Tick step for `range` with at most `max_ticks` labels.
pub fn time_step(range: VisibleRange, max_ticks: usize) -> i64 {
    let wanted = range.duration() / max_ticks.max(1) as i64;
    TIME_STEPS
        .iter()
        .copied()
        .find(|s| *s >= wanted)
        .unwrap_or(365 * DAY)
}

pub fn time_ticks(range: VisibleRange, max_ticks: usize) -> Vec<Timestamp> {
    let step = time_step(range, max_ticks);
    let mut t = range.from.div_euclid(step) * step;
    if t < range.from {
        t += step;
    }
    let mut ticks = Vec::new();
    while t <= range.to {
        ticks.push(t);
        t += step;
    }
    ticks
}

/// Axis label for chart time (already timezone-shifted, so formatted as UTC).
pub fn time_label(ts: Timestamp, step: i64) -> String {
    let Some(dt) = DateTime::from_timestamp(ts, 0) else {
        return String::new();
    };
    if step >= DAY || ts.rem_euclid(DAY) == 0 {
        dt.format("%d %b").to_string()
    } else {
        dt.format("%H:%M").to_string()
    }
}

pub fn crosshair_label(ts: Timestamp) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%d %b %y %H:%M").to_string())
        .unwrap_or_default()
}

/// A marker placed in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerGlyph {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub shape: MarkerShape,
    pub position: MarkerPosition,
    pub color: String,
    pub text: String,
    pub text_y: f64,
}

/// Snap markers onto their candles and stack the ones sharing a bar side.
/// Markers outside the loaded candles are skipped.
pub fn layout_markers(
    markers: &[Marker],
    series: &TimeSeries<Candle>,
    vp: &Viewport,
) -> Vec<MarkerGlyph> {
    let base = (vp.bar_spacing() * 0.4).clamp(3.0, 6.0);
    // (bar index, above?) -> offset used so far
    let mut stacks: Vec<(usize, bool, f64)> = Vec::new();
    let mut glyphs = Vec::with_capacity(markers.len());
    for marker in markers {
        let Some(candle) = candle_at(series, marker.time, vp.bar_secs()) else {
            continue;
        };
        let Some(idx) = series.index_at_or_before(candle.time) else {
            continue;
        };
        let radius = base * marker.size.scale();
        let above = marker.position == MarkerPosition::AboveBar;
        let offset = match stacks.iter_mut().find(|(i, a, _)| *i == idx && *a == above) {
            Some(entry) => {
                let current = entry.2;
                entry.2 += 2.0 * radius + MARKER_TEXT_HEIGHT;
                current
            }
            None => {
                stacks.push((idx, above, 2.0 * radius + MARKER_TEXT_HEIGHT));
                0.0
            }
        };
        let (y, text_y) = if above {
            let y = vp.price_to_y(candle.high) - MARKER_MARGIN - radius - offset;
            (y, y - radius - 3.0)
        } else {
            let y = vp.price_to_y(candle.low) + MARKER_MARGIN + radius + offset;
            (y, y + radius + MARKER_TEXT_HEIGHT - 2.0)
        };
        glyphs.push(MarkerGlyph {
            id: marker.id.clone(),
            x: vp.bar_center_x(candle.time),
            y,
            radius,
            shape: marker.shape,
            position: marker.position,
            color: marker.color.clone(),
            text: marker.text.clone(),
            text_y,
        });
    }
    glyphs
}

/// Closest glyph under the pointer.
pub fn hit_test(glyphs: &[MarkerGlyph], x: f64, y: f64) -> Option<&MarkerGlyph> {
    glyphs
        .iter()
        .map(|g| (g, ((g.x - x).powi(2) + (g.y - y).powi(2)).sqrt()))
        .filter(|(g, d)| *d <= g.radius + HIT_SLOP)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(g, _)| g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use position_engine::MarkerSize;

    fn hourly(n: i64) -> TimeSeries<Candle> {
        TimeSeries::from_unsorted(
            (0..n)
                .map(|i| Candle {
                    time: i * HOUR,
                    open: 100.0 + i as f64,
                    high: 105.0 + i as f64,
                    low: 95.0 + i as f64,
                    close: 101.0 + i as f64,
                })
                .collect(),
        )
    }

    fn viewport() -> Viewport {
        let mut vp = Viewport::new(1_000.0, 500.0, HOUR);
        assert!(vp.set_range(VisibleRange::new(0, 100 * HOUR)));
        vp
    }

    fn marker(id: &str, time: Timestamp, position: MarkerPosition, size: MarkerSize) -> Marker {
        Marker {
            id: id.to_string(),
            position,
            color: "#3fb68b".to_string(),
            size,
            shape: MarkerShape::Circle,
            text: "L".to_string(),
            time,
        }
    }

    #[test]
    fn transforms_are_inverse() {
        let mut vp = viewport();
        vp.autoscale(hourly(10).as_slice(), &[]);
        assert_eq!(vp.time_to_x(50 * HOUR), 500.0);
        assert_eq!(vp.x_to_time(500.0), 50 * HOUR);
        let y = vp.price_to_y(101.5);
        assert!((vp.y_to_price(y) - 101.5).abs() < 1e-9);
        assert_eq!(vp.bar_spacing(), 10.0);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut vp = viewport();
        assert!(!vp.set_range(VisibleRange { from: 10, to: 10 }));
        assert!(!vp.set_range(VisibleRange { from: 20, to: 10 }));
        assert_eq!(vp.range(), VisibleRange::new(0, 100 * HOUR));
    }

    #[test]
    fn panning_right_shows_older_data() {
        let mut vp = viewport();
        vp.pan_pixels(100.0);
        assert_eq!(vp.range(), VisibleRange::new(-10 * HOUR, 90 * HOUR));
    }

    #[test]
    fn zoom_keeps_anchor_and_respects_limits() {
        let mut vp = viewport();
        vp.zoom_at(500.0, 0.5);
        assert_eq!(vp.range(), VisibleRange::new(25 * HOUR, 75 * HOUR));

        vp.zoom_at(500.0, 1e-6);
        assert_eq!(vp.range().duration(), 10 * HOUR);
        vp.zoom_at(500.0, 1e9);
        assert_eq!(vp.range().duration(), 5_000 * HOUR);

        let before = vp.range();
        vp.zoom_at(500.0, f64::NAN);
        assert_eq!(vp.range(), before);
    }

    #[test]
    fn autoscale_pads_and_handles_flat_prices() {
        let mut vp = viewport();
        let series = hourly(3);
        vp.autoscale(series.as_slice(), &[200.0]);
        let (lo, hi) = vp.price_bounds();
        assert!(lo < 95.0);
        assert!(hi > 200.0);

        let flat = [Candle {
            time: 0,
            open: 5.0,
            high: 5.0,
            low: 5.0,
            close: 5.0,
        }];
        vp.autoscale(&flat, &[]);
        let (lo, hi) = vp.price_bounds();
        assert!(lo < 5.0 && hi > 5.0);

        vp.autoscale(&[], &[1.0]);
        assert_eq!(vp.price_bounds(), (lo, hi));
    }

    #[test]
    fn fit_last_shows_recent_bars() {
        let mut vp = viewport();
        vp.fit_last(&hourly(200), 50);
        assert_eq!(vp.range().to, 202 * HOUR);
        assert_eq!(vp.range().duration(), 50 * HOUR);
        assert_eq!(vp.visible(&hourly(200)).len(), 49);
    }

    #[test]
    fn candle_at_requires_pointer_inside_bucket() {
        let series = hourly(5);
        assert_eq!(candle_at(&series, 2 * HOUR + 10, HOUR).map(|c| c.time), Some(2 * HOUR));
        assert_eq!(candle_at(&series, 5 * HOUR + 1, HOUR), None);
        assert_eq!(candle_at(&series, -1, HOUR), None);
    }

    #[test]
    fn legend_lists_ohlc() {
        let c = hourly(1).as_slice()[0];
        assert_eq!(legend_text(&c, None), "O 100.00 H 105.00 L 95.00 C 101.00");
        assert_eq!(format_price(0.001234, None), "0.001234");
        assert_eq!(format_price(3.14159, Some(3)), "3.142");
    }

    #[test]
    fn price_ticks_are_round() {
        let ticks = price_ticks(93.0, 127.0, 5);
        assert_eq!(ticks, vec![100.0, 110.0, 120.0]);
        assert!(price_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn time_ticks_align_to_step() {
        let range = VisibleRange::new(HOUR + 7, 3 * DAY);
        let ticks = time_ticks(range, 6);
        let step = time_step(range, 6);
        assert_eq!(step, 12 * HOUR);
        assert!(ticks.iter().all(|t| t % step == 0 && range.contains(*t)));
        assert_eq!(ticks.first(), Some(&(12 * HOUR)));
    }

    #[test]
    fn time_labels_switch_format_by_step() {
        assert_eq!(time_label(DAY + 2 * HOUR, HOUR), "02:00");
        assert_eq!(time_label(DAY, HOUR), "02 Jan");
        assert_eq!(time_label(DAY + 2 * HOUR, DAY), "02 Jan");
        assert_eq!(crosshair_label(DAY + 2 * HOUR + 30 * MINUTE), "02 Jan 70 02:30");
    }

    #[test]
    fn markers_stack_away_from_the_bar() {
        let series = hourly(10);
        let mut vp = viewport();
        vp.autoscale(series.as_slice(), &[]);
        let markers = vec![
            marker("a-OPEN", 3 * HOUR + 60, MarkerPosition::AboveBar, MarkerSize::Normal),
            marker("b-OPEN", 3 * HOUR, MarkerPosition::AboveBar, MarkerSize::Normal),
            marker("a-CLOSE", 3 * HOUR, MarkerPosition::BelowBar, MarkerSize::Selected),
            marker("far-OPEN", 50 * HOUR, MarkerPosition::AboveBar, MarkerSize::Normal),
        ];
        let glyphs = layout_markers(&markers, &series, &vp);
        assert_eq!(glyphs.len(), 3);
        let high_y = vp.price_to_y(series.as_slice()[3].high);
        let low_y = vp.price_to_y(series.as_slice()[3].low);
        assert!(glyphs[0].y < high_y);
        assert!(glyphs[1].y < glyphs[0].y);
        assert!(glyphs[2].y > low_y);
        assert_eq!(glyphs[2].radius, glyphs[0].radius * 2.0);
        assert_eq!(glyphs[0].x, glyphs[2].x);
    }

    #[test]
    fn hit_test_picks_the_closest_glyph() {
        let series = hourly(10);
        let mut vp = viewport();
        vp.autoscale(series.as_slice(), &[]);
        let markers = vec![
            marker("a-OPEN", 2 * HOUR, MarkerPosition::AboveBar, MarkerSize::Normal),
            marker("a-CLOSE", 2 * HOUR, MarkerPosition::BelowBar, MarkerSize::Normal),
        ];
        let glyphs = layout_markers(&markers, &series, &vp);
        let target = &glyphs[1];
        let hit = hit_test(&glyphs, target.x + 1.0, target.y - 1.0).map(|g| g.id.as_str());
        assert_eq!(hit, Some("a-CLOSE"));
        assert!(hit_test(&glyphs, target.x + 50.0, target.y).is_none());
    }
}
