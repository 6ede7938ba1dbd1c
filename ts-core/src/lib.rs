use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Seconds since Unix epoch. Chart-facing values are timezone-shifted,
/// see [`TimezoneOffset`].
pub type Timestamp = i64;

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

/// Candle bucket sizes offered by the position chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    #[default]
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M5 => 5 * MINUTE,
            Timeframe::M15 => 15 * MINUTE,
            Timeframe::H1 => HOUR,
            Timeframe::H4 => 4 * HOUR,
            Timeframe::D1 => DAY,
        }
    }

    /// Floor a timestamp to the start of its bucket.
    pub fn align(&self, ts: Timestamp) -> Timestamp {
        let dur = self.duration_secs();
        ts.div_euclid(dur) * dur
    }

    /// Wire name used by the candle API.
    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Short label for timeframe buttons.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5M",
            Timeframe::M15 => "15M",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
        }
    }

    /// Daily candles are only offered on the expanded chart.
    pub fn is_available(&self, expanded: bool) -> bool {
        expanded || *self != Timeframe::D1
    }

    pub fn selectable(expanded: bool) -> impl Iterator<Item = Timeframe> {
        Self::ALL.into_iter().filter(move |tf| tf.is_available(expanded))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("invalid timeframe: {other}")),
        }
    }
}

/// Browser-style offset: minutes *behind* UTC (`Date#getTimezoneOffset`).
///
/// The chart engine renders every timestamp as UTC, so shifting the raw
/// epoch by the local offset makes axis labels read as local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimezoneOffset {
    pub minutes: i32,
}

impl TimezoneOffset {
    pub const UTC: TimezoneOffset = TimezoneOffset { minutes: 0 };

    pub fn from_minutes(minutes: i32) -> Self {
        Self { minutes }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn local() -> Self {
        let minutes = js_sys::Date::new_0().get_timezone_offset();
        Self {
            minutes: minutes as i32,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn local() -> Self {
        Self::UTC
    }

    /// UTC epoch -> chart time.
    pub fn apply(&self, utc: Timestamp) -> Timestamp {
        utc - self.minutes as i64 * MINUTE
    }

    /// Chart time -> UTC epoch.
    pub fn revert(&self, chart_ts: Timestamp) -> Timestamp {
        chart_ts + self.minutes as i64 * MINUTE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    fn absorb(&mut self, later: &Candle) {
        self.high = self.high.max(later.high);
        self.low = self.low.min(later.low);
        self.close = later.close;
    }
}

pub trait HasTimestamp {
    fn ts(&self) -> Timestamp;
}

impl HasTimestamp for Candle {
    fn ts(&self) -> Timestamp {
        self.time
    }
}

/// The chart viewport in chart time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl VisibleRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// Window of `span` seconds with `center` in the middle.
    pub fn centered(center: Timestamp, span: i64) -> Self {
        let half = span / 2;
        Self::new(center - half, center - half + span)
    }

    pub fn duration(&self) -> i64 {
        self.to - self.from
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.from && ts <= self.to
    }

    pub fn padded(&self, pad: i64) -> Self {
        Self::new(self.from - pad, self.to + pad)
    }
}

/// Ascending series with binary-searchable timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    data: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: HasTimestamp> TimeSeries<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Stable sort, so equal timestamps keep their input order.
    pub fn from_unsorted(mut data: Vec<T>) -> Self {
        data.sort_by_key(|s| s.ts());
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.data.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Samples whose timestamps are in [from, to).
    pub fn range(&self, from: Timestamp, to: Timestamp) -> &[T] {
        let start = self.lower_bound(from);
        let end = self.lower_bound(to).max(start);
        &self.data[start..end]
    }

    /// Index of the first sample with `ts >= target` (may equal `len`).
    pub fn lower_bound(&self, target: Timestamp) -> usize {
        lower_bound(&self.data, target)
    }

    /// Index of the first sample with `ts > target` (may equal `len`).
    pub fn upper_bound(&self, target: Timestamp) -> usize {
        let mut left = 0usize;
        let mut right = self.data.len();
        while left < right {
            let mid = (left + right) / 2;
            match self.data[mid].ts().cmp(&target) {
                Ordering::Less | Ordering::Equal => left = mid + 1,
                Ordering::Greater => right = mid,
            }
        }
        left
    }

    /// Forward search: first sample at or after `ts`, clamped to the last one.
    pub fn index_at_or_after(&self, ts: Timestamp) -> Option<usize> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.lower_bound(ts).min(self.data.len() - 1))
    }

    /// Backward search: last sample at or before `ts`, clamped to the first one.
    pub fn index_at_or_before(&self, ts: Timestamp) -> Option<usize> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.upper_bound(ts).saturating_sub(1))
    }
}

pub fn lower_bound<T: HasTimestamp>(data: &[T], target: Timestamp) -> usize {
    let mut left = 0usize;
    let mut right = data.len();
    while left < right {
        let mid = (left + right) / 2;
        match data[mid].ts().cmp(&target) {
            Ordering::Less => left = mid + 1,
            Ordering::Equal | Ordering::Greater => right = mid,
        }
    }
    left
}

/// Normalise raw API candles for display: bucket-align, sort, merge
/// duplicates of one bucket, then shift into chart time.
pub fn prepare_candles(
    raw: Vec<Candle>,
    timeframe: Timeframe,
    tz: TimezoneOffset,
) -> TimeSeries<Candle> {
    let mut aligned: Vec<Candle> = raw
        .into_iter()
        .filter(|c| c.open.is_finite() && c.close.is_finite())
        .map(|mut c| {
            c.time = timeframe.align(c.time);
            c
        })
        .collect();
    aligned.sort_by_key(|c| c.time);

    let mut out: Vec<Candle> = Vec::with_capacity(aligned.len());
    for c in aligned {
        match out.last_mut() {
            Some(last) if last.time == c.time => last.absorb(&c),
            _ => out.push(c),
        }
    }
    for c in out.iter_mut() {
        c.time = tz.apply(c.time);
    }
    TimeSeries { data: out }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
        }
    }

    #[test]
    fn timeframe_names_parse_back() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.name().parse::<Timeframe>(), Ok(tf));
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn daily_only_selectable_when_expanded() {
        let collapsed: Vec<_> = Timeframe::selectable(false).collect();
        assert!(!collapsed.contains(&Timeframe::D1));
        assert_eq!(collapsed.len(), 4);
        assert!(Timeframe::selectable(true).any(|tf| tf == Timeframe::D1));
    }

    #[test]
    fn align_floors_negative_timestamps() {
        assert_eq!(Timeframe::H1.align(3_599), 0);
        assert_eq!(Timeframe::H1.align(-1), -HOUR);
    }

    #[test]
    fn timezone_shift_is_reversible() {
        // UTC+7 reports -420 minutes.
        let tz = TimezoneOffset::from_minutes(-420);
        let utc = 1_700_000_000;
        assert_eq!(tz.apply(utc), utc + 7 * HOUR);
        assert_eq!(tz.revert(tz.apply(utc)), utc);
    }

    #[test]
    fn prepare_candles_sorts_and_merges_buckets() {
        let raw = vec![
            candle(2 * HOUR + 10, 3.0),
            candle(HOUR, 1.0),
            Candle {
                time: HOUR + 300,
                open: 9.0,
                high: 20.0,
                low: -5.0,
                close: 2.0,
            },
            candle(0, 0.5),
        ];
        let series = prepare_candles(raw, Timeframe::H1, TimezoneOffset::UTC);
        let times: Vec<_> = series.as_slice().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![0, HOUR, 2 * HOUR]);
        let merged = series.as_slice()[1];
        assert_eq!(merged.open, 1.0);
        assert_eq!(merged.high, 20.0);
        assert_eq!(merged.low, -5.0);
        assert_eq!(merged.close, 2.0);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prepare_candles_applies_timezone() {
        let tz = TimezoneOffset::from_minutes(60);
        let series = prepare_candles(vec![candle(DAY, 1.0)], Timeframe::D1, tz);
        assert_eq!(series.first().map(|c| c.time), Some(DAY - HOUR));
    }

    #[test]
    fn nearest_searches_clamp_to_bounds() {
        let series = TimeSeries::from_unsorted(vec![
            candle(100, 1.0),
            candle(200, 1.0),
            candle(300, 1.0),
        ]);
        assert_eq!(series.index_at_or_after(150), Some(1));
        assert_eq!(series.index_at_or_after(200), Some(1));
        assert_eq!(series.index_at_or_after(10_000), Some(2));
        assert_eq!(series.index_at_or_before(250), Some(1));
        assert_eq!(series.index_at_or_before(300), Some(2));
        assert_eq!(series.index_at_or_before(0), Some(0));

        let empty: TimeSeries<Candle> = TimeSeries::new();
        assert_eq!(empty.index_at_or_after(0), None);
        assert_eq!(empty.index_at_or_before(0), None);
    }

    #[test]
    fn range_is_half_open() {
        let series =
            TimeSeries::from_unsorted((0..5).map(|i| candle(i * 10, 1.0)).collect());
        assert_eq!(series.range(10, 30).len(), 2);
        assert!(series.range(30, 10).is_empty());
    }

    #[test]
    fn visible_range_helpers() {
        let r = VisibleRange::new(50, 10);
        assert_eq!(r, VisibleRange { from: 10, to: 50 });
        let c = VisibleRange::centered(1_000, DAY);
        assert_eq!(c.duration(), DAY);
        assert_eq!(c.from + DAY / 2, 1_000);
        assert_eq!(r.padded(5), VisibleRange::new(5, 55));
    }

    #[test]
    fn candle_serializes_with_time_field() {
        let json = serde_json::to_string(&candle(5, 1.0)).unwrap();
        assert!(json.contains("\"time\":5"));
    }
}
