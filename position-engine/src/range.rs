//! Time windows: which candles to request and where the viewport starts.

use ts_core::{Timeframe, Timestamp, TimezoneOffset, VisibleRange, DAY};

use crate::position::{oldest_open, PositionData};

/// Positions shorter than this get the wide focus padding.
pub const SHORT_POSITION_SPAN: i64 = 5 * DAY;
pub const WIDE_FOCUS_PAD: i64 = 5 * DAY;
pub const NARROW_FOCUS_PAD: i64 = DAY;
pub const DAILY_DEFAULT_SPAN: i64 = 60 * DAY;
pub const OVERVIEW_SPAN: i64 = 365 * DAY;

/// Furthest back a candle request may reach for each timeframe.
pub fn max_lookback(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::M5 => 7 * DAY,
        Timeframe::M15 => 21 * DAY,
        Timeframe::H1 => 90 * DAY,
        Timeframe::H4 => 365 * DAY,
        Timeframe::D1 => 1_095 * DAY,
    }
}

/// Window requested when there is nothing older to reach for.
pub fn default_span(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::M5 => 2 * DAY,
        Timeframe::M15 => 5 * DAY,
        Timeframe::H1 => 14 * DAY,
        Timeframe::H4 => 60 * DAY,
        Timeframe::D1 => 365 * DAY,
    }
}

fn align_up(timeframe: Timeframe, ts: Timestamp) -> Timestamp {
    let aligned = timeframe.align(ts);
    if aligned == ts {
        ts
    } else {
        aligned + timeframe.duration_secs()
    }
}

/// UTC window of candles to request for `positions` at `now`.
pub fn candle_window(
    timeframe: Timeframe,
    positions: &[PositionData],
    now: Timestamp,
) -> VisibleRange {
    let to = align_up(timeframe, now);
    let floor = to - max_lookback(timeframe);
    let mut from = to - default_span(timeframe);
    if let Some(oldest) = oldest_open(positions) {
        from = from.min(oldest - 2 * DAY);
    }
    let from = Timeframe::D1.align(from).max(floor);
    VisibleRange::new(from, to)
}

/// A year of daily candles for the brush overview.
pub fn overview_window(now: Timestamp) -> VisibleRange {
    let to = align_up(Timeframe::D1, now);
    VisibleRange::new(to - OVERVIEW_SPAN, to)
}

/// Padded window around a position, in chart time. Open positions run to
/// `now`.
pub fn target_position_range(
    position: &PositionData,
    timeframe: Timeframe,
    tz: TimezoneOffset,
    now: Timestamp,
) -> VisibleRange {
    let open = position.open_time(tz);
    let close = position
        .close_time(tz)
        .unwrap_or_else(|| tz.apply(now))
        .max(open);
    let pad = if close - open < SHORT_POSITION_SPAN && timeframe != Timeframe::M5 {
        WIDE_FOCUS_PAD
    } else {
        NARROW_FOCUS_PAD
    };
    VisibleRange::new(open - pad, close + pad)
}

/// Window centred on the most recent trade when nothing else chose one.
///
/// Daily candles get a 60 day window. Otherwise the window is two days when
/// the loaded candles already start a day or more before the trade, and one
/// day when they do not.
pub fn default_range(
    latest_trade: Timestamp,
    first_candle: Option<Timestamp>,
    timeframe: Timeframe,
) -> VisibleRange {
    if timeframe == Timeframe::D1 {
        return VisibleRange::centered(latest_trade, DAILY_DEFAULT_SPAN);
    }
    let covered = first_candle.is_some_and(|first| first <= latest_trade - DAY);
    let span = if covered { 2 * DAY } else { DAY };
    VisibleRange::centered(latest_trade, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fixtures::position;
    use ts_core::HOUR;

    const T0: Timestamp = 1_700_006_400; // a UTC midnight

    #[test]
    fn short_positions_get_wide_padding() {
        let p = position("a", true, T0, Some(T0 + 2 * DAY));
        let r = target_position_range(&p, Timeframe::H1, TimezoneOffset::UTC, T0 + 30 * DAY);
        assert_eq!(r, VisibleRange::new(T0 - 5 * DAY, T0 + 7 * DAY));
    }

    #[test]
    fn five_minute_and_long_positions_get_narrow_padding() {
        let short = position("a", true, T0, Some(T0 + 2 * DAY));
        let r = target_position_range(&short, Timeframe::M5, TimezoneOffset::UTC, T0);
        assert_eq!(r, VisibleRange::new(T0 - DAY, T0 + 3 * DAY));

        let long = position("b", true, T0, Some(T0 + 6 * DAY));
        for tf in Timeframe::ALL {
            let r = target_position_range(&long, tf, TimezoneOffset::UTC, T0);
            assert_eq!(r, VisibleRange::new(T0 - DAY, T0 + 7 * DAY));
        }
    }

    #[test]
    fn open_positions_run_to_now() {
        let p = position("a", true, T0, None);
        let r = target_position_range(&p, Timeframe::H4, TimezoneOffset::UTC, T0 + 10 * DAY);
        assert_eq!(r, VisibleRange::new(T0 - DAY, T0 + 11 * DAY));
    }

    #[test]
    fn target_range_is_in_chart_time() {
        let tz = TimezoneOffset::from_minutes(-120);
        let p = position("a", true, T0, Some(T0 + HOUR));
        let r = target_position_range(&p, Timeframe::H1, tz, T0);
        assert_eq!(r.from, T0 + 2 * HOUR - 5 * DAY);
    }

    #[test]
    fn default_range_depends_on_coverage() {
        let trade = T0 + 5 * DAY;
        let covered = default_range(trade, Some(T0), Timeframe::H1);
        assert_eq!(covered.duration(), 2 * DAY);
        assert!(covered.contains(trade));

        let fresh = default_range(trade, Some(trade - HOUR), Timeframe::H1);
        assert_eq!(fresh.duration(), DAY);
        assert_eq!(default_range(trade, None, Timeframe::M15).duration(), DAY);

        let daily = default_range(trade, Some(T0), Timeframe::D1);
        assert_eq!(daily.duration(), 60 * DAY);
        assert_eq!(daily.from + 30 * DAY, trade);
    }

    #[test]
    fn candle_window_reaches_back_to_oldest_position() {
        let now = T0 + 40 * DAY + 123;
        let positions = vec![
            position("a", true, T0 + 10 * DAY + 500, None),
            position("b", true, T0 + 30 * DAY, None),
        ];
        let w = candle_window(Timeframe::H1, &positions, now);
        assert_eq!(w.to, Timeframe::H1.align(now) + HOUR);
        assert_eq!(w.from, T0 + 8 * DAY);
    }

    #[test]
    fn candle_window_is_clamped_by_lookback() {
        let now = T0 + 400 * DAY;
        let positions = vec![position("a", true, T0, None)];
        let w = candle_window(Timeframe::M5, &positions, now);
        assert_eq!(w.to - w.from, 7 * DAY);

        let empty = candle_window(Timeframe::H4, &[], now);
        assert_eq!(empty.to - empty.from, 60 * DAY);
    }

    #[test]
    fn overview_is_one_year_of_days() {
        let w = overview_window(T0 + 10);
        assert_eq!(w.duration(), 365 * DAY);
        assert_eq!(w.to, T0 + DAY);
    }
}
