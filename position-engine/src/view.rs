//! Orchestrator state machine: timeframe, visible range, marker selection
//! and the side effects a host runs after each transition.

use tracing::debug;
use ts_core::{Timeframe, Timestamp, TimezoneOffset, VisibleRange};

use crate::markers::{marker_id, parse_marker_id, render_markers, Marker, MarkerKind};
use crate::position::{latest_activity, oldest_open, PositionData};
use crate::range::{default_range, target_position_range};

/// Inputs the view state reads but does not own.
#[derive(Debug, Clone, Copy)]
pub struct ChartContext<'a> {
    /// Every loaded position, open and closed.
    pub positions: &'a [PositionData],
    /// First loaded candle, in chart time.
    pub first_candle_time: Option<Timestamp>,
    pub is_expanded: bool,
    pub is_all_tokens: bool,
    pub has_next_page: bool,
    pub tz: TimezoneOffset,
    /// UTC seconds.
    pub now: Timestamp,
}

impl<'a> ChartContext<'a> {
    pub fn new(positions: &'a [PositionData], now: Timestamp) -> Self {
        Self {
            positions,
            first_candle_time: None,
            is_expanded: false,
            is_all_tokens: false,
            has_next_page: false,
            tz: TimezoneOffset::UTC,
            now,
        }
    }

    fn find(&self, id: &str) -> Option<&'a PositionData> {
        self.positions.iter().find(|p| p.id == id)
    }
}

/// Side effects the host must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartCommand {
    ShowSeeMore,
    FetchNextPage,
}

/// Orchestrator state for one position chart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartViewState {
    timeframe: Timeframe,
    visible_range: Option<VisibleRange>,
    marker_id: Option<String>,
    show_see_more: bool,
    target_id: Option<String>,
    // Position count when the last page was requested.
    page_requested_at: Option<usize>,
}

impl ChartViewState {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            ..Self::default()
        }
    }

    /// Initial state for a chart mounted in the given mode. A timeframe the
    /// mode does not offer falls back to 1h.
    pub fn for_mode(timeframe: Option<Timeframe>, expanded: bool) -> Self {
        let timeframe = match timeframe {
            Some(tf) if tf.is_available(expanded) => tf,
            Some(tf) => {
                debug!(%tf, expanded, "initial timeframe not available, using 1h");
                Timeframe::H1
            }
            None => Timeframe::default(),
        };
        Self::new(timeframe)
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.visible_range
    }

    pub fn marker_id(&self) -> Option<&str> {
        self.marker_id.as_deref()
    }

    pub fn show_see_more(&self) -> bool {
        self.show_see_more
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// Jump to a deep-linked position: select its open marker and frame it.
    pub fn focus_target(&mut self, target: &PositionData, ctx: &ChartContext<'_>) {
        let range = target_position_range(target, self.timeframe, ctx.tz, ctx.now);
        debug!(target = %target.id, from = range.from, to = range.to, "focus target position");
        self.target_id = Some(target.id.clone());
        self.marker_id = Some(marker_id(&target.id, MarkerKind::Open));
        self.visible_range = Some(range);
    }

    pub fn clear_target(&mut self) {
        self.target_id = None;
    }

    fn refocus_or_clear(&mut self, ctx: &ChartContext<'_>) {
        match self.target_id.as_deref().and_then(|id| ctx.find(id)) {
            Some(target) => self.focus_target(target, ctx),
            None => self.visible_range = None,
        }
    }

    /// Returns false and changes nothing when `timeframe` is not offered in
    /// the current mode.
    pub fn select_timeframe(&mut self, timeframe: Timeframe, ctx: &ChartContext<'_>) -> bool {
        if !timeframe.is_available(ctx.is_expanded) {
            debug!(%timeframe, "timeframe not available");
            return false;
        }
        self.timeframe = timeframe;
        self.refocus_or_clear(ctx);
        true
    }

    pub fn change_currency(&mut self, ctx: &ChartContext<'_>) {
        self.page_requested_at = None;
        self.refocus_or_clear(ctx);
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        if !expanded && !self.timeframe.is_available(false) {
            self.timeframe = Timeframe::H1;
            self.visible_range = None;
        }
        self.show_see_more = false;
    }

    /// Centre on the most recent trade when neither the user nor a target
    /// picked a range yet. Returns the range now in effect.
    pub fn resolve_default_range(&mut self, ctx: &ChartContext<'_>) -> Option<VisibleRange> {
        if self.visible_range.is_some() || self.target_id.is_some() {
            return self.visible_range;
        }
        let latest = latest_activity(ctx.positions, ctx.tz)?;
        let range = default_range(latest, ctx.first_candle_time, self.timeframe);
        debug!(from = range.from, to = range.to, "default range");
        self.visible_range = Some(range);
        self.visible_range
    }

    /// Older positions are needed when the range reaches past the oldest
    /// loaded open.
    pub fn needs_next_page(&self, ctx: &ChartContext<'_>) -> bool {
        if ctx.is_all_tokens || !ctx.has_next_page {
            return false;
        }
        let (Some(range), Some(oldest)) = (self.visible_range, oldest_open(ctx.positions)) else {
            return false;
        };
        range.from < ctx.tz.apply(oldest)
    }

    /// Handle a debounced range change coming from the chart.
    pub fn on_visible_range_changed(
        &mut self,
        range: VisibleRange,
        ctx: &ChartContext<'_>,
    ) -> Option<ChartCommand> {
        if self.visible_range == Some(range) {
            return None;
        }
        if !ctx.is_expanded {
            if self.show_see_more {
                return None;
            }
            self.show_see_more = true;
            return Some(ChartCommand::ShowSeeMore);
        }
        self.visible_range = Some(range);
        self.request_next_page(ctx)
    }

    /// Ask for older positions at most once per loaded page.
    pub fn request_next_page(&mut self, ctx: &ChartContext<'_>) -> Option<ChartCommand> {
        if !self.needs_next_page(ctx) || self.page_requested_at == Some(ctx.positions.len()) {
            return None;
        }
        self.page_requested_at = Some(ctx.positions.len());
        debug!(loaded = ctx.positions.len(), "request next page");
        Some(ChartCommand::FetchNextPage)
    }

    /// Chart click: remember the hovered marker (or clear it) and keep the
    /// range the user was looking at.
    pub fn select_marker(&mut self, marker_id: Option<String>, range: VisibleRange) {
        self.marker_id = marker_id.filter(|id| !id.is_empty());
        self.visible_range = Some(range);
    }

    pub fn clear_marker(&mut self) {
        self.marker_id = None;
    }

    pub fn apply_brush(&mut self, range: VisibleRange) {
        self.visible_range = Some(range);
    }

    /// Position behind the selected marker. Unknown or malformed ids give
    /// `None`.
    pub fn selected_position<'p>(&self, positions: &'p [PositionData]) -> Option<&'p PositionData> {
        let id = parse_marker_id(self.marker_id.as_deref()?).ok()?;
        positions.iter().find(|p| p.id == id.position_id)
    }

    pub fn markers(
        &self,
        open_positions: &[PositionData],
        closed_positions: &[PositionData],
        tz: TimezoneOffset,
    ) -> Vec<Marker> {
        render_markers(open_positions, closed_positions, self.marker_id(), tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fixtures::position;
    use ts_core::{prepare_candles, Candle, DAY, HOUR};

    const T0: Timestamp = 1_700_006_400;

    fn ctx(positions: &[PositionData]) -> ChartContext<'_> {
        ChartContext::new(positions, T0 + 30 * DAY)
    }

    #[test]
    fn focusing_a_target_selects_its_open_marker() {
        let positions = vec![position("p1", true, T0, Some(T0 + DAY))];
        let mut state = ChartViewState::new(Timeframe::H1);
        state.focus_target(&positions[0], &ctx(&positions));
        assert_eq!(state.marker_id(), Some("p1-OPEN"));
        assert_eq!(state.target_id(), Some("p1"));
        assert_eq!(
            state.visible_range(),
            Some(VisibleRange::new(T0 - 5 * DAY, T0 + 6 * DAY))
        );
        assert_eq!(state.selected_position(&positions).map(|p| p.id.as_str()), Some("p1"));
    }

    #[test]
    fn timeframe_change_clears_or_refocuses() {
        let positions = vec![position("p1", true, T0, Some(T0 + DAY))];
        let c = ctx(&positions);

        let mut plain = ChartViewState::new(Timeframe::H1);
        plain.apply_brush(VisibleRange::new(T0, T0 + DAY));
        assert!(plain.select_timeframe(Timeframe::H4, &c));
        assert_eq!(plain.visible_range(), None);

        let mut targeted = ChartViewState::new(Timeframe::H1);
        targeted.focus_target(&positions[0], &c);
        targeted.apply_brush(VisibleRange::new(0, 10));
        assert!(targeted.select_timeframe(Timeframe::M5, &c));
        assert_eq!(
            targeted.visible_range(),
            Some(VisibleRange::new(T0 - DAY, T0 + 2 * DAY))
        );
    }

    #[test]
    fn daily_requires_expanded_mode() {
        let positions = vec![];
        let mut c = ctx(&positions);
        let mut state = ChartViewState::new(Timeframe::H1);
        assert!(!state.select_timeframe(Timeframe::D1, &c));
        assert_eq!(state.timeframe(), Timeframe::H1);

        c.is_expanded = true;
        assert!(state.select_timeframe(Timeframe::D1, &c));
        state.apply_brush(VisibleRange::new(0, DAY));
        state.set_expanded(false);
        assert_eq!(state.timeframe(), Timeframe::H1);
        assert_eq!(state.visible_range(), None);
    }

    #[test]
    fn collapsed_mount_never_starts_on_daily() {
        let collapsed = ChartViewState::for_mode(Some(Timeframe::D1), false);
        assert_eq!(collapsed.timeframe(), Timeframe::H1);
        assert!(collapsed.timeframe().is_available(false));

        let expanded = ChartViewState::for_mode(Some(Timeframe::D1), true);
        assert_eq!(expanded.timeframe(), Timeframe::D1);
        assert_eq!(
            ChartViewState::for_mode(Some(Timeframe::M5), false).timeframe(),
            Timeframe::M5
        );
        assert_eq!(ChartViewState::for_mode(None, false).timeframe(), Timeframe::default());
    }

    #[test]
    fn currency_change_clears_range() {
        let positions = vec![position("p1", true, T0, None)];
        let mut state = ChartViewState::new(Timeframe::H1);
        state.apply_brush(VisibleRange::new(T0, T0 + DAY));
        state.change_currency(&ctx(&positions));
        assert_eq!(state.visible_range(), None);
    }

    #[test]
    fn default_range_centres_on_latest_trade() {
        // Ten daily candles and one position inside them.
        let raw: Vec<Candle> = (0..10)
            .map(|i| Candle {
                time: T0 + i * DAY,
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
            })
            .collect();
        let tz = TimezoneOffset::UTC;
        let series = prepare_candles(raw, Timeframe::D1, tz);
        let trade = T0 + 6 * DAY + 3 * HOUR;
        let positions = vec![position("p1", true, trade, None)];
        let mut c = ctx(&positions);
        c.first_candle_time = series.first().map(|candle| candle.time);

        let mut state = ChartViewState::new(Timeframe::default());
        let range = state.resolve_default_range(&c).unwrap();
        let duration = range.duration();
        assert!(duration == DAY || duration == 2 * DAY);
        assert_eq!(range.from + duration / 2, trade);
        assert_eq!(duration, 2 * DAY);

        // Once set it sticks.
        c.first_candle_time = Some(trade);
        assert_eq!(state.resolve_default_range(&c), Some(range));
    }

    #[test]
    fn default_range_waits_for_positions_and_skips_targets() {
        let none: Vec<PositionData> = vec![];
        let mut state = ChartViewState::new(Timeframe::H1);
        assert_eq!(state.resolve_default_range(&ctx(&none)), None);

        let positions = vec![position("p1", true, T0, None)];
        let c = ctx(&positions);
        state.focus_target(&positions[0], &c);
        let focused = state.visible_range();
        assert_eq!(state.resolve_default_range(&c), focused);
    }

    #[test]
    fn range_changes_show_see_more_once_when_collapsed() {
        let positions = vec![position("p1", true, T0, None)];
        let c = ctx(&positions);
        let mut state = ChartViewState::new(Timeframe::H1);
        let r = VisibleRange::new(T0, T0 + DAY);
        assert_eq!(state.on_visible_range_changed(r, &c), Some(ChartCommand::ShowSeeMore));
        assert!(state.show_see_more());
        assert_eq!(state.on_visible_range_changed(r.padded(HOUR), &c), None);
        assert_eq!(state.visible_range(), None);

        state.set_expanded(true);
        assert!(!state.show_see_more());
    }

    #[test]
    fn expanded_range_changes_paginate_once_per_page() {
        let positions = vec![position("p1", true, T0, None)];
        let mut c = ctx(&positions);
        c.is_expanded = true;
        c.has_next_page = true;
        let mut state = ChartViewState::new(Timeframe::H1);

        let inside = VisibleRange::new(T0 + HOUR, T0 + DAY);
        assert_eq!(state.on_visible_range_changed(inside, &c), None);
        assert_eq!(state.visible_range(), Some(inside));
        // Same range again is ignored.
        assert_eq!(state.on_visible_range_changed(inside, &c), None);

        let older = VisibleRange::new(T0 - DAY, T0 + DAY);
        assert_eq!(
            state.on_visible_range_changed(older, &c),
            Some(ChartCommand::FetchNextPage)
        );
        let older_still = older.padded(HOUR);
        assert_eq!(state.on_visible_range_changed(older_still, &c), None);

        let more = vec![positions[0].clone(), position("p0", true, T0 - 10 * DAY, None)];
        let mut c2 = ctx(&more);
        c2.is_expanded = true;
        c2.has_next_page = true;
        let far = VisibleRange::new(T0 - 20 * DAY, T0);
        assert_eq!(
            state.on_visible_range_changed(far, &c2),
            Some(ChartCommand::FetchNextPage)
        );
    }

    #[test]
    fn pagination_is_off_for_all_tokens_or_last_page() {
        let positions = vec![position("p1", true, T0, None)];
        let mut c = ctx(&positions);
        c.is_expanded = true;
        let mut state = ChartViewState::new(Timeframe::H1);
        state.apply_brush(VisibleRange::new(T0 - DAY, T0));
        assert!(!state.needs_next_page(&c));
        c.has_next_page = true;
        assert!(state.needs_next_page(&c));
        c.is_all_tokens = true;
        assert!(!state.needs_next_page(&c));
    }

    #[test]
    fn brushing_past_the_oldest_open_requests_one_page() {
        let positions = vec![position("p1", true, T0, None)];
        let mut c = ctx(&positions);
        c.is_expanded = true;
        c.has_next_page = true;
        let mut state = ChartViewState::new(Timeframe::H1);
        state.apply_brush(VisibleRange::new(T0 + HOUR, T0 + DAY));
        assert_eq!(state.request_next_page(&c), None);
        state.apply_brush(VisibleRange::new(T0 - 3 * DAY, T0));
        assert_eq!(state.request_next_page(&c), Some(ChartCommand::FetchNextPage));
        assert_eq!(state.request_next_page(&c), None);
    }

    #[test]
    fn marker_selection_degrades_gracefully() {
        let positions = vec![position("p1", true, T0, None)];
        let mut state = ChartViewState::new(Timeframe::H1);
        let r = VisibleRange::new(T0, T0 + DAY);

        state.select_marker(Some("garbage".to_string()), r);
        assert_eq!(state.selected_position(&positions), None);
        state.select_marker(Some("unknown-CLOSE".to_string()), r);
        assert_eq!(state.selected_position(&positions), None);

        state.select_marker(Some("p1-OPEN".to_string()), r);
        assert!(state.selected_position(&positions).is_some());
        assert_eq!(state.visible_range(), Some(r));

        state.select_marker(None, r);
        assert_eq!(state.marker_id(), None);
        state.select_marker(Some("p1-OPEN".to_string()), r);
        state.clear_marker();
        assert_eq!(state.selected_position(&positions), None);
    }

    #[test]
    fn markers_follow_selection() {
        let positions = vec![position("p1", true, T0, None), position("p2", false, T0 + 5, None)];
        let mut state = ChartViewState::new(Timeframe::H1);
        state.select_marker(Some("p2-OPEN".to_string()), VisibleRange::new(T0, T0 + 1));
        let markers = state.markers(&positions, &[], TimezoneOffset::UTC);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].size, crate::markers::MarkerSize::Selected);
        assert_eq!(markers[0].size, crate::markers::MarkerSize::Normal);
    }
}
