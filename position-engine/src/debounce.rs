//! Coalescing of bursty visible-range events.

use ts_core::VisibleRange;

/// Quiet period after the last range event before it is handled.
pub const RANGE_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingRange {
    range: VisibleRange,
    deadline: u64,
    ticket: u64,
}

/// Keeps only the newest range of a burst. Each push supersedes the previous
/// one and moves the deadline; the host either polls with its own clock or
/// fires the ticket of the timer it armed for the push.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDebouncer {
    delay_ms: u64,
    next_ticket: u64,
    pending: Option<PendingRange>,
}

impl Default for RangeDebouncer {
    fn default() -> Self {
        Self::new(RANGE_DEBOUNCE_MS)
    }
}

impl RangeDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            next_ticket: 0,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Record `range` seen at `now_ms`. Returns the ticket of this push.
    pub fn push(&mut self, range: VisibleRange, now_ms: u64) -> u64 {
        self.next_ticket += 1;
        self.pending = Some(PendingRange {
            range,
            deadline: now_ms.saturating_add(self.delay_ms),
            ticket: self.next_ticket,
        });
        self.next_ticket
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.pending.map(|p| p.deadline)
    }

    /// Take the pending range once its deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<VisibleRange> {
        let pending = self.pending.filter(|p| now_ms >= p.deadline)?;
        self.pending = None;
        Some(pending.range)
    }

    /// Timer for `ticket` elapsed. Only the newest push is delivered.
    pub fn fire(&mut self, ticket: u64) -> Option<VisibleRange> {
        let pending = self.pending.filter(|p| p.ticket == ticket)?;
        self.pending = None;
        Some(pending.range)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(from: i64) -> VisibleRange {
        VisibleRange::new(from, from + 3_600)
    }

    #[test]
    fn burst_delivers_only_the_last_range() {
        let mut debouncer = RangeDebouncer::default();
        let mut handled = Vec::new();
        for (i, at) in [0u64, 30, 60, 90].into_iter().enumerate() {
            debouncer.push(range(i as i64 * 60), at);
            handled.extend(debouncer.poll(at));
        }
        assert!(handled.is_empty());
        assert_eq!(debouncer.deadline(), Some(190));
        assert_eq!(debouncer.poll(189), None);
        handled.extend(debouncer.poll(190));
        handled.extend(debouncer.poll(400));
        assert_eq!(handled, vec![range(180)]);
    }

    #[test]
    fn burst_moves_the_view_state_once() {
        use crate::view::{ChartContext, ChartViewState};
        use ts_core::Timeframe;

        let mut ctx = ChartContext::new(&[], 0);
        ctx.is_expanded = true;
        let mut state = ChartViewState::new(Timeframe::H1);
        let mut debouncer = RangeDebouncer::default();
        let mut transitions = 0;
        for at in [0u64, 40, 80, 120, 500] {
            if let Some(r) = debouncer.poll(at) {
                transitions += 1;
                state.on_visible_range_changed(r, &ctx);
            }
            if at < 500 {
                debouncer.push(range(at as i64), at);
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(state.visible_range(), Some(range(120)));
    }

    #[test]
    fn superseded_timers_fire_nothing() {
        let mut debouncer = RangeDebouncer::new(RANGE_DEBOUNCE_MS);
        let first = debouncer.push(range(0), 0);
        let second = debouncer.push(range(60), 10);
        assert_eq!(debouncer.fire(first), None);
        assert_eq!(debouncer.fire(second), Some(range(60)));
        assert_eq!(debouncer.fire(second), None);
    }

    #[test]
    fn cancel_drops_the_pending_range() {
        let mut debouncer = RangeDebouncer::default();
        let ticket = debouncer.push(range(0), 0);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(1_000), None);
        assert_eq!(debouncer.fire(ticket), None);
    }
}
