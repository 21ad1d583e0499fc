use std::collections::VecDeque;
use std::time::Duration;

use crate::event::{Event, Moment};

/// A time-ordered buffer of `(event, count)` entries with timeframe-based
/// eviction.
///
/// Entries are appended to the back and evicted from the front whenever the
/// window's span reaches `timeframe`. Out-of-order arrivals (a timestamp
/// earlier than the current tail) are inserted at their correct position
/// rather than rejected — see [`EventWindow::append`].
pub struct EventWindow {
    ts_field: String,
    timeframe: Duration,
    entries: VecDeque<(Event, u64)>,
    on_removed: Option<Box<dyn FnMut(Event, u64)>>,
}

impl EventWindow {
    pub fn new(ts_field: impl Into<String>, timeframe: Duration) -> Self {
        Self {
            ts_field: ts_field.into(),
            timeframe,
            entries: VecDeque::new(),
            on_removed: None,
        }
    }

    /// Wire a callback invoked exactly once per evicted entry, in
    /// chronological order. Used by [`crate::rule::SpikeRule`] to hand
    /// entries aging out of the current window to the reference window.
    pub fn set_on_removed(&mut self, cb: impl FnMut(Event, u64) + 'static) {
        self.on_removed = Some(Box::new(cb));
    }

    pub fn timeframe(&self) -> Duration {
        self.timeframe
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of the `count` field across all entries.
    pub fn count(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).sum()
    }

    /// `ts(last) - ts(first)`, or zero for an empty or single-entry window.
    pub fn duration(&self) -> Duration {
        match (self.entries.front(), self.entries.back()) {
            (Some((first, _)), Some((last, _))) => {
                let a = self.ts(last);
                let b = self.ts(first);
                (a - b).to_std().unwrap_or(Duration::ZERO)
            }
            _ => Duration::ZERO,
        }
    }

    pub fn newest(&self) -> Option<&Event> {
        self.entries.back().map(|(e, _)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Event, u64)> {
        self.entries.iter()
    }

    /// Append `(event, count)`, inserting out of order if necessary, then
    /// evict from the head until the span is back under `timeframe`.
    pub fn append(&mut self, event: Event, count: u64) {
        let ts = self.ts(&event);

        if self.entries.is_empty() {
            self.entries.push_back((event, count));
        } else if ts >= self.ts(&self.entries.back().unwrap().0) {
            self.entries.push_back((event, count));
        } else if ts < self.ts(&self.entries.front().unwrap().0) {
            self.entries.push_front((event, count));
        } else {
            // Out-of-order but not before the head: scan from the tail
            // backwards for the insertion point. Bounded by entries.len()
            // — unreachable to exhaust given the head check above.
            let cap = self.entries.len();
            let mut inserted = false;
            for step in 0..cap {
                let idx = self.entries.len() - 1 - step;
                if self.ts(&self.entries[idx].0) < ts {
                    self.entries.insert(idx + 1, (event, count));
                    inserted = true;
                    break;
                }
            }
            debug_assert!(inserted, "out-of-order insert must find a position");
            // If somehow not inserted (should be unreachable), the entry is
            // dropped rather than corrupting ordering.
        }

        self.evict();
    }

    /// Remove everything; used when a rule resets a key's accumulation
    /// after a match.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict(&mut self) {
        while self.duration() >= self.timeframe {
            let Some((ev, c)) = self.entries.pop_front() else {
                break;
            };
            if let Some(cb) = self.on_removed.as_mut() {
                cb(ev, c);
            }
        }
    }

    fn ts(&self, event: &Event) -> Moment {
        event
            .moment(&self.ts_field)
            .expect("event missing timestamp field required by EventWindow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(secs: i64) -> Event {
        Event::new().with("@timestamp", secs as f64)
    }

    #[test]
    fn duration_strictly_under_timeframe_after_append() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(10));
        for t in 0..20 {
            w.append(ev(t), 1);
            assert!(w.duration() < w.timeframe());
        }
    }

    #[test]
    fn count_sums_entries() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(100));
        w.append(ev(0), 3);
        w.append(ev(1), 4);
        assert_eq!(w.count(), 7);
    }

    #[test]
    fn out_of_order_insertion_keeps_chronological_order() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(100));
        w.append(ev(0), 1);
        w.append(ev(5), 1);
        w.append(ev(3), 1); // out of order: belongs between 0 and 5
        let order: Vec<i64> = w.iter().map(|(e, _)| e.moment("@timestamp").unwrap().timestamp()).collect();
        assert_eq!(order, vec![0, 3, 5]);
    }

    #[test]
    fn out_of_order_before_head_prepends() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(100));
        w.append(ev(5), 1);
        w.append(ev(0), 1);
        let order: Vec<i64> = w.iter().map(|(e, _)| e.moment("@timestamp").unwrap().timestamp()).collect();
        assert_eq!(order, vec![0, 5]);
    }

    #[test]
    fn eviction_fires_on_removed_in_order() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(10));
        let removed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let removed_clone = removed.clone();
        w.set_on_removed(move |e, c| removed_clone.borrow_mut().push((e.moment("@timestamp").unwrap().timestamp(), c)));

        w.append(ev(0), 1);
        w.append(ev(5), 1);
        w.append(ev(11), 1); // duration now 11 >= 10, evicts t=0

        assert_eq!(*removed.borrow(), vec![(0, 1)]);
        let order: Vec<i64> = w.iter().map(|(e, _)| e.moment("@timestamp").unwrap().timestamp()).collect();
        assert_eq!(order, vec![5, 11]);
    }

    #[test]
    fn single_event_has_zero_duration_and_is_never_evicted() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(10));
        w.append(ev(0), 1);
        assert_eq!(w.duration(), Duration::ZERO);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn clear_empties_the_window() {
        let mut w = EventWindow::new("@timestamp", Duration::from_secs(10));
        w.append(ev(0), 1);
        w.append(ev(1), 1);
        w.clear();
        assert!(w.is_empty());
        assert_eq!(w.count(), 0);
    }
}
