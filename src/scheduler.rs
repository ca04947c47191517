use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Cancellable delayed events on virtual time.
///
/// Nothing fires by itself: the owner polls `pop_due` with the current time
/// and receives every event whose deadline has passed, earliest first. Events
/// sharing a deadline come out in the order they were scheduled.
pub struct Scheduler<E> {
    next_id: u64,
    pending: BTreeMap<(DateTime<Utc>, TimerId), E>,
    deadlines: HashMap<TimerId, DateTime<Utc>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, at: DateTime<Utc>, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((at, id), event);
        self.deadlines.insert(id, at);
        id
    }

    /// Returns false when the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(at) => self.pending.remove(&(at, id)).is_some(),
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }

    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(TimerId, E)> {
        let key = *self.pending.keys().next()?;
        if key.0 > now {
            return None;
        }
        let event = self.pending.remove(&key)?;
        self.deadlines.remove(&key.1);
        Some((key.1, event))
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.keys().next().map(|(at, _)| *at)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn drain(s: &mut Scheduler<&'static str>, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut fired = vec![];
        while let Some((_, e)) = s.pop_due(now) {
            fired.push(e);
        }
        fired
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut s = Scheduler::new();
        s.schedule(t0() + Duration::milliseconds(100), "mount");

        assert!(s.pop_due(t0()).is_none());
        assert!(s.pop_due(t0() + Duration::milliseconds(99)).is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut s = Scheduler::new();
        s.schedule(t0() + Duration::milliseconds(300), "remove");
        s.schedule(t0() + Duration::milliseconds(100), "mount");
        s.schedule(t0() + Duration::milliseconds(200), "exit");

        assert_eq!(
            drain(&mut s, t0() + Duration::seconds(1)),
            vec!["mount", "exit", "remove"]
        );
        assert!(s.is_empty());
    }

    #[test]
    fn ties_fire_in_schedule_order() {
        let mut s = Scheduler::new();
        let at = t0() + Duration::milliseconds(50);
        s.schedule(at, "first");
        s.schedule(at, "second");

        assert_eq!(drain(&mut s, at), vec!["first", "second"]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = Scheduler::new();
        let id = s.schedule(t0(), "x");

        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.pop_due(t0()).is_none());
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut s = Scheduler::new();
        let id = s.schedule(t0(), "x");
        assert!(s.pop_due(t0()).is_some());
        assert!(!s.cancel(id));
    }

    #[test]
    fn next_deadline_tracks_earliest() {
        let mut s = Scheduler::new();
        assert!(s.next_deadline().is_none());

        let late = s.schedule(t0() + Duration::seconds(5), "late");
        let early = s.schedule(t0() + Duration::seconds(1), "early");
        assert_eq!(s.next_deadline(), Some(t0() + Duration::seconds(1)));

        s.cancel(early);
        assert_eq!(s.next_deadline(), Some(t0() + Duration::seconds(5)));

        s.cancel(late);
        assert!(s.next_deadline().is_none());
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut s = Scheduler::new();
        s.schedule(t0(), "a");
        s.schedule(t0(), "b");
        s.cancel_all();

        assert!(s.is_empty());
        assert!(s.pop_due(t0() + Duration::days(1)).is_none());
    }
}
