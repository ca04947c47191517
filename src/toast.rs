use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::notifications::{Notification, NotificationType};
use crate::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy)]
pub struct ToastTiming {
    pub mount_delay: Duration,
    pub display_duration: Duration,
    pub exit_duration: Duration,
}

impl Default for ToastTiming {
    fn default() -> Self {
        Self {
            mount_delay: Duration::milliseconds(100),
            display_duration: Duration::milliseconds(3000),
            exit_duration: Duration::milliseconds(300),
        }
    }
}

impl ToastTiming {
    pub fn lifetime(&self) -> Duration {
        self.mount_delay + self.display_duration + self.exit_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastPhase {
    Enqueued,
    Mounted,
    Exiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastTransition {
    Mounted(String),
    Exiting(String),
    Removed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToastKey(u64);

#[derive(Debug, Clone, Copy)]
enum ToastEvent {
    Mount(ToastKey),
    Exit(ToastKey),
    Remove(ToastKey),
}

#[derive(Debug, Clone)]
pub struct Toast {
    key: ToastKey,
    pub notification: Notification,
    pub phase: ToastPhase,
    removed_at: DateTime<Utc>,
    timers: Vec<TimerId>,
}

/// Transient, bounded queue of on-screen pop-ups for unlock and update
/// notifications.
///
/// At most one unlock toast per category letter and at most one update toast
/// are live at any time; a newer one replaces the older. Each toast walks
/// `Enqueued -> Mounted -> Exiting -> removed` on its own timers.
pub struct ToastQueue {
    entries: Vec<Toast>,
    scheduler: Scheduler<ToastEvent>,
    timing: ToastTiming,
    limit: usize,
    next_key: u64,
}

impl ToastQueue {
    pub fn new(limit: usize, timing: ToastTiming) -> Self {
        Self {
            entries: Vec::new(),
            scheduler: Scheduler::new(),
            timing,
            limit,
            next_key: 0,
        }
    }

    pub fn push(&mut self, notification: Notification, now: DateTime<Utc>) {
        let replaced: Vec<ToastKey> = self
            .entries
            .iter()
            .filter(|t| conflicts(&t.notification, &notification))
            .map(|t| t.key)
            .collect();
        for key in replaced {
            self.drop_entry(key);
        }

        let key = ToastKey(self.next_key);
        self.next_key += 1;

        let mounted_at = now + self.timing.mount_delay;
        let exiting_at = mounted_at + self.timing.display_duration;
        let removed_at = exiting_at + self.timing.exit_duration;
        let timers = vec![
            self.scheduler.schedule(mounted_at, ToastEvent::Mount(key)),
            self.scheduler.schedule(exiting_at, ToastEvent::Exit(key)),
            self.scheduler.schedule(removed_at, ToastEvent::Remove(key)),
        ];

        debug!(id = %notification.id, "toast enqueued");
        self.entries.push(Toast {
            key,
            notification,
            phase: ToastPhase::Enqueued,
            removed_at,
            timers,
        });

        while self.entries.len() > self.limit {
            let oldest = self.entries[0].key;
            self.drop_entry(oldest);
        }
    }

    /// Removes every toast with this notification id. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let keys: Vec<ToastKey> = self
            .entries
            .iter()
            .filter(|t| t.notification.id == id)
            .map(|t| t.key)
            .collect();
        for key in &keys {
            self.drop_entry(*key);
        }
        !keys.is_empty()
    }

    /// User dismissal: skip the rest of the display window, play the exit
    /// animation and remove. Removal never moves past the toast's original
    /// deadline, and a toast already exiting ignores the request.
    pub fn dismiss(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let mut found = false;
        for toast in self
            .entries
            .iter_mut()
            .filter(|t| t.notification.id == id && t.phase != ToastPhase::Exiting)
        {
            for timer in toast.timers.drain(..) {
                self.scheduler.cancel(timer);
            }
            toast.phase = ToastPhase::Exiting;
            toast.removed_at = toast.removed_at.min(now + self.timing.exit_duration);
            toast.timers.push(
                self.scheduler
                    .schedule(toast.removed_at, ToastEvent::Remove(toast.key)),
            );
            found = true;
        }
        found
    }

    /// Fires every timer due at `now` and reports what changed.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<ToastTransition> {
        let mut transitions = Vec::new();
        while let Some((timer, event)) = self.scheduler.pop_due(now) {
            let transition = match event {
                ToastEvent::Mount(key) => self
                    .entry_mut(key, timer)
                    .filter(|t| t.phase == ToastPhase::Enqueued)
                    .map(|t| {
                        t.phase = ToastPhase::Mounted;
                        ToastTransition::Mounted(t.notification.id.clone())
                    }),
                ToastEvent::Exit(key) => self
                    .entry_mut(key, timer)
                    .filter(|t| t.phase != ToastPhase::Exiting)
                    .map(|t| {
                        t.phase = ToastPhase::Exiting;
                        ToastTransition::Exiting(t.notification.id.clone())
                    }),
                ToastEvent::Remove(key) => self
                    .drop_entry(key)
                    .map(|t| ToastTransition::Removed(t.notification.id)),
            };
            if let Some(transition) = transition {
                debug!(?transition, "toast transition");
                transitions.push(transition);
            }
        }
        transitions
    }

    /// Cancels all pending timers and empties the queue.
    pub fn clear(&mut self) {
        self.scheduler.cancel_all();
        self.entries.clear();
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.entries
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    fn entry_mut(&mut self, key: ToastKey, fired: TimerId) -> Option<&mut Toast> {
        let toast = self.entries.iter_mut().find(|t| t.key == key)?;
        toast.timers.retain(|t| *t != fired);
        Some(toast)
    }

    fn drop_entry(&mut self, key: ToastKey) -> Option<Toast> {
        let index = self.entries.iter().position(|t| t.key == key)?;
        let toast = self.entries.remove(index);
        for timer in &toast.timers {
            self.scheduler.cancel(*timer);
        }
        Some(toast)
    }
}

fn conflicts(existing: &Notification, incoming: &Notification) -> bool {
    match incoming.kind {
        NotificationType::Unlock => {
            existing.kind == NotificationType::Unlock
                && existing.category_letter == incoming.category_letter
        }
        NotificationType::Update => existing.kind == NotificationType::Update,
        _ => false,
    }
}
