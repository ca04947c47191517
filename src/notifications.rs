use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::progress::UnlockListener;
use crate::storage::{keys, load_or_default, save_json, SharedStore};
use crate::toast::{Toast, ToastQueue, ToastTiming, ToastTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Success,
    Info,
    Warning,
    Unlock,
    Update,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Success => "success",
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
            NotificationType::Unlock => "unlock",
            NotificationType::Update => "update",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(NotificationType::Success),
            "info" => Some(NotificationType::Info),
            "warning" | "warn" => Some(NotificationType::Warning),
            "unlock" => Some(NotificationType::Unlock),
            "update" => Some(NotificationType::Update),
            _ => None,
        }
    }

    // Only these ever pop up as toasts
    pub fn shows_toast(&self) -> bool {
        matches!(self, NotificationType::Unlock | NotificationType::Update)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub time: String,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_letter: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Notification {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Caller-supplied part of a notification. Read state and timestamp are
/// always assigned by the center.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub id: Option<String>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub category_letter: Option<char>,
    pub version: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            title: title.into(),
            message: message.into(),
            category_letter: None,
            version: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn unlock(completed: char, unlocked: char, now: DateTime<Utc>) -> Self {
        let mut n = Self::new(
            NotificationType::Unlock,
            format!("Category {} unlocked!", unlocked),
            format!(
                "You completed category {} and unlocked category {}. Keep going!",
                completed, unlocked
            ),
        )
        .with_id(format!("unlock_{}_{}", unlocked, now.timestamp_millis()));
        n.category_letter = Some(unlocked);
        n
    }

    pub fn update(version: &str) -> Self {
        let mut n = Self::new(
            NotificationType::Update,
            "Update Available",
            format!("Version {} is now available.", version),
        )
        .with_id(format!("update-{}", version));
        n.version = Some(version.to_string());
        n
    }

    pub fn update_failed() -> Self {
        Self::new(
            NotificationType::Warning,
            "Update Failed",
            "Failed to install the update. Please try again later.",
        )
        .with_id("update-failed")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub push_enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { push_enabled: true }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub max_notifications: usize,
    pub toast_limit: usize,
    pub duplicate_window: Duration,
    pub toast_timing: ToastTiming,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_notifications: 50,
            toast_limit: 3,
            duplicate_window: Duration::milliseconds(5000),
            toast_timing: ToastTiming::default(),
        }
    }
}

/// Owns the persisted notification log, the push setting and the transient
/// toast queue.
pub struct NotificationCenter {
    store: SharedStore,
    clock: Rc<dyn Clock>,
    config: NotificationConfig,
    log: Vec<Notification>,
    settings: NotificationSettings,
    toasts: ToastQueue,
}

impl NotificationCenter {
    pub fn load(store: SharedStore, clock: Rc<dyn Clock>, config: NotificationConfig) -> Self {
        let mut log: Vec<Notification> = load_or_default(&*store, keys::NOTIFICATIONS, Vec::new());
        log.truncate(config.max_notifications);
        let settings = load_or_default(
            &*store,
            keys::NOTIFICATION_SETTINGS,
            NotificationSettings::default(),
        );
        let toasts = ToastQueue::new(config.toast_limit, config.toast_timing);
        Self {
            store,
            clock,
            config,
            log,
            settings,
            toasts,
        }
    }

    /// Records a notification unless an identical one (same type and title)
    /// arrived within the duplicate window. Returns the stored id, or `None`
    /// when the notification was dropped.
    pub fn add_notification(&mut self, input: NewNotification) -> Option<String> {
        let now = self.clock.now();
        if self.is_duplicate(&input, now) {
            debug!(kind = input.kind.as_str(), title = %input.title, "dropping duplicate notification");
            return None;
        }

        let notification = Notification {
            id: input
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| generate_id(now)),
            title: input.title,
            message: input.message,
            kind: input.kind,
            time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            is_read: false,
            category_letter: input.category_letter,
            version: input.version,
        };
        let id = notification.id.clone();
        info!(id = %id, kind = notification.kind.as_str(), "notification added");

        if notification.kind.shows_toast() && self.settings.push_enabled {
            self.toasts.push(notification.clone(), now);
        }

        self.log.insert(0, notification);
        self.log.truncate(self.config.max_notifications);
        self.persist_log();
        Some(id)
    }

    fn is_duplicate(&self, input: &NewNotification, now: DateTime<Utc>) -> bool {
        self.log.iter().any(|n| {
            n.kind == input.kind
                && n.title == input.title
                && n.created_at()
                    .map_or(false, |at| now - at < self.config.duplicate_window)
        })
    }

    pub fn mark_as_read(&mut self, id: &str) {
        let mut changed = false;
        for n in self.log.iter_mut().filter(|n| n.id == id && !n.is_read) {
            n.is_read = true;
            changed = true;
        }
        if changed {
            self.persist_log();
        }
    }

    pub fn mark_all_as_read(&mut self) {
        for n in &mut self.log {
            n.is_read = true;
        }
        self.persist_log();
    }

    /// Empties the log. Toasts already on screen run out on their own.
    pub fn clear_notifications(&mut self) {
        self.log.clear();
        self.persist_log();
    }

    pub fn remove_toast(&mut self, id: &str) {
        if self.toasts.remove(id) {
            debug!(id, "toast removed");
        }
    }

    pub fn dismiss_toast(&mut self, id: &str) {
        let now = self.clock.now();
        self.toasts.dismiss(id, now);
    }

    /// Advances the toast timers to the clock's current time.
    pub fn tick(&mut self) -> Vec<ToastTransition> {
        let now = self.clock.now();
        self.toasts.advance(now)
    }

    /// Cancels every pending toast timer; call when the session ends.
    pub fn shutdown(&mut self) {
        self.toasts.clear();
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.log
    }

    pub fn unread_count(&self) -> usize {
        self.log.iter().filter(|n| !n.is_read).count()
    }

    pub fn toasts(&self) -> &[Toast] {
        self.toasts.toasts()
    }

    pub fn next_toast_deadline(&self) -> Option<DateTime<Utc>> {
        self.toasts.next_deadline()
    }

    pub fn push_enabled(&self) -> bool {
        self.settings.push_enabled
    }

    pub fn set_push_enabled(&mut self, enabled: bool) {
        self.settings.push_enabled = enabled;
        save_json(&*self.store, keys::NOTIFICATION_SETTINGS, &self.settings);
    }

    fn persist_log(&self) {
        save_json(&*self.store, keys::NOTIFICATIONS, &self.log);
    }
}

impl UnlockListener for NotificationCenter {
    fn category_unlocked(&mut self, completed: char, unlocked: char) {
        let now = self.clock.now();
        self.add_notification(NewNotification::unlock(completed, unlocked, now));
    }
}

fn generate_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("notification_{}_{}", now.timestamp_millis(), suffix)
}

const TIME_INTERVALS: [(i64, &str); 5] = [
    (31_536_000, "year"),
    (2_592_000, "month"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
];

/// Coarse "how long ago" label: the largest unit that fits more than once.
pub fn format_time_ago(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(timestamp) else {
        return "just now".to_string();
    };
    let seconds = (now - then.with_timezone(&Utc)).num_milliseconds().div_euclid(1000);

    for (unit_seconds, unit) in TIME_INTERVALS {
        let interval = seconds as f64 / unit_seconds as f64;
        if interval > 1.0 {
            let count = interval.floor() as i64;
            let plural = if count == 1 { "" } else { "s" };
            return format!("{} {}{} ago", count, unit, plural);
        }
    }

    "just now".to_string()
}
