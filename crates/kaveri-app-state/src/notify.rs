//! Transient notifications. Every timer is a deadline compared against an
//! injected `now`, so nothing here spawns tasks.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// How long a toast stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastLifetime {
    /// Role and suspension results.
    Short,
    #[default]
    Standard,
}

impl ToastLifetime {
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::seconds(1),
            Self::Standard => Duration::seconds(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Notifications {
    next_id: u64,
    toasts: Vec<Toast>,
}

impl Notifications {
    pub fn push(
        &mut self,
        level: ToastLevel,
        message: impl Into<String>,
        lifetime: ToastLifetime,
        now: DateTime<Utc>,
    ) -> u64 {
        self.expire(now);
        self.next_id += 1;
        self.toasts.push(Toast {
            id: self.next_id,
            level,
            message: message.into(),
            expires_at: now + lifetime.duration(),
        });
        self.next_id
    }

    pub fn success(
        &mut self,
        message: impl Into<String>,
        lifetime: ToastLifetime,
        now: DateTime<Utc>,
    ) -> u64 {
        self.push(ToastLevel::Success, message, lifetime, now)
    }

    pub fn error(
        &mut self,
        message: impl Into<String>,
        lifetime: ToastLifetime,
        now: DateTime<Utc>,
    ) -> u64 {
        self.push(ToastLevel::Error, message, lifetime, now)
    }

    /// Toasts whose deadline has not passed.
    pub fn visible(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Toast> {
        self.toasts.iter().filter(move |toast| toast.expires_at > now)
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.last()
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|toast| toast.id != id);
    }

    /// Drops expired toasts and returns how many were removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at > now);
        before - self.toasts.len()
    }

    /// Hands every pending toast to the caller, oldest first.
    pub fn drain(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

/// A flag that reads true until a deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimedIndicator {
    until: Option<DateTime<Utc>>,
}

impl TimedIndicator {
    pub fn show(&mut self, now: DateTime<Utc>, for_duration: Duration) {
        self.until = Some(now + for_duration);
    }

    #[must_use]
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0)
            .single()
            .expect("valid time")
    }

    #[test]
    fn short_toasts_close_after_one_second() {
        let mut notifications = Notifications::default();
        notifications.success("User successfully suspended!", ToastLifetime::Short, t0());
        assert_eq!(notifications.visible(t0()).count(), 1);
        assert_eq!(
            notifications
                .visible(t0() + Duration::milliseconds(999))
                .count(),
            1
        );
        assert_eq!(notifications.visible(t0() + Duration::seconds(1)).count(), 0);
    }

    #[test]
    fn standard_toasts_last_five_seconds() {
        let mut notifications = Notifications::default();
        notifications.error("Failed to update letter status.", ToastLifetime::Standard, t0());
        assert_eq!(notifications.expire(t0() + Duration::seconds(4)), 0);
        assert_eq!(notifications.expire(t0() + Duration::seconds(5)), 1);
        assert!(notifications.is_empty());
    }

    #[test]
    fn ids_increase_and_dismiss_removes_one() {
        let mut notifications = Notifications::default();
        let first = notifications.success("a", ToastLifetime::Standard, t0());
        let second = notifications.error("b", ToastLifetime::Standard, t0());
        assert!(second > first);
        notifications.dismiss(first);
        assert_eq!(notifications.latest().map(|toast| toast.id), Some(second));
        assert_eq!(notifications.drain().len(), 1);
        assert!(notifications.is_empty());
    }

    #[test]
    fn pushing_prunes_closed_toasts() {
        let mut notifications = Notifications::default();
        notifications.success("User successfully verified!", ToastLifetime::Short, t0());
        notifications.error("Failed to update letter status.", ToastLifetime::Standard, t0());
        let later = t0() + Duration::seconds(2);
        let id = notifications.success("User successfully blocked!", ToastLifetime::Short, later);

        let drained = notifications.drain();
        let kept: Vec<&str> = drained.iter().map(|toast| toast.message.as_str()).collect();
        assert_eq!(kept, vec!["Failed to update letter status.", "User successfully blocked!"]);
        assert_eq!(id, 3);
    }

    #[test]
    fn indicator_hides_at_deadline() {
        let mut indicator = TimedIndicator::default();
        assert!(!indicator.is_visible(t0()));
        indicator.show(t0(), Duration::seconds(3));
        assert!(indicator.is_visible(t0() + Duration::seconds(2)));
        assert!(!indicator.is_visible(t0() + Duration::seconds(3)));
        indicator.show(t0(), Duration::seconds(3));
        indicator.clear();
        assert!(!indicator.is_visible(t0()));
    }
}
