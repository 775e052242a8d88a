//! Toast notifications

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

use crate::error::{ErrorKind, RtmError};

const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Success => write!(f, "success"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Set for notifications raised from an [`RtmError`]
    pub cause: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
}

/// Bounded queue of notifications; the oldest entry is dropped when full
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    queue: VecDeque<Notification>,
    capacity: usize,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NotificationCenter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.enqueue(Notification {
            level,
            message: message.into(),
            cause: None,
            created_at: Utc::now(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Warning, message);
    }

    /// Raises an error toast carrying the error's kind
    pub fn error(&mut self, err: &RtmError) {
        log::warn!("{}", err);
        self.enqueue(Notification {
            level: NotificationLevel::Error,
            message: err.to_string(),
            cause: Some(err.kind()),
            created_at: Utc::now(),
        });
    }

    fn enqueue(&mut self, notification: Notification) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(notification);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns everything queued so far
    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    /// Drops notifications older than `max_age`
    pub fn expire(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) {
        self.queue.retain(|n| now - n.created_at < max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceOp;

    #[test]
    fn test_error_carries_kind() {
        let mut center = NotificationCenter::default();
        center.error(&RtmError::ServiceRejected {
            op: ServiceOp::Create,
            reason: "quota".into(),
        });
        let n = center.drain().pop().unwrap();
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.cause, Some(ErrorKind::Rejected));
        assert_eq!(n.message, "Create rejected: quota");
        assert!(center.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut center = NotificationCenter::with_capacity(2);
        center.info("one");
        center.info("two");
        center.success("three");
        let messages: Vec<&str> = center.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_expire() {
        let mut center = NotificationCenter::default();
        center.warning("stale");
        let later = Utc::now() + chrono::Duration::seconds(10);
        center.expire(later, chrono::Duration::seconds(5));
        assert_eq!(center.len(), 0);
    }
}
