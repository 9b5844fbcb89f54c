//! Transient notifications with explicit expiry.
//!
//! The TTL is fixed per queue, so insertion order is also expiry order and
//! sweeping only ever pops from the front.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fera_common::ToastKind;
use serde::Serialize;

pub const DEFAULT_TOAST_TTL: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: ToastKind,
    #[serde(skip)]
    pub expires_at: Instant,
}

impl Toast {
    pub fn is_visible_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct ToastQueue {
    ttl: Duration,
    entries: VecDeque<Toast>,
}

impl ToastQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: VecDeque::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn add(&mut self, title: &str, message: &str, kind: ToastKind) -> String {
        self.add_at(Instant::now(), title, message, kind)
    }

    pub fn add_at(&mut self, now: Instant, title: &str, message: &str, kind: ToastKind) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.entries.push_back(Toast {
            id: id.clone(),
            title: title.to_string(),
            message: message.to_string(),
            kind,
            expires_at: now + self.ttl,
        });
        id
    }

    pub fn active(&self) -> Vec<Toast> {
        self.active_at(Instant::now())
    }

    /// Entries still visible at `now`, oldest first.
    pub fn active_at(&self, now: Instant) -> Vec<Toast> {
        self.entries
            .iter()
            .filter(|t| t.is_visible_at(now))
            .cloned()
            .collect()
    }

    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Drop expired entries and return how many were removed.
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(front) = self.entries.front() {
            if front.is_visible_at(now) {
                break;
            }
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_TTL)
    }
}
