use eframe::egui;
use egui_notify::{Anchor, Toast, Toasts};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Toast wrapper with short-window deduplication, so a failing generator
/// that is clicked twice does not stack identical error toasts.
pub struct NotificationManager {
    toasts: Toasts,
    recent: Vec<(String, Instant)>,
    dedup_window: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        let toasts = Toasts::new()
            .with_anchor(Anchor::TopRight)
            .with_margin(egui::vec2(8.0, 8.0));
        Self {
            toasts,
            recent: Vec::new(),
            dedup_window: Duration::from_secs(2),
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        if self.is_duplicate(&message) {
            return;
        }
        self.recent.push((message.clone(), Instant::now()));

        let mut toast = match level {
            NotificationLevel::Info => Toast::info(&message),
            NotificationLevel::Error => Toast::error(&message),
        };
        toast.duration(Some(match level {
            NotificationLevel::Info => Duration::from_secs(3),
            NotificationLevel::Error => Duration::from_secs(8),
        }));
        self.toasts.add(toast);
    }

    fn is_duplicate(&mut self, message: &str) -> bool {
        let now = Instant::now();
        self.recent
            .retain(|(_, at)| now.duration_since(*at) < Duration::from_secs(60));
        self.recent
            .iter()
            .any(|(msg, at)| msg == message && now.duration_since(*at) < self.dedup_window)
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }

    /// Call once per frame.
    pub fn render(&mut self, ctx: &egui::Context) {
        self.toasts.show(ctx);
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
