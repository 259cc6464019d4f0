/*
 * stats.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render bookkeeping and the read-only statistics snapshot.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::options::RenderOptions;

/// How a render produced its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    /// Scanned, compiled and executed from source.
    Full,
    /// Re-executed the compiled body against the current scope.
    Partial,
    /// Returned the previous output unchanged.
    Static,
}

impl RenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderType::Full => "full",
            RenderType::Partial => "partial",
            RenderType::Static => "static",
        }
    }

    /// One-letter tag used in compact logs.
    pub fn tag(self) -> char {
        match self {
            RenderType::Full => 'f',
            RenderType::Partial => 'p',
            RenderType::Static => 's',
        }
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderTime {
    pub duration: Duration,
    pub render_type: RenderType,
}

/// Mutable render history of one template.
#[derive(Debug, Clone, Default)]
pub struct RenderHistory {
    last_full: Option<Instant>,
    last_full_at: Option<SystemTime>,
    last_render_at: Option<SystemTime>,
    last_render_type: Option<RenderType>,
    full: u64,
    partial: u64,
    fixed: u64,
    times: Vec<RenderTime>,
}

impl RenderHistory {
    pub fn record(&mut self, render_type: RenderType, started: Instant, duration: Duration) {
        let now = SystemTime::now();
        match render_type {
            RenderType::Full => {
                self.full += 1;
                self.last_full = Some(started);
                self.last_full_at = Some(now);
            }
            RenderType::Partial => self.partial += 1,
            RenderType::Static => self.fixed += 1,
        }
        self.last_render_at = Some(now);
        self.last_render_type = Some(render_type);
        self.times.push(RenderTime {
            duration,
            render_type,
        });
    }

    pub fn has_full_render(&self) -> bool {
        self.last_full.is_some()
    }

    /// Time since the start of the last full render.
    pub fn since_full(&self, now: Instant) -> Option<Duration> {
        self.last_full.map(|t| now.saturating_duration_since(t))
    }

    /// Forget the last full render so the next render starts from source.
    pub fn invalidate(&mut self) {
        self.last_full = None;
    }

    pub fn last_render_type(&self) -> Option<RenderType> {
        self.last_render_type
    }

    pub fn count(&self, render_type: RenderType) -> u64 {
        match render_type {
            RenderType::Full => self.full,
            RenderType::Partial => self.partial,
            RenderType::Static => self.fixed,
        }
    }

    pub fn times(&self) -> &[RenderTime] {
        &self.times
    }
}

/// Statistics snapshot of one template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateStats {
    pub path: String,
    pub fingerprint: String,
    pub created_at_ms: u64,
    pub lifetime: Duration,
    pub last_full_render_ms: Option<u64>,
    pub last_render_ms: Option<u64>,
    pub last_render_type: Option<RenderType>,
    pub full_renders: u64,
    pub partial_renders: u64,
    pub static_renders: u64,
    pub last_render_duration: Option<Duration>,
    pub render_times: Vec<RenderTime>,
    pub render_options: RenderOptions,
}

impl TemplateStats {
    pub fn new(
        path: String,
        fingerprint: String,
        created_at: SystemTime,
        history: &RenderHistory,
        render_options: RenderOptions,
    ) -> Self {
        Self {
            path,
            fingerprint,
            created_at_ms: epoch_ms(created_at),
            lifetime: created_at.elapsed().unwrap_or_default(),
            last_full_render_ms: history.last_full_at.map(epoch_ms),
            last_render_ms: history.last_render_at.map(epoch_ms),
            last_render_type: history.last_render_type,
            full_renders: history.full,
            partial_renders: history.partial,
            static_renders: history.fixed,
            last_render_duration: history.times.last().map(|t| t.duration),
            render_times: history.times.clone(),
            render_options,
        }
    }

    pub fn total_renders(&self) -> u64 {
        self.full_renders + self.partial_renders + self.static_renders
    }
}

pub fn epoch_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_counts_and_order() {
        let mut history = RenderHistory::default();
        let start = Instant::now();
        history.record(RenderType::Full, start, Duration::from_millis(3));
        history.record(RenderType::Partial, start, Duration::from_millis(1));
        history.record(RenderType::Static, start, Duration::ZERO);

        assert_eq!(history.count(RenderType::Full), 1);
        assert_eq!(history.count(RenderType::Partial), 1);
        assert_eq!(history.count(RenderType::Static), 1);
        assert_eq!(history.last_render_type(), Some(RenderType::Static));
        let kinds: Vec<char> = history.times().iter().map(|t| t.render_type.tag()).collect();
        assert_eq!(kinds, vec!['f', 'p', 's']);
    }

    #[test]
    fn test_invalidate_forgets_full_render() {
        let mut history = RenderHistory::default();
        history.record(RenderType::Full, Instant::now(), Duration::ZERO);
        assert!(history.has_full_render());
        history.invalidate();
        assert!(!history.has_full_render());
        assert_eq!(history.count(RenderType::Full), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut history = RenderHistory::default();
        history.record(RenderType::Full, Instant::now(), Duration::from_millis(2));
        let stats = TemplateStats::new(
            "page.html".to_string(),
            "abc".to_string(),
            SystemTime::now(),
            &history,
            RenderOptions::default(),
        );
        assert_eq!(stats.total_renders(), 1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["last_render_type"], "full");
        assert_eq!(json["render_options"]["style"], "compressed");
    }
}
