//! # Pacing Metrics
//!
//! Tracks how refresh callbacks turn into simulation ticks and redraws over a
//! rolling time window, so the effective generation rate can be compared with
//! the display refresh rate.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Instant;
//! use lifeview::performance::PacingMonitor;
//!
//! let mut monitor = PacingMonitor::new();
//!
//! // In the refresh callback
//! monitor.record_refresh(Instant::now(), true);
//!
//! let metrics = monitor.metrics();
//! println!("{:.1} ticks/s", metrics.tick_rate);
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rates measured over the monitor's window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacingMetrics {
    /// Refresh callbacks per second
    pub callback_rate: f32,
    /// Simulation ticks per second
    pub tick_rate: f32,
    /// Redraws per second, including out-of-band ones
    pub redraw_rate: f32,
    /// Mean time between refresh callbacks in milliseconds
    pub callback_interval_ms: f32,
    /// Longest gap between refresh callbacks in the window
    pub max_callback_interval_ms: f32,
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    Refresh { ticked: bool },
    Redraw,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    at: Instant,
    kind: EventKind,
}

/// Rolling-window pacing monitor
#[derive(Debug)]
pub struct PacingMonitor {
    events: VecDeque<Event>,
    /// Events older than this are dropped
    window: Duration,
    /// Metrics are recomputed at most this often
    update_interval: Duration,
    last_update: Option<Instant>,
    current_metrics: PacingMetrics,
}

impl PacingMonitor {
    /// Two-second window, metrics refreshed ten times per second
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(2), Duration::from_millis(100))
    }

    pub fn with_window(window: Duration, update_interval: Duration) -> Self {
        Self {
            events: VecDeque::with_capacity(256),
            window,
            update_interval,
            last_update: None,
            current_metrics: PacingMetrics::default(),
        }
    }

    /// Records one refresh callback and whether it ticked (and therefore redrew)
    pub fn record_refresh(&mut self, now: Instant, ticked: bool) {
        self.push(now, EventKind::Refresh { ticked });
    }

    /// Records a redraw outside the refresh cadence, e.g. after a reset or resize
    pub fn record_redraw(&mut self, now: Instant) {
        self.push(now, EventKind::Redraw);
    }

    fn push(&mut self, now: Instant, kind: EventKind) {
        self.events.push_back(Event { at: now, kind });
        self.evict(now);

        let due = self
            .last_update
            .is_none_or(|last| now.saturating_duration_since(last) >= self.update_interval);
        if due {
            self.update_metrics();
            self.last_update = Some(now);
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.events.front() {
            if now.saturating_duration_since(front.at) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    fn update_metrics(&mut self) {
        let (Some(first), Some(last)) = (self.events.front(), self.events.back()) else {
            self.current_metrics = PacingMetrics::default();
            return;
        };
        let span = last.at.saturating_duration_since(first.at).as_secs_f32();

        let mut callbacks = 0u32;
        let mut ticks = 0u32;
        let mut redraws = 0u32;
        let mut previous_refresh: Option<Instant> = None;
        let mut max_interval = Duration::ZERO;

        for event in &self.events {
            match event.kind {
                EventKind::Refresh { ticked } => {
                    callbacks += 1;
                    if ticked {
                        ticks += 1;
                        redraws += 1;
                    }
                    if let Some(previous) = previous_refresh {
                        max_interval = max_interval.max(event.at.saturating_duration_since(previous));
                    }
                    previous_refresh = Some(event.at);
                }
                EventKind::Redraw => redraws += 1,
            }
        }

        // Rates need at least two samples to span any time
        let rate = |count: u32| {
            if span > 0.0 && count > 1 {
                (count - 1) as f32 / span
            } else {
                0.0
            }
        };

        self.current_metrics = PacingMetrics {
            callback_rate: rate(callbacks),
            tick_rate: if callbacks > 0 {
                rate(callbacks) * ticks as f32 / callbacks as f32
            } else {
                0.0
            },
            redraw_rate: rate(redraws),
            callback_interval_ms: if callbacks > 1 {
                span * 1000.0 / (callbacks - 1) as f32
            } else {
                0.0
            },
            max_callback_interval_ms: max_interval.as_secs_f32() * 1000.0,
        };

        log::trace!(
            "pacing: {:.1} callbacks/s, {:.1} ticks/s",
            self.current_metrics.callback_rate,
            self.current_metrics.tick_rate
        );
    }

    /// Most recently computed metrics
    pub fn metrics(&self) -> &PacingMetrics {
        &self.current_metrics
    }

    /// Short human-readable summary, used in the window title
    pub fn summary(&self) -> String {
        format!(
            "{:.0} Hz, {:.1} gen/s",
            self.current_metrics.callback_rate, self.current_metrics.tick_rate
        )
    }

    /// Forget all history, e.g. after the scheduler stops
    pub fn reset(&mut self) {
        self.events.clear();
        self.current_metrics = PacingMetrics::default();
        self.last_update = None;
    }
}

impl Default for PacingMonitor {
    fn default() -> Self {
        Self::new()
    }
}
