// src/progress.rs
// =============================================================================
// Progress reporting for an extraction run.
//
// The run pushes ProgressEvents into an unbounded channel; whoever listens
// (the CLI's log task) consumes them at its own pace, so a slow consumer
// never holds up the crawl.
//
// Percentages within a run never go down and always stay in [0, 100]. The
// processing phase uses a logarithmic curve: the first pages move the bar
// visibly, and the bar slows down towards the end instead of sitting at 95%
// while half the work is still left.
//
// Rust concepts used:
// - tokio::sync::mpsc::UnboundedSender: send() never awaits, so reporting
//   works from sync code
// - Option<Sender>: a run without a listener just skips the send
// - `impl Into<String>` parameters: callers pass &str or String alike
// - Float-to-int `as` casts saturate, and the result is clamped anyway
// =============================================================================

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    Discovering,
    Processing,
    Finalizing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub percentage: u8,
    pub message: String,
}

/// Maps `current / total` onto `[start, end]` along log10(1 + 9x).
///
/// x = 0 gives `start`, x = 1 gives `end`. Counts beyond `total` are treated
/// as complete. An unknown (zero) total yields `start`.
pub fn percentage(current: usize, total: usize, start: u8, end: u8) -> u8 {
    // Keep both bounds in [0, 100] and end >= start
    let (start, end) = (start.min(100), end.min(100).max(start.min(100)));
    if total == 0 {
        return start;
    }
    let ratio = (current as f64 / total as f64).clamp(0.0, 1.0);
    // 0.0 at ratio 0, 1.0 at ratio 1
    let curve = (1.0 + 9.0 * ratio).log10();
    let value = f64::from(start) + f64::from(end - start) * curve;
    (value.floor() as u8).clamp(start, end)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub phase: Phase,
    pub processed: usize,
    pub estimated_total: usize,
    pub percentage: u8,
}

// Owns the sending half of the channel for one run
#[derive(Debug)]
pub struct ProgressTracker {
    sink: Option<UnboundedSender<ProgressEvent>>,
    state: ProgressState,
    // [start, end] of the current processing phase
    range: (u8, u8),
}

impl ProgressTracker {
    pub fn new(sink: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            sink,
            state: ProgressState {
                phase: Phase::Initializing,
                processed: 0,
                estimated_total: 0,
                percentage: 0,
            },
            range: (0, 100),
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Emits an event, holding the percentage at or above the last one
    pub fn report(&mut self, phase: Phase, percentage: u8, message: impl Into<String>) {
        // A failure freezes the bar where it was
        let percentage = match phase {
            Phase::Failed => self.state.percentage,
            _ => percentage.min(100).max(self.state.percentage),
        };
        self.state.phase = phase;
        self.state.percentage = percentage;

        let event = ProgressEvent {
            phase,
            percentage,
            message: message.into(),
        };
        tracing::debug!(phase = ?event.phase, percentage, "{}", event.message);
        if let Some(sink) = &self.sink {
            // The listener going away must not stop the run
            let _ = sink.send(event);
        }
    }

    /// Starts the processing phase over `[start, end]` for `total` items
    pub fn begin_processing(&mut self, total: usize, start: u8, end: u8, message: impl Into<String>) {
        self.range = (start, end);
        self.state.processed = 0;
        self.state.estimated_total = total;
        self.report(Phase::Processing, start, message);
    }

    /// Counts one processed item and reports the curve position
    pub fn advance(&mut self, message: impl Into<String>) {
        self.state.processed += 1;
        let (start, end) = self.range;
        let pct = percentage(self.state.processed, self.state.estimated_total, start, end);
        self.report(Phase::Processing, pct, message);
    }

    pub fn complete(&mut self, message: impl Into<String>) {
        self.report(Phase::Completed, 100, message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.report(Phase::Failed, 0, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_curve_endpoints() {
        assert_eq!(percentage(0, 10, 10, 85), 10);
        assert_eq!(percentage(10, 10, 10, 85), 85);
        assert_eq!(percentage(25, 10, 10, 85), 85);
    }

    #[test]
    fn test_curve_front_loads_progress() {
        // log10(1 + 9 * 0.1) = log10(1.9) ~ 0.2788 -> 10 + 75 * 0.2788 = 30.9
        assert_eq!(percentage(1, 10, 10, 85), 30);
        // halfway through the work is well past halfway on the bar
        assert!(percentage(5, 10, 0, 100) > 70);
    }

    #[test]
    fn test_unknown_total_gives_start() {
        assert_eq!(percentage(3, 0, 15, 85), 15);
    }

    #[test]
    fn test_curve_is_monotonic() {
        let mut last = 0;
        for i in 0..=200 {
            let p = percentage(i, 200, 10, 85);
            assert!(p >= last);
            assert!((10..=85).contains(&p));
            last = p;
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_tracker_never_goes_backwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(Some(tx));
        tracker.report(Phase::Initializing, 2, "init");
        tracker.report(Phase::Discovering, 8, "sitemap");
        tracker.report(Phase::Processing, 12, "crawl");
        tracker.begin_processing(50, 10, 85, "processing");
        tracker.advance("page 1");
        tracker.report(Phase::Finalizing, 250, "too far");

        let pcts: Vec<u8> = drain(&mut rx).iter().map(|e| e.percentage).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{pcts:?}");
        assert_eq!(*pcts.last().unwrap(), 100);
        assert_eq!(pcts[3], 12);
    }

    #[test]
    fn test_failure_holds_last_value() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(Some(tx));
        tracker.report(Phase::Processing, 40, "working");
        tracker.fail("boom");

        let events = drain(&mut rx);
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Failed);
        assert_eq!(last.percentage, 40);
        assert_eq!(tracker.state().phase, Phase::Failed);
    }

    #[test]
    fn test_dropped_listener_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut tracker = ProgressTracker::new(Some(tx));
        tracker.complete("done");
        assert_eq!(tracker.state().percentage, 100);
    }
}
