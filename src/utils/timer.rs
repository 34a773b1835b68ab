//! Stage timing

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Timer for measuring execution time of a pipeline stage
#[derive(Debug)]
pub struct Timer {
    name: String,
    start: Instant,
    checkpoints: Vec<(String, Duration)>,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            checkpoints: Vec::new(),
        }
    }

    /// Record a named checkpoint
    pub fn checkpoint(&mut self, name: impl Into<String>) {
        let name = name.into();
        let elapsed = self.start.elapsed();
        debug!(
            timer = %self.name,
            checkpoint = %name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Checkpoint reached"
        );
        self.checkpoints.push((name, elapsed));
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn checkpoints(&self) -> &[(String, Duration)] {
        &self.checkpoints
    }

    /// Stop and log the timer
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!(
            timer = %self.name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            checkpoints = self.checkpoints.len(),
            "Stage completed"
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_are_monotonic() {
        let mut timer = Timer::start("fit");
        timer.checkpoint("split");
        timer.checkpoint("encode");

        let marks = timer.checkpoints().to_vec();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].0, "split");
        assert!(marks[0].1 <= marks[1].1);
        assert!(timer.stop() >= marks[1].1);
    }
}
