use std::time::{Duration, Instant};

/// Wall-clock deadline fixed once when a collector starts. A budget too large
/// to represent never expires.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self { at: Instant::now().checked_add(budget) }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn remaining(&self) -> Duration {
        self.at.map_or(Duration::MAX, |at| at.saturating_duration_since(Instant::now()))
    }
}

/// Placeholder used wherever a value is not applicable.
pub const NOT_APPLICABLE: &str = "-";

/// Render an elapsed time the way reports show it, e.g. `12.34s`.
pub fn format_runtime(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
