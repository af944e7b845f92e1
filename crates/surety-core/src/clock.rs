use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time source for challenge deadlines and withdrawal cooldowns.
///
/// Deadlines are plain stored timestamps compared lazily against this clock
/// at the moment a dependent operation runs — there is no background sweeper.
/// `Manual` exists so tests and the simulator can advance time explicitly.
#[derive(Clone)]
pub enum Clock {
    System,
    Manual(Arc<AtomicU64>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    /// A manually driven clock starting at `start` (unix seconds).
    pub fn manual(start: u64) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start)))
    }

    pub fn now_secs(&self) -> u64 {
        match self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            Clock::Manual(t) => t.load(Ordering::SeqCst),
        }
    }

    /// Advance a manual clock. No effect on the system clock.
    pub fn advance(&self, secs: u64) {
        if let Clock::Manual(t) = self {
            t.fetch_add(secs, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = Clock::manual(1_000);
        assert_eq!(clock.now_secs(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_secs(), 1_500);
    }

    #[test]
    fn clones_share_the_same_time() {
        let clock = Clock::manual(10);
        let other = clock.clone();
        clock.advance(5);
        assert_eq!(other.now_secs(), 15);
    }
}
