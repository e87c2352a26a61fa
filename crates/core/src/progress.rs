//! Cooperative progress reporting and cancellation.
//!
//! The algorithms in demflow are single-threaded and sequential; a host that
//! wants a progress bar or a cancel button supplies a [`Progress`]
//! implementation, which the algorithms call between outer-loop iterations
//! (per row, per priority-queue batch, per routing pass). Returning `false`
//! from [`Progress::update`] aborts the running algorithm with
//! [`Error::Cancelled`](crate::Error::Cancelled); the algorithm discards its
//! partial state.

/// Host callback for progress display and cancellation.
pub trait Progress {
    /// Report that `done` of `total` work units are complete. `total` is 0
    /// when the amount of work is not known up front (iterative solvers).
    ///
    /// Returns `true` to continue, `false` to request cancellation.
    fn update(&mut self, done: usize, total: usize) -> bool;
}

/// The default sink: reports nothing, never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {
    fn update(&mut self, _done: usize, _total: usize) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_never_cancels() {
        let mut p = Silent;
        assert!(p.update(0, 100));
        assert!(p.update(100, 100));
    }

    #[test]
    fn test_custom_sink_sees_updates() {
        struct Counter {
            calls: usize,
            limit: usize,
        }
        impl Progress for Counter {
            fn update(&mut self, _done: usize, _total: usize) -> bool {
                self.calls += 1;
                self.calls < self.limit
            }
        }

        let mut p = Counter { calls: 0, limit: 3 };
        assert!(p.update(1, 10));
        assert!(p.update(2, 10));
        assert!(!p.update(3, 10));
        assert_eq!(p.calls, 3);
    }
}
