//! Cooperative cancellation, polled at the two points a long-running optimization
//! can stop promptly without true task cancellation: before each iteration starts,
//! and between generating and judging a sample within a batch.

/// A predicate checked at each cooperative cancellation point.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> Cancellation for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Never cancels. The default for callers that don't need cooperative cancellation.
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}
