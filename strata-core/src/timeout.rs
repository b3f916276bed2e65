use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct CancelState {
    timed_out: AtomicBool,
    cancelled: AtomicBool,
}

/// Watchdog that force-cancels a stalled native statement.
///
/// Armed with a deadline and a callback holding the live native handle. If
/// the deadline fires before [`disarm`](Self::disarm) is called, the
/// callback runs exactly once and the `timed_out` flag is raised. The
/// `cancelled` flag is the single compare-and-swap guard both sides race
/// on, so disarm-after-expiry and fire-after-disarm are both no-ops.
#[derive(Debug, Clone)]
pub struct TimeoutCanceller {
    state: Arc<CancelState>,
    deadline: Option<Duration>,
}

impl TimeoutCanceller {
    /// A canceller that never fires, for calls without a timeout.
    pub fn inert() -> Self {
        Self {
            state: Arc::new(CancelState::default()),
            deadline: None,
        }
    }

    /// Arm the watchdog. A `None` or zero deadline never fires.
    pub fn arm(deadline: Option<Duration>, cancel: impl FnOnce() + Send + 'static) -> Self {
        let Some(deadline) = deadline.filter(|d| !d.is_zero()) else {
            return Self::inert();
        };
        let state = Arc::new(CancelState::default());
        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if shared
                .cancelled
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                shared.timed_out.store(true, Ordering::SeqCst);
                log::warn!("statement exceeded {:?}, force-cancelling", deadline);
                cancel();
            }
        });
        Self {
            state,
            deadline: Some(deadline),
        }
    }

    /// Disarm after the first result is observed. Permanent: once disarmed
    /// the callback can never fire.
    pub fn disarm(&self) {
        let _ = self
            .state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn timed_out(&self) -> bool {
        self.state.timed_out.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// Cooperative cancellation of a streaming read, checked between rows.
///
/// Independent of the timeout path: requesting it stops iteration early and
/// the partial result set already produced is kept, not discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    requested: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
