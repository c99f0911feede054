use crate::model::TypingState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Local debounced composing indicator.
///
/// Any input event flips the state to `Composing` and restarts the quiet
/// timer; once no input arrives for the quiet period the state falls back to
/// `Idle`. Purely client-local; nothing is broadcast to peers.
pub struct TypingSignal {
    inner: Arc<Inner>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    state: Mutex<TypingState>,
    generation: AtomicU64,
    quiet: Duration,
}

impl TypingSignal {
    pub fn new(quiet: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(TypingState::Idle),
                generation: AtomicU64::new(0),
                quiet,
            }),
            pending: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TypingState {
        *self.inner.state.lock()
    }

    /// Register an input event. Must run inside a tokio runtime.
    pub fn notify_input(&self) {
        // Invalidate any pending timeout before flipping state, so a timer
        // that already woke up cannot race us back to Idle.
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.state.lock() = TypingState::Composing;
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            sleep(inner.quiet).await;
            if inner.generation.load(Ordering::SeqCst) == generation {
                *inner.state.lock() = TypingState::Idle;
            }
        });
        if let Some(old) = self.pending.lock().replace(task) {
            old.abort();
        }
    }

    /// Cancel the pending timeout and return to Idle. Called on room switch
    /// and teardown so a stale transition cannot fire into another room's UI.
    pub fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
        *self.inner.state.lock() = TypingState::Idle;
    }
}

impl Drop for TypingSignal {
    fn drop(&mut self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_keystroke_times_out() {
        let signal = TypingSignal::new(Duration::from_millis(40));
        assert_eq!(signal.state(), TypingState::Idle);
        signal.notify_input();
        assert_eq!(signal.state(), TypingState::Composing);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(signal.state(), TypingState::Composing);
        sleep(Duration::from_millis(40)).await;
        assert_eq!(signal.state(), TypingState::Idle);
    }

    #[tokio::test]
    async fn repeated_input_restarts_the_quiet_period() {
        let signal = TypingSignal::new(Duration::from_millis(50));
        signal.notify_input();
        for _ in 0..3 {
            sleep(Duration::from_millis(25)).await;
            signal.notify_input();
        }
        // 75ms after the first keystroke, still within the restarted window
        assert_eq!(signal.state(), TypingState::Composing);
        sleep(Duration::from_millis(90)).await;
        assert_eq!(signal.state(), TypingState::Idle);
    }

    #[tokio::test]
    async fn cancel_suppresses_the_pending_transition() {
        let signal = TypingSignal::new(Duration::from_millis(30));
        signal.notify_input();
        signal.cancel();
        assert_eq!(signal.state(), TypingState::Idle);
        // a fresh keystroke after cancel still works
        signal.notify_input();
        assert_eq!(signal.state(), TypingState::Composing);
        sleep(Duration::from_millis(60)).await;
        assert_eq!(signal.state(), TypingState::Idle);
    }
}
