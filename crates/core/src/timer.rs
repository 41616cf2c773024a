//! Turn forfeiture timer
//!
//! Some games (checkers) forfeit a player who sits on their turn too
//! long. The timer is rearmed on every successful turn and cancelled
//! when the session closes; a fired timer routes through the same
//! per-session lock as player actions, so it can never race a
//! late-arriving legal move. Staleness is detected by the session's
//! turn epoch, checked by the callback itself.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

pub struct TurnTimer {
    timeout: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TurnTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            handle: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arm the timer, aborting any previous arming. `on_fire` runs
    /// after the timeout elapses uninterrupted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn rearm<F>(&self, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            on_fire.await;
        });
        let mut handle = self.handle.lock().expect("timer lock poisoned");
        if let Some(previous) = handle.replace(task) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(task) = self.handle.lock().expect("timer lock poisoned").take() {
            task.abort();
        }
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
