//! Timer Controller (C2).
//!
//! Each timer is a spawned task racing a `CancellationToken` against
//! `tokio::time::sleep`: if `stop` is called before expiry the sleep branch
//! never wins and the handler never fires; if expiry has already started,
//! `stop` is a no-op, matching §4.2's safety requirement without an extra
//! generation counter.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

pub type TimerId = u64;

pub struct TimerController<T: Send + 'static> {
    next_id: TimerId,
    tokens: HashMap<TimerId, CancellationToken>,
    tx: Sender<T>,
}

impl<T: Send + 'static> TimerController<T> {
    pub fn new(tx: Sender<T>) -> Self {
        TimerController {
            next_id: 1,
            tokens: HashMap::new(),
            tx,
        }
    }

    /// Starts a timer that, unless stopped first, sends `on_expiry` on the
    /// controller's event channel after `duration`.
    pub fn start(&mut self, duration: Duration, on_expiry: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        self.tokens.insert(id, token.clone());

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let _ = tx.send(on_expiry).await;
                }
            }
        });
        id
    }

    /// Stops a running timer. Idempotent: stopping an unknown or
    /// already-fired id is a no-op.
    pub fn stop(&mut self, id: TimerId) {
        if let Some(token) = self.tokens.remove(&id) {
            token.cancel();
        }
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.tokens.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stopped_timer_never_fires() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut ctrl = TimerController::new(tx);
        let id = ctrl.start(Duration::from_millis(50), "fired");
        ctrl.stop(id);

        let result = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(result.is_err(), "stopped timer must not send its event");
    }

    #[tokio::test]
    async fn unstopped_timer_fires() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut ctrl = TimerController::new(tx);
        ctrl.start(Duration::from_millis(10), "fired");

        let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert_eq!(result.unwrap(), Some("fired"));
    }
}
