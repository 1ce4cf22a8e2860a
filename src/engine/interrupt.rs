// src/engine/interrupt.rs

//! Resettable wake signal shared by the host and both phase schedulers.
//!
//! Every [`Interrupt::interrupt`] bumps a generation counter on a
//! `tokio::sync::watch` channel. Each listener remembers the last generation it
//! saw, so firing wakes every current waiter exactly once and leaves the
//! channel armed for the next fire. A fire that lands while nobody is waiting
//! is seen by the next wait.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Sending side. Cheap to clone; hand copies to signal handlers and timers.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Wake whoever waits on a listener. Never cancels in-flight work.
    pub fn interrupt(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        debug!(generation = *self.tx.borrow(), "interrupt fired");
    }

    /// Number of times the interrupt has fired.
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> InterruptListener {
        InterruptListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side held by a phase scheduler.
#[derive(Debug)]
pub struct InterruptListener {
    rx: watch::Receiver<u64>,
}

impl InterruptListener {
    /// Resolve on the next fire not yet seen by this listener.
    ///
    /// Cancel safe. Never resolves once every [`Interrupt`] is dropped.
    pub async fn fired(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Forget fires that happened before now.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }

    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn fire_wakes_each_listener_once() {
        let interrupt = Interrupt::new();
        let mut a = interrupt.listener();
        let mut b = interrupt.listener();

        interrupt.interrupt();
        timeout(Duration::from_secs(1), a.fired()).await.unwrap();
        timeout(Duration::from_secs(1), b.fired()).await.unwrap();

        // Re-armed: no further wake until the next fire.
        assert!(timeout(Duration::from_millis(20), a.fired()).await.is_err());

        interrupt.interrupt();
        timeout(Duration::from_secs(1), a.fired()).await.unwrap();
        assert_eq!(interrupt.generation(), 2);
    }

    #[tokio::test]
    async fn waiting_listener_is_woken_from_another_task() {
        let interrupt = Interrupt::new();
        let mut listener = interrupt.listener();

        let remote = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.interrupt();
        });

        timeout(Duration::from_secs(1), listener.fired()).await.unwrap();
    }

    #[tokio::test]
    async fn mark_seen_drops_earlier_fires() {
        let interrupt = Interrupt::new();
        let mut listener = interrupt.listener();

        interrupt.interrupt();
        assert!(listener.has_pending());
        listener.mark_seen();
        assert!(!listener.has_pending());
        assert!(timeout(Duration::from_millis(20), listener.fired()).await.is_err());
    }
}
