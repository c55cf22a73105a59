//! Cancellation signal shared between the CLI, the gate and every in-flight
//! plugin process.

use tokio::sync::watch;

/// Owning side; dropping it without triggering never cancels anything.
#[derive(Debug)]
pub struct InterruptTrigger {
    tx: watch::Sender<bool>,
}

/// Cheap, cloneable observer handed to workers.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: Option<watch::Receiver<bool>>,
}

/// Create a connected trigger/observer pair
pub fn channel() -> (InterruptTrigger, Interrupt) {
    let (tx, rx) = watch::channel(false);
    (InterruptTrigger { tx }, Interrupt { rx: Some(rx) })
}

impl InterruptTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Trigger on the first Ctrl-C
    pub fn spawn_ctrl_c(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping plugin invocations");
                self.trigger();
            }
        })
    }
}

impl Interrupt {
    /// An observer that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the interrupt fires; pends forever if it never can
    pub async fn triggered(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        // A trigger that was dropped after firing still reads `true` here
        if rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_observers() {
        let (trigger, interrupt) = channel();
        let observer = interrupt.clone();
        assert!(!observer.is_triggered());

        let waiter = tokio::spawn(async move { observer.triggered().await });
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("observer woke up")
            .unwrap();
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_fired_state_survives_dropped_trigger() {
        let (trigger, interrupt) = channel();
        trigger.trigger();
        drop(trigger);

        tokio::time::timeout(Duration::from_secs(1), interrupt.triggered())
            .await
            .expect("already fired");
    }

    #[tokio::test]
    async fn test_never_stays_pending() {
        let interrupt = Interrupt::never();
        let result = tokio::time::timeout(Duration::from_millis(50), interrupt.triggered()).await;
        assert!(result.is_err());
        assert!(!interrupt.is_triggered());
    }
}
