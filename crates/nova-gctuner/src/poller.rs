use crate::runtime::{CollectionCallback, CycleNotifier};
use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Stand-in for a post-collection hook: treats every `interval` as one cycle.
///
/// For runtimes that cannot report collection completion. The cadence only
/// affects how quickly the tuner reacts, not what it computes.
pub struct IntervalNotifier {
    interval: Duration,
    notifier: Arc<CycleNotifier>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl IntervalNotifier {
    pub fn spawn(interval: Duration) -> io::Result<Self> {
        let notifier = Arc::new(CycleNotifier::new());
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("nova-gctuner-poll".to_string())
            .spawn({
                let notifier = notifier.clone();
                move || loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            notifier.collection_completed();
                        }
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        tracing::debug!(
            target = "nova.gctuner",
            interval_ms = interval.as_millis() as u64,
            "started interval collection notifier"
        );

        Ok(Self {
            interval,
            notifier,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn register(&self, callback: CollectionCallback) {
        self.notifier.register(callback);
    }

    pub fn pending(&self) -> usize {
        self.notifier.pending()
    }
}

impl std::fmt::Debug for IntervalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalNotifier")
            .field("interval", &self.interval)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for IntervalNotifier {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the worker immediately.
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            // The last reference may be dropped by a callback on the worker itself.
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}
