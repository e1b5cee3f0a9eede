//! Supervised background tasks
//!
//! Panics are recovered and the task restarts after a short back-off; a
//! process-wide shutdown signal stops the supervisor and aborts the task.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

const RESTART_BACKOFF: Duration = Duration::from_millis(500);

/// Run `task` in the background until it completes. A panicking run is
/// logged and restarted after the back-off; a clean return ends the
/// supervisor. `shutdown` aborts the current run.
pub fn spawn_supervised<F, Fut>(name: &'static str, mut shutdown: watch::Receiver<bool>, task: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let mut handle = tokio::spawn(task());
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(task = name, "shutdown signal received, aborting background task");
                    handle.abort();
                    return;
                }
                result = &mut handle => {
                    match result {
                        Ok(()) => return,
                        Err(err) if err.is_panic() => {
                            error!(task = name, error = %err, "background task panicked, restarting");
                            tokio::time::sleep(RESTART_BACKOFF).await;
                        }
                        Err(_) => return,
                    }
                }
            }
        }
    });
}

/// Create the process-wide shutdown channel. Send `true` to stop all
/// supervised tasks.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn panicking_task_is_restarted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = shutdown_channel();

        let counter = attempts.clone();
        spawn_supervised("flaky", rx, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_task_is_not_restarted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = shutdown_channel();

        let counter = attempts.clone();
        spawn_supervised("oneshot", rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_running_task() {
        let finished = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = shutdown_channel();

        let counter = finished.clone();
        spawn_supervised("longrun", rx, move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
