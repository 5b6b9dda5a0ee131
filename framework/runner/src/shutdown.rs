use crate::executor::Executor;
use gale_core::prelude::ShutdownHandle;
use std::future::Future;
use tokio::signal;

/// Stop the run when the user presses Ctrl-C.
///
/// Only the stop signal is sent, so in-flight iterations still get the graceful stop budget to
/// finish and the run is reported as usual.
pub(crate) fn start_shutdown_listener(executor: &Executor, stop_handle: ShutdownHandle) {
    start_stop_on(executor, stop_handle, signal::ctrl_c());
}

/// Fire `stop_handle` once `signal` resolves. The task only holds the stop handle.
fn start_stop_on(
    executor: &Executor,
    stop_handle: ShutdownHandle,
    signal: impl Future<Output = std::io::Result<()>> + Send + 'static,
) {
    executor.spawn(async move {
        match signal.await {
            Ok(()) => {
                println!("Received shutdown signal, stopping...");
                stop_handle.shutdown();
            }
            Err(e) => {
                log::error!("Failed to listen for Ctrl-C: {e}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn signal_fires_stop() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let executor = Executor::new(runtime, ShutdownHandle::new());
        let stop = ShutdownHandle::new();

        start_stop_on(&executor, stop.clone(), async { Ok(()) });

        let mut listener = stop.new_listener();
        let stopped = executor
            .execute_in_place(async move {
                tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown()).await
            })
            .unwrap();
        assert!(stopped.is_ok());
        assert!(stop.is_shutdown());
    }

    #[test]
    fn failing_to_listen_leaves_the_run_going() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let executor = Executor::new(runtime, ShutdownHandle::new());
        let stop = ShutdownHandle::new();

        start_stop_on(&executor, stop.clone(), async {
            Err(std::io::Error::other("no signal handler"))
        });

        executor
            .execute_in_place(async { tokio::time::sleep(Duration::from_millis(50)).await })
            .unwrap();
        assert!(!stop.is_shutdown());
    }
}
