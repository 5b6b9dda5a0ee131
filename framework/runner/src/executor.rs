use std::future::Future;
use std::time::Duration;

use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};

/// Runs the async work of virtual users on a shared Tokio runtime.
///
/// Each virtual user has its own thread and blocks it while its request is in flight, so the
/// requests of one virtual user never overlap.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    abandon_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, abandon_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            abandon_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is dropped, and [ShutdownSignalError] returned, if in-flight work is abandoned
    /// because the graceful stop budget has been used up.
    pub fn execute_in_place<T>(&self, fut: impl Future<Output = T>) -> Result<T, ShutdownSignalError> {
        let mut abandon_listener = self.abandon_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => Ok(result),
                _ = abandon_listener.wait_for_shutdown() => {
                    Err(ShutdownSignalError::default())
                },
            }
        })
    }

    /// Sleep for `duration` unless one of the listeners, or the abandon signal, fires first.
    ///
    /// Returns true if the full duration was slept.
    pub fn pause(
        &self,
        duration: Duration,
        mut first: DelegatedShutdownListener,
        mut second: DelegatedShutdownListener,
    ) -> bool {
        if duration.is_zero() {
            return !(first.should_shutdown() || second.should_shutdown());
        }

        self.execute_in_place(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => true,
                _ = first.wait_for_shutdown() => false,
                _ = second.wait_for_shutdown() => false,
            }
        })
        .unwrap_or(false)
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandon_handle.is_shutdown()
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled when the run ends and the runner will not wait for it.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}
