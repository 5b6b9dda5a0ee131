use tokio::sync::watch::{Receiver, Sender};

/// A latched signal. Once [ShutdownHandle::shutdown] has been called, every listener created from
/// this handle, before or after the call, observes the signal.
///
/// The runner uses several of these: one to stop virtual users starting new iterations, one to
/// abandon in-flight requests once the graceful stop budget is spent, one per virtual user to
/// retire it when the target count falls, and one to stop the background threads at the end.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::watch::channel(false).0,
        }
    }

    pub fn shutdown(&self) {
        let changed = self.sender.send_if_modified(|triggered| {
            let was_triggered = *triggered;
            *triggered = true;
            !was_triggered
        });

        if !changed {
            log::trace!("Shutdown signal was already sent");
        }
    }

    /// Point in time check on the handle itself, without needing a listener.
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been sent. If this returns true then work
    /// should be stopped.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. Returns immediately if it has already been sent. It is safe
    /// to race this with another future so that the signal can be used to cancel other work in
    /// progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|triggered| *triggered).await.is_err() {
            // Every handle has been dropped, so the signal can never arrive.
            futures::future::pending::<()>().await;
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}
