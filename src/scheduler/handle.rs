//! Handle to the running tick loop.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Controls one spawned tick loop.
///
/// Dropping the handle also ends the loop, since the loop treats a closed
/// shutdown channel as a stop request.
pub(crate) struct TickerHandle {
    pub(crate) shutdown_tx: oneshot::Sender<()>,
    pub(crate) task: JoinHandle<()>,
}

impl TickerHandle {
    /// Ask the loop to stop before its next tick.
    ///
    /// Does not wait for the loop task or for in-flight jobs.
    pub(crate) fn stop(self) {
        // The loop may already have exited; nothing to do then.
        let _ = self.shutdown_tx.send(());
        drop(self.task);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
