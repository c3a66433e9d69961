use tokio::sync::broadcast;

/// A handle for stopping the background sweeper task.
/// Clones are connected; shutting one down shuts them all down.
#[derive(Debug, Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    /// Creates a new active shutdown.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    /// Signals every listener obtained from this shutdown or its clones.
    pub fn shut_down(&self) {
        // Send only fails when there are no listeners, which just means
        // nothing is running to be stopped.
        let _ = self.notify.send(());
    }

    /// Creates a listener that resolves once shutdown is signaled.
    pub fn listen(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.notify.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving end of a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownListener {
    receiver: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Waits for the shutdown signal.
    pub async fn wait(&mut self) {
        use tokio::sync::broadcast::error::RecvError;

        loop {
            match self.receiver.recv().await {
                Ok(()) | Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(_)) => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_listeners_notified() {
        let shutdown = Shutdown::new();
        let mut listeners = [shutdown.listen(), shutdown.listen(), shutdown.listen()];
        shutdown.clone().shut_down();
        for listener in listeners.iter_mut() {
            listener.wait().await;
        }
    }

    #[tokio::test]
    async fn listener_after_drop_of_sender_side() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listen();
        drop(shutdown);
        listener.wait().await;
    }
}
