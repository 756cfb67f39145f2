use tokio::task::JoinHandle;

/// Owns the background tasks of one socket connection
pub struct TaskManager {
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn a task and track it
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(future));
    }

    /// Tasks spawned and not yet finished
    pub fn live(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort all tracked tasks and wait for them to finish
    pub async fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
            // aborted tasks report a cancellation error
            let _ = handle.await;
        }
    }

    /// Abort all tracked tasks without waiting
    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}
