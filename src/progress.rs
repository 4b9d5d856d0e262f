//! Progress payloads delivered to the calling/daemon layer.
//!
//! Both callback kinds are synchronous and multi-shot: several partial
//! updates followed by exactly one final update with `completed` set. They
//! are invoked on the operation's own thread and must not block materially.

/// One step of an ongoing download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    pub label: String,
    pub url: String,
    /// Expected total size of the resource in bytes.
    pub total_size: u64,
    /// Bytes received since the previous update.
    pub downloaded: u64,
    pub completed: bool,
}

/// One step of a long-running task (tool install, archive rebuild, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskProgress {
    pub name: String,
    pub message: String,
    pub completed: bool,
}

impl TaskProgress {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn completed(message: &str) -> Self {
        Self {
            message: message.to_string(),
            completed: true,
            ..Self::default()
        }
    }
}

/// Receiver for download updates.
pub type DownloadProgressFn<'a> = dyn FnMut(&DownloadProgress) + 'a;

/// Receiver for task updates.
pub type TaskProgressFn<'a> = dyn FnMut(&TaskProgress) + 'a;
