//! Progress notifications for long tree builds.
//!
//! Every notification carries the session id of the build that produced it.
//! Builds are never cancelled: an observer that moves on to a newer session
//! simply drops notifications (and results) tagged with any other session.

use std::{fmt, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Opaque token identifying one build request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// A fresh random session id.
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        SessionId(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        SessionId(id.to_owned())
    }
}

/// A snapshot of how far a build has got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub session_id: SessionId,
    pub files_handled: usize,
    pub files_total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.files_handled >= self.files_total
    }
}

/// Receives progress notifications from a build.
pub trait ProgressSink: Send + Sync {
    fn advance(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn advance(&self, progress: Progress) {
        self(progress)
    }
}

/// Sending half of a progress channel. Cheap to clone; many builds can
/// share one channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    sender: Sender<Progress>,
}

impl ProgressSink for ProgressSender {
    fn advance(&self, progress: Progress) {
        if let Err(err) = self.sender.send(progress) {
            trace!(session_id = %err.0.session_id, "progress watcher is gone, dropping update");
        }
    }
}

/// Create a progress channel.
pub fn channel() -> (ProgressSender, ProgressWatcher) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (ProgressSender { sender }, ProgressWatcher::new(receiver))
}

/// Outcome of [`ProgressWatcher::recv_timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A notification for the active session.
    Progress(Progress),
    /// Nothing for the active session arrived in time.
    Timeout,
    /// Every sender is gone and the channel is drained, so nothing more
    /// will arrive.
    Disconnected,
}

/// Receiving half of a progress channel, bound to at most one active
/// session at a time. Notifications for any other session are discarded.
#[derive(Debug)]
pub struct ProgressWatcher {
    receiver: Receiver<Progress>,
    active: Option<SessionId>,
    latest: Option<Progress>,
}

impl ProgressWatcher {
    fn new(receiver: Receiver<Progress>) -> Self {
        Self {
            receiver,
            active: None,
            latest: None,
        }
    }

    /// Switch to `session_id`. Progress seen for the previous session is
    /// forgotten.
    pub fn watch(&mut self, session_id: SessionId) {
        self.active = Some(session_id);
        self.latest = None;
    }

    pub fn active(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    /// Whether results tagged with `session_id` should be used.
    pub fn is_current(&self, session_id: &SessionId) -> bool {
        self.active.as_ref() == Some(session_id)
    }

    /// Latest progress seen for the active session.
    pub fn latest(&self) -> Option<&Progress> {
        self.latest.as_ref()
    }

    /// Drain pending notifications without blocking and return the latest
    /// progress for the active session.
    pub fn poll(&mut self) -> Option<&Progress> {
        while let Ok(progress) = self.receiver.try_recv() {
            self.accept(progress);
        }
        self.latest.as_ref()
    }

    /// Wait up to `timeout` for the next notification of the active session.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Received {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(progress) => {
                    if self.accept(progress.clone()) {
                        return Received::Progress(progress);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Received::Timeout,
                Err(RecvTimeoutError::Disconnected) => return Received::Disconnected,
            }
        }
    }

    fn accept(&mut self, progress: Progress) -> bool {
        if !self.is_current(&progress.session_id) {
            trace!(session_id = %progress.session_id, "discarding progress for stale session");
            return false;
        }
        self.latest = Some(progress);
        true
    }
}

/// Emits monotonic progress for one build session.
pub(crate) struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    session_id: SessionId,
    files_handled: usize,
    files_total: usize,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, session_id: SessionId, files_total: usize) -> Self {
        Self {
            sink,
            session_id,
            files_handled: 0,
            files_total,
        }
    }

    /// Report `files_handled`. Values are clamped so the reported count
    /// never decreases and never exceeds the total.
    pub(crate) fn advance(&mut self, files_handled: usize) {
        self.files_handled = self.files_handled.max(files_handled.min(self.files_total));
        self.sink.advance(Progress {
            session_id: self.session_id.clone(),
            files_handled: self.files_handled,
            files_total: self.files_total,
        });
    }
}
