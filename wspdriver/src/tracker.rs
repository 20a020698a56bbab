use crate::error::Result;
use crate::message::Message;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Identities already surfaced during this session. Grows for the lifetime of
/// the session and is never persisted.
#[derive(Debug, Default)]
pub struct ReadTracker {
    seen: HashSet<String>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time an identity is marked.
    pub fn mark_read(&mut self, identity: &str) -> bool {
        if self.seen.contains(identity) {
            return false;
        }
        self.seen.insert(identity.to_string())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Lazily drops messages whose identity the tracker has seen. Each message is
/// marked as it is pulled, so items never pulled stay unread.
pub struct Deduplicated<'t, I> {
    inner: I,
    tracker: &'t Mutex<ReadTracker>,
}

impl<'t, I> Deduplicated<'t, I> {
    pub fn new(inner: I, tracker: &'t Mutex<ReadTracker>) -> Self {
        Self { inner, tracker }
    }
}

impl<I> Iterator for Deduplicated<'_, I>
where
    I: Iterator<Item = Result<Message>>,
{
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let message = match self.inner.next()? {
                Ok(message) => message,
                Err(err) => return Some(Err(err)),
            };
            let fresh = self
                .tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .mark_read(message.identity());
            if fresh {
                return Some(Ok(message));
            }
            debug!(identity = message.identity(), "skipping already read message");
        }
    }
}
