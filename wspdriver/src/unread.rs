use crate::capability::Browser;
use crate::chat::MessageNodes;
use crate::error::{DriverError, Result};
use crate::message::Message;
use crate::session::Session;
use crate::tracker::Deduplicated;
use tracing::{debug, info};

type Batch<'s, B> = Deduplicated<'s, MessageNodes<<B as Browser>::Node>>;

/// Every message not yet surfaced by this session: the open chat first, then
/// each unread chat in turn. Opening a chat clears its unread flag, so the
/// walk ends once the page reports none. The first error ends the walk.
pub struct UnreadMessages<'s, B: Browser> {
    session: &'s Session<B>,
    batch: Option<Batch<'s, B>>,
    done: bool,
}

impl<'s, B: Browser> UnreadMessages<'s, B> {
    fn next_batch(&mut self) -> Result<Option<Batch<'s, B>>> {
        let Some(chat) = self.session.get_unread_chat()? else {
            return Ok(None);
        };
        debug!("reading next unread chat");
        let messages = chat.get_messages()?;
        Ok(Some(self.session.ensure_no_duplicates(messages)))
    }

    fn fail(&mut self, err: DriverError) -> Option<Result<Message>> {
        self.done = true;
        self.batch = None;
        Some(Err(err))
    }
}

impl<B: Browser> Iterator for UnreadMessages<'_, B> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(batch) = self.batch.as_mut() {
                match batch.next() {
                    Some(Ok(message)) => return Some(Ok(message)),
                    Some(Err(err)) => return self.fail(err),
                    None => self.batch = None,
                }
            }
            match self.next_batch() {
                Ok(Some(batch)) => self.batch = Some(batch),
                Ok(None) => {
                    self.done = true;
                    info!("no unread chats left");
                }
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl<B: Browser> Session<B> {
    pub fn get_unread_messages(&self) -> Result<UnreadMessages<'_, B>> {
        let current = self.get_current_chat_messages()?;
        Ok(UnreadMessages {
            session: self,
            batch: Some(self.ensure_no_duplicates(current)),
            done: false,
        })
    }
}
