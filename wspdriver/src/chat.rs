use crate::capability::{Browser, Node};
use crate::error::{DriverError, Result};
use crate::message::Message;
use crate::selectors;
use crate::session::Session;
use std::thread::sleep;
use tracing::{debug, info};

/// Handle to one conversation in the chat list. Holds no messages; every
/// enumeration reads the live page.
pub struct Chat<'s, B: Browser> {
    node: B::Node,
    session: &'s Session<B>,
}

impl<'s, B: Browser> Chat<'s, B> {
    pub(crate) fn new(node: B::Node, session: &'s Session<B>) -> Self {
        Self { node, session }
    }

    pub fn name(&self) -> Result<String> {
        let title = self
            .node
            .find(selectors::CHAT_TITLE)?
            .ok_or(DriverError::MissingElement(selectors::CHAT_TITLE))?;
        Ok(title.text()?)
    }

    /// Scrolls the chat into view and opens it. A failed click is returned
    /// as-is, never retried.
    pub fn select(&self) -> Result<()> {
        self.node.scroll_into_view()?;
        self.node.click()?;
        debug!("chat selected");
        Ok(())
    }

    pub fn get_messages(&self) -> Result<MessageNodes<B::Node>> {
        self.select()?;
        self.session.ensure_scrolled_to_latest()?;
        self.session.message_nodes()
    }
}

/// Message nodes captured from the open chat, classified as they are pulled.
pub struct MessageNodes<N> {
    nodes: std::vec::IntoIter<N>,
}

impl<N: Node> Iterator for MessageNodes<N> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next().map(|node| Message::from_node(&node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

/// Keeps asking the page for an unread chat until none is left. The caller
/// must open (and so mark read) each chat before pulling the next one.
pub struct UnreadChats<'s, B: Browser> {
    session: &'s Session<B>,
    done: bool,
}

impl<'s, B: Browser> Iterator for UnreadChats<'s, B> {
    type Item = Result<Chat<'s, B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.get_unread_chat() {
            Ok(Some(chat)) => Some(Ok(chat)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<B: Browser> Session<B> {
    /// Clicks the jump-to-latest control if it is showing and waits for the
    /// pane to catch up.
    pub fn ensure_scrolled_to_latest(&self) -> Result<()> {
        if let Some(control) = self.browser().find(selectors::JUMP_TO_LATEST)? {
            control.click()?;
            debug!("jumped to latest message");
            sleep(self.timing().settle_delay());
        }
        Ok(())
    }

    pub(crate) fn message_nodes(&self) -> Result<MessageNodes<B::Node>> {
        let nodes = self.browser().find_all(selectors::MESSAGE)?;
        Ok(MessageNodes {
            nodes: nodes.into_iter(),
        })
    }

    pub fn get_current_chat_messages(&self) -> Result<MessageNodes<B::Node>> {
        self.require_login()?;
        self.ensure_scrolled_to_latest()?;
        self.message_nodes()
    }

    pub fn get_chats(&self) -> Result<Vec<Chat<'_, B>>> {
        self.require_login()?;
        let chats = self
            .browser()
            .find_all(selectors::CHAT)?
            .into_iter()
            .map(|node| Chat::new(node, self))
            .collect();
        Ok(chats)
    }

    pub fn get_unread_chat(&self) -> Result<Option<Chat<'_, B>>> {
        self.require_login()?;
        self.find_unread_chat(true)
    }

    /// An unread chat may sit below the rendered part of the list, so a miss
    /// scrolls the list to the top and looks exactly once more.
    fn find_unread_chat(&self, first_try: bool) -> Result<Option<Chat<'_, B>>> {
        if let Some(node) = self.browser().find(selectors::UNREAD_CHAT)? {
            return Ok(Some(Chat::new(node, self)));
        }
        if !first_try {
            return Ok(None);
        }
        self.scroll_to_chat_list_top()?;
        self.find_unread_chat(false)
    }

    fn scroll_to_chat_list_top(&self) -> Result<()> {
        match self.browser().find(selectors::CHAT_LIST_TOP)? {
            Some(top) => top.scroll_into_view()?,
            None => debug!("chat list is empty"),
        }
        Ok(())
    }

    pub fn get_unread_chats(&self) -> Result<UnreadChats<'_, B>> {
        self.require_login()?;
        info!("scanning unread chats");
        Ok(UnreadChats {
            session: self,
            done: false,
        })
    }
}
