use crate::capability::{Browser, Node, WaitCondition};
use crate::error::{DriverError, Result};
use crate::selectors;
use crate::session::Session;
use std::thread::sleep;
use tracing::{info, warn};

impl<B: Browser> Session<B> {
    /// Searches the chat list for `contact_id` and opens the first match.
    /// Nothing checks that the match is unique.
    pub fn open_conversation(&self, contact_id: &str) -> Result<()> {
        self.require_login()?;
        let search = self.wait_for(selectors::SEARCH_INPUT, WaitCondition::Clickable)?;
        search
            .send_keys(contact_id)
            .map_err(DriverError::from_transport)?;
        sleep(self.timing().search_delay());
        search.press_enter().map_err(DriverError::from_transport)?;
        Ok(())
    }

    /// Sends are never retried; a failure may leave text in the compose box.
    pub fn send_message(&self, contact_id: &str, text: &str) -> Result<()> {
        self.open_conversation(contact_id)?;
        let result = self.write_and_send(text);
        match &result {
            Ok(()) => info!(contact = contact_id, chars = text.chars().count(), "message sent"),
            Err(err) => warn!(contact = contact_id, "send failed: {err}"),
        }
        result
    }

    fn write_and_send(&self, text: &str) -> Result<()> {
        let input = self
            .browser()
            .find(selectors::COMPOSE_INPUT)
            .map_err(DriverError::from_transport)?
            .ok_or(DriverError::MissingElement(selectors::COMPOSE_INPUT))?;
        input.send_keys(text).map_err(DriverError::from_transport)?;
        let send = self
            .wait_for(selectors::SEND_BUTTON, WaitCondition::Clickable)?;
        send.click().map_err(DriverError::from_transport)?;
        Ok(())
    }
}
