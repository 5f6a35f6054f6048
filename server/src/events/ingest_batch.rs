use std::{mem, vec::IntoIter};

use opus_shared::{GenericMessage, PayloadType, RawMessage};

/// Everything one worker iteration produced, in completion order.
#[derive(Debug)]
pub struct IngestBatch {
    iteration: u64,
    messages: Vec<RawMessage>,
    disconnects: usize,

    empty: bool,
}

impl IngestBatch {
    pub(crate) fn new(iteration: u64) -> Self {
        Self {
            iteration,
            messages: Vec::new(),
            disconnects: 0,

            empty: true,
        }
    }

    // Public

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    /// Number of synthesized disconnect notifications in this batch
    pub fn disconnects(&self) -> usize {
        self.disconnects
    }

    pub fn take_messages(&mut self) -> Vec<RawMessage> {
        self.empty = true;
        self.disconnects = 0;
        mem::take(&mut self.messages)
    }

    // Crate-public

    pub(crate) fn push_message(&mut self, message: RawMessage) {
        if is_disconnect(&message) {
            self.disconnects += 1;
        }
        self.messages.push(message);
        self.empty = false;
    }

    pub(crate) fn extend(&mut self, messages: impl IntoIterator<Item = RawMessage>) {
        for message in messages {
            self.push_message(message);
        }
    }
}

impl IntoIterator for IngestBatch {
    type Item = RawMessage;
    type IntoIter = IntoIter<RawMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

fn is_disconnect(message: &RawMessage) -> bool {
    message.header().payload_type == PayloadType::Generic.to_u32()
        && message
            .decode::<GenericMessage>()
            .map(|generic| generic.is_disconnect())
            .unwrap_or(false)
}
