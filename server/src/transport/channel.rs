use std::time::Duration;

use smol::{
    channel,
    channel::{Receiver, Sender, TryRecvError, TrySendError},
    future, Timer,
};

use crate::events::IngestBatch;

/// Downstream consumer has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError;

/// All senders have gone away and the queue is drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvError;

/// Unbounded hand-off from the ingestion worker to its downstream consumer
pub struct BatchChannel;

impl BatchChannel {
    pub fn unbounded() -> (BatchSender, BatchReceiver) {
        let (sender, receiver) = channel::unbounded();
        (BatchSender { sender }, BatchReceiver { receiver })
    }
}

#[derive(Clone)]
pub struct BatchSender {
    sender: Sender<IngestBatch>,
}

impl BatchSender {
    /// Enqueues without waiting; an unbounded queue is never full.
    pub fn send(&self, batch: IngestBatch) -> Result<(), SendError> {
        match self.sender.try_send(batch) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => Err(SendError),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Clone)]
pub struct BatchReceiver {
    receiver: Receiver<IngestBatch>,
}

impl BatchReceiver {
    /// Next batch if one is queued
    pub fn try_receive(&self) -> Result<Option<IngestBatch>, RecvError> {
        match self.receiver.try_recv() {
            Ok(batch) => Ok(Some(batch)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(RecvError),
        }
    }

    pub fn receive_blocking(&self) -> Result<IngestBatch, RecvError> {
        self.receiver.recv_blocking().map_err(|_| RecvError)
    }

    /// Waits up to `timeout` for the next batch
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<IngestBatch>, RecvError> {
        future::block_on(future::or(
            async { self.receiver.recv().await.map(Some).map_err(|_| RecvError) },
            async {
                Timer::after(timeout).await;
                Ok(None)
            },
        ))
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
