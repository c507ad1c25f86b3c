//! Detached turn execution.
//!
//! The webhook handler hands envelopes to [`TurnWorker::submit`] and returns
//! at once. Each sender has one queue and one drain task; `submit` enqueues
//! synchronously, so turns for a sender run and are stored in delivery
//! order. A semaphore bounds how many turns run at the same time.

use std::sync::Arc;

use axkan_core::pipeline::TurnOutcome;
use axkan_types::inbound::InboundEnvelope;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use crate::state::LiveProcessor;

#[derive(Clone)]
pub struct TurnWorker {
    processor: Arc<LiveProcessor>,
    permits: Arc<Semaphore>,
    queues: Arc<DashMap<String, UnboundedSender<InboundEnvelope>>>,
}

impl TurnWorker {
    pub fn new(processor: Arc<LiveProcessor>, max_inflight: usize) -> Self {
        Self {
            processor,
            permits: Arc::new(Semaphore::new(max_inflight.max(1))),
            queues: Arc::new(DashMap::new()),
        }
    }

    /// Queue the turns of one delivery behind any earlier turns of the same
    /// senders.
    pub fn submit(&self, envelopes: Vec<InboundEnvelope>) {
        for envelope in envelopes {
            self.enqueue(envelope);
        }
    }

    fn enqueue(&self, envelope: InboundEnvelope) {
        // The entry guard holds the shard lock, so the drain task cannot
        // retire the queue between the lookup and the send.
        match self.queues.entry(envelope.from.clone()) {
            Entry::Occupied(mut queue) => {
                if let Err(mpsc::error::SendError(envelope)) = queue.get().send(envelope) {
                    // The drain task is gone (it panicked); start a new one.
                    let tx = self.spawn_drain(envelope.from.clone());
                    if tx.send(envelope).is_ok() {
                        queue.insert(tx);
                    }
                }
            }
            Entry::Vacant(slot) => {
                let tx = self.spawn_drain(envelope.from.clone());
                if tx.send(envelope).is_ok() {
                    slot.insert(tx);
                }
            }
        }
    }

    fn spawn_drain(&self, sender: String) -> UnboundedSender<InboundEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = self.clone();
        tokio::spawn(async move { worker.drain(sender, rx).await });
        tx
    }

    async fn drain(&self, sender: String, mut rx: UnboundedReceiver<InboundEnvelope>) {
        loop {
            while let Ok(envelope) = rx.try_recv() {
                self.run(envelope).await;
            }
            // Retire the queue only while it is empty, under the shard lock
            // `enqueue` sends through.
            if self.queues.remove_if(&sender, |_, _| rx.is_empty()).is_some() {
                return;
            }
        }
    }

    /// Number of senders with a turn queued or running.
    #[cfg(test)]
    pub fn active_threads(&self) -> usize {
        self.queues.len()
    }

    async fn run(&self, envelope: InboundEnvelope) {
        let Ok(_permit) = self.permits.acquire().await else {
            error!("turn worker semaphore closed, dropping message");
            return;
        };

        let wa_message_id = envelope.wa_message_id.clone();
        let processor = self.processor.clone();
        // A panicking turn surfaces as a JoinError here instead of tearing
        // down the sender's queue.
        let result = tokio::spawn(async move { processor.process(envelope).await }).await;

        match result {
            Ok(Ok(TurnOutcome::Duplicate)) => {
                debug!(wa_message_id = %wa_message_id, "duplicate delivery ignored");
            }
            Ok(Ok(TurnOutcome::Replied(summary))) => {
                info!(
                    wa_message_id = %wa_message_id,
                    conversation_id = %summary.conversation_id,
                    intent = %summary.intent,
                    order = ?summary.order.as_ref().map(|o| o.order_number.as_str()),
                    text_delivered = summary.delivery.text_delivered,
                    images = summary.delivery.images_delivered,
                    "turn completed"
                );
            }
            Ok(Err(e)) => {
                error!(wa_message_id = %wa_message_id, error = %e, "turn failed");
            }
            Err(e) => {
                error!(wa_message_id = %wa_message_id, error = %e, "turn task panicked");
            }
        }
    }
}
