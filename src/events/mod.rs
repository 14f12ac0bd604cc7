use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::entities::ticket::TicketStatus;

/// Events emitted by the services. Consumed in-process by a logging task;
/// the channel boundary keeps emission off the request's critical path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TicketCreated(Uuid),
    TicketStatusChanged {
        ticket_id: Uuid,
        old_status: TicketStatus,
        new_status: TicketStatus,
    },
    TicketCompleted(Uuid),
    TicketImagesProcessed {
        ticket_id: Uuid,
        converted: usize,
        skipped: usize,
        failed: usize,
    },
    DepartmentCreated(Uuid),
    DepartmentDeleted(Uuid),
    EquipmentCreated(Uuid),
    EquipmentDeleted(Uuid),
    UserCreated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs for the lifetime of
/// the process; ends when every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::TicketStatusChanged {
                ticket_id,
                old_status,
                new_status,
            } => {
                info!(
                    ticket_id = %ticket_id,
                    old_status = old_status.as_str(),
                    new_status = new_status.as_str(),
                    "ticket status changed"
                );
            }
            Event::TicketImagesProcessed {
                ticket_id,
                converted,
                skipped,
                failed,
            } => {
                info!(
                    ticket_id = %ticket_id,
                    converted, skipped, failed,
                    "ticket images processed"
                );
            }
            other => info!(event = ?other, "event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive() {
        let (sender, mut rx) = channel(8);
        let id = Uuid::new_v4();
        sender.send(Event::TicketCreated(id)).await.unwrap();
        match rx.recv().await.unwrap() {
            Event::TicketCreated(got) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
