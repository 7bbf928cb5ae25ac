use crate::protocol::{Request, Response};
use tokio::sync::{mpsc, oneshot};

/// Events delivered one at a time to the manager's loop. The single consumer
/// is what serializes every handler; the store never needs a lock.
#[derive(Debug)]
pub enum Event {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    AlarmFired {
        name: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    pub fn new() -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(100);
        (Self { tx }, rx)
    }

    pub async fn publish(&self, event: Event) {
        let _ = self.tx.send(event).await;
    }
}
