//! Wakeup registry for clients blocked on XREAD.

use std::collections::HashMap;

use tokio::sync::mpsc;

/// Blocked readers keyed by stream key. XADD pings every channel that is
/// registered for the key it appended to; the blocked reader then re-reads
/// the stream itself, so a spurious wakeup is harmless.
#[derive(Debug, Default)]
pub struct StreamSignals {
    subscribers: HashMap<String, Vec<(String, mpsc::Sender<()>)>>,
}

impl StreamSignals {
    pub fn subscribe(&mut self, key: &str, client_address: &str, sender: mpsc::Sender<()>) {
        self.subscribers
            .entry(key.to_string())
            .or_default()
            .push((client_address.to_string(), sender));
    }

    pub fn unsubscribe(&mut self, key: &str, client_address: &str) {
        if let Some(subscribers) = self.subscribers.get_mut(key) {
            subscribers.retain(|(address, _)| address != client_address);

            if subscribers.is_empty() {
                self.subscribers.remove(key);
            }
        }
    }

    pub fn notify(&self, key: &str) {
        if let Some(subscribers) = self.subscribers.get(key) {
            for (_, sender) in subscribers {
                // a full channel already carries a pending wakeup
                let _ = sender.try_send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_reaches_every_subscriber_for_the_key() {
        let mut signals = StreamSignals::default();
        let (first_sender, mut first_receiver) = mpsc::channel(1);
        let (second_sender, mut second_receiver) = mpsc::channel(1);
        let (other_sender, mut other_receiver) = mpsc::channel(1);

        signals.subscribe("events", "client-1", first_sender);
        signals.subscribe("events", "client-2", second_sender);
        signals.subscribe("alerts", "client-3", other_sender);

        signals.notify("events");

        assert_eq!(first_receiver.try_recv(), Ok(()));
        assert_eq!(second_receiver.try_recv(), Ok(()));
        assert!(other_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_the_named_client() {
        let mut signals = StreamSignals::default();
        let (first_sender, mut first_receiver) = mpsc::channel(1);
        let (second_sender, mut second_receiver) = mpsc::channel(1);

        signals.subscribe("events", "client-1", first_sender);
        signals.subscribe("events", "client-2", second_sender);
        signals.unsubscribe("events", "client-1");

        signals.notify("events");

        assert!(first_receiver.try_recv().is_err());
        assert_eq!(second_receiver.try_recv(), Ok(()));
    }
}
