//! Delivery broadcaster
//!
//! Fans due reminders out to every connected client. Best effort: whoever is subscribed at
//! publish time gets the event, nothing is kept for clients that connect later

use serde::Serialize;
use tokio::sync::broadcast;

use crate::reminder::StoredRecord;

/// Broadcast channel capacity for events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event pushed to subscribers
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// These records are due, in order and as stored
    ReminderDue(Vec<StoredRecord>),
}

/// Broadcaster handle, cheap to clone
#[derive(Clone, Debug)]
pub struct Broadcaster {
    /// Sender side of the channel all subscribers listen on
    event_tx: broadcast::Sender<Event>,
}

impl Broadcaster {
    /// Create a broadcaster without subscribers
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self { event_tx }
    }

    /// Listen for events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Send due records to all current subscribers in one event
    ///
    /// Returns how many subscribers got it, zero is fine
    pub fn publish(&self, due: &[StoredRecord]) -> usize {
        let event = Event::ReminderDue(due.to_vec());

        match self.event_tx.send(event) {
            Ok(receivers) => {
                tracing::info!("Published {} due reminders to {receivers} clients", due.len());
                receivers
            }
            Err(_) => {
                tracing::debug!("Nobody is listening for {} due reminders", due.len());
                0
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;
    use serde_json::json;

    use super::*;
    use crate::reminder::Reminder;

    fn reminder(id: &str) -> StoredRecord {
        StoredRecord::Reminder(Reminder {
            id: id.to_string(),
            text: "Stand up".to_string(),
            time: "2024-01-01T00:00:00+00:00".to_string(),
            audio_filename: None,
            audio_type: None,
            extra: Map::new(),
        })
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let broadcaster = Broadcaster::new();

        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        let due = vec![reminder("a"), reminder("b")];
        assert_eq!(2, broadcaster.publish(&due));

        let expected = Event::ReminderDue(due);
        assert_eq!(expected, first.recv().await.unwrap());
        assert_eq!(expected, second.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let broadcaster = Broadcaster::new();

        assert_eq!(0, broadcaster.publish(&[reminder("a")]));

        let mut late = broadcaster.subscribe();
        assert!(late.try_recv().is_err());

        broadcaster.publish(&[reminder("b")]);
        assert_eq!(
            Event::ReminderDue(vec![reminder("b")]),
            late.recv().await.unwrap()
        );
    }

    #[test]
    fn test_event_shape() {
        let event = Event::ReminderDue(vec![reminder("a")]);

        assert_eq!(
            json!({
                "event": "reminder_due",
                "data": [{
                    "id": "a",
                    "text": "Stand up",
                    "time": "2024-01-01T00:00:00+00:00",
                    "audio_filename": null,
                    "audio_type": null,
                }],
            }),
            serde_json::to_value(&event).unwrap()
        );
    }

    #[test]
    fn test_event_carries_records_as_stored() {
        let odd = json!({ "id": 7, "time": "2020-01-01T00:00:00Z", "audio_type": "cloud_audio" });
        let event = Event::ReminderDue(vec![StoredRecord::Unparsed(odd.clone())]);

        assert_eq!(
            json!({ "event": "reminder_due", "data": [odd] }),
            serde_json::to_value(&event).unwrap()
        );
    }
}
