//! Events published to channels
//!
//! An [`Event`] is immutable once built. The body is held as `bytes::Bytes`,
//! so fanning the same event out to many subscribers only bumps a reference
//! count instead of copying the payload.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

/// Envelope written as the body of [`Event::json`] events
#[derive(Serialize)]
struct Envelope<'a, T: Serialize + ?Sized> {
    channel: &'a str,
    payload: &'a T,
}

/// A payload to be delivered to every subscriber of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    channel: Arc<str>,
    event_type: Option<Arc<str>>,
    data: Bytes,
}

impl Event {
    /// Create an untyped event with a raw body
    pub fn new(channel: impl AsRef<str>, data: impl Into<Bytes>) -> Self {
        Self {
            channel: Arc::from(channel.as_ref()),
            event_type: None,
            data: data.into(),
        }
    }

    /// Create an event whose body is `{"channel": .., "payload": ..}`
    ///
    /// This is the body shape browser clients of the `/__transmit` endpoints
    /// dispatch on, since a single stream multiplexes many channels.
    pub fn json<T: Serialize + ?Sized>(
        channel: impl AsRef<str>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let channel = channel.as_ref();
        let body = serde_json::to_vec(&Envelope { channel, payload })?;
        Ok(Self::new(channel, body))
    }

    /// Set the event-type label (`event:` field)
    pub fn with_type(mut self, event_type: impl AsRef<str>) -> Self {
        self.event_type = Some(Arc::from(event_type.as_ref()));
        self
    }

    /// Channel this event is published to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Optional event-type label
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// Event body
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event() {
        let event = Event::new("news", "hello");
        assert_eq!(event.channel(), "news");
        assert_eq!(event.event_type(), None);
        assert_eq!(event.data().as_ref(), b"hello");
    }

    #[test]
    fn test_with_type() {
        let event = Event::new("news", "hello").with_type("headline");
        assert_eq!(event.event_type(), Some("headline"));
    }

    #[test]
    fn test_json_envelope() {
        let event = Event::json("users/1", &serde_json::json!({ "name": "ada" })).unwrap();

        let body: serde_json::Value = serde_json::from_slice(event.data()).unwrap();
        assert_eq!(body["channel"], "users/1");
        assert_eq!(body["payload"]["name"], "ada");
    }

    #[test]
    fn test_clone_shares_body() {
        let event = Event::new("news", vec![0u8; 1024]);
        let copy = event.clone();

        assert_eq!(event.data().as_ptr(), copy.data().as_ptr());
    }
}
