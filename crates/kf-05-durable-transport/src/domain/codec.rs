//! Wire codec: the event as a JSON body, addressed by subject, with the
//! event id as the message id so the stream can drop duplicates.

use crate::error::{TransportError, TransportResult};
use crate::{HEADER_MSG_ID, HEADER_REDELIVERY, MAX_MESSAGE_SIZE};
use shared_types::Event;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub subject: String,
    pub headers: BTreeMap<String, String>,
    pub payload: Vec<u8>,
}

impl WireMessage {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn is_redelivery(&self) -> bool {
        self.header(HEADER_REDELIVERY).is_some_and(|v| v == "true")
    }
}

pub fn encode(subject: &str, evt: &Event, redelivery: bool) -> TransportResult<WireMessage> {
    let payload = serde_json::to_vec(evt).map_err(|e| TransportError::Codec(e.to_string()))?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::TooLarge {
            size: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut headers = BTreeMap::new();
    headers.insert(HEADER_MSG_ID.to_string(), evt.id.clone());
    if redelivery {
        headers.insert(HEADER_REDELIVERY.to_string(), "true".to_string());
    }

    Ok(WireMessage {
        subject: subject.to_string(),
        headers,
        payload,
    })
}

pub fn decode(payload: &[u8]) -> TransportResult<Event> {
    serde_json::from_slice(payload).map_err(|e| TransportError::Codec(e.to_string()))
}
