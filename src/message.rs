//! Wire protocol envelopes.
//!
//! Both directions use JSON arrays of the form `[type, ...args]`:
//! - client to relay: EVENT, REQ, CLOSE, COUNT, AUTH
//! - relay to client: EVENT, OK, EOSE, CLOSED, NOTICE, AUTH, COUNT
//!
//! Parsing is an explicit step; the dispatch loop logs and discards anything
//! that fails to parse instead of failing the connection.

use crate::event::Event;
use crate::filter::Filter;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when decoding relay messages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Messages sent from client to relay.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// `["EVENT", <event>]`
    Event(Event),

    /// `["REQ", <subscription_id>, <filter>, ...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// `["CLOSE", <subscription_id>]`
    Close { subscription_id: String },

    /// `["COUNT", <request_id>, <filter>, ...]`
    Count {
        request_id: String,
        filters: Vec<Filter>,
    },

    /// `["AUTH", <signed auth event>]`
    Auth(Event),
}

impl ClientMessage {
    /// Serialize to the JSON array wire form.
    pub fn to_json(&self) -> Result<String, MessageError> {
        let value = match self {
            ClientMessage::Event(event) => serde_json::json!(["EVENT", event]),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => array_with_filters("REQ", subscription_id, filters)?,
            ClientMessage::Close { subscription_id } => {
                serde_json::json!(["CLOSE", subscription_id])
            }
            ClientMessage::Count {
                request_id,
                filters,
            } => array_with_filters("COUNT", request_id, filters)?,
            ClientMessage::Auth(event) => serde_json::json!(["AUTH", event]),
        };
        Ok(value.to_string())
    }
}

fn array_with_filters(tag: &str, id: &str, filters: &[Filter]) -> Result<Value, MessageError> {
    let mut arr = vec![Value::String(tag.to_string()), Value::String(id.to_string())];
    for filter in filters {
        arr.push(serde_json::to_value(filter)?);
    }
    Ok(Value::Array(arr))
}

/// Messages sent from relay to client.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    /// `["EVENT", <subscription_id>, <event>]`
    Event {
        subscription_id: String,
        event: Event,
    },

    /// `["OK", <event_id>, <accepted>, <reason>]`
    Ok {
        event_id: String,
        accepted: bool,
        reason: String,
    },

    /// `["EOSE", <subscription_id>]`
    Eose { subscription_id: String },

    /// `["CLOSED", <subscription_id>, <reason>]`
    Closed {
        subscription_id: String,
        reason: String,
    },

    /// `["NOTICE", <text>]`
    Notice { text: String },

    /// `["AUTH", <challenge>]`
    Auth { challenge: String },

    /// `["COUNT", <request_id>, {"count": <n>}]`
    Count { request_id: String, count: u64 },
}

impl RelayMessage {
    /// Parse one inbound frame.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let arr: Vec<Value> =
            serde_json::from_str(json).map_err(|e| MessageError::InvalidFormat(e.to_string()))?;

        let tag = arr
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| MessageError::InvalidFormat("missing message type".to_string()))?;

        match tag {
            "EVENT" => Ok(RelayMessage::Event {
                subscription_id: str_arg(&arr, 1, "subscription id")?.to_string(),
                event: serde_json::from_value(
                    arr.get(2)
                        .ok_or_else(|| MessageError::MissingField("event".to_string()))?
                        .clone(),
                )?,
            }),
            "OK" => Ok(RelayMessage::Ok {
                event_id: str_arg(&arr, 1, "event id")?.to_string(),
                accepted: arr
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| MessageError::MissingField("accepted flag".to_string()))?,
                reason: arr
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "EOSE" => Ok(RelayMessage::Eose {
                subscription_id: str_arg(&arr, 1, "subscription id")?.to_string(),
            }),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: str_arg(&arr, 1, "subscription id")?.to_string(),
                reason: arr
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "NOTICE" => Ok(RelayMessage::Notice {
                text: str_arg(&arr, 1, "notice text")?.to_string(),
            }),
            "AUTH" => Ok(RelayMessage::Auth {
                challenge: str_arg(&arr, 1, "challenge")?.to_string(),
            }),
            "COUNT" => Ok(RelayMessage::Count {
                request_id: str_arg(&arr, 1, "request id")?.to_string(),
                count: arr
                    .get(2)
                    .and_then(Value::as_object)
                    .and_then(|obj| obj.get("count"))
                    .and_then(Value::as_u64)
                    .ok_or_else(|| MessageError::MissingField("count value".to_string()))?,
            }),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }
}

fn str_arg<'a>(arr: &'a [Value], idx: usize, what: &str) -> Result<&'a str, MessageError> {
    arr.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| MessageError::MissingField(what.to_string()))
}

/// Cheap pre-parse scan: pull the subscription id out of a raw `EVENT` frame
/// without a full JSON parse. Returns `None` for non-EVENT frames.
///
/// `"EVENT"` must appear within the first 22 bytes, matching how relays emit
/// the envelope; the id is whatever sits between the next pair of quotes.
pub(crate) fn scan_subscription_id(raw: &str) -> Option<&str> {
    let tag = clamp(raw, 22).find("\"EVENT\"")?;
    let rest = &raw[tag + 7..];
    let open = rest.find('"')?;
    let body = &rest[open + 1..];
    let close = clamp(body, 72).find('"')?;
    Some(&body[..close])
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn clamp(s: &str, max: usize) -> &str {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Cheap pre-parse scan: pull a 64-character hex field such as `"id"` out of a
/// raw frame. Used for the already-seen short-circuit before parse cost is
/// paid; a wrong hit is harmless because full verification still runs.
pub(crate) fn scan_hex64<'a>(raw: &'a str, field: &str) -> Option<&'a str> {
    let pattern = format!("\"{field}\":");
    let at = raw.find(&pattern)?;
    let rest = &raw[at + pattern.len()..];
    let open = rest.find('"')?;
    let value = rest.get(open + 1..open + 65)?;
    value
        .bytes()
        .all(|b| b.is_ascii_hexdigit())
        .then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_serializes() {
        let event = Event {
            id: "abc123".to_string(),
            pubkey: "pk".to_string(),
            created_at: 1234567890,
            kind: 1,
            tags: vec![],
            content: "Hello".to_string(),
            sig: "sig".to_string(),
        };

        let json = ClientMessage::Event(event).to_json().unwrap();
        assert!(json.starts_with("[\"EVENT\","));
        assert!(json.contains("abc123"));
    }

    #[test]
    fn client_req_serializes_filters_inline() {
        let msg = ClientMessage::Req {
            subscription_id: "sub1".to_string(),
            filters: vec![Filter::new().kinds(vec![1]).limit(10)],
        };

        let json = msg.to_json().unwrap();
        assert!(json.starts_with("[\"REQ\",\"sub1\","));
        assert!(json.contains("\"kinds\":[1]"));
    }

    #[test]
    fn client_close_serializes() {
        let msg = ClientMessage::Close {
            subscription_id: "sub1".to_string(),
        };
        assert_eq!(msg.to_json().unwrap(), r#"["CLOSE","sub1"]"#);
    }

    #[test]
    fn client_count_serializes() {
        let msg = ClientMessage::Count {
            request_id: "count:1".to_string(),
            filters: vec![Filter::new().kinds(vec![1])],
        };
        let json = msg.to_json().unwrap();
        assert!(json.starts_with("[\"COUNT\",\"count:1\","));
    }

    #[test]
    fn parses_event_frame() {
        let json = r#"["EVENT","sub1",{"id":"abc","pubkey":"pk","created_at":123,"kind":1,"tags":[],"content":"Hello","sig":"sig"}]"#;
        match RelayMessage::from_json(json).unwrap() {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                assert_eq!(subscription_id, "sub1");
                assert_eq!(event.id, "abc");
            }
            other => panic!("wrong message type: {other:?}"),
        }
    }

    #[test]
    fn parses_ok_accept_and_reject() {
        match RelayMessage::from_json(r#"["OK","e1",true,""]"#).unwrap() {
            RelayMessage::Ok {
                event_id, accepted, ..
            } => {
                assert_eq!(event_id, "e1");
                assert!(accepted);
            }
            other => panic!("wrong message type: {other:?}"),
        }

        match RelayMessage::from_json(r#"["OK","e1",false,"duplicate: have it"]"#).unwrap() {
            RelayMessage::Ok {
                accepted, reason, ..
            } => {
                assert!(!accepted);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("wrong message type: {other:?}"),
        }
    }

    #[test]
    fn parses_eose_closed_notice_auth_count() {
        assert!(matches!(
            RelayMessage::from_json(r#"["EOSE","sub1"]"#).unwrap(),
            RelayMessage::Eose { subscription_id } if subscription_id == "sub1"
        ));
        assert!(matches!(
            RelayMessage::from_json(r#"["CLOSED","sub1","error: too many"]"#).unwrap(),
            RelayMessage::Closed { reason, .. } if reason.contains("too many")
        ));
        assert!(matches!(
            RelayMessage::from_json(r#"["NOTICE","rate limited"]"#).unwrap(),
            RelayMessage::Notice { text } if text == "rate limited"
        ));
        assert!(matches!(
            RelayMessage::from_json(r#"["AUTH","challenge123"]"#).unwrap(),
            RelayMessage::Auth { challenge } if challenge == "challenge123"
        ));
        assert!(matches!(
            RelayMessage::from_json(r#"["COUNT","c1",{"count":42}]"#).unwrap(),
            RelayMessage::Count { count: 42, .. }
        ));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(RelayMessage::from_json("not json").is_err());
        assert!(RelayMessage::from_json("[]").is_err());
        assert!(RelayMessage::from_json(r#"[42,"x"]"#).is_err());
        assert!(matches!(
            RelayMessage::from_json(r#"["FROB","x"]"#),
            Err(MessageError::UnknownType(t)) if t == "FROB"
        ));
    }

    #[test]
    fn scans_subscription_id_from_event_frame() {
        let raw = r#"["EVENT","sub:17",{"id":"abc"}]"#;
        assert_eq!(scan_subscription_id(raw), Some("sub:17"));

        assert_eq!(scan_subscription_id(r#"["EOSE","sub:17"]"#), None);
        assert_eq!(scan_subscription_id(r#"["NOTICE","EVENT stuff"]"#), None);
    }

    #[test]
    fn scans_hex64_id() {
        let id = "5c83da77af1dec6d7289834998ad7aafbd9e2191396d75ec3cc27f5a77226f36";
        let raw = format!(r#"["EVENT","s",{{"id":"{id}","kind":1}}]"#);
        assert_eq!(scan_hex64(&raw, "id"), Some(id));

        // too short or non-hex: scan declines, full parse decides
        assert_eq!(scan_hex64(r#"{"id":"short"}"#, "id"), None);
    }
}
