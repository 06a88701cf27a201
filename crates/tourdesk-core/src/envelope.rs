//! Response envelope codec.
//!
//! Every response from the backend is wrapped as
//! `{ "payload": <value>, "message": "<status text>" }`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Envelope<T> {
    pub payload: T,
    pub message: String,
}

/// Decode a raw response body into its payload and message.
///
/// Both fields must be present; the payload must deserialize as `T`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, DecodeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let payload = map.remove("payload").ok_or(DecodeError::MissingField("payload"))?;
    let message = match map.remove("message") {
        Some(Value::String(message)) => message,
        Some(_) => return Err(DecodeError::MessageNotString),
        None => return Err(DecodeError::MissingField("message")),
    };

    let payload =
        serde_json::from_value(payload).map_err(|e| DecodeError::PayloadShape(e.to_string()))?;

    Ok(Envelope { payload, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        id: String,
    }

    #[test]
    fn test_decode_list_payload() {
        let body = br#"{"payload":[{"id":"a"},{"id":"b"}],"message":"ok"}"#;
        let env: Envelope<Vec<Item>> = decode(body).expect("valid envelope");
        assert_eq!(env.payload.len(), 2);
        assert_eq!(env.payload[1].id, "b");
        assert_eq!(env.message, "ok");
    }

    #[test]
    fn test_decode_is_idempotent() {
        let body = br#"{"payload":{"id":"x"},"message":"Created"}"#.to_vec();
        let first: Envelope<Value> = decode(&body).expect("valid envelope");
        let second: Envelope<Value> = decode(&body).expect("valid envelope");
        assert_eq!(first, second);
        assert_eq!(body, br#"{"payload":{"id":"x"},"message":"Created"}"#.to_vec());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            decode::<Value>(br#"{"message":"ok"}"#),
            Err(DecodeError::MissingField("payload"))
        );
        assert_eq!(
            decode::<Value>(br#"{"payload":[]}"#),
            Err(DecodeError::MissingField("message"))
        );
    }

    #[test]
    fn test_payload_shape_mismatch() {
        let result = decode::<Vec<Item>>(br#"{"payload":{"id":"a"},"message":"ok"}"#);
        assert!(matches!(result, Err(DecodeError::PayloadShape(_))));
    }

    #[test]
    fn test_not_json_or_not_object() {
        assert!(matches!(decode::<Value>(b"<html>"), Err(DecodeError::NotJson(_))));
        assert_eq!(decode::<Value>(b"[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(
            decode::<Value>(br#"{"payload":1,"message":5}"#),
            Err(DecodeError::MessageNotString)
        );
    }
}
