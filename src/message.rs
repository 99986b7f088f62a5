//! Client → server messages on the streaming channel.
//!
//! Clients send JSON text frames shaped like `{"audio": "<base64>"}`. Anything else is
//! classified as [`ClientMessage::Unknown`] and ignored by the session loop without a reply.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::{Error, Result};

/// A structurally validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    AudioChunk(AudioChunk),
    Unknown,
}

/// The still-encoded `audio` field of a chunk message.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    encoded: Value,
}

impl ClientMessage {
    /// Classify one text frame. Never fails: malformed input is `Unknown`.
    pub fn parse(text: &str) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(text) else {
            return Self::Unknown;
        };

        match fields.remove("audio") {
            Some(encoded) => Self::AudioChunk(AudioChunk { encoded }),
            None => Self::Unknown,
        }
    }
}

impl AudioChunk {
    /// Decode the base64 payload into container bytes.
    ///
    /// A present-but-unusable `audio` value is a decode failure of this chunk, not a malformed
    /// message, so the session answers it with a degraded snapshot.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let Value::String(encoded) = &self.encoded else {
            return Err(Error::Decode(
                "`audio` field must be a base64 string".to_owned(),
            ));
        };

        STANDARD
            .decode(encoded.trim())
            .map_err(|err| Error::Decode(format!("invalid base64 audio payload: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_message_is_recognized_and_decoded() -> anyhow::Result<()> {
        let msg = ClientMessage::parse(r#"{"audio": "aGVsbG8="}"#);
        let ClientMessage::AudioChunk(chunk) = msg else {
            panic!("expected an audio chunk, got {msg:?}");
        };
        assert_eq!(chunk.decode()?, b"hello");
        Ok(())
    }

    #[test]
    fn messages_without_audio_are_unknown() {
        assert_eq!(ClientMessage::parse(r#"{"ping": 1}"#), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(r#"["audio"]"#), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse("not json"), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(""), ClientMessage::Unknown);
    }

    #[test]
    fn unusable_audio_values_are_decode_errors() {
        for text in [r#"{"audio": null}"#, r#"{"audio": 12}"#, r#"{"audio": "@@@"}"#] {
            let ClientMessage::AudioChunk(chunk) = ClientMessage::parse(text) else {
                panic!("expected an audio chunk for {text}");
            };
            assert!(matches!(chunk.decode(), Err(Error::Decode(_))), "{text}");
        }
    }
}
