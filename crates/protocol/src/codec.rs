//! Frame codec
//!
//! Binary frames carry MessagePack with named fields; text frames carry
//! JSON. Both decode into the same message enums.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Codec failure for a single frame
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("msgpack encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message as a MessagePack binary frame
///
/// Named fields are required: the message enums are internally tagged.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

/// Decode a MessagePack binary frame
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Decode a JSON text frame
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ClientCursor, ClientMessage, ServerMessage};

    #[test]
    fn load_document_survives_msgpack() {
        let msg = ServerMessage::LoadDocument {
            client_id: "c1".into(),
            text: "# title\nbody".into(),
            cursors: vec![ClientCursor::new("c2", 3)],
        };
        let bytes = encode(&msg).unwrap();
        let back: ServerMessage = decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn json_text_frame_decodes() {
        let msg: ClientMessage = decode_json(r#"{"type":"send-text","text":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SendText { text: "hi".into() });
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(decode::<ClientMessage>(&[0xc1, 0x00, 0xff]).is_err());
        assert!(decode_json::<ClientMessage>(r#"{"type":"nope"}"#).is_err());
    }
}
