//! Handshake and framing helpers
//!
//! Room selection from the request URI, `Origin` checks, and decoding of
//! inbound frames into [`ClientMessage`]s.

use mdcollab_protocol::{decode, decode_json, ClientMessage, CodecError, RoomId, DEFAULT_ROOM};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Pages allowed to open a socket; requests without `Origin` are also allowed
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "https://localhost",
    "https://127.0.0.1",
];

/// Room named by `/?room=<percent-encoded id>`
///
/// Absent, empty, or undecodable values select [`DEFAULT_ROOM`].
pub fn parse_room_from_uri(uri: &str) -> RoomId {
    let Some((_, query)) = uri.split_once('?') else {
        return DEFAULT_ROOM.to_string();
    };
    query
        .split('&')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| *key == "room")
        .and_then(|(_, value)| {
            percent_encoding::percent_decode_str(value)
                .decode_utf8()
                .ok()
                .map(|s| s.into_owned())
        })
        .filter(|room| !room.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string())
}

fn scheme_and_host(url: &str) -> Option<(String, String)> {
    let url = Url::parse(url).ok()?;
    Some((url.scheme().to_string(), url.host_str()?.to_string()))
}

/// Check an `Origin` header against [`ALLOWED_ORIGINS`]
///
/// Scheme and host must match exactly, so `http://localhost.evil.com` does
/// not pass as `http://localhost`. Ports are not compared.
pub fn validate_origin(origin: &str) -> bool {
    let Some(origin) = scheme_and_host(origin) else {
        return false;
    };
    ALLOWED_ORIGINS
        .iter()
        .filter_map(|allowed| scheme_and_host(allowed))
        .any(|allowed| allowed == origin)
}

/// Decode an inbound frame
///
/// Binary frames are MessagePack, text frames JSON. Control frames yield
/// `Ok(None)`.
pub fn decode_client_frame(msg: &Message) -> Result<Option<ClientMessage>, CodecError> {
    match msg {
        Message::Binary(data) => decode(data).map(Some),
        Message::Text(text) => decode_json(text).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_is_read_from_query() {
        assert_eq!(parse_room_from_uri("/?room=notes"), "notes");
        assert_eq!(parse_room_from_uri("/?foo=bar&room=xyz"), "xyz");
        assert_eq!(parse_room_from_uri("/?room=team%20notes"), "team notes");
    }

    #[test]
    fn missing_room_falls_back_to_default() {
        assert_eq!(parse_room_from_uri("/"), DEFAULT_ROOM);
        assert_eq!(parse_room_from_uri("/?room="), DEFAULT_ROOM);
        assert_eq!(parse_room_from_uri("/?other=1"), DEFAULT_ROOM);
        // invalid UTF-8 after decoding
        assert_eq!(parse_room_from_uri("/?room=%FF"), DEFAULT_ROOM);
    }

    #[test]
    fn local_pages_on_any_port_are_allowed() {
        for origin in ["http://localhost", "http://localhost:8080", "http://127.0.0.1:3000", "https://localhost:443"] {
            assert!(validate_origin(origin), "{origin}");
        }
    }

    #[test]
    fn lookalike_and_foreign_origins_are_refused() {
        for origin in [
            "http://localhost.evil.com",
            "http://evil.localhost.com",
            "http://127.0.0.1.evil.com",
            "ws://localhost",
            "http://192.168.1.1",
            "not-a-url",
            "",
        ] {
            assert!(!validate_origin(origin), "{origin}");
        }
    }

    #[test]
    fn frames_decode_by_kind() {
        let bytes = mdcollab_protocol::encode(&ClientMessage::SendText { text: "x".into() }).unwrap();
        assert_eq!(
            decode_client_frame(&Message::Binary(bytes)).unwrap(),
            Some(ClientMessage::SendText { text: "x".into() })
        );
        assert_eq!(
            decode_client_frame(&Message::Text(
                r#"{"type":"send-cursor","offset":3,"client_id":"c"}"#.into()
            ))
            .unwrap(),
            Some(ClientMessage::SendCursor {
                offset: 3,
                client_id: "c".into()
            })
        );
        assert_eq!(decode_client_frame(&Message::Ping(vec![])).unwrap(), None);
        assert!(decode_client_frame(&Message::Binary(vec![0xc1])).is_err());
    }
}
