//! WebSocket frames exchanged with the push client.
//!
//! Every frame is a JSON object `{"type": ..., "message": ...}`.

use serde::{Deserialize, Serialize};

/// Frame sent by a browser tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Announces the canonical path of the page the tab displays.
    Open(String),
    /// Requests the current markup of a resource.
    Fetch(String),
    Close,
}

/// Error for a frame that is not a valid [`ClientMessage`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has no type")]
    MissingType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("frame of type {0} needs a string message")]
    InvalidMessage(&'static str),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl RawFrame {
    fn text(self, kind: &'static str) -> Result<String, ProtocolError> {
        match self.message {
            Some(serde_json::Value::String(text)) => Ok(text),
            _ => Err(ProtocolError::InvalidMessage(kind)),
        }
    }
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(frame)?;
        let kind = raw.kind.clone().ok_or(ProtocolError::MissingType)?;
        match kind.as_str() {
            "open" => raw.text("open").map(Self::Open),
            "fetch" => raw.text("fetch").map(Self::Fetch),
            "close" => Ok(Self::Close),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}

/// Source and destination of a move, as canonical paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedPaths {
    pub src: String,
    pub dest: String,
}

/// Frame sent to a browser tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Reply to `open`.
    Connected,
    /// A page changed; carries the reload target.
    Update(String),
    Moved(MovedPaths),
    /// Reply to `fetch` with the resource's markup.
    Dom(String),
    Error(String),
    /// The server is shutting down.
    Closed,
}

impl ServerMessage {
    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"open","message":"/blog/"}"#).unwrap(),
            ClientMessage::Open("/blog/".to_owned())
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"fetch","message":"/blog/post.html"}"#).unwrap(),
            ClientMessage::Fetch("/blog/post.html".to_owned())
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"close"}"#).unwrap(),
            ClientMessage::Close
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"close","message":""}"#).unwrap(),
            ClientMessage::Close
        );
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"message":"/"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"subscribe","message":"/"}"#),
            Err(ProtocolError::UnknownType(kind)) if kind == "subscribe"
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"open","message":42}"#),
            Err(ProtocolError::InvalidMessage("open"))
        ));
    }

    #[test]
    fn test_server_frames() {
        let frame = |msg: ServerMessage| -> serde_json::Value {
            serde_json::from_str(&msg.to_frame().unwrap()).unwrap()
        };

        assert_eq!(frame(ServerMessage::Connected), json!({"type": "connected"}));
        assert_eq!(frame(ServerMessage::Closed), json!({"type": "closed"}));
        assert_eq!(
            frame(ServerMessage::Update("/blog/".to_owned())),
            json!({"type": "update", "message": "/blog/"})
        );
        assert_eq!(
            frame(ServerMessage::Moved(MovedPaths {
                src: "/old/".to_owned(),
                dest: "/new/".to_owned(),
            })),
            json!({"type": "moved", "message": {"src": "/old/", "dest": "/new/"}})
        );
    }

    #[test]
    fn test_client_frame_encoding() {
        let open = serde_json::to_value(ClientMessage::Open("/".to_owned())).unwrap();
        assert_eq!(open, json!({"type": "open", "message": "/"}));

        let close = serde_json::to_value(ClientMessage::Close).unwrap();
        assert_eq!(close, json!({"type": "close"}));
    }

    #[test]
    fn test_server_frame_decoding() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"closed"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Closed);

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"dom","message":"<p>hi</p>"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Dom("<p>hi</p>".to_owned()));
    }
}
