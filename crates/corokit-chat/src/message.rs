use std::borrow::Cow;

/// One decoded line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub data: Vec<u8>,
    /// Entered on the server itself through `ChatServer::feed`
    pub is_server_message: bool,
}

impl ChatMessage {
    pub fn new(data: Vec<u8>, is_server_message: bool) -> Self {
        ChatMessage {
            data,
            is_server_message,
        }
    }

    /// Lossy UTF-8 view
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
