//! Events handed to caller callbacks

use std::fmt;
use std::time::Instant;

use bytes::Bytes;

use crate::api::ClientId;
use crate::codec::FrameInfo;

/// One frame copied out of the native client.
///
/// `data` and `info` are caller-owned copies; nothing here points into
/// native memory, so a frame may be kept or sent anywhere.
#[derive(Clone)]
pub struct Frame {
    pub client: ClientId,
    pub data: Bytes,
    pub info: FrameInfo,
    /// When the trampoline received the frame
    pub received: Instant,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("client", &self.client)
            .field("len", &self.data.len())
            .field("frame_num", &self.info.frame_num)
            .field("frame_len", &self.info.frame_len)
            .finish()
    }
}

/// Disconnect notification from the native client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub client: ClientId,
    pub code: i32,
    pub message: String,
}

/// Kind of native event, one callback slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Frame,
    Disconnect,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_label_matches_display() {
        for kind in [EventKind::Frame, EventKind::Disconnect] {
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(EventKind::Frame.as_str(), "frame");
    }
}
