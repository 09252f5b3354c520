//! Per-frame metadata header

use std::fmt;

use super::device::DeviceInfo;
use super::native_record;
use crate::error::{exact, CodecError};

/// Metadata delivered with every frame
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FrameInfo {
    start_code: [u8; 4],
    pub header_size: u16,
    pub version: u16,
    /// Software frame sequence number
    pub frame_num: u64,
    /// Hardware frame sequence number
    pub hw_frame_num: u64,
    pub utc_timestamp_us: u64,
    pub hw_timestamp_us: u64,
    pub offset_x: u32,
    pub offset_y: u32,
    pub lost_packets: u32,
    /// Payload length in bytes
    pub frame_len: u32,
    pub device_info: DeviceInfo,
}

native_record!(FrameInfo, 432);

impl FrameInfo {
    /// Zeroed header carrying `start_code`.
    pub fn with_start_code(start_code: [u8; 4]) -> Self {
        Self {
            start_code,
            ..Self::default()
        }
    }

    pub fn start_code(&self) -> [u8; 4] {
        self.start_code
    }

    pub fn set_start_code(&mut self, value: &[u8]) -> Result<(), CodecError> {
        self.start_code = exact("start_code", value)?;
        Ok(())
    }
}

impl fmt::Debug for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameInfo")
            .field("start_code", &self.start_code)
            .field("header_size", &self.header_size)
            .field("version", &self.version)
            .field("frame_num", &self.frame_num)
            .field("hw_frame_num", &self.hw_frame_num)
            .field("utc_timestamp_us", &self.utc_timestamp_us)
            .field("hw_timestamp_us", &self.hw_timestamp_us)
            .field("offset_x", &self.offset_x)
            .field("offset_y", &self.offset_y)
            .field("lost_packets", &self.lost_packets)
            .field("frame_len", &self.frame_len)
            .field("device_info", &self.device_info)
            .finish()
    }
}
