//! Device description embedded in every frame header

use std::fmt;

use serde::{Deserialize, Serialize};

use super::camera::CameraParameter;
use super::native_record;

/// Capacity of the channel name field, terminator included.
pub const CHANNEL_NAME_LEN: usize = 64;
/// Capacity of the vendor field, terminator included.
pub const VENDOR_LEN: usize = 32;

/// Output pixel formats understood by the native client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum PixelFormat {
    #[default]
    None = 0,
    Mono = 1,
    Rgb24 = 2,
    Bgr24 = 3,
}

impl TryFrom<i32> for PixelFormat {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Mono),
            2 => Ok(Self::Rgb24),
            3 => Ok(Self::Bgr24),
            other => Err(other),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DeviceInfo {
    pub width: u32,
    pub height: u32,
    pub name_hash: u64,
    pixel_format: i32,
    pub fps: f32,
    channel_name: [u8; CHANNEL_NAME_LEN],
    vendor: [u8; VENDOR_LEN],
    pub camera_parameter: CameraParameter,
}

native_record!(DeviceInfo, 376);

impl DeviceInfo {
    /// `None` when the stored id is not a known format; see [`raw_pixel_format`](Self::raw_pixel_format).
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::try_from(self.pixel_format).ok()
    }

    pub fn raw_pixel_format(&self) -> i32 {
        self.pixel_format
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format as i32;
    }

    pub fn channel_name(&self) -> String {
        read_text(&self.channel_name)
    }

    /// Stores at most `CHANNEL_NAME_LEN - 1` bytes. Longer names are truncated
    /// silently, at a character boundary.
    pub fn set_channel_name(&mut self, name: &str) {
        write_text(&mut self.channel_name, name);
    }

    pub fn vendor(&self) -> String {
        read_text(&self.vendor)
    }

    /// Stores at most `VENDOR_LEN - 1` bytes. Longer values are truncated
    /// silently, at a character boundary.
    pub fn set_vendor(&mut self, vendor: &str) {
        write_text(&mut self.vendor, vendor);
    }
}

impl fmt::Debug for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInfo")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("name_hash", &format_args!("{:#x}", self.name_hash))
            .field("pixel_format", &self.pixel_format)
            .field("fps", &self.fps)
            .field("channel_name", &self.channel_name())
            .field("vendor", &self.vendor())
            .field("camera_parameter", &self.camera_parameter)
            .finish()
    }
}

// Text up to the first NUL, or the whole field if the terminator is missing.
fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_text<const N: usize>(field: &mut [u8; N], value: &str) {
    let mut end = value.len().min(N - 1);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    field.fill(0);
    field[..end].copy_from_slice(&value.as_bytes()[..end]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::camera::{Intrinsics, PinholeModel};

    fn populated() -> DeviceInfo {
        let mut info = DeviceInfo::default();
        info.width = 1920;
        info.height = 1080;
        info.name_hash = 0x1234_5678_9abc_def0;
        info.fps = 29.97;
        info.set_pixel_format(PixelFormat::Bgr24);
        info.set_channel_name("front-left");
        info.set_vendor("pixelvision");
        info.camera_parameter.intrinsic_id = 3;
        info.camera_parameter.set_intrinsics(Intrinsics::Pinhole(PinholeModel {
            fx: 1000.0,
            fy: 1000.0,
            ..PinholeModel::default()
        }));
        info.camera_parameter.set_reserved1(&[1, 2, 3]).unwrap();
        info
    }

    #[test]
    fn copy_is_equal_and_independent() {
        let original = populated();
        let mut copy = original;
        assert_eq!(copy, original);

        copy.width = 640;
        copy.set_channel_name("rear");
        copy.camera_parameter.set_reserved1(&[0, 0, 0]).unwrap();

        assert_eq!(original.width, 1920);
        assert_eq!(original.channel_name(), "front-left");
        assert_eq!(original.camera_parameter.reserved1(), [1, 2, 3]);
    }

    #[test]
    fn text_round_trips() {
        let info = populated();
        assert_eq!(info.channel_name(), "front-left");
        assert_eq!(info.vendor(), "pixelvision");
        assert_eq!(info.pixel_format(), Some(PixelFormat::Bgr24));
    }

    #[test]
    fn text_at_capacity_minus_one_is_kept() {
        let mut info = DeviceInfo::default();
        let name = "c".repeat(CHANNEL_NAME_LEN - 1);
        info.set_channel_name(&name);
        assert_eq!(info.channel_name(), name);
        assert_eq!(info.channel_name[CHANNEL_NAME_LEN - 1], 0);
    }

    #[test]
    fn oversized_text_is_truncated() {
        let mut info = DeviceInfo::default();
        info.set_channel_name(&"x".repeat(CHANNEL_NAME_LEN + 10));
        assert_eq!(info.channel_name(), "x".repeat(CHANNEL_NAME_LEN - 1));
        assert_eq!(info.channel_name[CHANNEL_NAME_LEN - 1], 0);

        info.set_vendor(&"v".repeat(VENDOR_LEN));
        assert_eq!(info.vendor().len(), VENDOR_LEN - 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut info = DeviceInfo::default();
        // 'é' is two bytes, so the 31-byte limit falls mid-character.
        info.set_vendor(&"é".repeat(20));
        assert_eq!(info.vendor(), "é".repeat(15));
    }

    #[test]
    fn shorter_write_clears_previous_text() {
        let mut info = populated();
        info.set_vendor("ab");
        assert_eq!(info.vendor(), "ab");
        assert!(info.vendor[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unknown_pixel_format_is_preserved() {
        let mut info = DeviceInfo::default();
        info.pixel_format = 42;
        let copy = info;
        assert_eq!(copy.pixel_format(), None);
        assert_eq!(copy.raw_pixel_format(), 42);
    }

    #[test]
    fn pixel_format_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: PixelFormat,
        }
        let parsed: Wrapper = config::Config::builder()
            .set_override("format", "rgb24")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(parsed.format, PixelFormat::Rgb24);
    }
}
