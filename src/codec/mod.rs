//! Native value records delivered alongside every frame
//!
//! Each record is `#[repr(C)]` and laid out exactly like its counterpart in
//! `MvFrameHeader.h`, with no implicit padding. A copy of a record is therefore
//! a byte copy: nested records, fixed arrays, the intrinsic union and reserved
//! words all travel with it, and the copy shares nothing with its source.

pub mod camera;
pub mod device;
pub mod frame;

pub use camera::{
    CameraExtrinsic, CameraModel, CameraParameter, FisheyeModel, Intrinsics, PinholeModel,
    INTRINSIC_WORDS,
};
pub use device::{DeviceInfo, PixelFormat, CHANNEL_NAME_LEN, VENDOR_LEN};
pub use frame::FrameInfo;

/// Implements the byte-level plumbing shared by every native record.
///
/// `$size` must be the sum of the field sizes; the assertion then proves the
/// layout has no padding, which makes the byte view and byte equality sound.
macro_rules! native_record {
    ($ty:ty, $size:expr) => {
        const _: () = assert!(::std::mem::size_of::<$ty>() == $size);

        impl $ty {
            /// Raw bytes of the record exactly as laid out in native memory.
            pub fn as_bytes(&self) -> &[u8] {
                // SAFETY: plain `repr(C)` data without padding bytes (size asserted above).
                unsafe {
                    ::std::slice::from_raw_parts((self as *const Self).cast::<u8>(), $size)
                }
            }

            /// Copies a record out of native memory, or `None` for a null pointer.
            ///
            /// # Safety
            /// `ptr` must be null or point to a readable, fully written record that
            /// stays valid for the duration of this call. Alignment is not required.
            pub unsafe fn from_native(ptr: *const Self) -> Option<Self> {
                if ptr.is_null() {
                    None
                } else {
                    Some(::std::ptr::read_unaligned(ptr))
                }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                // SAFETY: every field is an integer, float or array of them; all-zero is valid.
                unsafe { ::std::mem::zeroed() }
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.as_bytes() == other.as_bytes()
            }
        }
    };
}

pub(crate) use native_record;
