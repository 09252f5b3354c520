//! Boundary with the native video client
//!
//! [`NativeApi`] is the fixed set of entry points this crate calls into. The
//! native client calls back through the two C-ABI function pointer types
//! below, which are always the trampolines in [`crate::dispatch`].

use std::ffi::{c_void, CStr};
use std::fmt;
use std::num::NonZeroUsize;

use libc::{c_char, c_int};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::PixelFormat;

/// Frame callback signature expected by `start_video_client`.
pub type FrameFn =
    unsafe extern "C" fn(client: *mut c_void, data: *mut u8, size: usize, frame_info: *mut c_void);

/// Disconnect callback signature expected by `connect_video_client`.
pub type DisconnectFn = unsafe extern "C" fn(client: *mut c_void, code: c_int, msg: *const c_char);

/// Stable identity of one native client, derived from its pointer value.
///
/// Equality and hashing follow the native pointer, never the Rust wrapper, so
/// registry lookups from native threads match the handle that registered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(NonZeroUsize);

impl ClientId {
    /// `None` for a null pointer.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({:#x})", self.0.get())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Non-success status returned by a native call.
///
/// Every variant is an operational condition the caller may retry or abandon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ApiError {
    #[error("invalid client context")]
    InvalidClientContext,
    #[error("invalid url")]
    InvalidUrl,
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("callback not set")]
    CallbackNotSet,
    #[error("invalid gpu index")]
    InvalidGpuIndex,
    #[error("video processor initialization failed")]
    InitVideoProcessorFailed,
    #[error("video decoder initialization failed")]
    InitVideoDecoderFailed,
    #[error("unknown native status {0}")]
    Unknown(i32),
}

impl ApiError {
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Raw `api_err_t` as returned by the native client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ApiStatus(pub c_int);

impl ApiStatus {
    pub const SUCCESS: Self = Self(0);
    pub const INVALID_CLIENT_CONTEXT: Self = Self(1);
    pub const INVALID_URL: Self = Self(2);
    pub const CONNECT_TIMEOUT: Self = Self(3);
    pub const CALLBACK_NOT_SET: Self = Self(4);
    pub const INVALID_GPU_INDEX: Self = Self(5);
    pub const INIT_VIDEO_PROCESSOR_FAILED: Self = Self(6);
    pub const INIT_VIDEO_DECODER_FAILED: Self = Self(7);

    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Self::SUCCESS => Ok(()),
            Self::INVALID_CLIENT_CONTEXT => Err(ApiError::InvalidClientContext),
            Self::INVALID_URL => Err(ApiError::InvalidUrl),
            Self::CONNECT_TIMEOUT => Err(ApiError::ConnectTimeout),
            Self::CALLBACK_NOT_SET => Err(ApiError::CallbackNotSet),
            Self::INVALID_GPU_INDEX => Err(ApiError::InvalidGpuIndex),
            Self::INIT_VIDEO_PROCESSOR_FAILED => Err(ApiError::InitVideoProcessorFailed),
            Self::INIT_VIDEO_DECODER_FAILED => Err(ApiError::InitVideoDecoderFailed),
            Self(other) => Err(ApiError::Unknown(other)),
        }
    }
}

impl From<ApiError> for ApiStatus {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidClientContext => Self::INVALID_CLIENT_CONTEXT,
            ApiError::InvalidUrl => Self::INVALID_URL,
            ApiError::ConnectTimeout => Self::CONNECT_TIMEOUT,
            ApiError::CallbackNotSet => Self::CALLBACK_NOT_SET,
            ApiError::InvalidGpuIndex => Self::INVALID_GPU_INDEX,
            ApiError::InitVideoProcessorFailed => Self::INIT_VIDEO_PROCESSOR_FAILED,
            ApiError::InitVideoDecoderFailed => Self::INIT_VIDEO_DECODER_FAILED,
            ApiError::Unknown(raw) => Self(raw),
        }
    }
}

/// Processing context handed to `start_video_client` (`videoproc_context`).
///
/// The values are passed through untouched; the native client validates them.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProcContext {
    pub gpu_index: c_int,
    pub target_format: c_int,
    pub target_fps: c_int,
}

impl VideoProcContext {
    pub fn new(gpu_index: i32, target_format: PixelFormat, target_fps: i32) -> Self {
        Self {
            gpu_index,
            target_format: target_format as c_int,
            target_fps,
        }
    }
}

impl Default for VideoProcContext {
    fn default() -> Self {
        Self::new(0, PixelFormat::Bgr24, 30)
    }
}

/// Entry points of the native video client.
///
/// Implementations must be callable from any thread. `client` arguments are
/// identities previously returned by [`create`](Self::create) and not yet
/// released; the safe wrapper in [`crate::client`] guarantees that.
pub trait NativeApi: Send + Sync {
    /// Global one-time initialization. Repeated calls must be harmless.
    fn init(&self);

    /// Creates a native client. Returns null on failure.
    fn create(&self) -> *mut c_void;

    fn release(&self, client: ClientId);

    fn connect(
        &self,
        client: ClientId,
        url: &CStr,
        timeout_sec: f32,
        on_disconnect: DisconnectFn,
    ) -> ApiStatus;

    fn disconnect(&self, client: ClientId) -> ApiStatus;

    fn start(&self, client: ClientId, ctx: VideoProcContext, on_frame: FrameFn) -> ApiStatus;

    fn stop(&self, client: ClientId) -> ApiStatus;

    fn set_max_queue_size(&self, client: ClientId, size: usize) -> ApiStatus;
}
