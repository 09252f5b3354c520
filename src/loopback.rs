//! In-process stand-in for the native video client
//!
//! [`LoopbackApi`] implements [`NativeApi`] without any network or decoder.
//! It keeps the callbacks the client layer hands it and, on
//! [`emit_frame`](LoopbackApi::emit_frame) / [`emit_disconnect`](LoopbackApi::emit_disconnect),
//! calls them through the C ABI with raw pointers into buffers it owns, the way
//! a native delivery thread does. Buffers are scrubbed right after each call.

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::api::{ApiStatus, ClientId, DisconnectFn, FrameFn, NativeApi, VideoProcContext};
use crate::codec::{FrameInfo, PixelFormat};

const ID_BASE: usize = 0x1000;
const ID_STRIDE: usize = 0x40;

// Shared by every backend instance: the callback registry is process-wide, so
// two live clients must never get the same identity.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Recorded state of one loopback client.
#[derive(Debug, Clone, Default)]
pub struct LoopbackClient {
    pub url: Option<String>,
    pub timeout_sec: f32,
    pub context: Option<VideoProcContext>,
    pub max_queue_size: Option<usize>,
    pub streaming: bool,
    on_disconnect: Option<DisconnectFn>,
    on_frame: Option<FrameFn>,
}

#[derive(Default)]
struct State {
    free: Vec<usize>,
    clients: HashMap<ClientId, LoopbackClient>,
    released: usize,
}

#[derive(Default)]
pub struct LoopbackApi {
    state: Mutex<State>,
    reuse_ids: bool,
    fail_next_create: AtomicBool,
    init_calls: AtomicUsize,
}

impl LoopbackApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out identities this instance freed again, like an allocator
    /// reusing addresses.
    pub fn with_identity_reuse() -> Self {
        Self {
            reuse_ids: true,
            ..Self::default()
        }
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn live_clients(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().released
    }

    pub fn client(&self, id: ClientId) -> Option<LoopbackClient> {
        self.state.lock().clients.get(&id).cloned()
    }

    /// Delivers one frame to the registered frame callback.
    ///
    /// Returns `false` when the client is unknown or not streaming, in which
    /// case nothing is called.
    pub fn emit_frame(&self, id: ClientId, data: &[u8], info: &FrameInfo) -> bool {
        let callback = {
            let state = self.state.lock();
            match state.clients.get(&id) {
                Some(client) if client.streaming => client.on_frame,
                _ => None,
            }
        };
        let Some(callback) = callback else {
            return false;
        };

        let mut buffer = data.to_vec();
        let mut header = Box::new(*info);
        trace!(client = %id, len = buffer.len(), "loopback frame");
        // SAFETY: both buffers outlive the call; the callback is one of ours.
        unsafe {
            callback(
                id.as_ptr(),
                buffer.as_mut_ptr(),
                buffer.len(),
                (&mut *header as *mut FrameInfo).cast::<c_void>(),
            );
        }
        buffer.fill(0xdd);
        *header = FrameInfo::default();
        true
    }

    /// Delivers a disconnect notification; the client stops streaming.
    pub fn emit_disconnect(&self, id: ClientId, code: i32, message: &str) -> bool {
        let callback = {
            let mut state = self.state.lock();
            match state.clients.get_mut(&id) {
                Some(client) => {
                    client.streaming = false;
                    client.on_disconnect
                }
                None => None,
            }
        };
        let Some(callback) = callback else {
            return false;
        };

        let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
        // SAFETY: `message` outlives the call.
        unsafe { callback(id.as_ptr(), code, message.as_ptr()) };
        true
    }
}

impl NativeApi for LoopbackApi {
    fn init(&self) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn create(&self) -> *mut c_void {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return std::ptr::null_mut();
        }

        let mut state = self.state.lock();
        let raw = match state.free.pop() {
            Some(raw) if self.reuse_ids => raw,
            _ => ID_BASE + NEXT_ID.fetch_add(1, Ordering::Relaxed) * ID_STRIDE,
        };
        let ptr = raw as *mut c_void;
        if let Some(id) = ClientId::from_ptr(ptr) {
            state.clients.insert(id, LoopbackClient::default());
            debug!(client = %id, "loopback client created");
        }
        ptr
    }

    fn release(&self, client: ClientId) {
        let mut state = self.state.lock();
        if state.clients.remove(&client).is_some() {
            state.released += 1;
            if self.reuse_ids {
                state.free.push(client.get());
            }
        }
    }

    fn connect(
        &self,
        client: ClientId,
        url: &CStr,
        timeout_sec: f32,
        on_disconnect: DisconnectFn,
    ) -> ApiStatus {
        let mut state = self.state.lock();
        let Some(entry) = state.clients.get_mut(&client) else {
            return ApiStatus::INVALID_CLIENT_CONTEXT;
        };

        let url = url.to_string_lossy();
        let Some((_, rest)) = url.split_once("://") else {
            return ApiStatus::INVALID_URL;
        };
        if rest.is_empty() {
            return ApiStatus::INVALID_URL;
        }
        if rest.starts_with("timeout") {
            return ApiStatus::CONNECT_TIMEOUT;
        }

        entry.url = Some(url.into_owned());
        entry.timeout_sec = timeout_sec;
        entry.on_disconnect = Some(on_disconnect);
        ApiStatus::SUCCESS
    }

    fn disconnect(&self, client: ClientId) -> ApiStatus {
        let mut state = self.state.lock();
        let Some(entry) = state.clients.get_mut(&client) else {
            return ApiStatus::INVALID_CLIENT_CONTEXT;
        };
        entry.url = None;
        entry.streaming = false;
        ApiStatus::SUCCESS
    }

    fn start(&self, client: ClientId, ctx: VideoProcContext, on_frame: FrameFn) -> ApiStatus {
        let mut state = self.state.lock();
        let Some(entry) = state.clients.get_mut(&client) else {
            return ApiStatus::INVALID_CLIENT_CONTEXT;
        };
        if entry.on_disconnect.is_none() || entry.url.is_none() {
            return ApiStatus::CALLBACK_NOT_SET;
        }
        if ctx.gpu_index < 0 {
            return ApiStatus::INVALID_GPU_INDEX;
        }
        if PixelFormat::try_from(ctx.target_format).is_err() {
            return ApiStatus::INIT_VIDEO_PROCESSOR_FAILED;
        }

        entry.context = Some(ctx);
        entry.on_frame = Some(on_frame);
        entry.streaming = true;
        ApiStatus::SUCCESS
    }

    fn stop(&self, client: ClientId) -> ApiStatus {
        let mut state = self.state.lock();
        let Some(entry) = state.clients.get_mut(&client) else {
            return ApiStatus::INVALID_CLIENT_CONTEXT;
        };
        entry.streaming = false;
        ApiStatus::SUCCESS
    }

    fn set_max_queue_size(&self, client: ClientId, size: usize) -> ApiStatus {
        let mut state = self.state.lock();
        let Some(entry) = state.clients.get_mut(&client) else {
            return ApiStatus::INVALID_CLIENT_CONTEXT;
        };
        entry.max_queue_size = Some(size);
        ApiStatus::SUCCESS
    }
}

/// Start code stamped on every synthetic header
pub const PATTERN_START_CODE: [u8; 4] = *b"PXMV";

const FRAME_INTERVAL_US: u64 = 33_333;

/// Builds a gradient payload of `len` bytes and a matching header.
///
/// `frame_len` saturates at `u32::MAX` for payloads the header cannot describe.
pub fn test_pattern(sequence: u64, len: usize) -> (Vec<u8>, FrameInfo) {
    let data = (0..len)
        .map(|i| (i as u64).wrapping_add(sequence) as u8)
        .collect();

    let timestamp_us = sequence.wrapping_mul(FRAME_INTERVAL_US);
    let mut info = FrameInfo::with_start_code(PATTERN_START_CODE);
    info.header_size = std::mem::size_of::<FrameInfo>() as u16;
    info.version = 1;
    info.frame_num = sequence;
    info.hw_frame_num = sequence;
    info.utc_timestamp_us = timestamp_us;
    info.hw_timestamp_us = timestamp_us;
    info.frame_len = u32::try_from(len).unwrap_or(u32::MAX);
    info.device_info.width = 640;
    info.device_info.height = 480;
    info.device_info.fps = 30.0;
    info.device_info.set_pixel_format(PixelFormat::Bgr24);
    info.device_info.set_channel_name("loopback");
    info.device_info.set_vendor("pxgrab");
    (data, info)
}
