//! Bindings to the shipped `libVideoClientAPI`

use std::ffi::{c_void, CStr};
use std::sync::Once;

use libc::{c_char, c_float, c_int};
use tracing::info;

use crate::api::{ApiStatus, ClientId, DisconnectFn, FrameFn, NativeApi, VideoProcContext};

/// Opaque native client handle (`video_client`).
type RawClient = *mut c_void;

#[link(name = "VideoClientAPI")]
#[link(name = "NvDecoder")]
extern "C" {
    fn api_init();
    fn create_video_client() -> RawClient;
    fn release_video_client(client: RawClient);
    fn connect_video_client(
        client: RawClient,
        url: *const c_char,
        timeout_sec: c_float,
        callback: DisconnectFn,
    ) -> c_int;
    fn disconnect_video_client(client: RawClient) -> c_int;
    fn start_video_client(client: RawClient, ctx: VideoProcContext, callback: FrameFn) -> c_int;
    fn stop_video_client(client: RawClient) -> c_int;
    fn set_max_queue_size(client: RawClient, size: usize) -> c_int;
}

static API_INIT: Once = Once::new();

/// The real native client library.
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoClientApi;

impl VideoClientApi {
    pub fn new() -> Self {
        Self
    }
}

// SAFETY for every call below: `ClientId`s come from `create_video_client` and
// the owning `VideoClient` stops handing them out once released.
impl NativeApi for VideoClientApi {
    fn init(&self) {
        API_INIT.call_once(|| {
            unsafe { api_init() };
            info!("VideoClientAPI initialized");
        });
    }

    fn create(&self) -> *mut c_void {
        unsafe { create_video_client() }
    }

    fn release(&self, client: ClientId) {
        unsafe { release_video_client(client.as_ptr()) }
    }

    fn connect(
        &self,
        client: ClientId,
        url: &CStr,
        timeout_sec: f32,
        on_disconnect: DisconnectFn,
    ) -> ApiStatus {
        ApiStatus(unsafe {
            connect_video_client(client.as_ptr(), url.as_ptr(), timeout_sec, on_disconnect)
        })
    }

    fn disconnect(&self, client: ClientId) -> ApiStatus {
        ApiStatus(unsafe { disconnect_video_client(client.as_ptr()) })
    }

    fn start(&self, client: ClientId, ctx: VideoProcContext, on_frame: FrameFn) -> ApiStatus {
        ApiStatus(unsafe { start_video_client(client.as_ptr(), ctx, on_frame) })
    }

    fn stop(&self, client: ClientId) -> ApiStatus {
        ApiStatus(unsafe { stop_video_client(client.as_ptr()) })
    }

    fn set_max_queue_size(&self, client: ClientId, size: usize) -> ApiStatus {
        ApiStatus(unsafe { set_max_queue_size(client.as_ptr(), size) })
    }
}
