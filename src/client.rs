//! Owning handle around one native video client

use std::ffi::CString;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::api::{ClientId, NativeApi, VideoProcContext};
use crate::dispatch;
use crate::error::ClientError;
use crate::event::{Disconnect, Frame};
use crate::registry::registry;

/// Global one-time initialization of the native library.
pub fn init(api: &dyn NativeApi) {
    debug!("initializing native video client api");
    api.init();
}

/// One native client instance.
///
/// The handle owns the native client: it is released exactly once, by
/// [`release`](Self::release) or on drop. After that every operation fails
/// with [`ClientError::Closed`] and the identity is gone, so it can never be
/// confused with a later client that happens to get the same native pointer.
/// The handle is deliberately not `Clone`.
pub struct VideoClient {
    api: Arc<dyn NativeApi>,
    id: Option<ClientId>,
}

impl VideoClient {
    /// Creates a native client and takes ownership of it.
    #[instrument(skip(api))]
    pub fn create(api: Arc<dyn NativeApi>) -> Result<Self, ClientError> {
        let id = ClientId::from_ptr(api.create()).ok_or(ClientError::CreateFailed)?;
        info!(client = %id, "video client created");
        Ok(Self { api, id: Some(id) })
    }

    /// Identity used as the registry key, `None` once released.
    pub fn id(&self) -> Option<ClientId> {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    fn live(&self) -> Result<ClientId, ClientError> {
        self.id.ok_or(ClientError::Closed)
    }

    /// Registers `on_disconnect` (replacing any previous one) and connects.
    #[instrument(skip(self, on_disconnect), fields(client = ?self.id))]
    pub fn connect<F>(&self, url: &str, timeout: Duration, on_disconnect: F) -> Result<(), ClientError>
    where
        F: Fn(Disconnect) -> color_eyre::Result<()> + Send + Sync + 'static,
    {
        let id = self.live()?;
        let url = CString::new(url).map_err(|_| ClientError::InvalidUrl)?;

        registry().register_disconnect(id, Arc::new(on_disconnect));
        self.api
            .connect(id, &url, timeout.as_secs_f32(), dispatch::on_disconnect)
            .into_result()?;
        info!(client = %id, "connected");
        Ok(())
    }

    #[instrument(skip(self), fields(client = ?self.id))]
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let id = self.live()?;
        self.api.disconnect(id).into_result()?;
        info!(client = %id, "disconnected");
        Ok(())
    }

    /// Registers `on_frame` (replacing any previous one) and starts streaming.
    #[instrument(skip(self, on_frame), fields(client = ?self.id))]
    pub fn start<F>(&self, ctx: VideoProcContext, on_frame: F) -> Result<(), ClientError>
    where
        F: Fn(Frame) -> color_eyre::Result<()> + Send + Sync + 'static,
    {
        let id = self.live()?;

        registry().register_frame(id, Arc::new(on_frame));
        self.api.start(id, ctx, dispatch::on_frame).into_result()?;
        info!(client = %id, "streaming started");
        Ok(())
    }

    /// Stops future deliveries. A callback already running is not interrupted.
    #[instrument(skip(self), fields(client = ?self.id))]
    pub fn stop(&self) -> Result<(), ClientError> {
        let id = self.live()?;
        self.api.stop(id).into_result()?;
        info!(client = %id, "streaming stopped");
        Ok(())
    }

    pub fn set_max_queue_size(&self, size: usize) -> Result<(), ClientError> {
        let id = self.live()?;
        self.api.set_max_queue_size(id, size).into_result()?;
        debug!(client = %id, size, "max queue size set");
        Ok(())
    }

    /// Releases the native client. Calling it again is a no-op.
    ///
    /// Registered callbacks are removed before the native client is freed, so
    /// an identity reused by a later client starts with no callbacks.
    pub fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        registry().unregister(id);
        self.api.release(id);
        info!(client = %id, "video client released");
    }
}

impl Drop for VideoClient {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for VideoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoClient").field("id", &self.id).finish()
    }
}
