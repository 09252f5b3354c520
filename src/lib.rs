//! Safe Rust front end for the VideoClientAPI streaming client
//!
//! The native client owns its connection and decode threads and reports frames
//! and disconnects through C callbacks. This crate wraps each native client in
//! an owning [`VideoClient`], keeps one replaceable callback per client and
//! event kind in a process-wide [`registry`], and routes native callbacks
//! through the trampolines in [`dispatch`], which copy every buffer and header
//! before caller code sees it.

pub mod api;
pub mod client;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod loopback;
#[cfg(feature = "native")]
pub mod native;
pub mod registry;

use std::path::Path;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use api::{ApiError, ApiStatus, ClientId, NativeApi, VideoProcContext};
pub use client::{init, VideoClient};
pub use codec::{
    CameraExtrinsic, CameraModel, CameraParameter, DeviceInfo, FisheyeModel, FrameInfo,
    Intrinsics, PinholeModel, PixelFormat,
};
pub use error::{ClientError, CodecError, ConfigError};
pub use event::{Disconnect, EventKind, Frame};
pub use registry::{registry, CallbackRegistry, DisconnectCallback, FrameCallback};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub processing: ProcessingConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    pub max_queue_size: usize,
}

/// Values forwarded to the native decoder as a [`VideoProcContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub gpu_index: i32,
    pub target_format: PixelFormat,
    pub target_fps: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Run every callback under one process-wide re-entrant lock
    pub serialize_callbacks: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "tcp://127.0.0.1:5000".into(),
            connect_timeout_ms: 5_000,
            max_queue_size: 8,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            gpu_index: 0,
            target_format: PixelFormat::Bgr24,
            target_fps: 30,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ProcessingConfig {
    pub fn context(&self) -> VideoProcContext {
        VideoProcContext::new(self.gpu_index, self.target_format, self.target_fps)
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `PXGRAB_*` environment
    /// variables (`PXGRAB_CLIENT__URL`, `PXGRAB_DISPATCH__SERIALIZE_CALLBACKS`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PXGRAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_round_trip_through_loader() {
        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.processing, ProcessingConfig::default());
        assert_eq!(loaded.client.max_queue_size, 8);
        assert!(!loaded.dispatch.serialize_callbacks);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[client]
url = "rtsp://10.0.0.7:8554/cam0"
connect_timeout_ms = 1500

[processing]
gpu_index = 1
target_format = "mono"

[dispatch]
serialize_callbacks = true
"#
        )
        .unwrap();

        let loaded = Config::load(Some(file.path())).unwrap();
        assert_eq!(loaded.client.url, "rtsp://10.0.0.7:8554/cam0");
        assert_eq!(loaded.client.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(loaded.client.max_queue_size, 8);
        assert_eq!(
            loaded.processing.context(),
            VideoProcContext::new(1, PixelFormat::Mono, 30)
        );
        assert!(loaded.dispatch.serialize_callbacks);
    }
}
