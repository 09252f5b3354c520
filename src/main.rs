//! pxgrab: connect to a video stream and report frames as they arrive

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use flume::{bounded, TrySendError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use pxgrab::loopback::{self, LoopbackApi};
use pxgrab::{dispatch, Config, Frame, NativeApi, PixelFormat, VideoClient};

/// Real library when built with `--features native`, otherwise the loopback
/// backend plus a handle for driving it.
#[cfg(feature = "native")]
fn backend() -> (Arc<dyn NativeApi>, Option<Arc<LoopbackApi>>) {
    (Arc::new(pxgrab::native::VideoClientApi::new()), None)
}

#[cfg(not(feature = "native"))]
fn backend() -> (Arc<dyn NativeApi>, Option<Arc<LoopbackApi>>) {
    let api = Arc::new(LoopbackApi::new());
    (api.clone(), Some(api))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pxgrab=debug".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("pxgrab launching...");

    // Load configuration
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    pxgrab::CONFIG.store(Arc::new(config.clone()));
    info!(url = %config.client.url, "configuration loaded");

    let (api, loopback) = backend();
    pxgrab::init(api.as_ref());

    let mut client = VideoClient::create(api)?;
    client.set_max_queue_size(config.client.max_queue_size)?;

    // Native threads hand frames to the consumer task; a full queue drops.
    let (tx, rx) = bounded::<Frame>(config.client.max_queue_size.max(1));
    let disconnected = Arc::new(Notify::new());

    let notify = disconnected.clone();
    client.connect(
        &config.client.url,
        config.client.connect_timeout(),
        move |event| {
            warn!(code = event.code, message = %event.message, "stream disconnected");
            notify.notify_one();
            Ok(())
        },
    )?;

    client.start(config.processing.context(), move |frame| {
        match tx.try_send(frame) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(frame)) => {
                debug!(frame_num = frame.info.frame_num, "consumer behind, frame dropped")
            }
        }
        Ok(())
    })?;

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Ok(frame) = rx.recv_async().await {
            received += 1;
            if received % 30 == 1 {
                let device = &frame.info.device_info;
                info!(
                    frame_num = frame.info.frame_num,
                    len = frame.len(),
                    width = device.width,
                    height = device.height,
                    channel = %device.channel_name(),
                    "frame received"
                );
            }
        }
        received
    });

    // Synthetic source standing in for the native delivery thread
    let running = Arc::new(AtomicBool::new(true));
    let producer = match (loopback, client.id()) {
        (Some(api), Some(id)) => {
            let running = running.clone();
            let fps = config.processing.target_fps.max(1) as u64;
            let len = frame_len(&config);
            Some(tokio::task::spawn_blocking(move || {
                let mut sequence = 0u64;
                while running.load(Ordering::Relaxed) {
                    let (data, info) = loopback::test_pattern(sequence, len);
                    if !api.emit_frame(id, &data, &info) {
                        break;
                    }
                    sequence += 1;
                    std::thread::sleep(Duration::from_micros(1_000_000 / fps));
                }
                api.emit_disconnect(id, 0, "loopback source stopped");
            }))
        }
        _ => None,
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = disconnected.notified() => info!("remote side closed the stream"),
    }

    running.store(false, Ordering::Relaxed);
    client.stop()?;
    client.disconnect()?;
    if let Some(producer) = producer {
        producer.await?;
    }
    client.release();

    let received = consumer.await?;
    let stats = dispatch::stats();
    info!(received, ?stats, "pxgrab shutting down");
    Ok(())
}

/// Payload size of one synthetic frame at 640x480 in the configured format.
fn frame_len(config: &Config) -> usize {
    let pixels = 640 * 480;
    match config.processing.target_format {
        PixelFormat::Mono => pixels,
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => pixels * 3,
        PixelFormat::None => 1024,
    }
}
