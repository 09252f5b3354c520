//! Trampolines invoked by the native client on its own threads
//!
//! [`on_frame`] and [`on_disconnect`] are the only functions native code ever
//! calls. They copy whatever the native client hands over, look up the
//! caller's callback in the [`registry`](crate::registry::registry) and run it.
//! Nothing escapes back into native code: callback errors and panics are
//! logged and counted, and the trampoline always returns normally.

use std::any::Any;
use std::ffi::{c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use crossbeam::utils::CachePadded;
use libc::{c_char, c_int};
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{error, info, trace, warn};

use crate::api::ClientId;
use crate::codec::FrameInfo;
use crate::event::{Disconnect, EventKind, Frame};
use crate::registry::{registry, CallbackRegistry};
use crate::CONFIG;

/// Snapshot of trampoline activity since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub disconnects_delivered: u64,
    pub disconnects_dropped: u64,
    pub callback_failures: u64,
}

struct Counters {
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    disconnects_delivered: AtomicU64,
    disconnects_dropped: AtomicU64,
    callback_failures: AtomicU64,
}

static COUNTERS: CachePadded<Counters> = CachePadded::new(Counters {
    frames_delivered: AtomicU64::new(0),
    frames_dropped: AtomicU64::new(0),
    disconnects_delivered: AtomicU64::new(0),
    disconnects_dropped: AtomicU64::new(0),
    callback_failures: AtomicU64::new(0),
});

pub fn stats() -> DispatchStats {
    DispatchStats {
        frames_delivered: COUNTERS.frames_delivered.load(Ordering::Relaxed),
        frames_dropped: COUNTERS.frames_dropped.load(Ordering::Relaxed),
        disconnects_delivered: COUNTERS.disconnects_delivered.load(Ordering::Relaxed),
        disconnects_dropped: COUNTERS.disconnects_dropped.load(Ordering::Relaxed),
        callback_failures: COUNTERS.callback_failures.load(Ordering::Relaxed),
    }
}

fn record_delivered(kind: EventKind) {
    let counter = match kind {
        EventKind::Frame => &COUNTERS.frames_delivered,
        EventKind::Disconnect => &COUNTERS.disconnects_delivered,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("pxgrab_events_delivered_total", "kind" => kind.as_str()).increment(1);
}

fn record_dropped(kind: EventKind) {
    let counter = match kind {
        EventKind::Frame => &COUNTERS.frames_dropped,
        EventKind::Disconnect => &COUNTERS.disconnects_dropped,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("pxgrab_events_dropped_total", "kind" => kind.as_str()).increment(1);
}

fn record_failure(kind: EventKind) {
    COUNTERS.callback_failures.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("pxgrab_callback_failures_total", "kind" => kind.as_str()).increment(1);
}

// Process-wide execution context for callers that cannot take concurrent entry.
static EXECUTION_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

fn execution_guard() -> Option<ReentrantMutexGuard<'static, ()>> {
    if CONFIG.load().dispatch.serialize_callbacks {
        Some(EXECUTION_LOCK.lock())
    } else {
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Runs one callback inside the execution context, containing any failure.
fn invoke(kind: EventKind, client: ClientId, callback: impl FnOnce() -> color_eyre::Result<()>) {
    let _guard = execution_guard();
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => record_delivered(kind),
        Ok(Err(report)) => {
            error!(client = %client, kind = %kind, error = ?report, "callback failed");
            record_failure(kind);
        }
        Err(payload) => {
            error!(
                client = %client,
                kind = %kind,
                panic = panic_message(payload.as_ref()),
                "callback panicked"
            );
            record_failure(kind);
        }
    }
}

/// Copies `data` and hands the frame to the callback registered for `client`.
///
/// Returns whether a callback was found. Callback failures are contained here.
pub fn deliver_frame(
    registry: &CallbackRegistry,
    client: ClientId,
    data: &[u8],
    info: FrameInfo,
) -> bool {
    let Some(callback) = registry.frame_callback(client) else {
        info!(client = %client, len = data.len(), "no frame callback registered, dropping frame");
        record_dropped(EventKind::Frame);
        return false;
    };

    let frame = Frame {
        client,
        data: Bytes::copy_from_slice(data),
        info,
        received: Instant::now(),
    };
    trace!(client = %client, len = frame.len(), frame_num = info.frame_num, "delivering frame");
    invoke(EventKind::Frame, client, move || callback(frame));
    true
}

/// Hands a disconnect notification to the callback registered for `client`.
pub fn deliver_disconnect(
    registry: &CallbackRegistry,
    client: ClientId,
    code: i32,
    message: String,
) -> bool {
    let Some(callback) = registry.disconnect_callback(client) else {
        info!(client = %client, code, %message, "no disconnect callback registered");
        record_dropped(EventKind::Disconnect);
        return false;
    };

    let event = Disconnect {
        client,
        code,
        message,
    };
    invoke(EventKind::Disconnect, client, move || callback(event));
    true
}

/// Frame entry point handed to `start_video_client`.
///
/// # Safety
/// Called by the native client. `data` must be null or valid for `size` bytes
/// and `frame_info` null or point to a frame header, both for the duration of
/// the call. Neither is retained.
pub unsafe extern "C" fn on_frame(
    client: *mut c_void,
    data: *mut u8,
    size: usize,
    frame_info: *mut c_void,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(id) = ClientId::from_ptr(client) else {
            warn!("frame event with null client context");
            return;
        };

        let payload: &[u8] = if size == 0 {
            &[]
        } else if data.is_null() {
            warn!(client = %id, size, "frame event with null data, dropping");
            record_dropped(EventKind::Frame);
            return;
        } else {
            // SAFETY: the native client guarantees `size` readable bytes for this call.
            unsafe { slice::from_raw_parts(data, size) }
        };

        // SAFETY: `frame_info` is null or a complete header for the duration of this call.
        let info = match unsafe { FrameInfo::from_native(frame_info.cast::<FrameInfo>()) } {
            Some(info) => info,
            None => {
                warn!(client = %id, "frame event without metadata");
                FrameInfo::default()
            }
        };

        deliver_frame(registry(), id, payload, info);
    }));

    if outcome.is_err() {
        error!("frame trampoline panicked; event discarded");
    }
}

/// Disconnect entry point handed to `connect_video_client`.
///
/// # Safety
/// Called by the native client. `msg` must be null or a NUL-terminated string
/// valid for the duration of the call.
pub unsafe extern "C" fn on_disconnect(client: *mut c_void, code: c_int, msg: *const c_char) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(id) = ClientId::from_ptr(client) else {
            warn!(code, "disconnect event with null client context");
            return;
        };

        let message = if msg.is_null() {
            String::new()
        } else {
            // SAFETY: non-null `msg` is NUL-terminated per the native contract.
            unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
        };

        deliver_disconnect(registry(), id, code, message);
    }));

    if outcome.is_err() {
        error!("disconnect trampoline panicked; event discarded");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use color_eyre::eyre::eyre;

    use super::*;

    fn id(raw: usize) -> ClientId {
        ClientId::from_ptr(raw as *mut c_void).unwrap()
    }

    #[test]
    fn frame_is_copied_before_callback_runs() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        registry.register_frame(
            id(0x100),
            Arc::new(move |frame: Frame| {
                *sink.lock().unwrap() = Some(frame);
                Ok(())
            }),
        );

        let mut native = vec![7u8; 64];
        let mut info = FrameInfo::default();
        info.frame_len = 64;
        assert!(deliver_frame(&registry, id(0x100), &native, info));
        native.fill(0);

        let frame = seen.lock().unwrap().take().unwrap();
        assert_eq!(frame.len(), 64);
        assert!(frame.data.iter().all(|&b| b == 7));
        assert_eq!(frame.info.frame_len, 64);
        assert_eq!(frame.client, id(0x100));
    }

    #[test]
    fn missing_callback_drops_silently() {
        let registry = CallbackRegistry::new();
        assert!(!deliver_frame(&registry, id(0x200), b"abc", FrameInfo::default()));
        assert!(!deliver_disconnect(&registry, id(0x200), 1, "gone".into()));
    }

    #[test]
    fn failing_callback_does_not_block_next_event() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry.register_frame(
            id(0x300),
            Arc::new(move |frame: Frame| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                match n {
                    0 => Err(eyre!("bad frame {}", frame.info.frame_num)),
                    1 => panic!("callback blew up"),
                    _ => Ok(()),
                }
            }),
        );

        for _ in 0..3 {
            assert!(deliver_frame(&registry, id(0x300), b"x", FrameInfo::default()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn disconnect_carries_code_and_message() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.register_disconnect(
            id(0x400),
            Arc::new(move |event: Disconnect| {
                sink.lock().unwrap().push(event);
                Ok(())
            }),
        );

        assert!(deliver_disconnect(&registry, id(0x400), -3, "peer reset".into()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Disconnect {
                client: id(0x400),
                code: -3,
                message: "peer reset".into()
            }]
        );
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn null_client_context_is_ignored() {
        unsafe {
            on_frame(std::ptr::null_mut(), std::ptr::null_mut(), 0, std::ptr::null_mut());
            on_disconnect(std::ptr::null_mut(), 0, std::ptr::null());
        }
    }
}
