//! Capture device seam and the RAII track guard.
//!
//! A [`CaptureDevice`] opens a [`CaptureTrack`] after the (possibly
//! interactive) permission prompt.  The track pushes [`CaptureEvent`]s into
//! the [`CaptureSink`] it was opened with; every event carries the session
//! number so the controller can drop events from an earlier recording.
//!
//! [`TrackGuard`] owns the open track and releases it when dropped, so the
//! device is freed on every exit path.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CaptureEvent / CaptureSink
// ---------------------------------------------------------------------------

/// Something a capture track reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// An encoded chunk of audio.
    Data { session: u64, bytes: Vec<u8> },
    /// The track finalized; no more data follows.
    Finished { session: u64 },
}

impl CaptureEvent {
    pub fn session(&self) -> u64 {
        match self {
            CaptureEvent::Data { session, .. } | CaptureEvent::Finished { session } => *session,
        }
    }
}

/// Where a track delivers its events.  Bound to one recording session.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    session: u64,
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl CaptureSink {
    pub fn new(session: u64, tx: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Deliver a data chunk.  Empty chunks are skipped.
    pub fn data(&self, bytes: Vec<u8>) -> bool {
        if bytes.is_empty() {
            return true;
        }
        self.tx
            .send(CaptureEvent::Data {
                session: self.session,
                bytes,
            })
            .is_ok()
    }

    /// Report that the track finalized.
    pub fn finished(&self) -> bool {
        self.tx
            .send(CaptureEvent::Finished {
                session: self.session,
            })
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Why a capture device could not be opened.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open capture track.
pub trait CaptureTrack: Send {
    /// Ask the track to finalize.  It must eventually report
    /// [`CaptureEvent::Finished`] to its sink.
    fn stop(&mut self);

    /// Release the underlying device.  Called exactly once, by
    /// [`TrackGuard`].
    fn release(&mut self);
}

/// An audio input that can be opened for one recording at a time.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Whether the device can produce `mime_type`.
    fn supports(&self, mime_type: &str) -> bool;

    /// Acquire the device and start capturing into `sink`.  May await a
    /// permission prompt.
    async fn open(
        &self,
        mime_type: &str,
        sink: CaptureSink,
    ) -> Result<Box<dyn CaptureTrack>, DeviceError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureDevice>, _: Box<dyn CaptureTrack>) {}
};

// ---------------------------------------------------------------------------
// TrackGuard
// ---------------------------------------------------------------------------

/// RAII guard over an open track; dropping it releases the device.
pub struct TrackGuard {
    track: Box<dyn CaptureTrack>,
}

impl TrackGuard {
    pub fn new(track: Box<dyn CaptureTrack>) -> Self {
        Self { track }
    }

    pub fn stop(&mut self) {
        self.track.stop();
    }
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.track.release();
        log::debug!("recorder: capture track released");
    }
}

// ---------------------------------------------------------------------------
// FileCapture
// ---------------------------------------------------------------------------

/// A capture device that "records" a pre-encoded audio file.
///
/// Used by the terminal front end: opening the device reads the file, and
/// stopping the track replays its bytes in `chunk_bytes` pieces before
/// reporting the end of the recording.  A missing file is treated like a
/// denied permission prompt.
pub struct FileCapture {
    path: Option<PathBuf>,
    chunk_bytes: usize,
}

impl FileCapture {
    pub fn new(path: Option<PathBuf>, chunk_bytes: usize) -> Self {
        Self {
            path,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Encoding implied by the file extension.
    fn encoding(&self) -> Option<&'static str> {
        let ext = self.path.as_ref()?.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "webm" => Some("audio/webm"),
            "ogg" | "opus" => Some("audio/ogg"),
            "wav" => Some("audio/wav"),
            "mp4" | "m4a" => Some("audio/mp4"),
            _ => None,
        }
    }
}

#[async_trait]
impl CaptureDevice for FileCapture {
    fn supports(&self, mime_type: &str) -> bool {
        match self.encoding() {
            Some(encoding) => mime_type.split(';').next().map(str::trim) == Some(encoding),
            None => false,
        }
    }

    async fn open(
        &self,
        mime_type: &str,
        sink: CaptureSink,
    ) -> Result<Box<dyn CaptureTrack>, DeviceError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| DeviceError::Unavailable("no recording.input_file configured".into()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {e}", path.display())))?;

        log::info!(
            "recorder: capturing {} ({} bytes, {mime_type})",
            path.display(),
            bytes.len()
        );
        Ok(Box::new(FileTrack {
            bytes,
            chunk_bytes: self.chunk_bytes,
            sink,
            stopped: false,
        }))
    }
}

struct FileTrack {
    bytes: Vec<u8>,
    chunk_bytes: usize,
    sink: CaptureSink,
    stopped: bool,
}

impl CaptureTrack for FileTrack {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for chunk in self.bytes.chunks(self.chunk_bytes) {
            self.sink.data(chunk.to_vec());
        }
        self.sink.finished();
    }

    fn release(&mut self) {
        self.bytes.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
