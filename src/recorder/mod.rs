//! Voice capture: the capture device seam and the recording state machine.
//!
//! * [`CaptureDevice`] / [`CaptureTrack`]: platform boundary; the track is
//!   owned through a [`TrackGuard`] so the device is released on every path.
//! * [`RecordingController`]: `Idle → Recording → Stopping → Processing`,
//!   producing an [`AudioUnit`](crate::backend::AudioUnit) for transcription.
//! * [`FileCapture`]: file-backed device for the terminal front end.

pub mod controller;
pub mod device;

pub use controller::{
    ProcessingStep, RecorderError, RecordingController, RecordingOutcome, RecordingState,
    TranscriptionError, TranscriptionJob,
};
pub use device::{
    CaptureDevice, CaptureEvent, CaptureSink, CaptureTrack, DeviceError, FileCapture, TrackGuard,
};
