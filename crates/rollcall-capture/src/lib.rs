//! rollcall-capture: camera capture and the recognizer-service boundary.
//!
//! Provides V4L2 frame capture behind the [`camera::FrameSource`] trait
//! and a blocking Unix-socket client for the external face recognizer.
//! Detection, embedding comparison, and anti-spoofing all happen on the
//! far side of that socket; this crate only moves frames and verdicts.

pub mod camera;
pub mod frame;
pub mod recognizer;

pub use camera::{CameraError, FrameSource, V4l2Camera};
pub use frame::Frame;
pub use recognizer::{Identification, ImageReport, Recognizer, RecognizerError, SocketRecognizer};
