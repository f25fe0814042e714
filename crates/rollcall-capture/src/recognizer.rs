//! Client for the external face recognizer service.
//!
//! The recognizer owns detection, embedding comparison, and anti-spoofing,
//! and indexes the employees directory out-of-band. The kiosk talks to it
//! over a Unix socket with length-prefixed bincode messages and treats the
//! whole thing as opaque: frames go in, verdicts come out.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::frame::Frame;

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognizer unreachable at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("recognizer transport failed: {0}")]
    Transport(#[from] std::io::Error),
    #[error("recognizer codec failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("recognizer protocol violation: {0}")]
    Protocol(String),
    /// The service answered but could not process this request (for
    /// example, inference failed on one frame). Sessions treat this as a
    /// miss and keep going; it never aborts the loop.
    #[error("recognizer backend error: {0}")]
    Backend(String),
}

/// Verdict for one camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Best match at or above the configured confidence, if any.
    pub employee_id: Option<String>,
    pub confidence: f32,
    /// False when anti-spoofing decided the face is not a live person.
    pub is_live: bool,
}

/// What the recognizer saw in a still image (registration path).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    pub faces: u32,
    /// Detection confidence of the most prominent face.
    pub confidence: f32,
}

/// The recognition collaborator interface.
///
/// Sessions and registration depend on this trait, never on the socket
/// client directly, so tests can script verdicts.
pub trait Recognizer {
    /// Identify the person in a live camera frame.
    fn identify(&mut self, frame: &Frame) -> Result<Identification, RecognizerError>;

    /// Count faces in an encoded still image (PNG/JPEG bytes as given).
    fn inspect(&mut self, image: &[u8]) -> Result<ImageReport, RecognizerError>;
}

/// Wire format shared with the recognizer service.
pub mod protocol {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Serialize};
    use std::io::{Read, Write};

    use super::RecognizerError;

    /// Upper bound on one message. Grayscale frames are ~300 KiB;
    /// registration photos can run to a few MiB.
    pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Request {
        /// Identify the person in a grayscale frame. Threshold and the
        /// anti-spoof toggle ride along: the service owns both checks.
        Identify {
            width: u32,
            height: u32,
            data: Vec<u8>,
            min_confidence: f32,
            require_liveness: bool,
        },
        /// Report faces in an encoded still image.
        Inspect { image: Vec<u8> },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Response {
        Identified {
            employee_id: Option<String>,
            confidence: f32,
            is_live: bool,
        },
        Inspected {
            faces: u32,
            confidence: f32,
        },
        Failed {
            message: String,
        },
    }

    /// Write one message: u32 little-endian payload length, then the
    /// bincode payload.
    pub fn write_message<T: Serialize>(
        writer: &mut impl Write,
        msg: &T,
    ) -> Result<(), RecognizerError> {
        let payload = bincode::serialize(msg)?;
        if payload.len() > MAX_MESSAGE_BYTES {
            return Err(RecognizerError::Protocol(format!(
                "outgoing message too large: {} bytes",
                payload.len()
            )));
        }
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one length-prefixed message, refusing oversized frames.
    pub fn read_message<T: DeserializeOwned>(
        reader: &mut impl Read,
    ) -> Result<T, RecognizerError> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_BYTES {
            return Err(RecognizerError::Protocol(format!(
                "refusing {len} byte message"
            )));
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        Ok(bincode::deserialize(&payload)?)
    }
}

use protocol::{Request, Response};

/// Blocking Unix-socket client for the recognizer service.
///
/// Connects per request; the service is free to restart between frames
/// without the kiosk noticing.
pub struct SocketRecognizer {
    socket_path: PathBuf,
    min_confidence: f32,
    require_liveness: bool,
}

impl SocketRecognizer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        min_confidence: f32,
        require_liveness: bool,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            min_confidence,
            require_liveness,
        }
    }

    fn call(&self, request: &Request) -> Result<Response, RecognizerError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|e| RecognizerError::Connect {
                path: self.socket_path.clone(),
                source: e,
            })?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        protocol::write_message(&mut stream, request)?;
        protocol::read_message(&mut stream)
    }
}

impl Recognizer for SocketRecognizer {
    fn identify(&mut self, frame: &Frame) -> Result<Identification, RecognizerError> {
        let response = self.call(&Request::Identify {
            width: frame.width,
            height: frame.height,
            data: frame.data.clone(),
            min_confidence: self.min_confidence,
            require_liveness: self.require_liveness,
        })?;

        match response {
            Response::Identified {
                employee_id,
                confidence,
                is_live,
            } => {
                tracing::debug!(
                    employee = employee_id.as_deref().unwrap_or("-"),
                    confidence,
                    is_live,
                    "identify verdict"
                );
                Ok(Identification {
                    employee_id,
                    confidence,
                    is_live,
                })
            }
            Response::Failed { message } => Err(RecognizerError::Backend(message)),
            other => Err(RecognizerError::Protocol(format!(
                "unexpected response to identify: {other:?}"
            ))),
        }
    }

    fn inspect(&mut self, image: &[u8]) -> Result<ImageReport, RecognizerError> {
        let response = self.call(&Request::Inspect {
            image: image.to_vec(),
        })?;

        match response {
            Response::Inspected { faces, confidence } => Ok(ImageReport { faces, confidence }),
            Response::Failed { message } => Err(RecognizerError::Backend(message)),
            other => Err(RecognizerError::Protocol(format!(
                "unexpected response to inspect: {other:?}"
            ))),
        }
    }
}
