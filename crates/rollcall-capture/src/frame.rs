//! Captured frame type and pixel format conversion.

/// A grayscale camera frame handed to the recognizer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixels, `width * height` bytes, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    /// Driver sequence number of the dequeued buffer.
    pub sequence: u32,
}

impl Frame {
    /// Average pixel brightness (0.0-255.0), used by camera diagnostics.
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| f32::from(b)).sum::<f32>() / self.data.len() as f32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to grayscale by keeping the Y channel.
///
/// YUYV packs two pixels in 4 bytes as [Y0, U, Y1, V], so luma sits at
/// every even byte offset.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}
