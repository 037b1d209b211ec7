//! AMQP 0-9-1 frames and their wire format.
//!
//! [`frame`] holds the frame model with builders for every method the client speaks, [`codec`]
//! is the `tokio_util` encoder and decoder of those frames.
#[macro_use]
extern crate bitflags;

pub mod codec;
pub mod frame;


/// Malformed input found by the decoder. The code is the AMQP reply code the connection should
/// be closed with: `501` for framing errors and `502` for syntax errors.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameError {
    pub code: u16,
    pub message: String,
}

impl FrameError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for FrameError {}

/// `Framed` streams report decoder errors as `io::Error`.
impl From<FrameError> for std::io::Error {
    fn from(err: FrameError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// Builds an `Err(FrameError)` from a reply code and a message.
///
/// ```
/// use burrow_codec::{frame_error, FrameError};
///
/// fn frame_end(octet: u8) -> Result<(), FrameError> {
///     if octet != 0xCE {
///         return frame_error!(501, "Frame end octet is missing");
///     }
///
///     Ok(())
/// }
///
/// assert_eq!(frame_end(0x00).unwrap_err().code, 501);
/// ```
#[macro_export]
macro_rules! frame_error {
    ($code:expr, $message:expr) => {
        ::std::result::Result::Err($crate::FrameError::new($code, $message))
    };
}
