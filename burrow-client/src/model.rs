//! Protocol numbers shared by the client modules.
use burrow_codec::frame;

pub type ChannelNumber = frame::Channel;
pub type ClassMethod = frame::ClassMethod;

/// Reply codes which close the whole connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    ConnectionForced = 320,
    InvalidPath = 402,
    AccessRefused = 403,
    /// Malformed frame, or a frame bigger than the negotiated maximum.
    FrameError = 501,
    SyntaxError = 502,
    /// A method arrived in a state where it makes no sense, like a second tune.
    CommandInvalid = 503,
    /// Frame on a channel which is not open.
    ChannelError = 504,
    /// Content frame without a preceding publish, deliver or get-ok.
    UnexpectedFrame = 505,
    /// No free channel number left below the negotiated channel max.
    ResourceError = 506,
    NotAllowed = 530,
    NotImplemented = 540,
    InternalError = 541,
}

impl ConnectionError {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Reply codes which close only the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Not an error: the close was asked for.
    Success = 200,
    ContentTooLarge = 311,
    /// Mandatory message without a matching binding, comes in basic-return.
    NoRoute = 312,
    NoConsumers = 313,
    AccessRefused = 403,
    NotFound = 404,
    /// Exclusive queue of another connection.
    ResourceLocked = 405,
    PreconditionFailed = 406,
}

impl ChannelError {
    pub const fn code(self) -> u16 {
        self as u16
    }
}
