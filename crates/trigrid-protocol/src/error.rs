//! Error types for the protocol layer.

/// Errors that can occur while framing or deframing.
///
/// The dispatcher's policy differs per variant: a frame with a bad magic
/// tag or an unparsable header is dropped and the connection kept, while
/// an oversized payload or an I/O failure tears the connection down.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The six-byte magic tag did not match.
    #[error("bad magic tag in frame header")]
    BadMagic,

    /// The opcode or length field was not the expected ASCII digits.
    #[error("unparsable frame header: {0}")]
    BadHeader(String),

    /// The payload does not fit the applicable bound: the inbound read
    /// cap, or the four-digit length field when encoding. Reads check
    /// this before the payload read is attempted.
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),

    /// Reading or writing the underlying stream failed (includes EOF
    /// mid-frame — partial frames are never interpreted).
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}
