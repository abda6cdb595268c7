//! Frame encoding and decoding over async byte streams.
//!
//! Decoding reads exactly `HEADER_LEN` bytes, validates the magic tag,
//! parses the opcode and payload length, then reads exactly that many
//! payload bytes. `read_exact` retries short reads internally, so a frame
//! is either delivered whole or the read fails — partial frames are never
//! interpreted.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    ARG_SEP, CRITICAL_MARKER, ERR_TOKEN, Frame, HEADER_LEN, LEN_WIDTH, MAGIC,
    MAX_ENCODED_PAYLOAD_LEN, MAX_PAYLOAD_LEN, OK_TOKEN, OPCODE_WIDTH, ProtocolError,
};

/// Reads one frame from the stream.
///
/// # Errors
///
/// - [`ProtocolError::BadMagic`] / [`ProtocolError::BadHeader`] — the
///   header was malformed; the payload (if any) has not been consumed.
/// - [`ProtocolError::PayloadTooLarge`] — the declared length exceeds
///   [`MAX_PAYLOAD_LEN`]; rejected before reading the payload.
/// - [`ProtocolError::Io`] — the stream failed or ended mid-frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    if &header[..MAGIC.len()] != MAGIC {
        return Err(ProtocolError::BadMagic);
    }

    let opcode = parse_digits(&header[MAGIC.len()..MAGIC.len() + OPCODE_WIDTH])?;
    let len = parse_digits(&header[MAGIC.len() + OPCODE_WIDTH..])? as usize;

    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Frame {
        opcode,
        payload: String::from_utf8_lossy(&payload).into_owned(),
    })
}

/// Parses a fixed-width ASCII decimal field.
fn parse_digits(field: &[u8]) -> Result<u16, ProtocolError> {
    let mut value: u16 = 0;
    for &b in field {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::BadHeader(format!(
                "non-digit byte 0x{b:02x} in numeric field"
            )));
        }
        value = value * 10 + u16::from(b - b'0');
    }
    Ok(value)
}

/// Encodes a client → server request frame (bare payload, no verdict token).
pub fn encode_request(opcode: u16, payload: &str) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(opcode, payload)
}

/// Encodes a successful server → client response: `ok;<payload>`.
pub fn encode_ok(opcode: u16, payload: &str) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(opcode, &format!("{OK_TOKEN}{ARG_SEP}{payload}"))
}

/// Encodes a failed server → client response: `err;<reason>`.
///
/// When `critical` is set the reserved [`CRITICAL_MARKER`] is appended as
/// a trailing field, signalling that this failure counts toward the
/// caller's invalid-operation throttle. The flag is the only way the
/// marker reaches the wire — handlers never splice it into reason text.
pub fn encode_err(
    opcode: u16,
    reason: &str,
    critical: bool,
) -> Result<Vec<u8>, ProtocolError> {
    let payload = if critical {
        format!("{ERR_TOKEN}{ARG_SEP}{reason}{ARG_SEP}{CRITICAL_MARKER}")
    } else {
        format!("{ERR_TOKEN}{ARG_SEP}{reason}")
    };
    encode_frame(opcode, &payload)
}

/// Lays out `MAGIC | opcode(3) | len(4, zero-padded) | payload`.
///
/// Only the length field bounds an outbound payload; the tight
/// [`MAX_PAYLOAD_LEN`] cap applies to reads alone, so responses built
/// from client-supplied fields still fit on the wire.
fn encode_frame(opcode: u16, payload: &str) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_ENCODED_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(format!("{opcode:03}").as_bytes());
    frame.extend_from_slice(
        format!("{len:0width$}", len = payload.len(), width = LEN_WIDTH).as_bytes(),
    );
    frame.extend_from_slice(payload.as_bytes());
    Ok(frame)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    async fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let mut cursor = bytes;
        read_frame(&mut cursor).await
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let bytes = encode_request(Opcode::Login.code(), "Alice").unwrap();
        let frame = decode(&bytes).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Login.code());
        assert_eq!(frame.payload, "Alice");
    }

    #[tokio::test]
    async fn test_ok_response_round_trip_with_multi_field_payload() {
        let bytes = encode_ok(Opcode::Move.code(), "1|0|0--0|0|0--0|0|0").unwrap();
        let frame = decode(&bytes).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Move.code());
        assert_eq!(frame.payload, "ok;1|0|0--0|0|0--0|0|0");
        assert_eq!(frame.args(), vec!["ok", "1|0|0--0|0|0--0|0|0"]);
    }

    #[tokio::test]
    async fn test_err_response_carries_reason() {
        let bytes = encode_err(Opcode::Join.code(), "player not in lobby", false).unwrap();
        let frame = decode(&bytes).await.unwrap();
        assert_eq!(frame.args(), vec!["err", "player not in lobby"]);
    }

    #[tokio::test]
    async fn test_critical_err_appends_marker_as_trailing_field() {
        let bytes = encode_err(Opcode::Move.code(), "not your turn", true).unwrap();
        let frame = decode(&bytes).await.unwrap();
        let args = frame.args();
        assert_eq!(args.last().copied(), Some(CRITICAL_MARKER));
        assert_eq!(args, vec!["err", "not your turn", CRITICAL_MARKER]);
    }

    #[test]
    fn test_encoded_header_layout_and_zero_padding() {
        let bytes = encode_request(Opcode::Join.code(), "").unwrap();
        assert_eq!(&bytes[..6], b"KIVUPS");
        assert_eq!(&bytes[6..9], b"002");
        assert_eq!(&bytes[9..13], b"0000");
        assert_eq!(bytes.len(), HEADER_LEN);

        let bytes = encode_ok(Opcode::YourTurn.code(), "").unwrap();
        assert_eq!(&bytes[6..9], b"010");
        // "ok;" is three bytes.
        assert_eq!(&bytes[9..13], b"0003");
    }

    #[tokio::test]
    async fn test_unknown_opcode_passes_through_raw() {
        let bytes = encode_request(42, "whatever").unwrap();
        let frame = decode(&bytes).await.unwrap();
        assert_eq!(frame.opcode, 42);
        assert_eq!(Opcode::from_code(frame.opcode), None);
    }

    #[tokio::test]
    async fn test_bad_magic_is_rejected() {
        let mut bytes = encode_request(Opcode::Ping.code(), "").unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes).await, Err(ProtocolError::BadMagic)));
    }

    #[tokio::test]
    async fn test_non_digit_length_is_rejected() {
        let mut bytes = encode_request(Opcode::Ping.code(), "").unwrap();
        bytes[9] = b'a';
        assert!(matches!(
            decode(&bytes).await,
            Err(ProtocolError::BadHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_declared_length_is_rejected_before_payload_read() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(b"011");
        bytes.extend_from_slice(b"9999");
        // No payload follows; the length check must fire before any
        // payload read could hit EOF.
        assert!(matches!(
            decode(&bytes).await,
            Err(ProtocolError::PayloadTooLarge(9999))
        ));
    }

    #[test]
    fn test_encoding_oversized_payload_fails() {
        let payload = "x".repeat(MAX_ENCODED_PAYLOAD_LEN + 1);
        assert!(matches!(
            encode_request(Opcode::Login.code(), &payload),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_responses_beyond_the_inbound_cap_still_encode() {
        // A welcome reply built from a long (but wire-legal) name can
        // exceed the inbound cap; it must still go out whole.
        let payload = "x".repeat(MAX_PAYLOAD_LEN + 50);
        let bytes = encode_ok(Opcode::Login.code(), &payload).unwrap();
        assert_eq!(&bytes[9..13], b"0181");

        // The same frame is over the limit coming back in.
        assert!(matches!(
            decode(&bytes).await,
            Err(ProtocolError::PayloadTooLarge(181))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_io_error() {
        let mut bytes = encode_request(Opcode::Login.code(), "Alice").unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(decode(&bytes).await, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn test_two_frames_back_to_back() {
        let mut bytes = encode_request(Opcode::Login.code(), "Alice").unwrap();
        bytes.extend(encode_request(Opcode::Join.code(), "").unwrap());

        let mut cursor = &bytes[..];
        let first = read_frame(&mut cursor).await.unwrap();
        let second = read_frame(&mut cursor).await.unwrap();
        assert_eq!(first.payload, "Alice");
        assert_eq!(second.opcode, Opcode::Join.code());
    }
}
