//! Newline-delimited JSON framing over a duplex byte
//! stream, shared by the host's Socket Hub and the provider-side runtime so
//! both ends of the IPC socket agree on exactly one framing implementation.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::Frame;

/// Default ceiling on a single accumulated (pre-newline) frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Errors the codec can produce while decoding or encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A delimited chunk was not a well-formed JSON frame object.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    /// An accumulated buffer exceeded the configured size ceiling before a
    /// newline was found.
    #[error("frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge {
        /// The configured ceiling that was exceeded.
        limit: usize,
    },
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// `tokio_util::codec::{Decoder, Encoder}` implementation for [`Frame`].
///
/// Decoding splits the input on `\n`; each delimited chunk (with the
/// newline stripped) is parsed as a single JSON object. An empty chunk
/// (a bare newline) is ignored rather than treated as malformed, matching
/// the documented empty-frame handling. Encoding serializes one JSON object
/// per call and appends exactly one trailing `\n`.
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Construct a codec with the default 4 MiB frame size ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Construct a codec with a custom frame size ceiling.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        loop {
            let Some(newline_at) = buf.iter().position(|&b| b == b'\n') else {
                if buf.len() > self.max_frame_size {
                    return Err(CodecError::FrameTooLarge {
                        limit: self.max_frame_size,
                    });
                }
                return Ok(None);
            };

            if newline_at > self.max_frame_size {
                return Err(CodecError::FrameTooLarge {
                    limit: self.max_frame_size,
                });
            }

            let line = buf.split_to(newline_at);
            buf.advance(1); // drop the newline itself

            if line.is_empty() {
                // Empty frame (just "\n") — ignored, keep looking.
                continue;
            }

            let frame: Frame = serde_json::from_slice(&line)?;
            return Ok(Some(frame));
        }
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_vec(item)?;
        dst.extend_from_slice(&json);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        Encoder::<&Frame>::encode(self, &item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, RegisterData, ToolDescriptor};

    fn sample_frame() -> Frame {
        Frame::Register {
            data: RegisterData {
                name: "calc".into(),
                version: "1.0.0".into(),
                description: String::new(),
                tools: vec![ToolDescriptor {
                    name: "add".into(),
                    description: "adds".into(),
                    input_schema: serde_json::json!({"type": "object"}),
                    output_schema: None,
                }],
                pid: None,
            },
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let original = sample_frame();
        Encoder::<&Frame>::encode(&mut codec, &original, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().expect("one frame");
        assert_eq!(
            serde_json::to_string(&decoded).unwrap(),
            serde_json::to_string(&original).unwrap()
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_returns_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"type\":\"log\""[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn empty_line_is_ignored() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"not json\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::MalformedFrame(_))
        ));
    }

    #[test]
    fn oversized_frame_without_newline_is_rejected() {
        let mut codec = FrameCodec::with_max_frame_size(16);
        let mut buf = BytesMut::from(&b"{\"type\":\"log\",\"data\":{}}"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { limit: 16 })
        ));
    }

    #[test]
    fn oversized_frame_with_newline_already_buffered_is_rejected() {
        // The full frame, newline included, arrives in a single read — the
        // no-newline-yet branch never runs, so the ceiling must still apply.
        let mut codec = FrameCodec::with_max_frame_size(16);
        let mut buf = BytesMut::from(&b"{\"type\":\"log\",\"data\":{}}\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { limit: 16 })
        ));
    }

    #[test]
    fn frame_at_exact_limit_succeeds() {
        // "{\"type\":\"log\"}\n" is 16 bytes including the trailing newline.
        let line = b"{\"type\":\"log\"}\n";
        assert_eq!(line.len(), 16);
        let mut codec = FrameCodec::with_max_frame_size(16);
        let mut buf = BytesMut::new();
        // A valid `log` frame needs a `data` field; use a raw malformed-but-
        // within-limit line to exercise the size boundary independent of
        // schema validity, then check the too-large path one byte over.
        buf.extend_from_slice(line);
        // This parses as a Frame::Log with a missing `data` field, which
        // `serde_json` rejects — so we only assert it is *not* rejected for
        // being too large.
        match codec.decode(&mut buf) {
            Err(CodecError::FrameTooLarge { .. }) => panic!("should not be too large"),
            _ => {}
        }
    }
}
