//! Cast v2 wire framing.
//!
//! Every message on the control channel is a 4-byte big-endian length
//! followed by a protobuf-encoded `CastMessage`:
//!
//! | field | name             | wire type |
//! |-------|------------------|-----------|
//! | 1     | protocol_version | varint    |
//! | 2     | source_id        | bytes     |
//! | 3     | destination_id   | bytes     |
//! | 4     | namespace        | bytes     |
//! | 5     | payload_type     | varint    |
//! | 6     | payload_utf8     | bytes     |
//! | 7     | payload_binary   | bytes     |
//!
//! Only string payloads are produced. Binary payloads are accepted and
//! carried through untouched.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::cast::types::CastError;
use crate::protocol_constants::{FRAME_LENGTH_PREFIX, MAX_FRAME_LEN};

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

const PROTOCOL_CASTV2_1_0: u64 = 0;
const PAYLOAD_STRING: u64 = 0;
const PAYLOAD_BINARY: u64 = 1;

/// Payload of a Cast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

/// One decoded `CastMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMessage {
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload: Payload,
}

impl CastMessage {
    /// Builds a message with a UTF-8 (JSON) payload.
    pub fn text(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        namespace: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            namespace: namespace.into(),
            payload: Payload::Text(payload.into()),
        }
    }

    /// Returns the payload if it is text.
    pub fn payload_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Serializes the protobuf body (without the length prefix).
    pub fn encode_to(&self, out: &mut BytesMut) {
        write_varint_field(out, 1, PROTOCOL_CASTV2_1_0);
        write_bytes_field(out, 2, self.source_id.as_bytes());
        write_bytes_field(out, 3, self.destination_id.as_bytes());
        write_bytes_field(out, 4, self.namespace.as_bytes());
        match &self.payload {
            Payload::Text(text) => {
                write_varint_field(out, 5, PAYLOAD_STRING);
                write_bytes_field(out, 6, text.as_bytes());
            }
            Payload::Binary(data) => {
                write_varint_field(out, 5, PAYLOAD_BINARY);
                write_bytes_field(out, 7, data);
            }
        }
    }

    /// Parses a protobuf body (without the length prefix).
    pub fn decode(mut buf: &[u8]) -> Result<Self, CastError> {
        let mut source_id = String::new();
        let mut destination_id = String::new();
        let mut namespace = String::new();
        let mut payload_type = PAYLOAD_STRING;
        let mut text = None;
        let mut binary = None;

        while buf.has_remaining() {
            let key = read_varint(&mut buf)?;
            let field = key >> 3;
            let wire = (key & 0x7) as u8;
            match wire {
                WIRE_VARINT => {
                    let value = read_varint(&mut buf)?;
                    if field == 5 {
                        payload_type = value;
                    }
                }
                WIRE_LEN => {
                    let len = read_varint(&mut buf)? as usize;
                    if len > buf.remaining() {
                        return Err(CastError::Frame(format!(
                            "field {} claims {} bytes, {} left",
                            field,
                            len,
                            buf.remaining()
                        )));
                    }
                    let value = &buf[..len];
                    match field {
                        2 => source_id = utf8(value)?,
                        3 => destination_id = utf8(value)?,
                        4 => namespace = utf8(value)?,
                        6 => text = Some(utf8(value)?),
                        7 => binary = Some(Bytes::copy_from_slice(value)),
                        _ => {}
                    }
                    buf.advance(len);
                }
                other => {
                    return Err(CastError::Frame(format!("unsupported wire type {}", other)));
                }
            }
        }

        let payload = if payload_type == PAYLOAD_BINARY {
            Payload::Binary(binary.unwrap_or_default())
        } else {
            Payload::Text(text.unwrap_or_default())
        };

        Ok(Self {
            source_id,
            destination_id,
            namespace,
            payload,
        })
    }
}

fn utf8(bytes: &[u8]) -> Result<String, CastError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| CastError::Frame("invalid utf-8".to_string()))
}

fn write_varint(out: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        out.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

fn write_varint_field(out: &mut BytesMut, field: u32, value: u64) {
    write_varint(out, u64::from(field << 3 | u32::from(WIRE_VARINT)));
    write_varint(out, value);
}

fn write_bytes_field(out: &mut BytesMut, field: u32, value: &[u8]) {
    write_varint(out, u64::from(field << 3 | u32::from(WIRE_LEN)));
    write_varint(out, value.len() as u64);
    out.put_slice(value);
}

fn read_varint(buf: &mut &[u8]) -> Result<u64, CastError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            return Err(CastError::Frame("truncated varint".to_string()));
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CastError::Frame("varint overflow".to_string()))
}

/// Codec turning a byte stream into [`CastMessage`]s and back.
///
/// Length prefixing is delegated to [`LengthDelimitedCodec`].
#[derive(Debug)]
pub struct CastCodec {
    frames: LengthDelimitedCodec,
}

impl CastCodec {
    pub fn new() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .big_endian()
                .length_field_length(FRAME_LENGTH_PREFIX)
                .max_frame_length(MAX_FRAME_LEN)
                .new_codec(),
        }
    }
}

impl Default for CastCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CastCodec {
    type Item = CastMessage;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src) {
            Ok(Some(frame)) => CastMessage::decode(&frame).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(CastError::Frame(e.to_string())),
        }
    }
}

impl Encoder<CastMessage> for CastCodec {
    type Error = CastError;

    fn encode(&mut self, item: CastMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        item.encode_to(&mut body);
        self.frames
            .encode(body.freeze(), dst)
            .map_err(|e| CastError::Frame(e.to_string()))
    }
}
