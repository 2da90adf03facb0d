//! Codec - call envelopes to bytes and back
//!
//! Design: fixed header for routing, then the argument tuple in bincode's
//! fixed-width little-endian encoding. Any `Serialize + DeserializeOwned` type
//! can ride along; derived structs encode their fields in declaration order.
//!
//! Encoding is deterministic: equal envelopes produce identical bytes.

mod header;

pub use header::{Header, FORMAT_VERSION, HEADER_LEN, MAGIC};

use crate::core::{CallEnvelope, Fingerprint};
use crate::errors::{DecodeError, EncodeError};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tracing::{trace, warn};

/// Default upper bound for a single encoded call (16 MiB)
pub const DEFAULT_MAX_BUFFER_BYTES: u64 = 16 * 1024 * 1024;

/// Stateless encoder/decoder for call envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    max_buffer_bytes: u64,
    verify_signatures: bool,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            verify_signatures: true,
        }
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_buffer_bytes(mut self, limit: u64) -> Self {
        self.max_buffer_bytes = limit;
        self
    }

    /// Skip the argument fingerprint check on decode
    ///
    /// The header is still parsed. Only use this for buffers from a trusted
    /// producer built from the same source.
    pub fn with_signature_verification(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    pub fn max_buffer_bytes(&self) -> u64 {
        self.max_buffer_bytes
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verify_signatures
    }

    fn options(&self, limit: u64) -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .with_limit(limit)
            .reject_trailing_bytes()
    }

    fn payload_limit(&self) -> u64 {
        self.max_buffer_bytes.saturating_sub(HEADER_LEN as u64)
    }

    /// Encode an envelope: header, then every argument in order
    pub fn encode<Args: Serialize>(&self, envelope: &CallEnvelope<Args>) -> Result<Vec<u8>, EncodeError> {
        if (HEADER_LEN as u64) > self.max_buffer_bytes {
            return Err(EncodeError::TooLarge {
                limit: self.max_buffer_bytes,
            });
        }

        let limit = self.payload_limit();
        let options = self.options(limit);
        let payload_len = options
            .serialized_size(envelope.arguments())
            .map_err(|err| encode_error(err, limit))?;

        let mut buffer = Vec::with_capacity(HEADER_LEN + payload_len as usize);
        Header::new(Fingerprint::of::<Args>(), envelope.target()).write_to(&mut buffer);
        self.options(limit)
            .serialize_into(&mut buffer, envelope.arguments())
            .map_err(|err| encode_error(err, limit))?;

        trace!(target_id = %envelope.target(), bytes = buffer.len(), "Encoded call envelope");
        Ok(buffer)
    }

    /// Decode only the routing header
    pub fn peek_header(&self, buffer: &[u8]) -> Result<Header, DecodeError> {
        self.check_size(buffer)?;
        Header::parse(buffer)
    }

    /// Decode an envelope whose argument tuple is `Args`
    ///
    /// The caller must name the same tuple type that was encoded. With
    /// signature verification on, a different tuple is reported as
    /// `SignatureMismatch` rather than misread.
    pub fn decode<Args: DeserializeOwned>(&self, buffer: &[u8]) -> Result<CallEnvelope<Args>, DecodeError> {
        let header = self.peek_header(buffer)?;

        if self.verify_signatures {
            let expected = Fingerprint::of::<Args>();
            if header.fingerprint != expected {
                warn!(target_id = %header.target, %expected, found = %header.fingerprint, "Signature mismatch");
                return Err(DecodeError::SignatureMismatch {
                    expected,
                    found: header.fingerprint,
                });
            }
        }

        let arguments = self
            .options(self.payload_limit())
            .deserialize::<Args>(&buffer[HEADER_LEN..])
            .map_err(|err| decode_error(err, buffer.len()))?;

        Ok(CallEnvelope::new(header.target, arguments))
    }

    /// Encode a trampoline's return value (no header)
    pub fn encode_output<R: Serialize>(&self, output: &R) -> Result<Vec<u8>, EncodeError> {
        let limit = self.max_buffer_bytes;
        self.options(limit)
            .serialize(output)
            .map_err(|err| encode_error(err, limit))
    }

    /// Decode a value produced by `encode_output`
    ///
    /// Outputs carry no fingerprint: `R` must be the return type of the
    /// function that produced `bytes`, or a type with the same encoding.
    /// `Prepared::call` fixes `R` from the handle.
    pub fn decode_output<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<R, DecodeError> {
        self.check_size(bytes)?;
        self.options(self.max_buffer_bytes)
            .deserialize::<R>(bytes)
            .map_err(|err| decode_error(err, bytes.len()))
    }

    fn check_size(&self, buffer: &[u8]) -> Result<(), DecodeError> {
        if buffer.len() as u64 > self.max_buffer_bytes {
            return Err(DecodeError::Malformed(format!(
                "{} bytes exceeds the {} byte limit",
                buffer.len(),
                self.max_buffer_bytes
            )));
        }
        Ok(())
    }
}

fn encode_error(err: bincode::Error, limit: u64) -> EncodeError {
    match *err {
        bincode::ErrorKind::SizeLimit => EncodeError::TooLarge { limit },
        other => EncodeError::Unsupported(other.to_string()),
    }
}

fn decode_error(err: bincode::Error, available: usize) -> DecodeError {
    match *err {
        bincode::ErrorKind::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
            DecodeError::Truncated { available }
        }
        bincode::ErrorKind::SizeLimit => {
            DecodeError::Malformed("length prefix exceeds the buffer limit".to_string())
        }
        other => DecodeError::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetId;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Vec3 {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Point,
        Segment(Vec3, Vec3),
    }

    fn target() -> TargetId {
        TargetId::from_name("codec_test")
    }

    #[test]
    fn test_primitive_layout() {
        let codec = Codec::new();
        let bytes = codec.encode(&CallEnvelope::new(target(), (1i32, 2i32))).unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 8);
        assert_eq!(&bytes[HEADER_LEN..], &[1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_composite_round_trip() {
        let codec = Codec::new();
        let mut tags = BTreeMap::new();
        tags.insert("a".to_string(), 1u8);
        let envelope = CallEnvelope::new(
            target(),
            (
                Vec3 { x: 1.0, y: 2.0, z: 3.0 },
                Shape::Segment(Vec3 { x: 0.0, y: -0.0, z: 1.5 }, Vec3 { x: 9.0, y: 8.0, z: 7.0 }),
                Some("label".to_string()),
                tags,
            ),
        );

        let bytes = codec.encode(&envelope).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
        assert_eq!(bytes, codec.encode(&decoded).unwrap());
    }

    #[test]
    fn test_float_bits_preserved() {
        let codec = Codec::new();
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let bytes = codec.encode(&CallEnvelope::new(target(), (nan, -0.0f32))).unwrap();
        let decoded: CallEnvelope<(f64, f32)> = codec.decode(&bytes).unwrap();

        assert_eq!(decoded.arguments().0.to_bits(), nan.to_bits());
        assert_eq!(decoded.arguments().1.to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn test_unit_arguments() {
        let codec = Codec::new();
        let bytes = codec.encode(&CallEnvelope::new(target(), ())).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded: CallEnvelope<()> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.target(), target());
    }

    #[test]
    fn test_every_prefix_is_truncated() {
        let codec = Codec::new();
        let bytes = codec
            .encode(&CallEnvelope::new(target(), (7u16, "hello".to_string(), vec![1u32, 2, 3])))
            .unwrap();

        for len in 0..bytes.len() {
            let result = codec.decode::<(u16, String, Vec<u32>)>(&bytes[..len]);
            assert!(
                matches!(result, Err(DecodeError::Truncated { .. })),
                "prefix of {} bytes gave {:?}",
                len,
                result
            );
        }
    }

    #[test]
    fn test_signature_mismatch() {
        let codec = Codec::new();
        let bytes = codec.encode(&CallEnvelope::new(target(), (1i32, 2i32))).unwrap();

        let result = codec.decode::<(i64,)>(&bytes);
        assert!(matches!(result, Err(DecodeError::SignatureMismatch { .. })));
    }

    #[test]
    fn test_unverified_decode_reads_raw_payload() {
        let codec = Codec::new().with_signature_verification(false);
        let bytes = codec.encode(&CallEnvelope::new(target(), (1i32, 2i32))).unwrap();

        let decoded: CallEnvelope<(u32, u32)> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.into_arguments(), (1, 2));
    }

    #[test]
    fn test_malformed_payloads() {
        let codec = Codec::new().with_signature_verification(false);

        let mut bytes = codec.encode(&CallEnvelope::new(target(), (true,))).unwrap();
        *bytes.last_mut().unwrap() = 2;
        assert!(matches!(codec.decode::<(bool,)>(&bytes), Err(DecodeError::Malformed(_))));

        let mut bytes = codec.encode(&CallEnvelope::new(target(), (5u8,))).unwrap();
        bytes.push(0);
        assert!(matches!(codec.decode::<(u8,)>(&bytes), Err(DecodeError::Malformed(_))));

        let bytes = codec.encode(&CallEnvelope::new(target(), (vec![0xffu8, 0xfe],))).unwrap();
        assert!(matches!(codec.decode::<(String,)>(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_size_limit() {
        let codec = Codec::new().with_max_buffer_bytes(HEADER_LEN as u64 + 4);
        let result = codec.encode(&CallEnvelope::new(target(), (vec![0u8; 64],)));
        assert!(matches!(result, Err(EncodeError::TooLarge { .. })));

        let big = Codec::new().encode(&CallEnvelope::new(target(), (vec![0u8; 64],))).unwrap();
        assert!(matches!(codec.decode::<(Vec<u8>,)>(&big), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_limit_below_header_rejects_encode() {
        let codec = Codec::new().with_max_buffer_bytes(8);
        let result = codec.encode(&CallEnvelope::new(TargetId::from_u64(1), ()));
        assert!(matches!(result, Err(EncodeError::TooLarge { limit: 8 })));

        let exact = Codec::new().with_max_buffer_bytes(HEADER_LEN as u64);
        let bytes = exact.encode(&CallEnvelope::new(TargetId::from_u64(1), ())).unwrap();
        assert!(exact.decode::<()>(&bytes).is_ok());
        assert!(exact.encode(&CallEnvelope::new(TargetId::from_u64(1), (0u8,))).is_err());
    }

    #[test]
    fn test_invalid_enum_tag() {
        let codec = Codec::new();
        let mut bytes = codec.encode(&CallEnvelope::new(target(), (Shape::Point,))).unwrap();
        assert_eq!(&bytes[HEADER_LEN..], &[0, 0, 0, 0]);

        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(codec.decode::<(Shape,)>(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_output_round_trip() {
        let codec = Codec::new();
        assert!(codec.encode_output(&()).unwrap().is_empty());

        let bytes = codec.encode_output(&"x = 1, y = 2".to_string()).unwrap();
        let text: String = codec.decode_output(&bytes).unwrap();
        assert_eq!(text, "x = 1, y = 2");
    }
}
