//! Binary codec for network messages.
//!
//! Frames are one version byte followed by a bincode payload.

use thiserror::Error;

use crate::messages::{NetMessage, PROTOCOL_VERSION};

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("empty frame")]
    Empty,

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Encode a message to bytes.
pub fn encode(message: &NetMessage) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serde::encode_to_vec(message, bincode::config::standard())?;
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a message from bytes.
pub fn decode(data: &[u8]) -> Result<NetMessage, CodecError> {
    let (&version, payload) = data.split_first().ok_or(CodecError::Empty)?;
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let (message, read) = bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    if read != payload.len() {
        return Err(CodecError::TrailingBytes(payload.len() - read));
    }
    Ok(message)
}

/// Upper bound on the encoded size of a message, version byte included.
/// Useful for buffer allocation.
pub fn estimate_size(message: &NetMessage) -> usize {
    match message {
        NetMessage::Move(_) => 31,       // version + tag + timestamp + tick length + ticks + input + flags + position + mode
        NetMessage::Ack(_) => 6,         // version + tag + timestamp
        NetMessage::Correction(_) => 31, // version + tag + timestamp + position + velocity + mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{AckMessage, CorrectionMessage, MoveMessage};
    use crate::quantize::QuantizedInput;
    use glam::Vec3;

    fn sample_move() -> NetMessage {
        NetMessage::Move(MoveMessage {
            timestamp: 12.5,
            tick_delta_time: 1.0 / 60.0,
            ticks: 3,
            input: QuantizedInput::new(Vec3::new(1.0, -0.5, 0.0), 3.0),
            flags: 0x81,
            claimed_position: Vec3::new(1.0, 2.0, 3.0),
            claimed_mode: 4,
        })
    }

    #[test]
    fn test_roundtrip_move() {
        let msg = sample_move();
        let encoded = encode(&msg).unwrap();
        assert_eq!(encoded[0], PROTOCOL_VERSION);
        assert_eq!(decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_roundtrip_correction_keeps_bits() {
        let msg = NetMessage::Correction(CorrectionMessage {
            timestamp: 0.1 + 0.2,
            position: Vec3::new(-0.000_123, 1.0e-30, 7.25),
            velocity: Vec3::new(f32::MIN_POSITIVE, -3.4, 0.0),
            mode: 1,
        });
        let decoded = decode(&encode(&msg).unwrap()).unwrap();

        let (NetMessage::Correction(a), NetMessage::Correction(b)) = (&msg, &decoded) else {
            panic!("wrong message type");
        };
        assert_eq!(a.timestamp.to_bits(), b.timestamp.to_bits());
        assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
        assert_eq!(a.velocity.to_array().map(f32::to_bits), b.velocity.to_array().map(f32::to_bits));
    }

    #[test]
    fn test_estimate_is_upper_bound() {
        let messages = [
            sample_move(),
            NetMessage::Ack(AckMessage { timestamp: 1.0 }),
            NetMessage::Correction(CorrectionMessage {
                timestamp: 1.0,
                position: Vec3::ONE,
                velocity: Vec3::NEG_ONE,
                mode: 6,
            }),
        ];
        for msg in &messages {
            let encoded = encode(msg).unwrap();
            assert!(encoded.len() <= estimate_size(msg), "{msg:?} took {}", encoded.len());
        }
    }

    #[test]
    fn test_compact_encoding() {
        let encoded = encode(&NetMessage::Ack(AckMessage { timestamp: 4.0 })).unwrap();
        assert!(encoded.len() <= 6, "encoded size was {}", encoded.len());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut encoded = encode(&sample_move()).unwrap();
        encoded[0] = PROTOCOL_VERSION + 1;
        assert!(matches!(decode(&encoded), Err(CodecError::UnsupportedVersion(v)) if v == PROTOCOL_VERSION + 1));
    }

    #[test]
    fn test_rejects_empty_and_truncated() {
        assert!(matches!(decode(&[]), Err(CodecError::Empty)));

        let encoded = encode(&sample_move()).unwrap();
        assert!(matches!(decode(&encoded[..encoded.len() - 3]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut encoded = encode(&NetMessage::Ack(AckMessage { timestamp: 2.0 })).unwrap();
        encoded.extend_from_slice(&[0, 0]);
        assert!(matches!(decode(&encoded), Err(CodecError::TrailingBytes(2))));
    }
}
