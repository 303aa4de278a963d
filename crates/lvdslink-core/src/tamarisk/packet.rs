//! Packet encoding/decoding
//!
//! Tamarisk frames:
//! - 1 byte: start marker (0x01)
//! - 1 byte: command or response id
//! - 1 byte: payload length (0..=252)
//! - N bytes: payload, multi-byte values big-endian
//! - 1 byte: checksum, chosen so that every byte of the frame sums to zero
//!   modulo 256

use byteorder::{BigEndian, ByteOrder};

use super::{ProtocolError, FRAME_OVERHEAD, MTU, START_BYTE};

/// Checksum over a frame's header and payload
///
/// `(-START - id - len(payload) - sum(payload)) mod 256`
pub fn checksum(id: u8, payload: &[u8]) -> u8 {
    let header = 0u8
        .wrapping_sub(START_BYTE)
        .wrapping_sub(id)
        .wrapping_sub(payload.len() as u8);
    payload.iter().fold(header, |sum, &b| sum.wrapping_sub(b))
}

/// Frame `payload` under `id`
pub fn encode(id: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Ok(Packet::new(id, payload.to_vec())?.to_bytes())
}

/// Validate a received frame and split it into id and payload
pub fn decode(raw: &[u8]) -> Result<Packet, ProtocolError> {
    Packet::from_bytes(raw)
}

/// A well-formed Tamarisk packet
///
/// Only constructible through [`Packet::new`], [`Packet::from_bytes`] or
/// [`PacketBuilder`], so the payload always fits the length byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: u8,
    payload: Vec<u8>,
}

impl Packet {
    /// Create a packet, rejecting payloads that do not fit the length byte
    pub fn new(id: u8, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MTU {
            return Err(ProtocolError::Encode {
                len: payload.len(),
                max: MTU,
            });
        }
        Ok(Self { id, payload })
    }

    /// Command id on requests, response id on replies
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Decode a packet from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < FRAME_OVERHEAD || raw[0] != START_BYTE {
            return Err(ProtocolError::Format { raw: raw.to_vec() });
        }

        let declared = raw[2] as usize;
        if declared > MTU {
            return Err(ProtocolError::Format { raw: raw.to_vec() });
        }
        let actual = raw.len() - FRAME_OVERHEAD;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        let id = raw[1];
        let payload = &raw[3..raw.len() - 1];
        let expected = checksum(id, payload);
        let received = raw[raw.len() - 1];
        if expected != received {
            return Err(ProtocolError::Checksum {
                expected,
                actual: received,
            });
        }

        Ok(Self {
            id,
            payload: payload.to_vec(),
        })
    }

    /// Encode the packet to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(START_BYTE);
        bytes.push(self.id);
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        bytes.push(checksum(self.id, &self.payload));
        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Payload read as a big-endian 16-bit word, if it holds exactly one
    pub fn payload_u16(&self) -> Option<u16> {
        (self.payload.len() == 2).then(|| BigEndian::read_u16(&self.payload))
    }
}

/// Builder for request packets
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    id: u8,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }

    /// Add a 16-bit parameter (big-endian)
    pub fn u16_be(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Result<Packet, ProtocolError> {
        Packet::new(self.id, self.payload)
    }
}
