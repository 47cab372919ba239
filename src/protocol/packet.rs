//! uwsgi packet framing.
//!
//! ```text
//! +-----------+-----------------+-----------+
//! | modifier1 | datasize (u16le)| modifier2 |   4-byte header
//! +-----------+-----------------+-----------+
//! | u16le klen | key | u16le vlen | value |   repeated per variable
//! +------------------------------------------+
//! ```
//!
//! Only modifier1 = 0 / modifier2 = 0 (a vars block) is produced or accepted.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::vars::Vars;

/// Size of the fixed packet header.
pub const HEADER_LEN: usize = 4;

/// Largest key, value or block the 16-bit length fields can describe.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} of variable '{key}' is {len} bytes, limit is 65535")]
    FieldTooLarge {
        key: String,
        field: &'static str,
        len: usize,
    },

    #[error("vars block is {0} bytes, limit is 65535")]
    BlockTooLarge(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet shorter than its 4-byte header")]
    ShortHeader,

    #[error("unsupported modifiers {0}/{1}")]
    Modifier(u8, u8),

    #[error("header declares {declared} bytes but {actual} follow")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("vars block truncated at offset {0}")]
    Truncated(usize),

    #[error("variable name at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// An encoded vars packet: header plus block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: [u8; HEADER_LEN],
    block: Bytes,
}

impl Packet {
    /// Serialize `vars` into a block and frame it.
    pub fn encode(vars: &Vars) -> Result<Self, EncodeError> {
        let block = encode_block(vars)?;
        let size = block.len().to_le_bytes();
        Ok(Self {
            header: [0, size[0], size[1], 0],
            block,
        })
    }

    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    pub fn block(&self) -> &Bytes {
        &self.block
    }

    /// Block length as declared in the header.
    pub fn datasize(&self) -> u16 {
        u16::from_le_bytes([self.header[1], self.header[2]])
    }

    /// Header and block as one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.block.len());
        buf.put_slice(&self.header);
        buf.put_slice(&self.block);
        buf.freeze()
    }
}

/// Parse a packet header, returning the declared block length.
pub fn decode_header(header: &[u8]) -> Result<usize, DecodeError> {
    let [modifier1, lo, hi, modifier2] = header else {
        return Err(DecodeError::ShortHeader);
    };
    if *modifier1 != 0 || *modifier2 != 0 {
        return Err(DecodeError::Modifier(*modifier1, *modifier2));
    }
    Ok(u16::from_le_bytes([*lo, *hi]) as usize)
}

/// Decode a complete packet (header followed by exactly its block).
pub fn decode_packet(packet: &[u8]) -> Result<Vars, DecodeError> {
    if packet.len() < HEADER_LEN {
        return Err(DecodeError::ShortHeader);
    }
    let declared = decode_header(&packet[..HEADER_LEN])?;
    let block = &packet[HEADER_LEN..];
    if block.len() != declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: block.len(),
        });
    }
    decode_block(block)
}

/// Decode a vars block.
pub fn decode_block(block: &[u8]) -> Result<Vars, DecodeError> {
    let mut vars = Vars::new();
    let mut buf = block;

    while buf.has_remaining() {
        let offset = block.len() - buf.remaining();
        let key = read_field(&mut buf, block.len())?;
        let key = std::str::from_utf8(key).map_err(|_| DecodeError::InvalidUtf8(offset))?;
        let value = read_field(&mut buf, block.len())?;
        vars.insert(key, value);
    }

    Ok(vars)
}

fn read_field<'a>(buf: &mut &'a [u8], total: usize) -> Result<&'a [u8], DecodeError> {
    let offset = total - buf.remaining();
    if buf.remaining() < 2 {
        return Err(DecodeError::Truncated(offset));
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(DecodeError::Truncated(offset));
    }
    let (field, rest) = buf.split_at(len);
    *buf = rest;
    Ok(field)
}

fn encode_block(vars: &Vars) -> Result<Bytes, EncodeError> {
    let size: usize = vars.iter().map(|(k, v)| 4 + k.len() + v.len()).sum();
    let mut buf = BytesMut::with_capacity(size);

    for (key, value) in vars.iter() {
        put_field(&mut buf, key, "name", key.as_bytes())?;
        put_field(&mut buf, key, "value", value)?;
    }

    if buf.len() > MAX_FIELD_LEN {
        return Err(EncodeError::BlockTooLarge(buf.len()));
    }
    Ok(buf.freeze())
}

fn put_field(buf: &mut BytesMut, key: &str, field: &'static str, data: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(data.len()).map_err(|_| EncodeError::FieldTooLarge {
        key: key.chars().take(64).collect(),
        field,
        len: data.len(),
    })?;
    buf.put_u16_le(len);
    buf.put_slice(data);
    Ok(())
}
