//! The 32-bit simple type cell
//!
//! A cell either carries a basic type inline (low 24 bits zero, pointer flag
//! at bit 24, tag at bits 27..31) or holds the buffer offset of an out-of-line
//! complex type record. Complex records start with a flag byte using the same
//! pointer/tag arrangement: pointer at bit 0, tag at bits 3..7.

use crate::core::blob::TypeTag;
use crate::core::bytes::{bit, bits, u32_at, u8_at};
use crate::core::header::HEADER_SIZE;
use crate::error::{Result, TypelibError};

const INLINE_MASK: u32 = 0x00ff_ffff;
const POINTER_BIT: u32 = 24;
const TAG_SHIFT: u32 = 27;

/// Decoded simple type cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    Basic { tag: TypeTag, pointer: bool },
    Offset(u32),
}

impl SimpleType {
    /// Inline basic type cell
    pub fn basic(tag: TypeTag, pointer: bool) -> Self {
        SimpleType::Basic { tag, pointer }
    }

    /// Out-of-line reference. `None` for values a reader would classify as basic.
    pub fn from_offset(offset: u32) -> Option<Self> {
        (offset >= HEADER_SIZE && offset & INLINE_MASK != 0).then_some(SimpleType::Offset(offset))
    }

    /// True when a raw cell holds an inline type
    #[inline]
    pub fn is_inline(raw: u32) -> bool {
        raw & INLINE_MASK == 0
    }

    pub fn decode(raw: u32) -> Result<Self> {
        if Self::is_inline(raw) {
            let tag = TypeTag::from_raw(bits(raw, TAG_SHIFT, 5) as u8)?;
            Ok(SimpleType::Basic {
                tag,
                pointer: bit(raw, POINTER_BIT),
            })
        } else {
            Ok(SimpleType::Offset(raw))
        }
    }

    pub fn encode(self) -> u32 {
        match self {
            SimpleType::Basic { tag, pointer } => {
                ((tag as u32) << TAG_SHIFT) | (u32::from(pointer) << POINTER_BIT)
            }
            SimpleType::Offset(offset) => offset,
        }
    }

    /// Read and decode the cell stored at `offset`
    pub fn read(data: &[u8], offset: u32) -> Result<Self> {
        Self::decode(u32_at(data, offset)?)
    }

    /// True for an all-zero cell, used by signatures without a return type
    pub fn is_empty(raw: u32) -> bool {
        raw == 0
    }
}

/// Flag byte of a complex type record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexTypeHeader {
    pub tag: TypeTag,
    pub pointer: bool,
}

impl ComplexTypeHeader {
    pub fn read(data: &[u8], offset: u32) -> Result<Self> {
        let byte = u32::from(u8_at(data, offset)?);
        let tag = TypeTag::from_raw(bits(byte, 3, 5) as u8).map_err(|_| {
            TypelibError::InvalidBlob(format!("Wrong tag in complex type at {offset:#x}"))
        })?;
        Ok(ComplexTypeHeader {
            tag,
            pointer: bit(byte, 0),
        })
    }

    pub fn encode(self) -> u8 {
        ((self.tag as u8) << 3) | u8::from(self.pointer)
    }
}
