//! Native-endian field readers over a raw typelib buffer
//!
//! The format stores every integer in the producer's byte order and assumes
//! the consumer shares it, so all reads go through [`NativeEndian`]. Every
//! reader is bounds checked; nothing reinterprets bytes as a Rust struct.

use crate::error::{Result, TypelibError};
use byteorder::{ByteOrder, NativeEndian};

#[inline]
fn slice(data: &[u8], offset: u32, len: usize) -> Result<&[u8]> {
    let start = offset as usize;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            TypelibError::Invalid(format!(
                "The buffer is too short: need {len} bytes at {offset:#x}, have {}",
                data.len()
            ))
        })
}

/// Check that `len` bytes starting at `offset` lie inside the buffer.
pub fn ensure_fits(data: &[u8], offset: u32, len: usize) -> Result<()> {
    slice(data, offset, len).map(|_| ())
}

/// Like [`ensure_fits`] for a length summed from untrusted counts.
pub fn ensure_extent(data: &[u8], offset: u32, len: u64) -> Result<()> {
    let end = u64::from(offset) + len;
    if end > data.len() as u64 {
        return Err(TypelibError::Invalid(format!(
            "The buffer is too short: need {len} bytes at {offset:#x}, have {}",
            data.len()
        )));
    }
    Ok(())
}

/// Offset of record `index` in an array of `size`-byte records at `base`.
/// Fails rather than wrapping past `u32::MAX`.
pub fn record_offset(base: u32, index: u32, size: u32) -> Result<u32> {
    let at = u64::from(base) + u64::from(index) * u64::from(size);
    u32::try_from(at).map_err(|_| {
        TypelibError::Invalid(format!(
            "Offset overflow: record {index} of {size} bytes after {base:#x}"
        ))
    })
}

/// `offset + len`, failing rather than wrapping
#[inline]
pub fn advance(offset: u32, len: u32) -> Result<u32> {
    record_offset(offset, 1, len)
}

pub fn u8_at(data: &[u8], offset: u32) -> Result<u8> {
    Ok(slice(data, offset, 1)?[0])
}

pub fn i8_at(data: &[u8], offset: u32) -> Result<i8> {
    Ok(u8_at(data, offset)? as i8)
}

pub fn u16_at(data: &[u8], offset: u32) -> Result<u16> {
    Ok(NativeEndian::read_u16(slice(data, offset, 2)?))
}

pub fn i16_at(data: &[u8], offset: u32) -> Result<i16> {
    Ok(NativeEndian::read_i16(slice(data, offset, 2)?))
}

pub fn u32_at(data: &[u8], offset: u32) -> Result<u32> {
    Ok(NativeEndian::read_u32(slice(data, offset, 4)?))
}

pub fn i32_at(data: &[u8], offset: u32) -> Result<i32> {
    Ok(NativeEndian::read_i32(slice(data, offset, 4)?))
}

pub fn u64_at(data: &[u8], offset: u32) -> Result<u64> {
    Ok(NativeEndian::read_u64(slice(data, offset, 8)?))
}

pub fn i64_at(data: &[u8], offset: u32) -> Result<i64> {
    Ok(NativeEndian::read_i64(slice(data, offset, 8)?))
}

pub fn f32_at(data: &[u8], offset: u32) -> Result<f32> {
    Ok(NativeEndian::read_f32(slice(data, offset, 4)?))
}

pub fn f64_at(data: &[u8], offset: u32) -> Result<f64> {
    Ok(NativeEndian::read_f64(slice(data, offset, 8)?))
}

/// Read the NUL-terminated UTF-8 string starting at `offset`.
///
/// When `max_len` is given the terminator must appear within that many bytes.
pub fn str_at(data: &[u8], offset: u32, max_len: Option<usize>) -> Result<&str> {
    let start = offset as usize;
    let tail = data.get(start..).ok_or_else(|| {
        TypelibError::Invalid(format!(
            "Buffer is too short while looking up string at {offset:#x}"
        ))
    })?;
    let window = match max_len {
        Some(max) => &tail[..tail.len().min(max)],
        None => tail,
    };
    let end = window.iter().position(|&b| b == 0).ok_or_else(|| {
        TypelibError::Invalid(format!("Unterminated string at {offset:#x}"))
    })?;
    std::str::from_utf8(&window[..end])
        .map_err(|e| TypelibError::Invalid(format!("String at {offset:#x} is not UTF-8: {e}")))
}

/// Extract `width` bits of `word` starting at bit `shift` (LSB = bit 0).
#[inline]
pub const fn bits(word: u32, shift: u32, width: u32) -> u32 {
    (word >> shift) & ((1u32 << width) - 1)
}

#[inline]
pub const fn bit(word: u32, shift: u32) -> bool {
    bits(word, shift, 1) != 0
}

/// Round `value` up to the next multiple of four.
#[inline]
pub const fn align4(value: u32) -> u32 {
    (value + 3) & !3
}

#[inline]
pub const fn is_aligned(value: u32) -> bool {
    value % 4 == 0
}
