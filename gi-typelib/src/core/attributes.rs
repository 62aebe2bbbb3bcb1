//! Attribute table lookup
//!
//! Attributes are `{offset, name, value}` records sorted by the offset of the
//! blob they annotate. A blob's attributes are found by binary search and then
//! walking back to the first record with the same offset.

use crate::core::blob::layout::attribute;
use crate::core::bytes::{str_at, u32_at};
use crate::core::header::Header;

/// Iterator over the `(name, value)` attributes of one blob
#[derive(Debug, Clone)]
pub struct Attributes<'a> {
    data: &'a [u8],
    header: Header,
    blob_offset: u32,
    next: u32,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(data: &'a [u8], header: Header, blob_offset: u32) -> Self {
        let next = find_first(data, &header, blob_offset).unwrap_or(header.n_attributes);
        Attributes {
            data,
            header,
            blob_offset,
            next,
        }
    }

    fn record_offset(&self, index: u32) -> u32 {
        record_offset(&self.header, index)
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.header.n_attributes {
            return None;
        }
        let at = self.record_offset(self.next);
        if u32_at(self.data, at + attribute::OFFSET).ok()? != self.blob_offset {
            self.next = self.header.n_attributes;
            return None;
        }
        self.next += 1;
        let name = str_at(self.data, u32_at(self.data, at + attribute::NAME).ok()?, None).ok()?;
        let value = str_at(self.data, u32_at(self.data, at + attribute::VALUE).ok()?, None).ok()?;
        Some((name, value))
    }
}

fn record_offset(header: &Header, index: u32) -> u32 {
    header.attributes + index * u32::from(header.blob_sizes.attribute)
}

/// Index of the first attribute record for `blob_offset`
fn find_first(data: &[u8], header: &Header, blob_offset: u32) -> Option<u32> {
    let key_at = |i: u32| u32_at(data, record_offset(header, i) + attribute::OFFSET).ok();

    let (mut lo, mut hi) = (0u32, header.n_attributes);
    let mut found = None;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let key = key_at(mid)?;
        match key.cmp(&blob_offset) {
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
            std::cmp::Ordering::Equal => {
                found = Some(mid);
                break;
            }
        }
    }

    let mut first = found?;
    while first > 0 && key_at(first - 1) == Some(blob_offset) {
        first -= 1;
    }
    Some(first)
}
