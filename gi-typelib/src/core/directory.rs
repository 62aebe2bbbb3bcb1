//! Directory entries

use crate::core::blob::{BlobType, layout::dir_entry};
use crate::core::bytes::{bit, u16_at, u32_at};
use crate::core::header::Header;
use crate::error::{Result, TypelibError};

/// Decoded directory entry
///
/// Indices are 1-based, as stored in the typelib. A local entry's `offset`
/// is the blob offset; a non-local entry's `offset` is the offset of the
/// namespace string that provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub index: u16,
    pub blob_type: u16,
    pub local: bool,
    pub name: u32,
    pub offset: u32,
}

impl DirEntry {
    pub fn read(data: &[u8], header: &Header, index: u16) -> Result<DirEntry> {
        if index == 0 || index > header.n_entries {
            return Err(TypelibError::IndexOutOfRange {
                section: "directory",
                index: u32::from(index),
                count: u32::from(header.n_entries),
            });
        }
        let at = header.dir_entry_offset(index);
        Ok(DirEntry {
            index,
            blob_type: u16_at(data, at + dir_entry::BLOB_TYPE)?,
            local: bit(u32::from(u16_at(data, at + dir_entry::FLAGS)?), 0),
            name: u32_at(data, at + dir_entry::NAME)?,
            offset: u32_at(data, at + dir_entry::OFFSET)?,
        })
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn blob_type(&self) -> Result<BlobType> {
        BlobType::from_raw(self.blob_type)
    }

    /// Registered-type entries are the only ones with a runtime type name
    pub fn is_registered_type(&self) -> bool {
        self.blob_type()
            .map(BlobType::is_registered_type)
            .unwrap_or(false)
    }
}
