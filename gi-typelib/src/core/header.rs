//! Typelib header layout and decoding

use crate::core::bytes::{u16_at, u32_at, u8_at};
use crate::error::{Result, TypelibError};

/// Magic string opening every typelib
pub const TYPELIB_MAGIC: [u8; 16] = *b"GOBJ\nMETADATA\r\n\x1a";

/// Only supported major version
pub const TYPELIB_MAJOR_VERSION: u8 = 4;

/// Size of the fixed header
pub const HEADER_SIZE: u32 = 112;

/// Byte offsets of the header fields
pub mod field {
    pub const MAGIC: u32 = 0;
    pub const MAJOR_VERSION: u32 = 16;
    pub const MINOR_VERSION: u32 = 17;
    pub const N_ENTRIES: u32 = 20;
    pub const N_LOCAL_ENTRIES: u32 = 22;
    pub const DIRECTORY: u32 = 24;
    pub const N_ATTRIBUTES: u32 = 28;
    pub const ATTRIBUTES: u32 = 32;
    pub const DEPENDENCIES: u32 = 36;
    pub const SIZE: u32 = 40;
    pub const NAMESPACE: u32 = 44;
    pub const NSVERSION: u32 = 48;
    pub const SHARED_LIBRARY: u32 = 52;
    pub const C_PREFIX: u32 = 56;
    pub const BLOB_SIZES: u32 = 60;
    pub const SECTIONS: u32 = 96;
}

/// Identifiers of the optional sections listed in the section table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SectionType {
    End = 0,
    DirectoryIndex = 1,
}

/// Size of one `{id, offset}` section record
pub const SECTION_RECORD_SIZE: u32 = 8;

/// Per-blob fixed sizes declared by the header
///
/// Readers must stride by these values rather than by the sizes they were
/// built against; a newer writer may append fields to any fixed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobSizes {
    pub entry: u16,
    pub function: u16,
    pub callback: u16,
    pub signal: u16,
    pub vfunc: u16,
    pub arg: u16,
    pub property: u16,
    pub field: u16,
    pub value: u16,
    pub attribute: u16,
    pub constant: u16,
    pub error_domain: u16,
    pub signature: u16,
    pub enumeration: u16,
    pub structure: u16,
    pub object: u16,
    pub interface: u16,
    pub union: u16,
}

impl BlobSizes {
    /// Sizes of the blobs this reader knows about
    pub const KNOWN: BlobSizes = BlobSizes {
        entry: 12,
        function: 20,
        callback: 12,
        signal: 16,
        vfunc: 20,
        arg: 16,
        property: 16,
        field: 16,
        value: 12,
        attribute: 12,
        constant: 24,
        error_domain: 16,
        signature: 8,
        enumeration: 24,
        structure: 32,
        object: 60,
        interface: 40,
        union: 40,
    };

    fn as_array(&self) -> [u16; 18] {
        [
            self.entry,
            self.function,
            self.callback,
            self.signal,
            self.vfunc,
            self.arg,
            self.property,
            self.field,
            self.value,
            self.attribute,
            self.constant,
            self.error_domain,
            self.signature,
            self.enumeration,
            self.structure,
            self.object,
            self.interface,
            self.union,
        ]
    }

    fn from_array(a: [u16; 18]) -> Self {
        BlobSizes {
            entry: a[0],
            function: a[1],
            callback: a[2],
            signal: a[3],
            vfunc: a[4],
            arg: a[5],
            property: a[6],
            field: a[7],
            value: a[8],
            attribute: a[9],
            constant: a[10],
            error_domain: a[11],
            signature: a[12],
            enumeration: a[13],
            structure: a[14],
            object: a[15],
            interface: a[16],
            union: a[17],
        }
    }

    const NAMES: [&'static str; 18] = [
        "entry",
        "function",
        "callback",
        "signal",
        "vfunc",
        "arg",
        "property",
        "field",
        "value",
        "attribute",
        "constant",
        "error_domain",
        "signature",
        "enum",
        "struct",
        "object",
        "interface",
        "union",
    ];

    /// Compare against [`BlobSizes::KNOWN`].
    ///
    /// Returns the name of the first blob whose declared size is unacceptable:
    /// smaller than known, or (with `strict`) different from known. The
    /// error-domain size is not checked, it is no longer referenced.
    pub fn first_mismatch(&self, strict: bool) -> Option<&'static str> {
        let known = BlobSizes::KNOWN.as_array();
        self.as_array()
            .iter()
            .zip(known.iter())
            .enumerate()
            .filter(|(i, _)| *i != 11)
            .find(|(_, (declared, known))| {
                if strict {
                    declared != known
                } else {
                    declared < known
                }
            })
            .map(|(i, _)| Self::NAMES[i])
    }

    /// Encode into the 36-byte header table (native endian)
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        for (i, size) in self.as_array().iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&size.to_ne_bytes());
        }
        out
    }
}

impl Default for BlobSizes {
    fn default() -> Self {
        BlobSizes::KNOWN
    }
}

/// Decoded copy of the fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major_version: u8,
    pub minor_version: u8,
    pub n_entries: u16,
    pub n_local_entries: u16,
    pub directory: u32,
    pub n_attributes: u32,
    pub attributes: u32,
    pub dependencies: u32,
    pub size: u32,
    pub namespace: u32,
    pub nsversion: u32,
    pub shared_library: u32,
    pub c_prefix: u32,
    pub blob_sizes: BlobSizes,
    pub sections: u32,
}

impl Header {
    /// Decode the header. Only checks that the buffer can hold one.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_SIZE as usize {
            return Err(TypelibError::Invalid(format!(
                "The specified typelib length {} is too short",
                data.len()
            )));
        }

        let mut sizes = [0u16; 18];
        for (i, size) in sizes.iter_mut().enumerate() {
            *size = u16_at(data, field::BLOB_SIZES + 2 * i as u32)?;
        }

        Ok(Header {
            major_version: u8_at(data, field::MAJOR_VERSION)?,
            minor_version: u8_at(data, field::MINOR_VERSION)?,
            n_entries: u16_at(data, field::N_ENTRIES)?,
            n_local_entries: u16_at(data, field::N_LOCAL_ENTRIES)?,
            directory: u32_at(data, field::DIRECTORY)?,
            n_attributes: u32_at(data, field::N_ATTRIBUTES)?,
            attributes: u32_at(data, field::ATTRIBUTES)?,
            dependencies: u32_at(data, field::DEPENDENCIES)?,
            size: u32_at(data, field::SIZE)?,
            namespace: u32_at(data, field::NAMESPACE)?,
            nsversion: u32_at(data, field::NSVERSION)?,
            shared_library: u32_at(data, field::SHARED_LIBRARY)?,
            c_prefix: u32_at(data, field::C_PREFIX)?,
            blob_sizes: BlobSizes::from_array(sizes),
            sections: u32_at(data, field::SECTIONS)?,
        })
    }

    /// True when the magic string matches
    pub fn has_magic(data: &[u8]) -> bool {
        data.get(..16) == Some(&TYPELIB_MAGIC[..])
    }

    /// Offset of the directory entry with the given 1-based index
    pub fn dir_entry_offset(&self, index: u16) -> u32 {
        self.directory + (u32::from(index).saturating_sub(1)) * u32::from(self.blob_sizes.entry)
    }

    /// Locate an optional section by walking the section table.
    pub fn find_section(&self, data: &[u8], section: SectionType) -> Option<u32> {
        if self.sections == 0 {
            return None;
        }
        let mut at = self.sections;
        loop {
            let id = u32_at(data, at).ok()?;
            if id == SectionType::End as u32 {
                return None;
            }
            if id == section as u32 {
                return u32_at(data, at + 4).ok();
            }
            at = at.checked_add(SECTION_RECORD_SIZE)?;
        }
    }
}
