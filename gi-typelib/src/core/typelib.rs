//! Validated, shared typelib buffer

use crate::config::TypelibConfig;
use crate::core::attributes::Attributes;
use crate::core::blob::{
    BlobType,
    layout::{enumeration, registered},
};
use crate::core::bytes;
use crate::core::directory::DirEntry;
use crate::core::header::{Header, SectionType};
use crate::core::validate;
use crate::error::{Result, TypelibError};
use crate::hash;
use crate::info::BaseInfo;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

enum Storage {
    Shared(Arc<[u8]>),
    Mapped(Mmap),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Shared(bytes) => bytes,
            Storage::Mapped(map) => map,
        }
    }
}

struct TypelibInner {
    storage: Storage,
    header: Header,
    config: TypelibConfig,
}

/// A validated typelib
///
/// Cloning is cheap: every clone, and every info handle derived from the
/// typelib, shares the same immutable buffer.
#[derive(Clone)]
pub struct Typelib {
    inner: Arc<TypelibInner>,
}

impl Typelib {
    /// Validate `bytes` with the default configuration
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_bytes_with_config(bytes, TypelibConfig::default())
    }

    pub fn from_bytes_with_config(
        bytes: impl Into<Arc<[u8]>>,
        config: TypelibConfig,
    ) -> Result<Self> {
        Self::from_storage(Storage::Shared(bytes.into()), config)
    }

    /// Memory-map and validate a typelib file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, TypelibConfig::default())
    }

    #[allow(unsafe_code)]
    pub fn open_with_config(path: impl AsRef<Path>, config: TypelibConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and never handed out mutably. A
        // concurrent truncation of the file by another process is outside
        // what a reader can defend against, as with any mapped file.
        let map = unsafe { Mmap::map(&file)? };
        debug!(path = %path.as_ref().display(), len = map.len(), "mapped typelib");
        Self::from_storage(Storage::Mapped(map), config)
    }

    fn from_storage(storage: Storage, config: TypelibConfig) -> Result<Self> {
        let header = validate::validate(storage.bytes(), &config)?;
        Ok(Typelib {
            inner: Arc::new(TypelibInner {
                storage,
                header,
                config,
            }),
        })
    }

    /// The raw buffer
    pub fn data(&self) -> &[u8] {
        self.inner.storage.bytes()
    }

    pub fn header(&self) -> &Header {
        &self.inner.header
    }

    pub fn config(&self) -> &TypelibConfig {
        &self.inner.config
    }

    /// True when both values share one buffer
    pub fn ptr_eq(&self, other: &Typelib) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles on the shared buffer
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    // Scalar reads. Validation guarantees the fields accessors read are in
    // bounds, so an out-of-range read yields the zero value.

    pub(crate) fn read_u8(&self, at: u32) -> u8 {
        bytes::u8_at(self.data(), at).unwrap_or_default()
    }

    pub(crate) fn read_u16(&self, at: u32) -> u16 {
        bytes::u16_at(self.data(), at).unwrap_or_default()
    }

    pub(crate) fn read_u32(&self, at: u32) -> u32 {
        bytes::u32_at(self.data(), at).unwrap_or_default()
    }

    pub(crate) fn read_i32(&self, at: u32) -> i32 {
        bytes::i32_at(self.data(), at).unwrap_or_default()
    }

    /// String at `offset`, or `""` when it cannot be read
    pub fn string(&self, offset: u32) -> &str {
        bytes::str_at(self.data(), offset, None).unwrap_or_default()
    }

    /// String at `offset`; `None` for a zero offset
    pub fn opt_string(&self, offset: u32) -> Option<&str> {
        if offset == 0 {
            None
        } else {
            bytes::str_at(self.data(), offset, None).ok()
        }
    }

    pub fn namespace(&self) -> &str {
        self.string(self.header().namespace)
    }

    pub fn nsversion(&self) -> Option<&str> {
        self.opt_string(self.header().nsversion)
    }

    /// Shared libraries providing the symbols, in search order
    pub fn shared_libraries(&self) -> Vec<&str> {
        split_list(self.opt_string(self.header().shared_library), ',')
    }

    /// Immediate dependencies as `Namespace-Version` strings
    pub fn dependencies(&self) -> Vec<&str> {
        split_list(self.opt_string(self.header().dependencies), '|')
    }

    pub fn c_prefixes(&self) -> Vec<&str> {
        split_list(self.opt_string(self.header().c_prefix), ',')
    }

    pub fn n_entries(&self) -> u16 {
        self.header().n_entries
    }

    pub fn n_local_entries(&self) -> u16 {
        self.header().n_local_entries
    }

    /// Directory entry by 1-based index
    pub fn dir_entry(&self, index: u16) -> Result<DirEntry> {
        DirEntry::read(self.data(), self.header(), index)
    }

    pub fn dir_entries(&self) -> impl Iterator<Item = DirEntry> + '_ {
        (1..=self.n_entries()).filter_map(|i| self.dir_entry(i).ok())
    }

    pub fn local_entries(&self) -> impl Iterator<Item = DirEntry> + '_ {
        (1..=self.n_local_entries()).filter_map(|i| self.dir_entry(i).ok())
    }

    pub fn entry_name(&self, entry: &DirEntry) -> &str {
        self.string(entry.name)
    }

    /// Namespace providing a non-local entry
    pub fn entry_namespace(&self, entry: &DirEntry) -> &str {
        if entry.local {
            self.namespace()
        } else {
            self.string(entry.offset)
        }
    }

    /// Find a local entry by name
    ///
    /// Uses the directory index section when the typelib has one; the hit is
    /// confirmed against the stored name since any key maps to some slot.
    pub fn dir_entry_by_name(&self, name: &str) -> Option<DirEntry> {
        let n_local = self.n_local_entries();
        if n_local == 0 {
            return None;
        }

        if let Some(section) = self
            .header()
            .find_section(self.data(), SectionType::DirectoryIndex)
        {
            metrics::counter!("typelib_dir_lookups_total", "strategy" => "hash").increment(1);
            let memory = self.data().get(section as usize..)?;
            let slot = hash::search(memory, name, u32::from(n_local)).ok()?;
            let entry = self.dir_entry(slot.checked_add(1)?).ok()?;
            let hit = self.entry_name(&entry) == name;
            trace!(name, slot, hit, "directory index lookup");
            return hit.then_some(entry);
        }

        metrics::counter!("typelib_dir_lookups_total", "strategy" => "linear").increment(1);
        trace!(name, n_local, "linear directory lookup");
        self.local_entries().find(|e| self.entry_name(e) == name)
    }

    /// Find a local registered-type entry by its runtime type name
    pub fn dir_entry_by_gtype_name(&self, gtype_name: &str) -> Option<DirEntry> {
        self.local_entries().find(|entry| {
            if !entry.is_registered_type() {
                return false;
            }
            let offset = self.read_u32(entry.offset.saturating_add(registered::GTYPE_NAME));
            offset != 0 && self.string(offset) == gtype_name
        })
    }

    /// Find the local enum declaring `domain` as its error domain
    pub fn dir_entry_by_error_domain(&self, domain: &str) -> Option<DirEntry> {
        self.local_entries().find(|entry| {
            if entry.blob_type != BlobType::Enum as u16 {
                return false;
            }
            let offset = self.read_u32(entry.offset.saturating_add(enumeration::ERROR_DOMAIN));
            offset != 0 && self.string(offset) == domain
        })
    }

    /// True when one of the C prefixes starts `gtype_name` and is followed by
    /// an uppercase letter: `Gdk` matches `GdkX11Cursor`, `G` does not.
    pub fn matches_gtype_name_prefix(&self, gtype_name: &str) -> bool {
        self.c_prefixes().into_iter().any(|prefix| {
            gtype_name
                .strip_prefix(prefix)
                .and_then(|rest| rest.bytes().next())
                .is_some_and(|next| next.is_ascii_uppercase())
        })
    }

    /// Attributes attached to the blob at `blob_offset`
    pub fn attributes(&self, blob_offset: u32) -> Attributes<'_> {
        Attributes::new(self.data(), *self.header(), blob_offset)
    }

    /// Info handle for a directory entry; non-local entries come back unresolved
    pub fn info(&self, index: u16) -> Result<BaseInfo> {
        BaseInfo::from_entry(self, index)
    }

    /// Info handle for the local entry named `name`
    pub fn find_by_name(&self, name: &str) -> Option<BaseInfo> {
        let entry = self.dir_entry_by_name(name)?;
        self.info(entry.index).ok()
    }

    /// Local entry whose blob starts at `offset`
    pub(crate) fn entry_at_offset(&self, offset: u32) -> Result<DirEntry> {
        self.local_entries()
            .find(|e| e.offset == offset)
            .ok_or_else(|| {
                TypelibError::precondition(
                    "Typelib::entry_at_offset",
                    format!("no local entry at {offset:#x}"),
                )
            })
    }
}

fn split_list(list: Option<&str>, separator: char) -> Vec<&str> {
    match list {
        Some(list) if !list.is_empty() => list.split(separator).collect(),
        _ => Vec::new(),
    }
}

impl fmt::Debug for Typelib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typelib")
            .field("namespace", &self.namespace())
            .field("nsversion", &self.nsversion())
            .field("n_entries", &self.n_entries())
            .field("size", &self.data().len())
            .finish()
    }
}

impl PartialEq for Typelib {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Typelib {}
