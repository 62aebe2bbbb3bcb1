//! Packed string index: a perfect hash plus a dense `u16` lookup table
//!
//! Layout: `[u32 table_offset][packed function][pad to 4][u16 table; n]`.
//! Querying a key outside the original set still yields some table slot, so
//! callers must confirm the hit against the stored name.

use crate::config::HashConfig;
use crate::core::bytes::{align4, record_offset, u16_at, u32_at};
use crate::error::{Result, TypelibError};
use crate::hash::mphf::{self, PerfectHash};
use ahash::AHashSet;
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Largest key set an index can describe
pub const MAX_KEYS: usize = 1 << 16;

/// Incrementally collects `name -> value` pairs and packs them
#[derive(Debug, Default)]
pub struct HashBuilder {
    config: HashConfig,
    keys: Vec<(String, u16)>,
    function: Option<PerfectHash>,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HashConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Add a key. Must be called before [`HashBuilder::prepare`].
    pub fn add_string(&mut self, key: impl Into<String>, value: u16) -> Result<()> {
        if self.function.is_some() {
            return Err(TypelibError::precondition(
                "HashBuilder::add_string",
                "builder already prepared",
            ));
        }
        self.keys.push((key.into(), value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Generate the perfect hash over the collected keys. Idempotent.
    pub fn prepare(&mut self) -> Result<()> {
        if self.function.is_some() {
            return Ok(());
        }
        if self.keys.len() > MAX_KEYS {
            return Err(TypelibError::Unbuildable(format!(
                "{} keys exceed the index limit of {MAX_KEYS}",
                self.keys.len()
            )));
        }
        let mut seen = AHashSet::with_capacity(self.keys.len());
        if let Some((dup, _)) = self.keys.iter().find(|(k, _)| !seen.insert(k.as_str())) {
            return Err(TypelibError::Unbuildable(format!("duplicate key {dup:?}")));
        }

        let names: Vec<&str> = self.keys.iter().map(|(k, _)| k.as_str()).collect();
        match PerfectHash::generate(&names, &self.config) {
            Ok(function) => {
                metrics::counter!("typelib_hash_builds_total").increment(1);
                self.function = Some(function);
                Ok(())
            }
            Err(e) => {
                warn!(keys = self.keys.len(), error = %e, "perfect hash build failed");
                Err(e)
            }
        }
    }

    fn prepared(&self, operation: &'static str) -> Result<&PerfectHash> {
        self.function
            .as_ref()
            .ok_or_else(|| TypelibError::precondition(operation, "builder not prepared"))
    }

    fn table_offset(function: &PerfectHash) -> u32 {
        align4(4 + function.packed_size() as u32)
    }

    /// Bytes needed by [`HashBuilder::pack`]
    pub fn buffer_size(&self) -> Result<u32> {
        let function = self.prepared("HashBuilder::buffer_size")?;
        Ok(Self::table_offset(function) + 2 * self.keys.len() as u32)
    }

    /// Write the index into `out`, which must hold [`HashBuilder::buffer_size`] bytes
    pub fn pack(&self, out: &mut [u8]) -> Result<()> {
        let function = self.prepared("HashBuilder::pack")?;
        let size = self.buffer_size()? as usize;
        let out = out.get_mut(..size).ok_or_else(|| {
            TypelibError::precondition("HashBuilder::pack", format!("need {size} bytes"))
        })?;
        out.fill(0);

        let table_offset = Self::table_offset(function);
        out[..4].copy_from_slice(&table_offset.to_ne_bytes());
        function.pack(&mut out[4..])?;

        for (key, value) in &self.keys {
            let slot = function.evaluate(key.as_bytes());
            let at = (table_offset + 2 * slot) as usize;
            out[at..at + 2].copy_from_slice(&value.to_ne_bytes());
        }
        trace!(keys = self.keys.len(), size, "packed string index");
        Ok(())
    }

    /// Prepare and pack into a fresh buffer
    pub fn finish(mut self) -> Result<PackedIndex> {
        self.prepare()?;
        let mut bytes = vec![0u8; self.buffer_size()? as usize];
        self.pack(&mut bytes)?;
        Ok(PackedIndex {
            bytes,
            n_entries: self.keys.len() as u32,
        })
    }
}

/// An owned, packed index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedIndex {
    bytes: Vec<u8>,
    n_entries: u32,
}

impl PackedIndex {
    /// Build an index from a complete map
    pub fn build(keys: &BTreeMap<String, u16>) -> Result<Self> {
        Self::build_with_config(keys, HashConfig::default())
    }

    pub fn build_with_config(keys: &BTreeMap<String, u16>, config: HashConfig) -> Result<Self> {
        let mut builder = HashBuilder::with_config(config);
        for (key, value) in keys {
            builder.add_string(key.clone(), *value)?;
        }
        builder.finish()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn n_entries(&self) -> u32 {
        self.n_entries
    }

    pub fn query(&self, key: &str) -> Result<u16> {
        search(&self.bytes, key, self.n_entries)
    }
}

/// Look `key` up in a packed index built over `n_entries` keys.
///
/// The slot returned by the function is clamped into `[0, n_entries)`, so any
/// key yields some stored value; only keys of the original set are meaningful.
pub fn search(memory: &[u8], key: &str, n_entries: u32) -> Result<u16> {
    if n_entries == 0 {
        return Err(TypelibError::precondition(
            "hash::search",
            "index has no entries",
        ));
    }
    let table_offset = u32_at(memory, 0)?;
    let function = memory.get(4..).unwrap_or_default();
    let mut slot = mphf::evaluate_packed(function, key.as_bytes())?;
    if slot >= n_entries {
        slot %= n_entries;
    }
    u16_at(memory, record_offset(table_offset, slot, 2)?)
}
