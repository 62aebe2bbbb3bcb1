//! Loader and hash builder configuration

/// Configuration for loading and validating a typelib
#[derive(Debug, Clone)]
pub struct TypelibConfig {
    /// Validate every local blob, not only the header and directory
    pub validate_blobs: bool,
    /// Require declared blob sizes to equal the known sizes exactly
    pub strict_blob_sizes: bool,
    /// A name's NUL terminator must occur within this many bytes
    pub max_name_len: usize,
}

impl Default for TypelibConfig {
    fn default() -> Self {
        Self {
            validate_blobs: true,
            strict_blob_sizes: false,
            max_name_len: 2048,
        }
    }
}

impl TypelibConfig {
    /// Reject any blob size table that differs from the known layout
    pub fn strict() -> Self {
        Self {
            strict_blob_sizes: true,
            ..Self::default()
        }
    }

    /// Header and directory checks only
    pub fn shallow() -> Self {
        Self {
            validate_blobs: false,
            ..Self::default()
        }
    }
}

/// Configuration for the perfect-hash generator
#[derive(Debug, Clone)]
pub struct HashConfig {
    /// First seed tried; later attempts derive from it
    pub seed: u32,
    /// Number of seeds tried before giving up
    pub max_attempts: u32,
    /// Average number of keys per displacement bucket
    pub bucket_load: u32,
    /// Displacement probes tried per bucket before reseeding
    pub max_probes: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            seed: 0x9e37_79b9,
            max_attempts: 32,
            bucket_load: 4,
            max_probes: 1 << 20,
        }
    }
}
