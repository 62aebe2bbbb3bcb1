//! Perfect-hash string index used by the directory lookup

pub mod index;
pub mod mphf;

pub use self::index::{HashBuilder, PackedIndex, search};
pub use self::mphf::PerfectHash;
