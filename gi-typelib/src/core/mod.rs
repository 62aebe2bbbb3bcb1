//! Typelib buffer, binary schema, validation and offset resolution

pub mod attributes;
pub mod blob;
pub mod bytes;
pub mod directory;
pub mod header;
pub mod offsets;
pub mod simple_type;
pub mod typelib;
pub mod validate;

pub use self::attributes::Attributes;
pub use self::blob::{BlobType, TypeTag};
pub use self::directory::DirEntry;
pub use self::header::{BlobSizes, Header};
pub use self::offsets::{Composite, CompositeKind, Section};
pub use self::simple_type::SimpleType;
pub use self::typelib::Typelib;
