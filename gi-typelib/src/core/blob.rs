//! Descriptor blob schema: type tags, enumerations, flag words and field offsets

use crate::error::{Result, TypelibError};
use bitflags::bitflags;
use std::fmt;

/// Blob type tag stored in directory entries and in the first field of most blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlobType {
    Invalid = 0,
    Function = 1,
    Callback = 2,
    Struct = 3,
    Boxed = 4,
    Enum = 5,
    Flags = 6,
    Object = 7,
    Interface = 8,
    Constant = 9,
    /// Retired error-domain slot
    Invalid0 = 10,
    Union = 11,
}

impl BlobType {
    /// Parse blob type from its raw tag
    pub fn from_raw(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(BlobType::Invalid),
            1 => Ok(BlobType::Function),
            2 => Ok(BlobType::Callback),
            3 => Ok(BlobType::Struct),
            4 => Ok(BlobType::Boxed),
            5 => Ok(BlobType::Enum),
            6 => Ok(BlobType::Flags),
            7 => Ok(BlobType::Object),
            8 => Ok(BlobType::Interface),
            9 => Ok(BlobType::Constant),
            10 => Ok(BlobType::Invalid0),
            11 => Ok(BlobType::Union),
            other => Err(TypelibError::InvalidEntry(format!(
                "Invalid blob type {other}"
            ))),
        }
    }

    /// Types that carry a runtime type name and init function
    pub fn is_registered_type(self) -> bool {
        matches!(
            self,
            BlobType::Struct
                | BlobType::Enum
                | BlobType::Flags
                | BlobType::Object
                | BlobType::Interface
                | BlobType::Union
        )
    }
}

/// Primitive and container type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeTag {
    Void = 0,
    Boolean = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    GType = 12,
    Utf8 = 13,
    Filename = 14,
    Array = 15,
    Interface = 16,
    GList = 17,
    GSList = 18,
    GHash = 19,
    Error = 20,
    UniChar = 21,
}

impl TypeTag {
    pub const COUNT: usize = 22;

    /// Parse tag from the 5-bit field
    pub fn from_raw(raw: u8) -> Result<Self> {
        use TypeTag::*;
        const ALL: [TypeTag; TypeTag::COUNT] = [
            Void, Boolean, Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64, Float,
            Double, GType, Utf8, Filename, Array, Interface, GList, GSList, GHash, Error, UniChar,
        ];
        ALL.get(raw as usize)
            .copied()
            .ok_or_else(|| TypelibError::InvalidBlob(format!("Invalid type tag {raw}")))
    }

    /// Tags that may appear inline in a simple type cell
    pub fn is_basic(self) -> bool {
        self < TypeTag::Array || self == TypeTag::UniChar
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            TypeTag::Array | TypeTag::GList | TypeTag::GSList | TypeTag::GHash
        )
    }

    pub fn is_numeric(self) -> bool {
        self >= TypeTag::Int8 && self <= TypeTag::Double
    }

    /// Basic tags from utf8 on are only meaningful behind a pointer
    pub fn requires_pointer(self) -> bool {
        self >= TypeTag::Utf8 && self != TypeTag::UniChar
    }

    /// Byte size of a constant value of this tag, 0 when unchecked
    pub fn constant_value_size(self) -> u32 {
        const SIZES: [u32; TypeTag::COUNT] = [
            0, 4, 1, 1, 2, 2, 4, 4, 8, 8, 4, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4,
        ];
        SIZES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Boolean => "gboolean",
            TypeTag::Int8 => "gint8",
            TypeTag::UInt8 => "guint8",
            TypeTag::Int16 => "gint16",
            TypeTag::UInt16 => "guint16",
            TypeTag::Int32 => "gint32",
            TypeTag::UInt32 => "guint32",
            TypeTag::Int64 => "gint64",
            TypeTag::UInt64 => "guint64",
            TypeTag::Float => "gfloat",
            TypeTag::Double => "gdouble",
            TypeTag::GType => "GType",
            TypeTag::Utf8 => "utf8",
            TypeTag::Filename => "filename",
            TypeTag::Array => "array",
            TypeTag::Interface => "interface",
            TypeTag::GList => "glist",
            TypeTag::GSList => "gslist",
            TypeTag::GHash => "ghash",
            TypeTag::Error => "error",
            TypeTag::UniChar => "gunichar",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayType {
    C = 0,
    Array = 1,
    PtrArray = 2,
    ByteArray = 3,
}

impl ArrayType {
    pub fn from_raw(raw: u32) -> Self {
        match raw & 0b11 {
            0 => ArrayType::C,
            1 => ArrayType::Array,
            2 => ArrayType::PtrArray,
            _ => ArrayType::ByteArray,
        }
    }
}

/// Lifetime of a callback argument's user data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeType {
    Invalid = 0,
    Call = 1,
    Async = 2,
    Notified = 3,
    Forever = 4,
}

impl ScopeType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => ScopeType::Call,
            2 => ScopeType::Async,
            3 => ScopeType::Notified,
            4 => ScopeType::Forever,
            _ => ScopeType::Invalid,
        }
    }
}

/// Ownership transfer between caller and callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Nothing,
    Container,
    Everything,
}

impl Transfer {
    /// Decode from the "transfer ownership" / "transfer container" bit pair
    pub fn from_bits(everything: bool, container: bool) -> Self {
        if everything {
            Transfer::Everything
        } else if container {
            Transfer::Container
        } else {
            Transfer::Nothing
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

/// Sentinel for "no accessor" in 10-bit method index fields
pub const ACCESSOR_SENTINEL: u32 = 0x3ff;

// Flag words. Multi-bit fields (indices, alignment, storage type) are
// decoded separately with `bytes::bits`.

bitflags! {
    /// Common flag word at offset 2 of function blobs
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionBlobFlags: u16 {
        const DEPRECATED = 1 << 0;
        const SETTER = 1 << 1;
        const GETTER = 1 << 2;
        const CONSTRUCTOR = 1 << 3;
        const WRAPS_VFUNC = 1 << 4;
        const THROWS = 1 << 5;
    }
}

bitflags! {
    /// Argument flag word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArgBlobFlags: u32 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const CALLER_ALLOCATES = 1 << 2;
        const NULLABLE = 1 << 3;
        const OPTIONAL = 1 << 4;
        const TRANSFER_OWNERSHIP = 1 << 5;
        const TRANSFER_CONTAINER_OWNERSHIP = 1 << 6;
        const RETURN_VALUE = 1 << 7;
        const SKIP = 1 << 11;
    }
}

bitflags! {
    /// Signature flag word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignatureBlobFlags: u16 {
        const MAY_RETURN_NULL = 1 << 0;
        const CALLER_OWNS_RETURN_VALUE = 1 << 1;
        const CALLER_OWNS_RETURN_CONTAINER = 1 << 2;
        const SKIP_RETURN = 1 << 3;
        const INSTANCE_TRANSFER_OWNERSHIP = 1 << 4;
        const THROWS = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldBlobFlags: u8 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const HAS_EMBEDDED_TYPE = 1 << 2;
    }
}

bitflags! {
    /// Property flag word; setter and getter indices live in bits 7..27
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyBlobFlags: u32 {
        const DEPRECATED = 1 << 0;
        const READABLE = 1 << 1;
        const WRITABLE = 1 << 2;
        const CONSTRUCT = 1 << 3;
        const CONSTRUCT_ONLY = 1 << 4;
        const TRANSFER_OWNERSHIP = 1 << 5;
        const TRANSFER_CONTAINER_OWNERSHIP = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalBlobFlags: u16 {
        const DEPRECATED = 1 << 0;
        const RUN_FIRST = 1 << 1;
        const RUN_LAST = 1 << 2;
        const RUN_CLEANUP = 1 << 3;
        const NO_RECURSE = 1 << 4;
        const DETAILED = 1 << 5;
        const ACTION = 1 << 6;
        const NO_HOOKS = 1 << 7;
        const HAS_CLASS_CLOSURE = 1 << 8;
        const TRUE_STOPS_EMIT = 1 << 9;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VFuncBlobFlags: u16 {
        const MUST_CHAIN_UP = 1 << 0;
        const MUST_BE_IMPLEMENTED = 1 << 1;
        const MUST_NOT_BE_IMPLEMENTED = 1 << 2;
        const CLASS_CLOSURE = 1 << 3;
        const THROWS = 1 << 4;
    }
}

bitflags! {
    /// Flag word of registered-type blobs; bit meaning past bit 1 is per kind
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegisteredBlobFlags: u16 {
        const DEPRECATED = 1 << 0;
        const UNREGISTERED = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectBlobFlags: u16 {
        const DEPRECATED = 1 << 0;
        const ABSTRACT = 1 << 1;
        const FUNDAMENTAL = 1 << 2;
        const FINAL = 1 << 3;
    }
}

/// Field offsets per blob kind
pub mod layout {
    pub mod common {
        pub const BLOB_TYPE: u32 = 0;
        pub const FLAGS: u32 = 2;
        pub const NAME: u32 = 4;
    }

    pub mod dir_entry {
        pub const BLOB_TYPE: u32 = 0;
        pub const FLAGS: u32 = 2;
        pub const NAME: u32 = 4;
        pub const OFFSET: u32 = 8;
    }

    pub mod arg {
        pub const NAME: u32 = 0;
        pub const FLAGS: u32 = 4;
        pub const CLOSURE: u32 = 8;
        pub const DESTROY: u32 = 9;
        pub const ARG_TYPE: u32 = 12;
        /// Scope occupies three bits of the flag word
        pub const SCOPE_SHIFT: u32 = 8;
    }

    pub mod signature {
        pub const RETURN_TYPE: u32 = 0;
        pub const FLAGS: u32 = 4;
        pub const N_ARGUMENTS: u32 = 6;
    }

    pub mod function {
        pub const FLAGS: u32 = 2;
        pub const NAME: u32 = 4;
        pub const SYMBOL: u32 = 8;
        pub const SIGNATURE: u32 = 12;
        pub const EXTRA: u32 = 16;
        /// 10-bit property/vfunc index within the flag word
        pub const INDEX_SHIFT: u32 = 6;
    }

    pub mod callback {
        pub const NAME: u32 = 4;
        pub const SIGNATURE: u32 = 8;
    }

    pub mod value {
        pub const FLAGS: u32 = 0;
        pub const NAME: u32 = 4;
        pub const VALUE: u32 = 8;
    }

    pub mod field {
        pub const NAME: u32 = 0;
        pub const FLAGS: u32 = 4;
        pub const BITS: u32 = 5;
        pub const STRUCT_OFFSET: u32 = 6;
        pub const TYPE: u32 = 12;
    }

    pub mod registered {
        pub const GTYPE_NAME: u32 = 8;
        pub const GTYPE_INIT: u32 = 12;
    }

    pub mod structure {
        pub const SIZE: u32 = 16;
        pub const N_FIELDS: u32 = 20;
        pub const N_METHODS: u32 = 22;
        pub const COPY_FUNC: u32 = 24;
        pub const FREE_FUNC: u32 = 28;
        pub const ALIGNMENT_SHIFT: u32 = 3;
        pub const IS_GTYPE_STRUCT_BIT: u32 = 2;
        pub const FOREIGN_BIT: u32 = 9;
    }

    pub mod union {
        pub const SIZE: u32 = 16;
        pub const N_FIELDS: u32 = 20;
        pub const N_FUNCTIONS: u32 = 22;
        pub const COPY_FUNC: u32 = 24;
        pub const FREE_FUNC: u32 = 28;
        pub const DISCRIMINATOR_OFFSET: u32 = 32;
        pub const DISCRIMINATOR_TYPE: u32 = 36;
        pub const DISCRIMINATED_BIT: u32 = 2;
        pub const ALIGNMENT_SHIFT: u32 = 3;
    }

    pub mod enumeration {
        pub const N_VALUES: u32 = 16;
        pub const N_METHODS: u32 = 18;
        pub const ERROR_DOMAIN: u32 = 20;
        pub const STORAGE_TYPE_SHIFT: u32 = 2;
    }

    pub mod property {
        pub const NAME: u32 = 0;
        pub const FLAGS: u32 = 4;
        pub const TYPE: u32 = 12;
        pub const SETTER_SHIFT: u32 = 7;
        pub const GETTER_SHIFT: u32 = 17;
    }

    pub mod signal {
        pub const FLAGS: u32 = 0;
        pub const CLASS_CLOSURE: u32 = 2;
        pub const NAME: u32 = 4;
        pub const SIGNATURE: u32 = 12;
    }

    pub mod vfunc {
        pub const NAME: u32 = 0;
        pub const FLAGS: u32 = 4;
        pub const SIGNAL: u32 = 6;
        pub const STRUCT_OFFSET: u32 = 8;
        pub const INVOKER: u32 = 10;
        pub const SIGNATURE: u32 = 16;
    }

    pub mod object {
        pub const PARENT: u32 = 16;
        pub const GTYPE_STRUCT: u32 = 18;
        pub const N_INTERFACES: u32 = 20;
        pub const N_FIELDS: u32 = 22;
        pub const N_PROPERTIES: u32 = 24;
        pub const N_METHODS: u32 = 26;
        pub const N_SIGNALS: u32 = 28;
        pub const N_VFUNCS: u32 = 30;
        pub const N_CONSTANTS: u32 = 32;
        pub const N_FIELD_CALLBACKS: u32 = 34;
        pub const REF_FUNC: u32 = 36;
        pub const UNREF_FUNC: u32 = 40;
        pub const SET_VALUE_FUNC: u32 = 44;
        pub const GET_VALUE_FUNC: u32 = 48;
    }

    pub mod interface {
        pub const GTYPE_STRUCT: u32 = 16;
        pub const N_PREREQUISITES: u32 = 18;
        pub const N_PROPERTIES: u32 = 20;
        pub const N_METHODS: u32 = 22;
        pub const N_SIGNALS: u32 = 24;
        pub const N_VFUNCS: u32 = 26;
        pub const N_CONSTANTS: u32 = 28;
    }

    pub mod constant {
        pub const NAME: u32 = 4;
        pub const TYPE: u32 = 8;
        pub const SIZE: u32 = 12;
        pub const OFFSET: u32 = 16;
    }

    pub mod attribute {
        pub const OFFSET: u32 = 0;
        pub const NAME: u32 = 4;
        pub const VALUE: u32 = 8;
    }

    /// Out-of-line complex type records
    pub mod complex {
        pub const INTERFACE_TYPE_SIZE: u32 = 4;
        pub const ARRAY_TYPE_SIZE: u32 = 8;
        pub const PARAM_TYPE_SIZE: u32 = 4;
        pub const ERROR_TYPE_SIZE: u32 = 4;
        /// Interface record: directory index of the referenced entry
        pub const INTERFACE: u32 = 2;
        /// Param/error records: number of parameters or domains
        pub const N_TYPES: u32 = 2;
        /// Array record: length index or fixed size
        pub const ARRAY_DIMENSION: u32 = 2;
        /// Array record: element type cell
        pub const ARRAY_ELEMENT: u32 = 4;
        /// Bits of the second flag byte of an array record
        pub const ARRAY_ZERO_TERMINATED_BIT: u32 = 0;
        pub const ARRAY_HAS_LENGTH_BIT: u32 = 1;
        pub const ARRAY_HAS_SIZE_BIT: u32 = 2;
        pub const ARRAY_TYPE_SHIFT: u32 = 3;
    }
}
