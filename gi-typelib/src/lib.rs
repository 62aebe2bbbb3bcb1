//! Typelib Reader
//!
//! Validation and zero-copy reflection over the binary typelib format: a
//! memory-mappable file describing a library's functions, callbacks,
//! structs, unions, enums, objects, interfaces and constants.
//!
//! Load a buffer with [`Typelib::from_bytes`] or [`Typelib::open`], which
//! validate it, then walk it through [`BaseInfo`] handles. Every read is
//! bounds checked against the buffer.

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)] // We'll use #[allow(unsafe_code)] only where necessary with safety proofs

pub mod config;
pub mod core;
pub mod error;
pub mod hash;
pub mod info;
pub mod repository;
pub mod symbol;

// Re-export commonly used types
pub use crate::config::TypelibConfig;
pub use crate::core::{
    BlobType, Composite, CompositeKind, DirEntry, Header, Section, TypeTag, Typelib,
    blob::{ArrayType, Direction, ScopeType, Transfer},
    validate::{validate, validate_header_basic},
};
pub use crate::error::{Result, TypelibError};
pub use crate::hash::{HashBuilder, PackedIndex};
pub use crate::info::{
    ArgInfo, BaseInfo, Callable, CallableInfo, CallbackInfo, ConstantInfo, ConstantValue, EnumInfo,
    FieldInfo, FunctionInfo, InfoHandle, InfoType, InterfaceInfo, ObjectInfo, PropertyInfo,
    RegisteredType, RegisteredTypeInfo, SignalInfo, StructInfo, TypeInfo, UnionInfo, VFuncInfo,
    ValueInfo,
};
pub use crate::repository::Repository;
pub use crate::symbol::{
    RuntimeTypeId, SymbolAddress, SymbolResolver, SymbolTable, TypeRegistry, TypeTable,
};

pub use crate::core::header::{HEADER_SIZE, TYPELIB_MAGIC, TYPELIB_MAJOR_VERSION};
