//! Reflection handles over a validated typelib
//!
//! A handle is a `(typelib, offset, kind)` triple plus an optional container,
//! the handle it was obtained from. Handles never cache decoded values; every
//! accessor re-reads the buffer.
//!
//! [`BaseInfo`] is the reference-counted handle. [`StackInfo`] is a borrowed
//! view used for sub-records that always exist inside their parent (argument
//! and return types); it cannot outlive the handle it borrows.
//!
//! Kind wrappers ([`FunctionInfo`], [`StructInfo`], ...) are checked newtypes
//! created with `TryFrom<BaseInfo>`. Asking a handle of the wrong kind for a
//! kind-specific accessor is reported as [`TypelibError::PreconditionViolation`].

use crate::core::attributes::Attributes;
use crate::core::blob::{
    BlobType, TypeTag,
    layout::{common, field, property, signal, value},
};
use crate::core::bytes::bit;
use crate::core::offsets::{Composite, CompositeKind, Section};
use crate::core::simple_type::SimpleType;
use crate::core::typelib::Typelib;
use crate::error::{Result, TypelibError};
use std::fmt;
use std::sync::Arc;

/// Define a checked newtype over [`BaseInfo`] accepting the listed kinds
macro_rules! info_kind {
    ($(#[$meta:meta])* $name:ident: $($kind:ident)|+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name($crate::info::BaseInfo);

        impl $name {
            pub(crate) fn new_unchecked(info: $crate::info::BaseInfo) -> Self {
                $name(info)
            }

            pub fn as_base(&self) -> &$crate::info::BaseInfo {
                &self.0
            }

            pub fn into_base(self) -> $crate::info::BaseInfo {
                self.0
            }
        }

        impl TryFrom<$crate::info::BaseInfo> for $name {
            type Error = $crate::error::TypelibError;

            fn try_from(info: $crate::info::BaseInfo) -> $crate::error::Result<Self> {
                use $crate::info::{InfoHandle, InfoType};
                match info.info_type() {
                    $(InfoType::$kind)|+ => Ok($name(info)),
                    other => Err($crate::error::TypelibError::precondition(
                        concat!(stringify!($name), "::try_from"),
                        format!("a {} info is not a {}", other.as_str(), stringify!($name)),
                    )),
                }
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::info::BaseInfo;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<$crate::info::BaseInfo> for $name {
            fn as_ref(&self) -> &$crate::info::BaseInfo {
                &self.0
            }
        }

        impl From<$name> for $crate::info::BaseInfo {
            fn from(info: $name) -> Self {
                info.0
            }
        }
    };
}

mod callable;
mod members;
mod object;
mod registered;
mod structs;
mod types;

pub use self::callable::{
    ArgInfo, Callable, CallableInfo, CallbackInfo, FunctionInfo, FunctionInfoFlags, SignalFlags,
    SignalInfo, StackArgInfo, VFuncInfo, VFuncInfoFlags,
};
pub use self::members::{
    ConstantInfo, ConstantValue, FieldInfo, FieldInfoFlags, ParamFlags, PropertyInfo, ValueInfo,
};
pub use self::object::{InterfaceInfo, ObjectInfo};
pub use self::registered::{RegisteredType, RegisteredTypeInfo};
pub use self::structs::{EnumInfo, StructInfo, UnionInfo};
pub use self::types::{StackTypeInfo, TypeInfo};

/// Kind of a reflection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InfoType {
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
    Invalid0 = 10,
    Union = 11,
    Value = 12,
    Signal = 13,
    VFunc = 14,
    Property = 15,
    Field = 16,
    Arg = 17,
    Type = 18,
    Unresolved = 19,
}

impl InfoType {
    /// Handle kind for a directory entry. Boxed blobs use the struct layout
    /// and surface as struct infos.
    pub fn from_blob_type(blob_type: BlobType) -> Self {
        match blob_type {
            BlobType::Invalid => InfoType::Invalid,
            BlobType::Function => InfoType::Function,
            BlobType::Callback => InfoType::Callback,
            BlobType::Struct | BlobType::Boxed => InfoType::Struct,
            BlobType::Enum => InfoType::Enum,
            BlobType::Flags => InfoType::Flags,
            BlobType::Object => InfoType::Object,
            BlobType::Interface => InfoType::Interface,
            BlobType::Constant => InfoType::Constant,
            BlobType::Invalid0 => InfoType::Invalid0,
            BlobType::Union => InfoType::Union,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InfoType::Invalid | InfoType::Invalid0 => "invalid",
            InfoType::Function => "function",
            InfoType::Callback => "callback",
            InfoType::Struct => "struct",
            InfoType::Boxed => "boxed",
            InfoType::Enum => "enum",
            InfoType::Flags => "flags",
            InfoType::Object => "object",
            InfoType::Interface => "interface",
            InfoType::Constant => "constant",
            InfoType::Union => "union",
            InfoType::Value => "value",
            InfoType::Signal => "signal",
            InfoType::VFunc => "vfunc",
            InfoType::Property => "property",
            InfoType::Field => "field",
            InfoType::Arg => "arg",
            InfoType::Type => "type",
            InfoType::Unresolved => "unresolved",
        }
    }

    /// Offset of the name string within blobs of this kind
    fn name_field(self) -> Option<u32> {
        match self {
            InfoType::Function
            | InfoType::Callback
            | InfoType::Struct
            | InfoType::Boxed
            | InfoType::Enum
            | InfoType::Flags
            | InfoType::Object
            | InfoType::Interface
            | InfoType::Constant
            | InfoType::Union => Some(common::NAME),
            InfoType::Value => Some(value::NAME),
            InfoType::Signal => Some(signal::NAME),
            InfoType::Property => Some(property::NAME),
            InfoType::VFunc | InfoType::Field | InfoType::Arg => Some(field::NAME),
            _ => None,
        }
    }

    fn composite_kind(self) -> Option<CompositeKind> {
        match self {
            InfoType::Object => Some(CompositeKind::Object),
            InfoType::Interface => Some(CompositeKind::Interface),
            InfoType::Struct | InfoType::Boxed => Some(CompositeKind::Struct),
            InfoType::Union => Some(CompositeKind::Union),
            InfoType::Enum | InfoType::Flags => Some(CompositeKind::Enum),
            _ => None,
        }
    }
}

impl fmt::Display for InfoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a type handle's offset is to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeForm {
    /// Offset points at a simple type cell holding this basic type
    Basic { tag: TypeTag, pointer: bool },
    /// Offset points at an out-of-line complex type record
    Complex,
    /// Offset points at a callback blob embedded after a field
    Embedded,
}

/// Accessors shared by every handle, heap or stack
pub trait InfoHandle {
    fn typelib(&self) -> &Typelib;

    /// Byte offset of the described record
    fn offset(&self) -> u32;

    fn info_type(&self) -> InfoType;

    /// The handle this one was obtained from
    fn container(&self) -> Option<&BaseInfo>;

    fn is_stack_allocated(&self) -> bool;

    /// Heap handle describing the same record
    fn to_base(&self) -> BaseInfo;

    /// Nearest heap handle a stack view derived from this one can borrow
    fn stack_parent(&self) -> &BaseInfo;

    /// Layout of a type handle, `None` for other kinds
    fn type_form(&self) -> Option<TypeForm>;

    /// Name and namespace of an unresolved reference
    fn unresolved_names(&self) -> Option<(&str, &str)>;

    /// Name of the described entity; type handles have none
    fn name(&self) -> Option<&str> {
        if let Some((name, _)) = self.unresolved_names() {
            return Some(name);
        }
        let field = self.info_type().name_field()?;
        let typelib = self.typelib();
        typelib.opt_string(typelib.read_u32(self.offset().saturating_add(field)))
    }

    /// Namespace of the typelib holding the entity
    fn namespace(&self) -> &str {
        match self.unresolved_names() {
            Some((_, namespace)) => namespace,
            None => self.typelib().namespace(),
        }
    }

    fn is_deprecated(&self) -> bool {
        let typelib = self.typelib();
        let at = self.offset();
        match self.info_type() {
            InfoType::Function
            | InfoType::Callback
            | InfoType::Struct
            | InfoType::Boxed
            | InfoType::Enum
            | InfoType::Flags
            | InfoType::Object
            | InfoType::Interface
            | InfoType::Constant
            | InfoType::Union => bit(u32::from(typelib.read_u16(at.saturating_add(common::FLAGS))), 0),
            InfoType::Value => bit(typelib.read_u32(at.saturating_add(value::FLAGS)), 0),
            InfoType::Signal => bit(u32::from(typelib.read_u16(at.saturating_add(signal::FLAGS))), 0),
            InfoType::Property => bit(typelib.read_u32(at.saturating_add(property::FLAGS)), 0),
            _ => false,
        }
    }

    /// Value of the attribute `name` attached to this record
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    fn attributes(&self) -> Attributes<'_> {
        self.typelib().attributes(self.offset())
    }

    /// Same record of the same typelib
    fn equal<O: InfoHandle + ?Sized>(&self, other: &O) -> bool
    where
        Self: Sized,
    {
        self.typelib().ptr_eq(other.typelib()) && self.offset() == other.offset()
    }
}

#[derive(Debug)]
enum Payload {
    Blob,
    Type(TypeForm),
    /// String offsets of a non-local entry's name and namespace
    Unresolved { name: u32, namespace: u32 },
}

struct InfoInner {
    typelib: Typelib,
    offset: u32,
    info_type: InfoType,
    container: Option<BaseInfo>,
    payload: Payload,
}

/// Reference-counted reflection handle
#[derive(Clone)]
pub struct BaseInfo(Arc<InfoInner>);

impl BaseInfo {
    pub(crate) fn new(
        info_type: InfoType,
        container: Option<BaseInfo>,
        typelib: &Typelib,
        offset: u32,
    ) -> Self {
        Self::with_payload(info_type, container, typelib, offset, Payload::Blob)
    }

    fn with_payload(
        info_type: InfoType,
        container: Option<BaseInfo>,
        typelib: &Typelib,
        offset: u32,
        payload: Payload,
    ) -> Self {
        BaseInfo(Arc::new(InfoInner {
            typelib: typelib.clone(),
            offset,
            info_type,
            container,
            payload,
        }))
    }

    /// Type handle for the simple type cell at `cell`
    pub(crate) fn new_type(container: Option<BaseInfo>, typelib: &Typelib, cell: u32) -> Self {
        let (offset, form) = type_form_at(typelib, cell);
        Self::with_payload(InfoType::Type, container, typelib, offset, Payload::Type(form))
    }

    /// Type handle for a callback embedded at `offset`
    pub(crate) fn new_embedded_type(container: BaseInfo, typelib: &Typelib, offset: u32) -> Self {
        Self::with_payload(
            InfoType::Type,
            Some(container),
            typelib,
            offset,
            Payload::Type(TypeForm::Embedded),
        )
    }

    /// Handle for directory entry `index`; non-local entries come back as
    /// [`InfoType::Unresolved`] carrying the name and providing namespace.
    pub(crate) fn from_entry(typelib: &Typelib, index: u16) -> Result<Self> {
        let entry = typelib.dir_entry(index)?;
        if entry.local {
            let info_type = InfoType::from_blob_type(entry.blob_type()?);
            Ok(Self::new(info_type, None, typelib, entry.offset))
        } else {
            Ok(Self::with_payload(
                InfoType::Unresolved,
                None,
                typelib,
                entry.offset,
                Payload::Unresolved {
                    name: entry.name,
                    namespace: entry.offset,
                },
            ))
        }
    }

    /// Number of live references to this handle
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn is_unresolved(&self) -> bool {
        self.0.info_type == InfoType::Unresolved
    }

    /// Downcast into a kind wrapper
    pub fn downcast<T: TryFrom<BaseInfo, Error = TypelibError>>(self) -> Result<T> {
        T::try_from(self)
    }

    pub(crate) fn require(&self, operation: &'static str, kinds: &[InfoType]) -> Result<()> {
        if kinds.contains(&self.0.info_type) {
            Ok(())
        } else {
            Err(TypelibError::precondition(
                operation,
                format!("not applicable to a {} info", self.0.info_type),
            ))
        }
    }

    pub(crate) fn read_u8(&self, field: u32) -> u8 {
        self.0.typelib.read_u8(self.0.offset.saturating_add(field))
    }

    pub(crate) fn read_u16(&self, field: u32) -> u16 {
        self.0.typelib.read_u16(self.0.offset.saturating_add(field))
    }

    pub(crate) fn read_u32(&self, field: u32) -> u32 {
        self.0.typelib.read_u32(self.0.offset.saturating_add(field))
    }

    pub(crate) fn read_i32(&self, field: u32) -> i32 {
        self.0.typelib.read_i32(self.0.offset.saturating_add(field))
    }

    /// String referenced by the offset stored in `field`
    pub(crate) fn string_field(&self, field: u32) -> Option<&str> {
        self.0.typelib.opt_string(self.read_u32(field))
    }

    pub(crate) fn composite(&self) -> Result<Composite<'_>> {
        let kind = self.0.info_type.composite_kind().ok_or_else(|| {
            TypelibError::precondition(
                "BaseInfo::composite",
                format!("a {} info has no sections", self.0.info_type),
            )
        })?;
        let typelib = &self.0.typelib;
        Ok(Composite::new(
            typelib.data(),
            typelib.header().blob_sizes,
            kind,
            self.0.offset,
        ))
    }

    /// Declared record count of a section, zero when it cannot be read
    pub(crate) fn section_count(&self, section: Section) -> u32 {
        self.composite()
            .and_then(|c| c.count(section))
            .unwrap_or_default()
    }

    /// Handle for record `n` of `section`, contained by `self`
    pub(crate) fn section_child(&self, info_type: InfoType, section: Section, n: u32) -> Result<BaseInfo> {
        let offset = self.composite()?.offset_of(section, n)?;
        Ok(BaseInfo::new(info_type, Some(self.clone()), &self.0.typelib, offset))
    }

    /// First record of `section` named `name`
    pub(crate) fn find_section_child(
        &self,
        info_type: InfoType,
        section: Section,
        name: &str,
    ) -> Option<BaseInfo> {
        let name_field = info_type.name_field()?;
        let typelib = &self.0.typelib;
        let offsets = self.composite().and_then(|c| c.offsets(section)).ok()?;
        offsets
            .into_iter()
            .find(|at| typelib.string(typelib.read_u32(at.saturating_add(name_field))) == name)
            .map(|at| BaseInfo::new(info_type, Some(self.clone()), typelib, at))
    }

    /// Directory index stored in record `n` of an index section
    pub(crate) fn section_entry(&self, section: Section, n: u32) -> Result<BaseInfo> {
        let at = self.composite()?.offset_of(section, n)?;
        let index = self.0.typelib.read_u16(at);
        BaseInfo::from_entry(&self.0.typelib, index)
    }

    /// Handle for the entry index stored in `field`, `None` when zero
    pub(crate) fn entry_field(&self, field: u32) -> Option<BaseInfo> {
        match self.read_u16(field) {
            0 => None,
            index => BaseInfo::from_entry(&self.0.typelib, index).ok(),
        }
    }
}

impl InfoHandle for BaseInfo {
    fn typelib(&self) -> &Typelib {
        &self.0.typelib
    }

    fn offset(&self) -> u32 {
        self.0.offset
    }

    fn info_type(&self) -> InfoType {
        self.0.info_type
    }

    fn container(&self) -> Option<&BaseInfo> {
        self.0.container.as_ref()
    }

    fn is_stack_allocated(&self) -> bool {
        false
    }

    fn to_base(&self) -> BaseInfo {
        self.clone()
    }

    fn stack_parent(&self) -> &BaseInfo {
        self
    }

    fn type_form(&self) -> Option<TypeForm> {
        match self.0.payload {
            Payload::Type(form) => Some(form),
            _ => None,
        }
    }

    fn unresolved_names(&self) -> Option<(&str, &str)> {
        match self.0.payload {
            Payload::Unresolved { name, namespace } => {
                Some((self.0.typelib.string(name), self.0.typelib.string(namespace)))
            }
            _ => None,
        }
    }
}

impl PartialEq for BaseInfo {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for BaseInfo {}

impl fmt::Debug for BaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseInfo")
            .field("info_type", &self.0.info_type)
            .field("name", &self.name())
            .field("namespace", &self.namespace())
            .field("offset", &self.0.offset)
            .finish()
    }
}

/// Decode the cell at `cell` into a type handle's offset and form
fn type_form_at(typelib: &Typelib, cell: u32) -> (u32, TypeForm) {
    match SimpleType::decode(typelib.read_u32(cell)) {
        Ok(SimpleType::Basic { tag, pointer }) => (cell, TypeForm::Basic { tag, pointer }),
        Ok(SimpleType::Offset(offset)) => (offset, TypeForm::Complex),
        Err(_) => (
            cell,
            TypeForm::Basic {
                tag: TypeTag::Void,
                pointer: false,
            },
        ),
    }
}

/// Non-owning handle on a record nested in a heap handle
///
/// Its container is the heap handle it borrows. Views derived from a stack
/// view borrow the same heap handle.
#[derive(Debug, Clone, Copy)]
pub struct StackInfo<'a> {
    parent: &'a BaseInfo,
    offset: u32,
    info_type: InfoType,
    form: Option<TypeForm>,
}

impl<'a> StackInfo<'a> {
    pub(crate) fn new(parent: &'a BaseInfo, info_type: InfoType, offset: u32) -> Self {
        StackInfo {
            parent,
            offset,
            info_type,
            form: None,
        }
    }

    pub(crate) fn new_type(parent: &'a BaseInfo, cell: u32) -> Self {
        let (offset, form) = type_form_at(parent.typelib(), cell);
        StackInfo {
            parent,
            offset,
            info_type: InfoType::Type,
            form: Some(form),
        }
    }
}

impl InfoHandle for StackInfo<'_> {
    fn typelib(&self) -> &Typelib {
        self.parent.typelib()
    }

    fn offset(&self) -> u32 {
        self.offset
    }

    fn info_type(&self) -> InfoType {
        self.info_type
    }

    fn container(&self) -> Option<&BaseInfo> {
        Some(self.parent)
    }

    fn is_stack_allocated(&self) -> bool {
        true
    }

    fn to_base(&self) -> BaseInfo {
        let payload = match self.form {
            Some(form) => Payload::Type(form),
            None => Payload::Blob,
        };
        BaseInfo::with_payload(
            self.info_type,
            Some(self.parent.clone()),
            self.parent.typelib(),
            self.offset,
            payload,
        )
    }

    fn stack_parent(&self) -> &BaseInfo {
        self.parent
    }

    fn type_form(&self) -> Option<TypeForm> {
        self.form
    }

    fn unresolved_names(&self) -> Option<(&str, &str)> {
        None
    }
}
