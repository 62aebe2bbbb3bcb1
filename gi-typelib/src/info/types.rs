//! Type handles

use super::{BaseInfo, InfoHandle, InfoType, StackInfo, TypeForm};
use crate::core::blob::{ArrayType, TypeTag, layout::complex};
use crate::core::bytes::{self, bit, bits};
use crate::core::simple_type::ComplexTypeHeader;
use crate::error::{Result, TypelibError};
use crate::info::structs::EnumInfo;

/// Describes a type: a basic tag, a container with parameters, or a
/// reference to another directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo<H = BaseInfo>(H);

/// Type view borrowed from its enclosing callable or argument
pub type StackTypeInfo<'a> = TypeInfo<StackInfo<'a>>;

impl TryFrom<BaseInfo> for TypeInfo {
    type Error = TypelibError;

    fn try_from(info: BaseInfo) -> Result<Self> {
        info.require("TypeInfo::try_from", &[InfoType::Type])?;
        Ok(TypeInfo(info))
    }
}

impl From<TypeInfo> for BaseInfo {
    fn from(info: TypeInfo) -> Self {
        info.0
    }
}

impl<'a> TypeInfo<StackInfo<'a>> {
    pub(crate) fn stack(parent: &'a BaseInfo, cell: u32) -> Self {
        TypeInfo(StackInfo::new_type(parent, cell))
    }
}

impl TypeInfo {
    pub(crate) fn heap(container: BaseInfo, cell: u32) -> Self {
        let typelib = container.typelib().clone();
        TypeInfo(BaseInfo::new_type(Some(container), &typelib, cell))
    }

    pub(crate) fn embedded(container: BaseInfo, offset: u32) -> Self {
        let typelib = container.typelib().clone();
        TypeInfo(BaseInfo::new_embedded_type(container, &typelib, offset))
    }
}

impl<H: InfoHandle> TypeInfo<H> {
    pub fn handle(&self) -> &H {
        &self.0
    }

    fn form(&self) -> TypeForm {
        self.0.type_form().unwrap_or(TypeForm::Complex)
    }

    fn complex_header(&self) -> Option<ComplexTypeHeader> {
        match self.form() {
            TypeForm::Complex => {
                ComplexTypeHeader::read(self.0.typelib().data(), self.0.offset()).ok()
            }
            _ => None,
        }
    }

    /// Byte 1 of an array record, `None` for other types
    fn array_flags(&self) -> Option<u32> {
        let header = self.complex_header()?;
        (header.tag == TypeTag::Array)
            .then(|| u32::from(self.0.typelib().read_u8(self.0.offset().saturating_add(1))))
    }

    pub fn is_pointer(&self) -> bool {
        match self.form() {
            TypeForm::Basic { pointer, .. } => pointer,
            TypeForm::Complex => self.complex_header().is_some_and(|h| h.pointer),
            TypeForm::Embedded => false,
        }
    }

    pub fn tag(&self) -> TypeTag {
        match self.form() {
            TypeForm::Basic { tag, .. } => tag,
            TypeForm::Complex => self
                .complex_header()
                .map(|h| h.tag)
                .unwrap_or(TypeTag::Void),
            TypeForm::Embedded => TypeTag::Interface,
        }
    }

    /// Number of parameter types: one for arrays and lists, two for hash tables
    pub fn n_param_types(&self) -> u32 {
        match self.complex_header().map(|h| h.tag) {
            Some(TypeTag::Array) => 1,
            Some(TypeTag::GList | TypeTag::GSList | TypeTag::GHash) => u32::from(
                self.0
                    .typelib()
                    .read_u16(self.0.offset().saturating_add(complex::N_TYPES)),
            ),
            _ => 0,
        }
    }

    /// Parameter type `n` of a container type
    pub fn param_type(&self, n: u32) -> Result<TypeInfo> {
        if !self.complex_header().is_some_and(|h| h.tag.is_container()) {
            return Err(TypelibError::precondition(
                "TypeInfo::param_type",
                format!("{} is not a container type", self.tag()),
            ));
        }
        let count = self.n_param_types();
        if n >= count {
            return Err(TypelibError::IndexOutOfRange {
                section: "param types",
                index: n,
                count,
            });
        }
        let first = bytes::advance(self.0.offset(), complex::PARAM_TYPE_SIZE)?;
        Ok(TypeInfo::heap(self.0.to_base(), bytes::record_offset(first, n, 4)?))
    }

    /// The entry an interface type refers to
    ///
    /// Embedded types yield the callback they describe. References to entries
    /// of other typelibs come back unresolved.
    pub fn interface(&self) -> Option<BaseInfo> {
        match self.form() {
            TypeForm::Embedded => {
                let typelib = self.0.typelib().clone();
                Some(BaseInfo::new(
                    InfoType::Callback,
                    Some(self.0.to_base()),
                    &typelib,
                    self.0.offset(),
                ))
            }
            TypeForm::Complex if self.tag() == TypeTag::Interface => {
                let typelib = self.0.typelib();
                let index = typelib.read_u16(self.0.offset().saturating_add(complex::INTERFACE));
                typelib.info(index).ok()
            }
            _ => None,
        }
    }

    /// Argument index holding the length of an array
    pub fn array_length_index(&self) -> Option<u16> {
        let flags = self.array_flags()?;
        bit(flags, complex::ARRAY_HAS_LENGTH_BIT).then(|| {
            self.0
                .typelib()
                .read_u16(self.0.offset().saturating_add(complex::ARRAY_DIMENSION))
        })
    }

    pub fn array_fixed_size(&self) -> Option<u16> {
        let flags = self.array_flags()?;
        bit(flags, complex::ARRAY_HAS_SIZE_BIT).then(|| {
            self.0
                .typelib()
                .read_u16(self.0.offset().saturating_add(complex::ARRAY_DIMENSION))
        })
    }

    pub fn is_zero_terminated(&self) -> bool {
        self.array_flags()
            .is_some_and(|flags| bit(flags, complex::ARRAY_ZERO_TERMINATED_BIT))
    }

    /// Array flavour, `None` for non-array types
    pub fn array_type(&self) -> Option<ArrayType> {
        let flags = self.array_flags()?;
        Some(ArrayType::from_raw(bits(flags, complex::ARRAY_TYPE_SHIFT, 2)))
    }

    /// Tag of the value actually stored: enums and flags resolve to their
    /// storage integer type
    pub fn storage_type(&self) -> TypeTag {
        let tag = self.tag();
        if tag != TypeTag::Interface {
            return tag;
        }
        self.interface()
            .and_then(|info| EnumInfo::try_from(info).ok())
            .map(|e| e.storage_type())
            .unwrap_or(tag)
    }
}

impl<H: InfoHandle> InfoHandle for TypeInfo<H> {
    fn typelib(&self) -> &crate::core::typelib::Typelib {
        self.0.typelib()
    }

    fn offset(&self) -> u32 {
        self.0.offset()
    }

    fn info_type(&self) -> InfoType {
        self.0.info_type()
    }

    fn container(&self) -> Option<&BaseInfo> {
        self.0.container()
    }

    fn is_stack_allocated(&self) -> bool {
        self.0.is_stack_allocated()
    }

    fn to_base(&self) -> BaseInfo {
        self.0.to_base()
    }

    fn stack_parent(&self) -> &BaseInfo {
        self.0.stack_parent()
    }

    fn type_form(&self) -> Option<TypeForm> {
        self.0.type_form()
    }

    fn unresolved_names(&self) -> Option<(&str, &str)> {
        None
    }
}
