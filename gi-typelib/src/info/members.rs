//! Fields, properties, enum values and constants

use super::{BaseInfo, InfoHandle, InfoType};
use crate::core::blob::{
    ACCESSOR_SENTINEL, FieldBlobFlags, PropertyBlobFlags, TypeTag, Transfer,
    layout::{constant, field, property, value},
};
use crate::core::bytes::{self, bit, bits};
use crate::core::offsets::Section;
use crate::error::{Result, TypelibError};
use crate::info::callable::FunctionInfo;
use crate::info::types::TypeInfo;
use bitflags::bitflags;

info_kind! {
    /// A field of a struct, union or object
    FieldInfo: Field
}

info_kind! {
    /// A property of an object or interface
    PropertyInfo: Property
}

info_kind! {
    /// A member of an enum or flags type
    ValueInfo: Value
}

info_kind! {
    ConstantInfo: Constant
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldInfoFlags: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
    }
}

bitflags! {
    /// Property access flags, numbered like the runtime's parameter flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const CONSTRUCT = 1 << 2;
        const CONSTRUCT_ONLY = 1 << 3;
        const DEPRECATED = 1 << 31;
    }
}

impl FieldInfo {
    fn blob_flags(&self) -> FieldBlobFlags {
        FieldBlobFlags::from_bits_truncate(self.0.read_u8(field::FLAGS))
    }

    pub fn flags(&self) -> FieldInfoFlags {
        let blob = self.blob_flags();
        let mut flags = FieldInfoFlags::empty();
        flags.set(FieldInfoFlags::READABLE, blob.contains(FieldBlobFlags::READABLE));
        flags.set(FieldInfoFlags::WRITABLE, blob.contains(FieldBlobFlags::WRITABLE));
        flags
    }

    /// Width in bits, 0 when the field is not a bitfield
    pub fn size(&self) -> u32 {
        u32::from(self.0.read_u8(field::BITS))
    }

    /// Byte offset within the containing struct
    pub fn struct_offset(&self) -> u32 {
        u32::from(self.0.read_u16(field::STRUCT_OFFSET))
    }

    /// Declared type; an embedded callback shows up as an interface type
    pub fn type_info(&self) -> TypeInfo {
        if self.blob_flags().contains(FieldBlobFlags::HAS_EMBEDDED_TYPE) {
            let sizes = self.0.typelib().header().blob_sizes;
            TypeInfo::embedded(self.0.clone(), self.0.offset().saturating_add(u32::from(sizes.field)))
        } else {
            TypeInfo::heap(self.0.clone(), self.0.offset().saturating_add(field::TYPE))
        }
    }
}

impl PropertyInfo {
    fn raw_flags(&self) -> u32 {
        self.0.read_u32(property::FLAGS)
    }

    fn blob_flags(&self) -> PropertyBlobFlags {
        PropertyBlobFlags::from_bits_truncate(self.raw_flags())
    }

    pub fn flags(&self) -> ParamFlags {
        let blob = self.blob_flags();
        let mut flags = ParamFlags::empty();
        flags.set(ParamFlags::READABLE, blob.contains(PropertyBlobFlags::READABLE));
        flags.set(ParamFlags::WRITABLE, blob.contains(PropertyBlobFlags::WRITABLE));
        flags.set(ParamFlags::CONSTRUCT, blob.contains(PropertyBlobFlags::CONSTRUCT));
        flags.set(
            ParamFlags::CONSTRUCT_ONLY,
            blob.contains(PropertyBlobFlags::CONSTRUCT_ONLY),
        );
        flags.set(ParamFlags::DEPRECATED, blob.contains(PropertyBlobFlags::DEPRECATED));
        flags
    }

    pub fn ownership_transfer(&self) -> Transfer {
        let blob = self.blob_flags();
        Transfer::from_bits(
            blob.contains(PropertyBlobFlags::TRANSFER_OWNERSHIP),
            blob.contains(PropertyBlobFlags::TRANSFER_CONTAINER_OWNERSHIP),
        )
    }

    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::heap(self.0.clone(), self.0.offset().saturating_add(property::TYPE))
    }

    fn accessor(&self, shift: u32) -> Option<FunctionInfo> {
        let index = bits(self.raw_flags(), shift, 10);
        if index == ACCESSOR_SENTINEL {
            return None;
        }
        let container = self.0.container()?;
        container
            .require("PropertyInfo::accessor", &[InfoType::Object, InfoType::Interface])
            .ok()?;
        container
            .section_child(InfoType::Function, Section::Methods, index)
            .ok()
            .map(FunctionInfo::new_unchecked)
    }

    /// Method that sets the property; construct-only properties have none
    pub fn setter(&self) -> Option<FunctionInfo> {
        let blob = self.blob_flags();
        if !blob.contains(PropertyBlobFlags::WRITABLE)
            || blob.contains(PropertyBlobFlags::CONSTRUCT_ONLY)
        {
            return None;
        }
        self.accessor(property::SETTER_SHIFT)
    }

    pub fn getter(&self) -> Option<FunctionInfo> {
        if !self.blob_flags().contains(PropertyBlobFlags::READABLE) {
            return None;
        }
        self.accessor(property::GETTER_SHIFT)
    }
}

impl ValueInfo {
    /// Numeric value, zero-extended for members of unsigned enums
    pub fn value(&self) -> i64 {
        let raw = self.0.read_i32(value::VALUE);
        if bit(self.0.read_u32(value::FLAGS), 1) {
            i64::from(raw as u32)
        } else {
            i64::from(raw)
        }
    }
}

/// Decoded constant value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue<'a> {
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// Raw code point; not guaranteed to be a valid `char`
    UniChar(u32),
    Utf8(&'a str),
    /// Any other payload, undecoded
    Bytes(&'a [u8]),
}

impl ConstantInfo {
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::heap(self.0.clone(), self.0.offset().saturating_add(constant::TYPE))
    }

    /// Decode the stored value according to the constant's basic type
    pub fn value(&self) -> Result<ConstantValue<'_>> {
        let data = self.0.typelib().data();
        let size = self.0.read_u32(constant::SIZE);
        let at = self.0.read_u32(constant::OFFSET);
        let type_info = self.type_info();
        if type_info.is_pointer() && type_info.tag() != TypeTag::Utf8 {
            return bytes_value(data, at, size);
        }
        Ok(match type_info.tag() {
            TypeTag::Boolean => ConstantValue::Boolean(bytes::i32_at(data, at)? != 0),
            TypeTag::Int8 => ConstantValue::Int8(bytes::i8_at(data, at)?),
            TypeTag::UInt8 => ConstantValue::UInt8(bytes::u8_at(data, at)?),
            TypeTag::Int16 => ConstantValue::Int16(bytes::i16_at(data, at)?),
            TypeTag::UInt16 => ConstantValue::UInt16(bytes::u16_at(data, at)?),
            TypeTag::Int32 => ConstantValue::Int32(bytes::i32_at(data, at)?),
            TypeTag::UInt32 => ConstantValue::UInt32(bytes::u32_at(data, at)?),
            TypeTag::Int64 => ConstantValue::Int64(bytes::i64_at(data, at)?),
            TypeTag::UInt64 => ConstantValue::UInt64(bytes::u64_at(data, at)?),
            TypeTag::Float => ConstantValue::Float(bytes::f32_at(data, at)?),
            TypeTag::Double => ConstantValue::Double(bytes::f64_at(data, at)?),
            TypeTag::UniChar => ConstantValue::UniChar(bytes::u32_at(data, at)?),
            TypeTag::Utf8 => ConstantValue::Utf8(bytes::str_at(data, at, None)?),
            _ => return bytes_value(data, at, size),
        })
    }
}

fn bytes_value(data: &[u8], at: u32, size: u32) -> Result<ConstantValue<'_>> {
    let start = at as usize;
    start
        .checked_add(size as usize)
        .and_then(|end| data.get(start..end))
        .map(ConstantValue::Bytes)
        .ok_or_else(|| {
            TypelibError::Invalid(format!(
                "Constant value of {size} bytes at {at:#x} is outside the buffer"
            ))
        })
}
