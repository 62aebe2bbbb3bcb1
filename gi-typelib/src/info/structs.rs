//! Structs, unions and enumerations

use super::{InfoHandle, InfoType};
use crate::core::blob::{
    TypeTag,
    layout::{common, enumeration, structure, union},
};
use crate::core::bytes::{bit, bits};
use crate::core::offsets::Section;
use crate::error::Result;
use crate::info::callable::FunctionInfo;
use crate::info::members::{ConstantInfo, FieldInfo, ValueInfo};
use crate::info::types::TypeInfo;

info_kind! {
    /// A struct or boxed type
    StructInfo: Struct | Boxed
}

info_kind! {
    UnionInfo: Union
}

info_kind! {
    /// An enumeration or flags type
    EnumInfo: Enum | Flags
}

/// Field and method sections shared by structs and unions
macro_rules! fields_and_methods {
    ($name:ident) => {
        impl $name {
            pub fn n_fields(&self) -> u32 {
                self.0.section_count(Section::Fields)
            }

            pub fn field(&self, n: u32) -> Result<FieldInfo> {
                self.0
                    .section_child(InfoType::Field, Section::Fields, n)
                    .map(FieldInfo::new_unchecked)
            }

            pub fn find_field(&self, name: &str) -> Option<FieldInfo> {
                self.0
                    .find_section_child(InfoType::Field, Section::Fields, name)
                    .map(FieldInfo::new_unchecked)
            }

            pub fn n_methods(&self) -> u32 {
                self.0.section_count(Section::Methods)
            }

            pub fn method(&self, n: u32) -> Result<FunctionInfo> {
                self.0
                    .section_child(InfoType::Function, Section::Methods, n)
                    .map(FunctionInfo::new_unchecked)
            }

            pub fn find_method(&self, name: &str) -> Option<FunctionInfo> {
                self.0
                    .find_section_child(InfoType::Function, Section::Methods, name)
                    .map(FunctionInfo::new_unchecked)
            }
        }
    };
}

fields_and_methods!(StructInfo);
fields_and_methods!(UnionInfo);

impl StructInfo {
    fn flags(&self) -> u32 {
        u32::from(self.0.read_u16(common::FLAGS))
    }

    pub fn size(&self) -> u32 {
        self.0.read_u32(structure::SIZE)
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> u32 {
        bits(self.flags(), structure::ALIGNMENT_SHIFT, 6)
    }

    /// True for the class struct of an object or the vtable of an interface
    pub fn is_gtype_struct(&self) -> bool {
        bit(self.flags(), structure::IS_GTYPE_STRUCT_BIT)
    }

    pub fn is_foreign(&self) -> bool {
        bit(self.flags(), structure::FOREIGN_BIT)
    }

    pub fn copy_function_name(&self) -> Option<&str> {
        self.0.string_field(structure::COPY_FUNC)
    }

    pub fn free_function_name(&self) -> Option<&str> {
        self.0.string_field(structure::FREE_FUNC)
    }
}

impl UnionInfo {
    fn flags(&self) -> u32 {
        u32::from(self.0.read_u16(common::FLAGS))
    }

    pub fn size(&self) -> u32 {
        self.0.read_u32(union::SIZE)
    }

    pub fn alignment(&self) -> u32 {
        bits(self.flags(), union::ALIGNMENT_SHIFT, 6)
    }

    pub fn is_discriminated(&self) -> bool {
        bit(self.flags(), union::DISCRIMINATED_BIT)
    }

    /// Byte offset of the discriminator field, `None` for plain unions
    pub fn discriminator_offset(&self) -> Option<i32> {
        self.is_discriminated()
            .then(|| self.0.read_i32(union::DISCRIMINATOR_OFFSET))
    }

    pub fn discriminator_type(&self) -> Option<TypeInfo> {
        self.is_discriminated().then(|| {
            TypeInfo::heap(self.0.clone(), self.0.offset().saturating_add(union::DISCRIMINATOR_TYPE))
        })
    }

    /// Discriminator constant selecting field `n`
    pub fn discriminator(&self, n: u32) -> Option<ConstantInfo> {
        if !self.is_discriminated() {
            return None;
        }
        self.0
            .section_child(InfoType::Constant, Section::Discriminators, n)
            .ok()
            .map(ConstantInfo::new_unchecked)
    }

    pub fn copy_function_name(&self) -> Option<&str> {
        self.0.string_field(union::COPY_FUNC)
    }

    pub fn free_function_name(&self) -> Option<&str> {
        self.0.string_field(union::FREE_FUNC)
    }
}

impl EnumInfo {
    pub fn n_values(&self) -> u32 {
        self.0.section_count(Section::Values)
    }

    pub fn value(&self, n: u32) -> Result<ValueInfo> {
        self.0
            .section_child(InfoType::Value, Section::Values, n)
            .map(ValueInfo::new_unchecked)
    }

    pub fn values(&self) -> Vec<ValueInfo> {
        (0..self.n_values()).filter_map(|n| self.value(n).ok()).collect()
    }

    pub fn n_methods(&self) -> u32 {
        self.0.section_count(Section::Methods)
    }

    pub fn method(&self, n: u32) -> Result<FunctionInfo> {
        self.0
            .section_child(InfoType::Function, Section::Methods, n)
            .map(FunctionInfo::new_unchecked)
    }

    /// Integer type the values are stored as
    pub fn storage_type(&self) -> TypeTag {
        let raw = bits(
            u32::from(self.0.read_u16(common::FLAGS)),
            enumeration::STORAGE_TYPE_SHIFT,
            5,
        );
        TypeTag::from_raw(raw as u8).unwrap_or(TypeTag::UInt32)
    }

    /// Error domain quark string for enums describing error codes
    pub fn error_domain(&self) -> Option<&str> {
        self.0.string_field(enumeration::ERROR_DOMAIN)
    }
}
