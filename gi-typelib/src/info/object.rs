//! Object classes and interfaces

use super::{BaseInfo, InfoType};
use crate::core::blob::{
    ObjectBlobFlags,
    layout::{common, interface, object},
};
use crate::core::offsets::Section;
use crate::error::Result;
use crate::info::callable::{FunctionInfo, SignalInfo, VFuncInfo};
use crate::info::members::{ConstantInfo, FieldInfo, PropertyInfo};
use crate::info::structs::StructInfo;
use crate::repository::Repository;

info_kind! {
    /// A class of the runtime object system
    ObjectInfo: Object
}

info_kind! {
    InterfaceInfo: Interface
}

/// Sections present in both objects and interfaces
macro_rules! class_sections {
    ($name:ident) => {
        impl $name {
            pub fn n_properties(&self) -> u32 {
                self.0.section_count(Section::Properties)
            }

            pub fn property(&self, n: u32) -> Result<PropertyInfo> {
                self.0
                    .section_child(InfoType::Property, Section::Properties, n)
                    .map(PropertyInfo::new_unchecked)
            }

            pub fn find_property(&self, name: &str) -> Option<PropertyInfo> {
                self.0
                    .find_section_child(InfoType::Property, Section::Properties, name)
                    .map(PropertyInfo::new_unchecked)
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

            pub fn n_signals(&self) -> u32 {
                self.0.section_count(Section::Signals)
            }

            pub fn signal(&self, n: u32) -> Result<SignalInfo> {
                self.0
                    .section_child(InfoType::Signal, Section::Signals, n)
                    .map(SignalInfo::new_unchecked)
            }

            pub fn find_signal(&self, name: &str) -> Option<SignalInfo> {
                self.0
                    .find_section_child(InfoType::Signal, Section::Signals, name)
                    .map(SignalInfo::new_unchecked)
            }

            pub fn n_vfuncs(&self) -> u32 {
                self.0.section_count(Section::VFuncs)
            }

            pub fn vfunc(&self, n: u32) -> Result<VFuncInfo> {
                self.0
                    .section_child(InfoType::VFunc, Section::VFuncs, n)
                    .map(VFuncInfo::new_unchecked)
            }

            pub fn find_vfunc(&self, name: &str) -> Option<VFuncInfo> {
                self.0
                    .find_section_child(InfoType::VFunc, Section::VFuncs, name)
                    .map(VFuncInfo::new_unchecked)
            }

            pub fn n_constants(&self) -> u32 {
                self.0.section_count(Section::Constants)
            }

            pub fn constant(&self, n: u32) -> Result<ConstantInfo> {
                self.0
                    .section_child(InfoType::Constant, Section::Constants, n)
                    .map(ConstantInfo::new_unchecked)
            }
        }
    };
}

class_sections!(ObjectInfo);
class_sections!(InterfaceInfo);

impl ObjectInfo {
    fn blob_flags(&self) -> ObjectBlobFlags {
        ObjectBlobFlags::from_bits_truncate(self.0.read_u16(common::FLAGS))
    }

    pub fn is_abstract(&self) -> bool {
        self.blob_flags().contains(ObjectBlobFlags::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        self.blob_flags().contains(ObjectBlobFlags::FINAL)
    }

    /// True for roots of their own type hierarchy
    pub fn is_fundamental(&self) -> bool {
        self.blob_flags().contains(ObjectBlobFlags::FUNDAMENTAL)
    }

    /// Parent class; unresolved when it lives in another typelib
    pub fn parent(&self) -> Option<BaseInfo> {
        self.0.entry_field(object::PARENT)
    }

    /// Class struct holding the vfunc table
    pub fn class_struct(&self) -> Option<StructInfo> {
        self.0
            .entry_field(object::GTYPE_STRUCT)
            .and_then(|info| StructInfo::try_from(info).ok())
    }

    pub fn n_interfaces(&self) -> u32 {
        self.0.section_count(Section::Interfaces)
    }

    /// Implemented interface `n`; unresolved when declared elsewhere
    pub fn interface(&self, n: u32) -> Result<BaseInfo> {
        self.0.section_entry(Section::Interfaces, n)
    }

    pub fn interfaces(&self) -> Vec<BaseInfo> {
        (0..self.n_interfaces())
            .filter_map(|n| self.interface(n).ok())
            .collect()
    }

    pub fn n_fields(&self) -> u32 {
        self.0.section_count(Section::Fields)
    }

    pub fn field(&self, n: u32) -> Result<FieldInfo> {
        self.0
            .section_child(InfoType::Field, Section::Fields, n)
            .map(FieldInfo::new_unchecked)
    }

    /// Local interfaces, in declaration order
    fn local_interfaces(&self) -> impl Iterator<Item = InterfaceInfo> + '_ {
        self.interfaces()
            .into_iter()
            .filter_map(|info| InterfaceInfo::try_from(info).ok())
    }

    /// Find a method on the class, then on each implemented interface.
    /// Returns the method with the handle that declares it.
    pub fn find_method_using_interfaces(&self, name: &str) -> Option<(FunctionInfo, BaseInfo)> {
        if let Some(method) = self.find_method(name) {
            return Some((method, self.0.clone()));
        }
        self.local_interfaces().find_map(|iface| {
            iface
                .find_method(name)
                .map(|method| (method, iface.into_base()))
        })
    }

    /// Find a vfunc on the class, then on each implemented interface
    pub fn find_vfunc_using_interfaces(&self, name: &str) -> Option<(VFuncInfo, BaseInfo)> {
        if let Some(vfunc) = self.find_vfunc(name) {
            return Some((vfunc, self.0.clone()));
        }
        self.local_interfaces().find_map(|iface| {
            iface
                .find_vfunc(name)
                .map(|vfunc| (vfunc, iface.into_base()))
        })
    }

    pub fn ref_function_name(&self) -> Option<&str> {
        self.0.string_field(object::REF_FUNC)
    }

    pub fn unref_function_name(&self) -> Option<&str> {
        self.0.string_field(object::UNREF_FUNC)
    }

    pub fn set_value_function_name(&self) -> Option<&str> {
        self.0.string_field(object::SET_VALUE_FUNC)
    }

    pub fn get_value_function_name(&self) -> Option<&str> {
        self.0.string_field(object::GET_VALUE_FUNC)
    }

    /// Walk up the parent chain until `get` yields a name
    fn find_in_ancestors(
        &self,
        repository: &Repository,
        get: impl Fn(&ObjectInfo) -> Option<&str>,
    ) -> Option<String> {
        let mut current = self.clone();
        loop {
            if let Some(name) = get(&current) {
                return Some(name.to_string());
            }
            let parent = current.parent()?;
            let parent = repository.resolve(&parent).ok()?;
            current = ObjectInfo::try_from(parent).ok()?;
        }
    }

    /// Reference function of this class or the nearest ancestor declaring one
    pub fn find_ref_function_name(&self, repository: &Repository) -> Option<String> {
        self.find_in_ancestors(repository, ObjectInfo::ref_function_name)
    }

    pub fn find_unref_function_name(&self, repository: &Repository) -> Option<String> {
        self.find_in_ancestors(repository, ObjectInfo::unref_function_name)
    }

    pub fn find_set_value_function_name(&self, repository: &Repository) -> Option<String> {
        self.find_in_ancestors(repository, ObjectInfo::set_value_function_name)
    }

    pub fn find_get_value_function_name(&self, repository: &Repository) -> Option<String> {
        self.find_in_ancestors(repository, ObjectInfo::get_value_function_name)
    }
}

impl InterfaceInfo {
    pub fn n_prerequisites(&self) -> u32 {
        self.0.section_count(Section::Prerequisites)
    }

    /// Prerequisite `n`; unresolved when declared elsewhere
    pub fn prerequisite(&self, n: u32) -> Result<BaseInfo> {
        self.0.section_entry(Section::Prerequisites, n)
    }

    /// Struct holding the interface's vfunc table
    pub fn iface_struct(&self) -> Option<StructInfo> {
        self.0
            .entry_field(interface::GTYPE_STRUCT)
            .and_then(|info| StructInfo::try_from(info).ok())
    }
}
