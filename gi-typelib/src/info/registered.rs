//! Entries registered with the runtime type system

use super::{BaseInfo, InfoHandle, InfoType};
use crate::core::blob::{BlobType, layout::registered};
use crate::symbol::{RuntimeTypeId, SymbolResolver, TypeRegistry};
use tracing::trace;

info_kind! {
    /// Any registered type: struct, boxed, union, enum, flags, object or interface
    RegisteredTypeInfo: Struct | Boxed | Union | Enum | Flags | Object | Interface
}

/// Init function name that marks types built into the runtime
const INTERN: &str = "intern";

/// Accessors shared by registered-type handles
pub trait RegisteredType: AsRef<BaseInfo> {
    /// Runtime type name, `None` for unregistered types
    fn type_name(&self) -> Option<&str> {
        self.as_ref().string_field(registered::GTYPE_NAME)
    }

    /// Symbol of the function returning the runtime type identifier
    fn type_init_function_name(&self) -> Option<&str> {
        self.as_ref().string_field(registered::GTYPE_INIT)
    }

    /// True when the entry was declared as a boxed blob
    fn is_boxed(&self) -> bool {
        let info = self.as_ref();
        let raw = info.typelib().read_u16(info.offset());
        raw == BlobType::Boxed as u16
    }

    /// Identifier the runtime assigned to this type
    ///
    /// Returns [`RuntimeTypeId::NONE`] when the type has no init function or
    /// the init symbol cannot be found; neither is an error.
    fn runtime_type_identifier(
        &self,
        resolver: &dyn SymbolResolver,
        registry: &dyn TypeRegistry,
    ) -> RuntimeTypeId {
        let Some(init) = self.type_init_function_name() else {
            return RuntimeTypeId::NONE;
        };
        if init == INTERN {
            return self
                .type_name()
                .map(|name| registry.type_from_name(name))
                .unwrap_or(RuntimeTypeId::NONE);
        }
        let libraries = self.as_ref().typelib().shared_libraries();
        match resolver.resolve_symbol(&libraries, init) {
            Some(address) => registry.type_from_init(address),
            None => {
                trace!(init, "type init function not found");
                RuntimeTypeId::NONE
            }
        }
    }
}

impl RegisteredType for RegisteredTypeInfo {}
impl RegisteredType for crate::info::StructInfo {}
impl RegisteredType for crate::info::UnionInfo {}
impl RegisteredType for crate::info::EnumInfo {}
impl RegisteredType for crate::info::ObjectInfo {}
impl RegisteredType for crate::info::InterfaceInfo {}

impl RegisteredTypeInfo {
    /// Kind of the registered entry
    pub fn kind(&self) -> InfoType {
        self.0.info_type()
    }
}
