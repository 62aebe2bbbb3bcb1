//! Boundary to the dynamic linker and the runtime type system
//!
//! The reader never loads shared libraries or registers types itself.
//! Callers plug those services in through [`SymbolResolver`] and
//! [`TypeRegistry`].

use ahash::AHashMap;

/// Address of a resolved symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolAddress(pub usize);

/// Identifier the runtime type system assigns to a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeTypeId(pub usize);

impl RuntimeTypeId {
    /// "No type"
    pub const NONE: RuntimeTypeId = RuntimeTypeId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Finds exported symbols in a list of shared libraries
pub trait SymbolResolver {
    /// Look `symbol` up in `libraries`, in order
    fn resolve_symbol(&self, libraries: &[&str], symbol: &str) -> Option<SymbolAddress>;
}

/// Maps registered types to runtime identifiers
pub trait TypeRegistry {
    /// Identifier of a type already known to the runtime by name
    fn type_from_name(&self, type_name: &str) -> RuntimeTypeId;

    /// Call the type's init function and return what it registered
    fn type_from_init(&self, init: SymbolAddress) -> RuntimeTypeId;
}

/// In-memory symbol table keyed by `(library, symbol)`
///
/// A library of `None` matches every library list, which is how tests
/// model symbols that live in the main program.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: AHashMap<(Option<String>, String), SymbolAddress>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `symbol` as exported by `library`
    pub fn insert(&mut self, library: Option<&str>, symbol: &str, address: SymbolAddress) {
        self.symbols
            .insert((library.map(str::to_string), symbol.to_string()), address);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve_symbol(&self, libraries: &[&str], symbol: &str) -> Option<SymbolAddress> {
        libraries
            .iter()
            .find_map(|lib| {
                self.symbols
                    .get(&(Some((*lib).to_string()), symbol.to_string()))
                    .copied()
            })
            .or_else(|| self.symbols.get(&(None, symbol.to_string())).copied())
    }
}

/// In-memory type registry: names map to ids, init symbols map to ids
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    by_name: AHashMap<String, RuntimeTypeId>,
    by_init: AHashMap<SymbolAddress, RuntimeTypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_name(&mut self, type_name: &str, id: RuntimeTypeId) {
        self.by_name.insert(type_name.to_string(), id);
    }

    pub fn insert_init(&mut self, init: SymbolAddress, id: RuntimeTypeId) {
        self.by_init.insert(init, id);
    }
}

impl TypeRegistry for TypeTable {
    fn type_from_name(&self, type_name: &str) -> RuntimeTypeId {
        self.by_name
            .get(type_name)
            .copied()
            .unwrap_or(RuntimeTypeId::NONE)
    }

    fn type_from_init(&self, init: SymbolAddress) -> RuntimeTypeId {
        self.by_init
            .get(&init)
            .copied()
            .unwrap_or(RuntimeTypeId::NONE)
    }
}
