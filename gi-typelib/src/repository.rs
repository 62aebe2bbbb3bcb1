//! Registry of loaded typelibs, keyed by namespace
//!
//! The repository only holds typelibs handed to it; it never searches the
//! filesystem. Lookups clone the [`Typelib`] handle out of the lock before
//! building infos, so no lock is held while the buffer is read.

use crate::core::typelib::Typelib;
use crate::error::{Result, TypelibError};
use crate::info::{BaseInfo, EnumInfo, InfoHandle};
use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Repository {
    typelibs: RwLock<AHashMap<String, Typelib>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded typelib under its namespace
    ///
    /// Registering the same namespace and version twice keeps the first
    /// typelib. A different version of a registered namespace is rejected.
    pub fn register(&self, typelib: Typelib) -> Result<String> {
        let namespace = typelib.namespace().to_string();
        let mut typelibs = self.typelibs.write();
        if let Some(existing) = typelibs.get(&namespace) {
            if existing.nsversion() != typelib.nsversion() {
                return Err(TypelibError::precondition(
                    "Repository::register",
                    format!(
                        "namespace {namespace} version {} is already registered, cannot add version {}",
                        existing.nsversion().unwrap_or_default(),
                        typelib.nsversion().unwrap_or_default(),
                    ),
                ));
            }
            debug!(namespace = %namespace, "namespace already registered");
            return Ok(namespace);
        }
        debug!(
            namespace = %namespace,
            version = typelib.nsversion().unwrap_or_default(),
            entries = typelib.n_entries(),
            "registered typelib"
        );
        metrics::gauge!("typelib_registered_namespaces").set((typelibs.len() + 1) as f64);
        typelibs.insert(namespace.clone(), typelib);
        Ok(namespace)
    }

    /// True when `namespace` is registered, at `version` if one is given
    pub fn is_registered(&self, namespace: &str, version: Option<&str>) -> bool {
        self.typelibs
            .read()
            .get(namespace)
            .is_some_and(|t| version.is_none() || t.nsversion() == version)
    }

    pub fn get(&self, namespace: &str) -> Option<Typelib> {
        self.typelibs.read().get(namespace).cloned()
    }

    /// Registered namespaces, sorted
    pub fn loaded_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.typelibs.read().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    /// Immediate dependencies of a registered namespace
    pub fn dependencies(&self, namespace: &str) -> Option<Vec<String>> {
        let typelib = self.get(namespace)?;
        Some(
            typelib
                .dependencies()
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn n_infos(&self, namespace: &str) -> u16 {
        self.get(namespace)
            .map(|t| t.n_local_entries())
            .unwrap_or_default()
    }

    /// Local entry `index` (0-based) of a namespace
    pub fn info(&self, namespace: &str, index: u16) -> Result<BaseInfo> {
        let typelib = self.require(namespace)?;
        let count = typelib.n_local_entries();
        if index >= count {
            return Err(TypelibError::IndexOutOfRange {
                section: "local entries",
                index: u32::from(index),
                count: u32::from(count),
            });
        }
        typelib.info(index + 1)
    }

    fn require(&self, namespace: &str) -> Result<Typelib> {
        self.get(namespace).ok_or_else(|| {
            TypelibError::precondition(
                "Repository",
                format!("namespace {namespace} is not registered"),
            )
        })
    }

    pub fn find_by_name(&self, namespace: &str, name: &str) -> Option<BaseInfo> {
        self.get(namespace)?.find_by_name(name)
    }

    /// Find a registered type by runtime type name
    ///
    /// Typelibs whose C prefix matches the name are searched first.
    pub fn find_by_gtype_name(&self, gtype_name: &str) -> Option<BaseInfo> {
        let typelibs: Vec<Typelib> = self.typelibs.read().values().cloned().collect();
        let (preferred, rest): (Vec<_>, Vec<_>) = typelibs
            .into_iter()
            .partition(|t| t.matches_gtype_name_prefix(gtype_name));
        preferred.iter().chain(rest.iter()).find_map(|typelib| {
            let entry = typelib.dir_entry_by_gtype_name(gtype_name)?;
            typelib.info(entry.index).ok()
        })
    }

    /// Find the enum whose error domain is `domain`
    pub fn find_by_error_domain(&self, domain: &str) -> Option<EnumInfo> {
        let typelibs: Vec<Typelib> = self.typelibs.read().values().cloned().collect();
        typelibs.iter().find_map(|typelib| {
            let entry = typelib.dir_entry_by_error_domain(domain)?;
            typelib.info(entry.index).ok()?.downcast().ok()
        })
    }

    /// Info for directory entry `index` of `typelib`
    ///
    /// Non-local entries are looked up in the namespace providing them and
    /// come back unresolved when that namespace is not registered.
    pub fn info_from_entry(&self, typelib: &Typelib, index: u16) -> Result<BaseInfo> {
        let info = typelib.info(index)?;
        if !info.is_unresolved() {
            return Ok(info);
        }
        Ok(self.resolve(&info).unwrap_or(info))
    }

    /// Replace an unresolved info with the entry it names
    pub fn resolve(&self, info: &BaseInfo) -> Result<BaseInfo> {
        let Some((name, namespace)) = info.unresolved_names() else {
            return Ok(info.clone());
        };
        self.find_by_name(namespace, name).ok_or_else(|| {
            debug!(namespace, name, "unresolvable reference");
            TypelibError::Unresolvable {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })
    }
}
