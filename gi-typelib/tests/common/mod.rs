//! Shared fixture builder: assembles typelib buffers byte by byte
#![allow(dead_code)]

use gi_typelib::core::blob::layout::{
    arg, callback, common, constant, enumeration, field, function, interface, object, property,
    registered, signal, signature, structure, union, value, vfunc,
};
use gi_typelib::core::header::{BlobSizes, HEADER_SIZE, SectionType, TYPELIB_MAGIC, field as hf};
use gi_typelib::core::simple_type::{ComplexTypeHeader, SimpleType};
use gi_typelib::{BlobType, HashBuilder, TypeTag};
use std::collections::HashMap;

/// Inline basic type cell
pub fn basic(tag: TypeTag, pointer: bool) -> u32 {
    SimpleType::basic(tag, pointer).encode()
}

pub fn utf8() -> u32 {
    basic(TypeTag::Utf8, true)
}

#[derive(Debug, Clone)]
pub struct Arg<'a> {
    pub name: &'a str,
    pub flags: u32,
    pub closure: i8,
    pub destroy: i8,
    pub ty: u32,
}

impl<'a> Arg<'a> {
    pub fn new(name: &'a str, flags: u32, ty: u32) -> Self {
        Arg {
            name,
            flags,
            closure: -1,
            destroy: -1,
            ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Func<'a> {
    pub name: &'a str,
    pub symbol: &'a str,
    /// Raw flag word, index bits included
    pub flags: u16,
    pub is_static: bool,
    pub signature: u32,
}

impl<'a> Func<'a> {
    pub fn new(name: &'a str, symbol: &'a str, signature: u32) -> Self {
        Func {
            name,
            symbol,
            flags: 0,
            is_static: false,
            signature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub name: &'a str,
    pub flags: u8,
    pub bits: u8,
    pub struct_offset: u16,
    pub ty: u32,
    /// Signature of an embedded callback; sets the embedded flag
    pub embedded: Option<(&'a str, u32)>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'a str, struct_offset: u16, ty: u32) -> Self {
        Field {
            name,
            flags: 0b11,
            bits: 0,
            struct_offset,
            ty,
            embedded: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prop<'a> {
    pub name: &'a str,
    pub flags: u32,
    pub ty: u32,
}

#[derive(Debug, Clone)]
pub struct Signal<'a> {
    pub name: &'a str,
    pub flags: u16,
    pub class_closure: u16,
    pub signature: u32,
}

#[derive(Debug, Clone)]
pub struct VFunc<'a> {
    pub name: &'a str,
    pub flags: u16,
    pub signal: u16,
    pub struct_offset: u16,
    pub invoker: u16,
    pub signature: u32,
}

#[derive(Debug, Clone)]
pub struct Value<'a> {
    pub name: &'a str,
    pub value: i32,
    pub unsigned: bool,
}

#[derive(Debug, Clone)]
pub struct Const<'a> {
    pub name: &'a str,
    pub ty: u32,
    pub bytes: Vec<u8>,
}

/// Registered type data, `None` for unregistered types
pub type GType<'a> = Option<(&'a str, &'a str)>;

#[derive(Debug, Clone, Default)]
pub struct ObjectDef<'a> {
    pub name: &'a str,
    pub gtype_name: &'a str,
    pub gtype_init: &'a str,
    pub flags: u16,
    pub parent: u16,
    pub gtype_struct: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field<'a>>,
    pub properties: Vec<Prop<'a>>,
    pub methods: Vec<Func<'a>>,
    pub signals: Vec<Signal<'a>>,
    pub vfuncs: Vec<VFunc<'a>>,
    pub constants: Vec<Const<'a>>,
    pub ref_func: Option<&'a str>,
    pub unref_func: Option<&'a str>,
    pub set_value_func: Option<&'a str>,
    pub get_value_func: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceDef<'a> {
    pub name: &'a str,
    pub gtype_name: &'a str,
    pub gtype_init: &'a str,
    pub gtype_struct: u16,
    pub prerequisites: Vec<u16>,
    pub properties: Vec<Prop<'a>>,
    pub methods: Vec<Func<'a>>,
    pub signals: Vec<Signal<'a>>,
    pub vfuncs: Vec<VFunc<'a>>,
    pub constants: Vec<Const<'a>>,
}

#[derive(Debug, Clone)]
struct Entry {
    blob_type: u16,
    local: bool,
    name: u32,
    offset: u32,
}

/// Builds a typelib buffer
///
/// Declare every directory entry first (locals before remotes), then write
/// blobs and bind them to their entries. Strings are interned.
pub struct TypelibBuilder {
    data: Vec<u8>,
    strings: HashMap<String, u32>,
    entries: Vec<Entry>,
    n_local: u16,
    attributes: Vec<(u32, u32, u32)>,
    sizes: BlobSizes,
    namespace: u32,
    nsversion: u32,
    shared_library: u32,
    c_prefix: u32,
    dependencies: u32,
    directory_index: bool,
}

impl TypelibBuilder {
    pub fn new(namespace: &str) -> Self {
        Self::with_sizes(namespace, BlobSizes::KNOWN)
    }

    /// Builder declaring (and striding by) non-default blob sizes
    pub fn with_sizes(namespace: &str, sizes: BlobSizes) -> Self {
        let mut b = TypelibBuilder {
            data: vec![0u8; HEADER_SIZE as usize],
            strings: HashMap::new(),
            entries: Vec::new(),
            n_local: 0,
            attributes: Vec::new(),
            sizes,
            namespace: 0,
            nsversion: 0,
            shared_library: 0,
            c_prefix: 0,
            dependencies: 0,
            directory_index: false,
        };
        b.namespace = b.string(namespace);
        b
    }

    pub fn sizes(&self) -> BlobSizes {
        self.sizes
    }

    pub fn nsversion(mut self, version: &str) -> Self {
        self.nsversion = self.string(version);
        self
    }

    pub fn shared_library(mut self, libraries: &str) -> Self {
        self.shared_library = self.string(libraries);
        self
    }

    pub fn c_prefix(mut self, prefixes: &str) -> Self {
        self.c_prefix = self.string(prefixes);
        self
    }

    pub fn dependencies(mut self, deps: &str) -> Self {
        self.dependencies = self.string(deps);
        self
    }

    /// Emit a perfect-hash directory index section
    pub fn directory_index(mut self) -> Self {
        self.directory_index = true;
        self
    }

    // Raw buffer access

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    /// Reserve `len` zeroed bytes at the next 4-aligned offset
    pub fn alloc(&mut self, len: u32) -> u32 {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        let at = self.data.len() as u32;
        self.data.resize(self.data.len() + len as usize, 0);
        at
    }

    pub fn put_bytes(&mut self, at: u32, bytes: &[u8]) {
        self.data[at as usize..at as usize + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_u8(&mut self, at: u32, v: u8) {
        self.data[at as usize] = v;
    }

    pub fn put_u16(&mut self, at: u32, v: u16) {
        self.put_bytes(at, &v.to_ne_bytes());
    }

    pub fn put_u32(&mut self, at: u32, v: u32) {
        self.put_bytes(at, &v.to_ne_bytes());
    }

    pub fn put_i32(&mut self, at: u32, v: i32) {
        self.put_bytes(at, &v.to_ne_bytes());
    }

    /// Offset of an interned NUL-terminated string
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&at) = self.strings.get(s) {
            return at;
        }
        let at = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.strings.insert(s.to_string(), at);
        at
    }

    fn opt_string(&mut self, s: Option<&str>) -> u32 {
        s.map(|s| self.string(s)).unwrap_or(0)
    }

    // Directory

    /// Declare a local entry; returns its 1-based index
    pub fn declare(&mut self, name: &str) -> u16 {
        assert_eq!(
            self.entries.len(),
            usize::from(self.n_local),
            "locals must be declared before remote entries"
        );
        let name = self.string(name);
        self.entries.push(Entry {
            blob_type: 0,
            local: true,
            name,
            offset: 0,
        });
        self.n_local += 1;
        self.n_local
    }

    /// Declare an entry provided by another namespace
    pub fn declare_remote(&mut self, name: &str, namespace: &str, blob_type: BlobType) -> u16 {
        let name = self.string(name);
        let offset = self.string(namespace);
        self.entries.push(Entry {
            blob_type: blob_type as u16,
            local: false,
            name,
            offset,
        });
        self.entries.len() as u16
    }

    /// Point a declared local entry at its blob
    pub fn bind(&mut self, index: u16, blob_type: BlobType, offset: u32) {
        let entry = &mut self.entries[usize::from(index) - 1];
        entry.blob_type = blob_type as u16;
        entry.offset = offset;
    }

    pub fn attribute(&mut self, blob_offset: u32, name: &str, value: &str) {
        let name = self.string(name);
        let value = self.string(value);
        self.attributes.push((blob_offset, name, value));
    }

    // Types

    pub fn interface_type(&mut self, index: u16) -> u32 {
        let at = self.alloc(4);
        let head = ComplexTypeHeader {
            tag: TypeTag::Interface,
            pointer: true,
        };
        self.put_u8(at, head.encode());
        self.put_u16(at + 2, index);
        at
    }

    /// Array record; `flags` is the second flag byte
    pub fn array_type(&mut self, element: u32, flags: u8, dimension: u16) -> u32 {
        let at = self.alloc(8);
        let head = ComplexTypeHeader {
            tag: TypeTag::Array,
            pointer: true,
        };
        self.put_u8(at, head.encode());
        self.put_u8(at + 1, flags);
        self.put_u16(at + 2, dimension);
        self.put_u32(at + 4, element);
        at
    }

    /// List or hash table record
    pub fn param_type(&mut self, tag: TypeTag, params: &[u32]) -> u32 {
        let at = self.alloc(4 + 4 * params.len() as u32);
        let head = ComplexTypeHeader { tag, pointer: true };
        self.put_u8(at, head.encode());
        self.put_u16(at + 2, params.len() as u16);
        for (i, p) in params.iter().enumerate() {
            self.put_u32(at + 4 + 4 * i as u32, *p);
        }
        at
    }

    pub fn error_type(&mut self) -> u32 {
        let at = self.alloc(4);
        let head = ComplexTypeHeader {
            tag: TypeTag::Error,
            pointer: true,
        };
        self.put_u8(at, head.encode());
        at
    }

    // Callables

    pub fn signature(&mut self, return_type: u32, flags: u16, args: &[Arg<'_>]) -> u32 {
        let sig = u32::from(self.sizes.signature);
        let arg_size = u32::from(self.sizes.arg);
        let at = self.alloc(sig + arg_size * args.len() as u32);
        self.put_u32(at + signature::RETURN_TYPE, return_type);
        self.put_u16(at + signature::FLAGS, flags);
        self.put_u16(at + signature::N_ARGUMENTS, args.len() as u16);
        for (i, a) in args.iter().enumerate() {
            let base = at + sig + arg_size * i as u32;
            let name = self.string(a.name);
            self.put_u32(base + arg::NAME, name);
            self.put_u32(base + arg::FLAGS, a.flags);
            self.put_u8(base + arg::CLOSURE, a.closure as u8);
            self.put_u8(base + arg::DESTROY, a.destroy as u8);
            self.put_u32(base + arg::ARG_TYPE, a.ty);
        }
        at
    }

    /// `void f(void)`
    pub fn void_signature(&mut self) -> u32 {
        let ret = basic(TypeTag::Void, false);
        self.signature(ret, 0, &[])
    }

    pub fn write_function(&mut self, at: u32, f: &Func<'_>) {
        let name = self.string(f.name);
        let symbol = self.string(f.symbol);
        self.put_u16(at + common::BLOB_TYPE, BlobType::Function as u16);
        self.put_u16(at + function::FLAGS, f.flags);
        self.put_u32(at + function::NAME, name);
        self.put_u32(at + function::SYMBOL, symbol);
        self.put_u32(at + function::SIGNATURE, f.signature);
        self.put_u16(at + function::EXTRA, u16::from(f.is_static));
    }

    pub fn function_blob(&mut self, f: &Func<'_>) -> u32 {
        let at = self.alloc(u32::from(self.sizes.function));
        self.write_function(at, f);
        at
    }

    pub fn write_callback(&mut self, at: u32, name: &str, sig: u32) {
        let name = self.string(name);
        self.put_u16(at + common::BLOB_TYPE, BlobType::Callback as u16);
        self.put_u32(at + callback::NAME, name);
        self.put_u32(at + callback::SIGNATURE, sig);
    }

    pub fn callback_blob(&mut self, name: &str, sig: u32) -> u32 {
        let at = self.alloc(u32::from(self.sizes.callback));
        self.write_callback(at, name, sig);
        at
    }

    fn write_signal(&mut self, at: u32, s: &Signal<'_>) {
        let name = self.string(s.name);
        self.put_u16(at + signal::FLAGS, s.flags);
        self.put_u16(at + signal::CLASS_CLOSURE, s.class_closure);
        self.put_u32(at + signal::NAME, name);
        self.put_u32(at + signal::SIGNATURE, s.signature);
    }

    fn write_vfunc(&mut self, at: u32, v: &VFunc<'_>) {
        let name = self.string(v.name);
        self.put_u32(at + vfunc::NAME, name);
        self.put_u16(at + vfunc::FLAGS, v.flags);
        self.put_u16(at + vfunc::SIGNAL, v.signal);
        self.put_u16(at + vfunc::STRUCT_OFFSET, v.struct_offset);
        self.put_u16(at + vfunc::INVOKER, v.invoker);
        self.put_u32(at + vfunc::SIGNATURE, v.signature);
    }

    // Members

    /// Write a field and return the bytes it occupies
    fn write_field(&mut self, at: u32, f: &Field<'_>) -> u32 {
        let name = self.string(f.name);
        self.put_u32(at + field::NAME, name);
        let mut flags = f.flags;
        if f.embedded.is_some() {
            flags |= 0b100;
        }
        self.put_u8(at + field::FLAGS, flags);
        self.put_u8(at + field::BITS, f.bits);
        self.put_u16(at + field::STRUCT_OFFSET, f.struct_offset);
        self.put_u32(at + field::TYPE, f.ty);
        match f.embedded {
            Some((cb_name, sig)) => {
                self.write_callback(at + u32::from(self.sizes.field), cb_name, sig);
                u32::from(self.sizes.field) + u32::from(self.sizes.callback)
            }
            None => u32::from(self.sizes.field),
        }
    }

    fn fields_size(&self, fields: &[Field<'_>]) -> u32 {
        fields
            .iter()
            .map(|f| {
                u32::from(self.sizes.field)
                    + f.embedded.map_or(0, |_| u32::from(self.sizes.callback))
            })
            .sum()
    }

    fn write_property(&mut self, at: u32, p: &Prop<'_>) {
        let name = self.string(p.name);
        self.put_u32(at + property::NAME, name);
        self.put_u32(at + property::FLAGS, p.flags);
        self.put_u32(at + property::TYPE, p.ty);
    }

    fn write_value(&mut self, at: u32, v: &Value<'_>) {
        let name = self.string(v.name);
        self.put_u32(at + value::FLAGS, u32::from(v.unsigned) << 1);
        self.put_u32(at + value::NAME, name);
        self.put_i32(at + value::VALUE, v.value);
    }

    fn write_constant(&mut self, at: u32, c: &Const<'_>) {
        let name = self.string(c.name);
        let data = self.alloc(c.bytes.len() as u32);
        self.put_bytes(data, &c.bytes);
        self.put_u16(at + common::BLOB_TYPE, BlobType::Constant as u16);
        self.put_u32(at + constant::NAME, name);
        self.put_u32(at + constant::TYPE, c.ty);
        self.put_u32(at + constant::SIZE, c.bytes.len() as u32);
        self.put_u32(at + constant::OFFSET, data);
    }

    pub fn constant_blob(&mut self, c: &Const<'_>) -> u32 {
        let at = self.alloc(u32::from(self.sizes.constant));
        self.write_constant(at, c);
        at
    }

    /// Constant holding a NUL-terminated string
    pub fn string_constant<'a>(name: &'a str, s: &str) -> Const<'a> {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        Const {
            name,
            ty: utf8(),
            bytes,
        }
    }

    fn write_registration(&mut self, at: u32, blob_type: BlobType, name: &str, flags: u16, gtype: GType<'_>) {
        let name = self.string(name);
        let (gtype_name, gtype_init, flags) = match gtype {
            Some((n, i)) => (self.string(n), self.string(i), flags),
            None => (0, 0, flags | 0b10),
        };
        self.put_u16(at + common::BLOB_TYPE, blob_type as u16);
        self.put_u16(at + common::FLAGS, flags);
        self.put_u32(at + common::NAME, name);
        self.put_u32(at + registered::GTYPE_NAME, gtype_name);
        self.put_u32(at + registered::GTYPE_INIT, gtype_init);
    }

    // Composites

    #[allow(clippy::too_many_arguments)]
    pub fn struct_blob(
        &mut self,
        blob_type: BlobType,
        name: &str,
        gtype: GType<'_>,
        flags: u16,
        size: u32,
        fields: &[Field<'_>],
        methods: &[Func<'_>],
    ) -> u32 {
        let s = self.sizes;
        let total = u32::from(s.structure)
            + self.fields_size(fields)
            + methods.len() as u32 * u32::from(s.function);
        let at = self.alloc(total);
        self.write_registration(at, blob_type, name, flags, gtype);
        self.put_u32(at + structure::SIZE, size);
        self.put_u16(at + structure::N_FIELDS, fields.len() as u16);
        self.put_u16(at + structure::N_METHODS, methods.len() as u16);
        let mut cur = at + u32::from(s.structure);
        for f in fields {
            cur += self.write_field(cur, f);
        }
        for m in methods {
            self.write_function(cur, m);
            cur += u32::from(s.function);
        }
        at
    }

    pub fn set_struct_functions(&mut self, at: u32, copy: Option<&str>, free: Option<&str>) {
        let copy = self.opt_string(copy);
        let free = self.opt_string(free);
        self.put_u32(at + structure::COPY_FUNC, copy);
        self.put_u32(at + structure::FREE_FUNC, free);
    }

    /// Union; `discriminator` is `(offset, type cell, one constant per field)`
    pub fn union_blob(
        &mut self,
        name: &str,
        gtype: GType<'_>,
        size: u32,
        fields: &[Field<'_>],
        methods: &[Func<'_>],
        discriminator: Option<(i32, u32, Vec<Const<'_>>)>,
    ) -> u32 {
        let s = self.sizes;
        let n_discriminators = discriminator.as_ref().map_or(0, |(_, _, c)| c.len() as u32);
        let total = u32::from(s.union)
            + self.fields_size(fields)
            + methods.len() as u32 * u32::from(s.function)
            + n_discriminators * u32::from(s.constant);
        let at = self.alloc(total);
        let flags = if discriminator.is_some() { 0b100 } else { 0 };
        self.write_registration(at, BlobType::Union, name, flags, gtype);
        self.put_u32(at + union::SIZE, size);
        self.put_u16(at + union::N_FIELDS, fields.len() as u16);
        self.put_u16(at + union::N_FUNCTIONS, methods.len() as u16);
        let mut cur = at + u32::from(s.union);
        for f in fields {
            cur += self.write_field(cur, f);
        }
        for m in methods {
            self.write_function(cur, m);
            cur += u32::from(s.function);
        }
        if let Some((offset, ty, constants)) = discriminator {
            self.put_i32(at + union::DISCRIMINATOR_OFFSET, offset);
            self.put_u32(at + union::DISCRIMINATOR_TYPE, ty);
            for c in &constants {
                self.write_constant(cur, c);
                cur += u32::from(s.constant);
            }
        }
        at
    }

    #[allow(clippy::too_many_arguments)]
    pub fn enum_blob(
        &mut self,
        blob_type: BlobType,
        name: &str,
        gtype: GType<'_>,
        storage: TypeTag,
        error_domain: Option<&str>,
        values: &[Value<'_>],
        methods: &[Func<'_>],
    ) -> u32 {
        let s = self.sizes;
        let total = u32::from(s.enumeration)
            + values.len() as u32 * u32::from(s.value)
            + methods.len() as u32 * u32::from(s.function);
        let at = self.alloc(total);
        self.write_registration(at, blob_type, name, (storage as u16) << 2, gtype);
        self.put_u16(at + enumeration::N_VALUES, values.len() as u16);
        self.put_u16(at + enumeration::N_METHODS, methods.len() as u16);
        let domain = self.opt_string(error_domain);
        self.put_u32(at + enumeration::ERROR_DOMAIN, domain);
        let mut cur = at + u32::from(s.enumeration);
        for v in values {
            self.write_value(cur, v);
            cur += u32::from(s.value);
        }
        for m in methods {
            self.write_function(cur, m);
            cur += u32::from(s.function);
        }
        at
    }

    pub fn object_blob(&mut self, o: &ObjectDef<'_>) -> u32 {
        let s = self.sizes;
        let n_ifaces = o.interfaces.len() as u32;
        let total = u32::from(s.object)
            + (n_ifaces + n_ifaces % 2) * 2
            + self.fields_size(&o.fields)
            + o.properties.len() as u32 * u32::from(s.property)
            + o.methods.len() as u32 * u32::from(s.function)
            + o.signals.len() as u32 * u32::from(s.signal)
            + o.vfuncs.len() as u32 * u32::from(s.vfunc)
            + o.constants.len() as u32 * u32::from(s.constant);
        let at = self.alloc(total);
        self.write_registration(
            at,
            BlobType::Object,
            o.name,
            o.flags,
            Some((o.gtype_name, o.gtype_init)),
        );
        self.put_u16(at + object::PARENT, o.parent);
        self.put_u16(at + object::GTYPE_STRUCT, o.gtype_struct);
        self.put_u16(at + object::N_INTERFACES, n_ifaces as u16);
        self.put_u16(at + object::N_FIELDS, o.fields.len() as u16);
        self.put_u16(at + object::N_PROPERTIES, o.properties.len() as u16);
        self.put_u16(at + object::N_METHODS, o.methods.len() as u16);
        self.put_u16(at + object::N_SIGNALS, o.signals.len() as u16);
        self.put_u16(at + object::N_VFUNCS, o.vfuncs.len() as u16);
        self.put_u16(at + object::N_CONSTANTS, o.constants.len() as u16);
        let callbacks = o.fields.iter().filter(|f| f.embedded.is_some()).count();
        self.put_u16(at + object::N_FIELD_CALLBACKS, callbacks as u16);
        let names = [
            (object::REF_FUNC, o.ref_func),
            (object::UNREF_FUNC, o.unref_func),
            (object::SET_VALUE_FUNC, o.set_value_func),
            (object::GET_VALUE_FUNC, o.get_value_func),
        ];
        for (field, name) in names {
            let offset = self.opt_string(name);
            self.put_u32(at + field, offset);
        }

        let mut cur = at + u32::from(s.object);
        for iface in &o.interfaces {
            self.put_u16(cur, *iface);
            cur += 2;
        }
        cur += 2 * (n_ifaces % 2);
        for f in &o.fields {
            cur += self.write_field(cur, f);
        }
        self.write_class_members(
            cur,
            &o.properties,
            &o.methods,
            &o.signals,
            &o.vfuncs,
            &o.constants,
        );
        at
    }

    pub fn interface_blob(&mut self, i: &InterfaceDef<'_>) -> u32 {
        let s = self.sizes;
        let n_prereqs = i.prerequisites.len() as u32;
        let total = u32::from(s.interface)
            + (n_prereqs + n_prereqs % 2) * 2
            + i.properties.len() as u32 * u32::from(s.property)
            + i.methods.len() as u32 * u32::from(s.function)
            + i.signals.len() as u32 * u32::from(s.signal)
            + i.vfuncs.len() as u32 * u32::from(s.vfunc)
            + i.constants.len() as u32 * u32::from(s.constant);
        let at = self.alloc(total);
        self.write_registration(
            at,
            BlobType::Interface,
            i.name,
            0,
            Some((i.gtype_name, i.gtype_init)),
        );
        self.put_u16(at + interface::GTYPE_STRUCT, i.gtype_struct);
        self.put_u16(at + interface::N_PREREQUISITES, n_prereqs as u16);
        self.put_u16(at + interface::N_PROPERTIES, i.properties.len() as u16);
        self.put_u16(at + interface::N_METHODS, i.methods.len() as u16);
        self.put_u16(at + interface::N_SIGNALS, i.signals.len() as u16);
        self.put_u16(at + interface::N_VFUNCS, i.vfuncs.len() as u16);
        self.put_u16(at + interface::N_CONSTANTS, i.constants.len() as u16);

        let mut cur = at + u32::from(s.interface);
        for req in &i.prerequisites {
            self.put_u16(cur, *req);
            cur += 2;
        }
        cur += 2 * (n_prereqs % 2);
        self.write_class_members(
            cur,
            &i.properties,
            &i.methods,
            &i.signals,
            &i.vfuncs,
            &i.constants,
        );
        at
    }

    fn write_class_members(
        &mut self,
        mut cur: u32,
        properties: &[Prop<'_>],
        methods: &[Func<'_>],
        signals: &[Signal<'_>],
        vfuncs: &[VFunc<'_>],
        constants: &[Const<'_>],
    ) {
        let s = self.sizes;
        for p in properties {
            self.write_property(cur, p);
            cur += u32::from(s.property);
        }
        for m in methods {
            self.write_function(cur, m);
            cur += u32::from(s.function);
        }
        for sig in signals {
            self.write_signal(cur, sig);
            cur += u32::from(s.signal);
        }
        for v in vfuncs {
            self.write_vfunc(cur, v);
            cur += u32::from(s.vfunc);
        }
        for c in constants {
            self.write_constant(cur, c);
            cur += u32::from(s.constant);
        }
    }

    // Output

    /// Lay out directory, attributes and sections and fill in the header
    pub fn finish(mut self) -> Vec<u8> {
        let entry_size = u32::from(self.sizes.entry);
        // Empty tables get offset 0: an offset equal to the buffer size is out of range
        let directory = if self.entries.is_empty() {
            0
        } else {
            self.alloc(entry_size * self.entries.len() as u32)
        };
        for (i, e) in self.entries.clone().iter().enumerate() {
            let at = directory + entry_size * i as u32;
            self.put_u16(at, e.blob_type);
            self.put_u16(at + 2, u16::from(e.local));
            self.put_u32(at + 4, e.name);
            self.put_u32(at + 8, e.offset);
        }

        let mut attributes = std::mem::take(&mut self.attributes);
        attributes.sort_by_key(|(offset, _, _)| *offset);
        let attribute_size = u32::from(self.sizes.attribute);
        let attributes_at = if attributes.is_empty() {
            0
        } else {
            self.alloc(attribute_size * attributes.len() as u32)
        };
        for (i, (offset, name, value)) in attributes.iter().enumerate() {
            let at = attributes_at + attribute_size * i as u32;
            self.put_u32(at, *offset);
            self.put_u32(at + 4, *name);
            self.put_u32(at + 8, *value);
        }

        let mut sections = 0;
        if self.directory_index && self.n_local > 0 {
            let mut hash = HashBuilder::new();
            for (i, e) in self.entries[..usize::from(self.n_local)].iter().enumerate() {
                let name = read_cstr(&self.data, e.name);
                hash.add_string(name, i as u16).expect("add key");
            }
            let index = hash.finish().expect("build index");
            let index_at = self.alloc(index.as_bytes().len() as u32);
            self.put_bytes(index_at, index.as_bytes());
            sections = self.alloc(16);
            self.put_u32(sections, SectionType::DirectoryIndex as u32);
            self.put_u32(sections + 4, index_at);
            self.put_u32(sections + 8, SectionType::End as u32);
        }

        self.put_bytes(0, &TYPELIB_MAGIC);
        self.put_u8(hf::MAJOR_VERSION, 4);
        self.put_u16(hf::N_ENTRIES, self.entries.len() as u16);
        self.put_u16(hf::N_LOCAL_ENTRIES, self.n_local);
        self.put_u32(hf::DIRECTORY, directory);
        self.put_u32(hf::N_ATTRIBUTES, attributes.len() as u32);
        self.put_u32(hf::ATTRIBUTES, attributes_at);
        self.put_u32(hf::DEPENDENCIES, self.dependencies);
        self.put_u32(hf::NAMESPACE, self.namespace);
        self.put_u32(hf::NSVERSION, self.nsversion);
        self.put_u32(hf::SHARED_LIBRARY, self.shared_library);
        self.put_u32(hf::C_PREFIX, self.c_prefix);
        let sizes = self.sizes.to_bytes();
        self.put_bytes(hf::BLOB_SIZES, &sizes);
        self.put_u32(hf::SECTIONS, sections);
        let size = self.len();
        self.put_u32(hf::SIZE, size);
        self.data
    }
}

fn read_cstr(data: &[u8], at: u32) -> String {
    let rest = &data[at as usize..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

// Directory indices of the demo typelib
pub const WIDGET: u16 = 1;
pub const WIDGET_CLASS: u16 = 2;
pub const SIZABLE: u16 = 3;
pub const COLOR: u16 = 4;
pub const DEMO_ERROR: u16 = 5;
pub const HANDLER: u16 = 6;
pub const INIT: u16 = 7;
pub const VERSION: u16 = 8;
pub const ANSWER: u16 = 9;
pub const VALUE: u16 = 10;
pub const POINT: u16 = 11;
pub const REMOTE_OBJECT: u16 = 12;

const IN: u32 = 1 << 0;
const OUT: u32 = 1 << 1;
const CALLER_ALLOCATES: u32 = 1 << 2;
const NULLABLE: u32 = 1 << 3;
const OPTIONAL: u32 = 1 << 4;
const TRANSFER: u32 = 1 << 5;
const SKIP: u32 = 1 << 11;
const SCOPE_NOTIFIED: u32 = 3 << 8;

/// Property flag word with setter and getter method indices
pub fn property_flags(readable: bool, writable: bool, setter: u32, getter: u32) -> u32 {
    (u32::from(readable) << 1) | (u32::from(writable) << 2) | (setter << 7) | (getter << 17)
}

/// The `Demo` namespace: one of every entry kind
pub fn demo(with_index: bool) -> Vec<u8> {
    demo_with_sizes(BlobSizes::KNOWN, with_index)
}

/// The demo typelib laid out with declared blob sizes `sizes`
pub fn demo_with_sizes(sizes: BlobSizes, with_index: bool) -> Vec<u8> {
    let mut b = TypelibBuilder::with_sizes("Demo", sizes)
        .nsversion("1.0")
        .shared_library("libdemo.so.1,libdemo-extra.so")
        .c_prefix("Demo")
        .dependencies("GObject-2.0|GLib-2.0");
    if with_index {
        b = b.directory_index();
    }

    for name in [
        "Widget",
        "WidgetClass",
        "Sizable",
        "Color",
        "DemoError",
        "Handler",
        "init",
        "VERSION",
        "ANSWER",
        "Value",
        "Point",
    ] {
        b.declare(name);
    }
    b.declare_remote("Object", "GObject", BlobType::Object);

    let int32 = basic(TypeTag::Int32, false);
    let void_sig = b.void_signature();
    let color_ref = b.interface_type(COLOR);

    // Widget
    let get_width_sig = b.signature(int32, 0, &[]);
    let set_width_sig = b.signature(
        basic(TypeTag::Void, false),
        0,
        &[Arg::new("width", IN, int32)],
    );
    let widget_ref = b.interface_type(WIDGET);
    let new_sig = b.signature(widget_ref, 1 << 1, &[]);
    let draw_sig = b.signature(
        basic(TypeTag::Boolean, false),
        1 << 5,
        &[Arg::new("label", IN | NULLABLE | TRANSFER, utf8())],
    );
    b.attribute(draw_sig, "ret.kind", "status");
    let changed_sig = b.signature(
        basic(TypeTag::Void, false),
        0,
        &[Arg::new("detail", IN, utf8())],
    );
    let widget = b.object_blob(&ObjectDef {
        name: "Widget",
        gtype_name: "DemoWidget",
        gtype_init: "demo_widget_get_type",
        flags: 1 << 1,
        parent: REMOTE_OBJECT,
        gtype_struct: WIDGET_CLASS,
        interfaces: vec![SIZABLE],
        fields: vec![
            Field::new("width", 0, int32),
            Field {
                flags: 0b01,
                bits: 3,
                ..Field::new("state", 4, color_ref)
            },
            Field {
                embedded: Some(("on_draw", void_sig)),
                ..Field::new("on_draw", 8, 0)
            },
        ],
        properties: vec![Prop {
            name: "width",
            flags: property_flags(true, true, 1, 0),
            ty: int32,
        }],
        methods: vec![
            Func {
                flags: 1 << 2,
                ..Func::new("get_width", "demo_widget_get_width", get_width_sig)
            },
            Func {
                flags: 1 << 1,
                ..Func::new("set_width", "demo_widget_set_width", set_width_sig)
            },
            Func {
                flags: 1 << 3,
                ..Func::new("new", "demo_widget_new", new_sig)
            },
            Func {
                flags: 1 << 4,
                ..Func::new("draw", "demo_widget_draw", draw_sig)
            },
        ],
        signals: vec![Signal {
            name: "changed",
            flags: (1 << 2) | (1 << 5) | (1 << 8),
            class_closure: 0,
            signature: changed_sig,
        }],
        vfuncs: vec![VFunc {
            name: "draw",
            flags: (1 << 0) | (1 << 3),
            signal: 0,
            struct_offset: 16,
            invoker: 3,
            signature: draw_sig,
        }],
        constants: vec![Const {
            name: "MAX_WIDTH",
            ty: int32,
            bytes: 4096i32.to_ne_bytes().to_vec(),
        }],
        unref_func: Some("demo_widget_unref"),
        ..ObjectDef::default()
    });
    b.bind(WIDGET, BlobType::Object, widget);
    b.attribute(widget, "doc.since", "1.2");
    b.attribute(widget, "doc.stability", "unstable");

    let widget_class = b.struct_blob(
        BlobType::Struct,
        "WidgetClass",
        None,
        (1 << 2) | (8 << 3),
        64,
        &[Field::new("padding", 0, int32)],
        &[],
    );
    b.bind(WIDGET_CLASS, BlobType::Struct, widget_class);

    // Sizable
    let get_size_sig = b.signature(int32, 0, &[]);
    let sizable = b.interface_blob(&InterfaceDef {
        name: "Sizable",
        gtype_name: "DemoSizable",
        gtype_init: "demo_sizable_get_type",
        prerequisites: vec![REMOTE_OBJECT],
        properties: vec![Prop {
            name: "size",
            flags: property_flags(true, false, 0x3ff, 0),
            ty: int32,
        }],
        methods: vec![Func::new("get_size", "demo_sizable_get_size", get_size_sig)],
        vfuncs: vec![VFunc {
            name: "get_size",
            flags: 0,
            signal: 0,
            struct_offset: 8,
            invoker: 0,
            signature: get_size_sig,
        }],
        ..InterfaceDef::default()
    });
    b.bind(SIZABLE, BlobType::Interface, sizable);

    // Enums
    let color = b.enum_blob(
        BlobType::Enum,
        "Color",
        Some(("DemoColor", "demo_color_get_type")),
        TypeTag::UInt32,
        None,
        &[
            Value {
                name: "red",
                value: 0,
                unsigned: true,
            },
            Value {
                name: "green",
                value: 1,
                unsigned: true,
            },
            Value {
                name: "white",
                value: -1,
                unsigned: true,
            },
        ],
        &[],
    );
    b.bind(COLOR, BlobType::Enum, color);

    let quark_sig = b.signature(basic(TypeTag::UInt32, false), 0, &[]);
    let demo_error = b.enum_blob(
        BlobType::Enum,
        "DemoError",
        Some(("DemoError", "demo_error_get_type")),
        TypeTag::Int32,
        Some("demo-error-quark"),
        &[Value {
            name: "failed",
            value: -2,
            unsigned: false,
        }],
        &[Func {
            is_static: true,
            ..Func::new("quark", "demo_error_quark", quark_sig)
        }],
    );
    b.bind(DEMO_ERROR, BlobType::Enum, demo_error);

    // Handler
    let handler_sig = b.signature(
        basic(TypeTag::Boolean, false),
        0,
        &[Arg::new("user_data", IN, basic(TypeTag::Void, true))],
    );
    let handler = b.callback_blob("Handler", handler_sig);
    b.bind(HANDLER, BlobType::Callback, handler);

    // init
    let list = b.param_type(TypeTag::GList, &[utf8()]);
    let handler_ref = b.interface_type(HANDLER);
    let strv = b.array_type(utf8(), 0b1, 0);
    let counts = b.array_type(int32, 0b10, 5);
    let table = b.param_type(TypeTag::GHash, &[utf8(), int32]);
    let error = b.error_type();
    let init_sig = b.signature(
        list,
        (1 << 0) | (1 << 2),
        &[
            Arg {
                closure: 1,
                destroy: 2,
                ..Arg::new("handler", IN | SCOPE_NOTIFIED, handler_ref)
            },
            Arg::new("user_data", IN, basic(TypeTag::Void, true)),
            Arg::new("notify", IN, handler_ref),
            Arg::new("items", IN, strv),
            Arg::new("counts", OUT | CALLER_ALLOCATES, counts),
            Arg::new("n_counts", IN | OUT, basic(TypeTag::Int32, true)),
            Arg::new("table", IN | OPTIONAL | SKIP, table),
            Arg::new("error", OUT, error),
        ],
    );
    let init = b.function_blob(&Func {
        flags: 1,
        is_static: true,
        ..Func::new("init", "demo_init", init_sig)
    });
    b.bind(INIT, BlobType::Function, init);

    // Constants
    let version = b.constant_blob(&TypelibBuilder::string_constant("VERSION", "1.2.3"));
    b.bind(VERSION, BlobType::Constant, version);
    let answer = b.constant_blob(&Const {
        name: "ANSWER",
        ty: int32,
        bytes: 42i32.to_ne_bytes().to_vec(),
    });
    b.bind(ANSWER, BlobType::Constant, answer);

    // Value
    let value = b.union_blob(
        "Value",
        None,
        8,
        &[Field::new("i", 4, int32), Field::new("s", 4, utf8())],
        &[],
        Some((
            0,
            int32,
            vec![
                Const {
                    name: "i",
                    ty: int32,
                    bytes: 1i32.to_ne_bytes().to_vec(),
                },
                Const {
                    name: "s",
                    ty: int32,
                    bytes: 2i32.to_ne_bytes().to_vec(),
                },
            ],
        )),
    );
    b.bind(VALUE, BlobType::Union, value);

    // Point
    let point_ref = b.interface_type(POINT);
    let copy_sig = b.signature(point_ref, 1 << 1, &[]);
    let point = b.struct_blob(
        BlobType::Boxed,
        "Point",
        Some(("DemoPoint", "demo_point_get_type")),
        4 << 3,
        8,
        &[Field::new("x", 0, int32), Field::new("y", 4, int32)],
        &[Func::new("copy", "demo_point_copy", copy_sig)],
    );
    b.set_struct_functions(point, Some("demo_point_copy"), Some("demo_point_free"));
    b.bind(POINT, BlobType::Boxed, point);

    b.finish()
}

/// The `GObject` namespace providing the root class
pub fn gobject() -> Vec<u8> {
    let mut b = TypelibBuilder::new("GObject")
        .nsversion("2.0")
        .shared_library("libgobject-2.0.so.0")
        .c_prefix("G");
    let object = b.declare("Object");
    let unowned = b.declare("InitiallyUnowned");

    let void_sig = b.void_signature();
    let object_blob = b.object_blob(&ObjectDef {
        name: "Object",
        gtype_name: "GObject",
        gtype_init: "intern",
        flags: 1 << 2,
        methods: vec![Func::new("ref", "g_object_ref", void_sig)],
        ref_func: Some("g_object_ref"),
        unref_func: Some("g_object_unref"),
        set_value_func: Some("g_value_set_object"),
        get_value_func: Some("g_value_get_object"),
        ..ObjectDef::default()
    });
    b.bind(object, BlobType::Object, object_blob);

    let unowned_blob = b.object_blob(&ObjectDef {
        name: "InitiallyUnowned",
        gtype_name: "GInitiallyUnowned",
        gtype_init: "g_initially_unowned_get_type",
        parent: object,
        ..ObjectDef::default()
    });
    b.bind(unowned, BlobType::Object, unowned_blob);
    b.finish()
}
