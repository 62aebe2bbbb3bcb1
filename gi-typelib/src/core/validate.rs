//! Structural validation of a typelib buffer
//!
//! Validation runs once at load time. A buffer that passes may be read by
//! every accessor without further structural checks: each blob it declares
//! fits in the buffer, every name is a terminated identifier and every
//! directory index it stores is in range.

use crate::config::TypelibConfig;
use crate::core::blob::{
    BlobType, FieldBlobFlags, FunctionBlobFlags, RegisteredBlobFlags, SignalBlobFlags, TypeTag,
    VFuncBlobFlags, ACCESSOR_SENTINEL,
    layout::{
        arg, callback, common, complex, constant, enumeration, field, function, interface,
        object, property, registered, signal, signature, structure, union, value, vfunc,
    },
};
use crate::core::bytes::{self, bit, bits, is_aligned};
use crate::core::directory::DirEntry;
use crate::core::header::{
    HEADER_SIZE, Header, SECTION_RECORD_SIZE, SectionType, TYPELIB_MAJOR_VERSION,
};
use crate::core::simple_type::{ComplexTypeHeader, SimpleType};
use crate::hash::mphf;
use crate::error::{Result, TypelibError};
use tracing::debug;

/// Nested complex types deeper than this are rejected
const MAX_TYPE_DEPTH: u32 = 32;

/// Header checks that need no string or directory access
pub fn validate_header_basic(data: &[u8], config: &TypelibConfig) -> Result<Header> {
    let header = Header::parse(data)?;

    if !Header::has_magic(data) {
        return Err(TypelibError::InvalidHeader("Invalid magic header".into()));
    }
    if header.major_version != TYPELIB_MAJOR_VERSION {
        return Err(TypelibError::InvalidHeader(format!(
            "Typelib version mismatch; expected {TYPELIB_MAJOR_VERSION}, found {}",
            header.major_version
        )));
    }
    if header.n_entries < header.n_local_entries {
        return Err(TypelibError::InvalidHeader(
            "Inconsistent entry counts".into(),
        ));
    }
    if header.size as usize != data.len() {
        return Err(TypelibError::InvalidHeader(format!(
            "Typelib size {} does not match {}",
            header.size,
            data.len()
        )));
    }
    if let Some(blob) = header.blob_sizes.first_mismatch(config.strict_blob_sizes) {
        return Err(TypelibError::InvalidHeader(format!(
            "Blob size mismatch for {blob}"
        )));
    }
    if !is_aligned(header.directory) {
        return Err(TypelibError::InvalidHeader("Misaligned directory".into()));
    }
    if !is_aligned(header.attributes) {
        return Err(TypelibError::InvalidHeader("Misaligned attributes".into()));
    }
    if header.attributes == 0 && header.n_attributes > 0 {
        return Err(TypelibError::InvalidHeader(
            "Wrong number of attributes".into(),
        ));
    }

    let offsets = [
        ("directory", header.directory),
        ("attributes", header.attributes),
        ("dependencies", header.dependencies),
        ("namespace", header.namespace),
        ("nsversion", header.nsversion),
        ("shared_library", header.shared_library),
        ("c_prefix", header.c_prefix),
        ("sections", header.sections),
    ];
    for (what, offset) in offsets {
        if offset != 0 && (offset < HEADER_SIZE || offset >= header.size) {
            return Err(TypelibError::InvalidHeader(format!(
                "The {what} offset {offset:#x} is out of range"
            )));
        }
    }

    Ok(header)
}

/// Validate the whole buffer and return its decoded header
pub fn validate(data: &[u8], config: &TypelibConfig) -> Result<Header> {
    metrics::counter!("typelib_validations_total").increment(1);
    let result = run(data, config);
    if let Err(e) = &result {
        metrics::counter!("typelib_validation_failures_total").increment(1);
        debug!(error = %e, len = data.len(), "typelib rejected");
    }
    result
}

fn run(data: &[u8], config: &TypelibConfig) -> Result<Header> {
    let header = validate_header_basic(data, config)?;
    let mut validator = Validator {
        data,
        header,
        config,
        context: Vec::new(),
    };

    validator.validate_header()?;

    let directory = validator.validate_directory();
    directory.map_err(|e| e.with_context(&validator.context_prefix("directory")))?;

    validator.validate_attributes()?;
    validator.validate_sections()?;

    debug!(
        namespace = validator.name("namespace", header.namespace).unwrap_or_default(),
        n_entries = header.n_entries,
        n_local_entries = header.n_local_entries,
        size = header.size,
        "typelib validated"
    );
    Ok(header)
}

struct Validator<'a> {
    data: &'a [u8],
    header: Header,
    config: &'a TypelibConfig,
    context: Vec<String>,
}

impl<'a> Validator<'a> {
    fn context_prefix(&self, section: &str) -> String {
        if self.context.is_empty() {
            format!("In {section}")
        } else {
            format!("In {section} (context: {})", self.context.join("/"))
        }
    }

    /// Run `f` with `name` pushed on the context stack. The stack is left
    /// untouched on failure so the error can report where it happened.
    fn in_context<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.context.push(name.to_string());
        let result = f(self);
        if result.is_ok() {
            self.context.pop();
        }
        result
    }

    fn fits(&self, offset: u32, len: u32) -> Result<()> {
        bytes::ensure_fits(self.data, offset, len as usize)
    }

    /// Check a blob of `fixed` bytes followed by `(count, record size)` arrays
    fn fits_sections(&self, offset: u32, fixed: u16, sections: &[(u32, u16)]) -> Result<()> {
        let len = sections
            .iter()
            .fold(u64::from(fixed), |len, &(count, size)| {
                len + u64::from(count) * u64::from(size)
            });
        bytes::ensure_extent(self.data, offset, len)
    }

    fn u8(&self, at: u32) -> Result<u8> {
        bytes::u8_at(self.data, at)
    }

    fn u16(&self, at: u32) -> Result<u16> {
        bytes::u16_at(self.data, at)
    }

    fn u32(&self, at: u32) -> Result<u32> {
        bytes::u32_at(self.data, at)
    }

    fn name(&self, what: &str, offset: u32) -> Result<&'a str> {
        let name = bytes::str_at(self.data, offset, Some(self.config.max_name_len))
            .map_err(|_| TypelibError::Invalid(format!("The {what} name at {offset:#x} is invalid or too long")))?;
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(TypelibError::Invalid(format!(
                "The {what} contains invalid characters: '{name}'"
            )));
        }
        Ok(name)
    }

    fn dir_entry_checked(&self, index: u16) -> Result<DirEntry> {
        if index == 0 || index > self.header.n_entries {
            return Err(TypelibError::InvalidBlob(format!(
                "Invalid directory index {index}"
            )));
        }
        self.fits(
            self.header.dir_entry_offset(index),
            u32::from(self.header.blob_sizes.entry),
        )?;
        DirEntry::read(self.data, &self.header, index)
    }

    fn validate_header(&mut self) -> Result<()> {
        self.name("namespace", self.header.namespace)?;
        Ok(())
    }

    fn validate_directory(&mut self) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(
            self.header.directory,
            u32::from(self.header.n_entries) * u32::from(sizes.entry),
        )?;

        for index in 1..=self.header.n_entries {
            let entry = DirEntry::read(self.data, &self.header, index)?;
            self.name("entry", entry.name)?;

            if (entry.local && entry.blob_type == BlobType::Invalid as u16)
                || entry.blob_type > BlobType::Union as u16
            {
                return Err(TypelibError::InvalidDirectory("Invalid entry type".into()));
            }

            if index <= self.header.n_local_entries {
                if !entry.local {
                    return Err(TypelibError::InvalidDirectory(
                        "Too few local directory entries".into(),
                    ));
                }
                if !is_aligned(entry.offset) {
                    return Err(TypelibError::InvalidDirectory("Misaligned entry".into()));
                }
                if self.config.validate_blobs {
                    self.validate_blob(entry.offset)?;
                } else {
                    self.fits(entry.offset, 8)?;
                }
            } else {
                if entry.local {
                    return Err(TypelibError::InvalidDirectory(
                        "Too many local directory entries".into(),
                    ));
                }
                self.name("namespace", entry.offset)?;
            }
        }
        Ok(())
    }

    fn validate_attributes(&self) -> Result<()> {
        let end = u64::from(self.header.attributes)
            + u64::from(self.header.n_attributes) * u64::from(self.header.blob_sizes.attribute);
        if u64::from(self.header.size) < end {
            return Err(TypelibError::Invalid(
                "The buffer is too short for the attribute table".into(),
            ));
        }
        Ok(())
    }

    /// The section table must terminate inside the buffer and a directory
    /// index, when present, must hold one slot per local entry.
    fn validate_sections(&self) -> Result<()> {
        if self.header.sections == 0 {
            return Ok(());
        }
        let mut at = self.header.sections;
        loop {
            self.fits(at, SECTION_RECORD_SIZE).map_err(|_| {
                TypelibError::InvalidHeader("Unterminated section table".into())
            })?;
            let id = self.u32(at)?;
            if id == SectionType::End as u32 {
                return Ok(());
            }
            let offset = self.u32(at + 4)?;
            if id == SectionType::DirectoryIndex as u32 {
                self.validate_directory_index(offset).map_err(|e| {
                    TypelibError::InvalidHeader(format!("Directory index out of bounds: {e}"))
                })?;
            }
            at += SECTION_RECORD_SIZE;
        }
    }

    /// `[u32 table offset][packed function][u16 table; n_local_entries]`,
    /// with the function ending before the table starts
    fn validate_directory_index(&self, offset: u32) -> Result<()> {
        let table_at = bytes::advance(offset, self.u32(offset)?)?;
        self.fits(table_at, 2 * u32::from(self.header.n_local_entries))?;
        let function_at = bytes::advance(offset, 4)?;
        let function = self
            .data
            .get(function_at as usize..table_at as usize)
            .ok_or_else(|| TypelibError::Invalid("Table overlaps the hash function".into()))?;
        mphf::packed_size(function)?;
        Ok(())
    }

    fn validate_blob(&mut self, offset: u32) -> Result<()> {
        self.fits(offset, 8)?;
        let raw = self.u16(offset + common::BLOB_TYPE)?;
        match BlobType::from_raw(raw)? {
            BlobType::Function => self.validate_function(offset, None),
            BlobType::Callback => self.validate_callback(offset),
            BlobType::Struct => self.validate_struct(offset, BlobType::Struct),
            BlobType::Boxed => self.validate_struct(offset, BlobType::Boxed),
            BlobType::Enum => self.validate_enum(offset, BlobType::Enum),
            BlobType::Flags => self.validate_enum(offset, BlobType::Flags),
            BlobType::Object => self.validate_object(offset),
            BlobType::Interface => self.validate_interface(offset),
            BlobType::Constant => self.validate_constant(offset),
            BlobType::Union => self.validate_union(offset),
            BlobType::Invalid | BlobType::Invalid0 => Err(TypelibError::InvalidEntry(format!(
                "Invalid blob type {raw}"
            ))),
        }
    }

    fn expect_blob_type(&self, offset: u32, expected: BlobType) -> Result<()> {
        let found = self.u16(offset + common::BLOB_TYPE)?;
        if found != expected as u16 {
            return Err(TypelibError::InvalidBlob(format!(
                "Wrong blob type {found}, expected {expected:?}"
            )));
        }
        Ok(())
    }

    // Types

    fn validate_type(&self, cell: u32, depth: u32) -> Result<()> {
        if depth > MAX_TYPE_DEPTH {
            return Err(TypelibError::InvalidBlob("Type nesting too deep".into()));
        }
        let raw = self.u32(cell)?;
        if SimpleType::is_inline(raw) {
            let tag = TypeTag::from_raw(bits(raw, 27, 5) as u8)?;
            if !tag.is_basic() {
                return Err(TypelibError::InvalidBlob(format!(
                    "Invalid non-basic tag {} in simple type",
                    tag as u8
                )));
            }
            if tag.requires_pointer() && !bit(raw, 24) {
                return Err(TypelibError::InvalidBlob(format!(
                    "Pointer type expected for tag {}",
                    tag as u8
                )));
            }
            return Ok(());
        }

        self.fits(raw, complex::INTERFACE_TYPE_SIZE)?;
        let head = ComplexTypeHeader::read(self.data, raw)?;
        match head.tag {
            TypeTag::Array => {
                self.fits(raw, complex::ARRAY_TYPE_SIZE)?;
                self.validate_type(raw + complex::ARRAY_ELEMENT, depth + 1)
            }
            TypeTag::Interface => {
                self.dir_entry_checked(self.u16(raw + complex::INTERFACE)?)?;
                Ok(())
            }
            TypeTag::GList | TypeTag::GSList => self.validate_param_type(raw, head, 1, depth),
            TypeTag::GHash => self.validate_param_type(raw, head, 2, depth),
            TypeTag::Error => {
                if !head.pointer {
                    return Err(TypelibError::InvalidBlob(format!(
                        "Pointer type expected for tag {}",
                        head.tag as u8
                    )));
                }
                Ok(())
            }
            _ => Err(TypelibError::InvalidBlob("Wrong tag in complex type".into())),
        }
    }

    fn validate_param_type(
        &self,
        offset: u32,
        head: ComplexTypeHeader,
        n_params: u16,
        depth: u32,
    ) -> Result<()> {
        if !head.pointer {
            return Err(TypelibError::InvalidBlob(format!(
                "Pointer type expected for tag {}",
                head.tag as u8
            )));
        }
        if self.u16(offset + complex::N_TYPES)? != n_params {
            return Err(TypelibError::InvalidBlob(
                "Parameter type number mismatch".into(),
            ));
        }
        self.fits(offset, complex::PARAM_TYPE_SIZE + 4 * u32::from(n_params))?;
        for i in 0..u32::from(n_params) {
            self.validate_type(offset + complex::PARAM_TYPE_SIZE + 4 * i, depth + 1)?;
        }
        Ok(())
    }

    /// Resolve the out-of-line record a cell points at, refusing inline types
    fn complex_type_of(&self, cell: u32) -> Result<ComplexTypeHeader> {
        let raw = self.u32(cell)?;
        if raw == 0 {
            return Err(TypelibError::Invalid("Expected blob for type".into()));
        }
        if SimpleType::is_inline(raw) {
            return Err(TypelibError::Invalid(format!(
                "Expected non-basic type but got {}",
                bits(raw, 27, 5)
            )));
        }
        self.fits(raw, 4)?;
        ComplexTypeHeader::read(self.data, raw)
    }

    // Callables

    fn validate_arg(&self, offset: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.arg))?;
        self.name("argument", self.u32(offset + arg::NAME)?)?;
        self.validate_type(offset + arg::ARG_TYPE, 0)
    }

    fn validate_signature(&self, offset: u32) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.signature))?;
        if self.u32(offset + signature::RETURN_TYPE)? != 0 {
            self.validate_type(offset + signature::RETURN_TYPE, 0)?;
        }
        let n_arguments = u32::from(self.u16(offset + signature::N_ARGUMENTS)?);
        let first = bytes::advance(offset, u32::from(sizes.signature))?;
        for i in 0..n_arguments {
            self.validate_arg(bytes::record_offset(first, i, u32::from(sizes.arg))?)?;
        }
        Ok(())
    }

    fn return_type_of_signature(&self, offset: u32) -> Result<u32> {
        self.fits(offset, u32::from(self.header.blob_sizes.signature))?;
        if self.u32(offset + signature::RETURN_TYPE)? == 0 {
            return Err(TypelibError::Invalid(
                "No return type found in signature".into(),
            ));
        }
        Ok(offset + signature::RETURN_TYPE)
    }

    fn validate_function(&mut self, offset: u32, container: Option<BlobType>) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.function))?;
        self.expect_blob_type(offset, BlobType::Function)?;
        let name = self.name("function", self.u32(offset + function::NAME)?)?;

        self.in_context(name, |v| {
            let symbol = v.name("function symbol", v.u32(offset + function::SYMBOL)?)?;
            let raw_flags = v.u16(offset + function::FLAGS)?;
            let flags = FunctionBlobFlags::from_bits_truncate(raw_flags);
            let is_accessor = flags.intersects(
                FunctionBlobFlags::SETTER | FunctionBlobFlags::GETTER | FunctionBlobFlags::WRAPS_VFUNC,
            );

            if flags.contains(FunctionBlobFlags::CONSTRUCTOR)
                && !matches!(
                    container,
                    Some(
                        BlobType::Boxed
                            | BlobType::Struct
                            | BlobType::Union
                            | BlobType::Object
                            | BlobType::Interface
                    )
                )
            {
                return Err(TypelibError::InvalidBlob("Constructor not allowed".into()));
            }
            if is_accessor && !matches!(container, Some(BlobType::Object | BlobType::Interface)) {
                return Err(TypelibError::InvalidBlob(
                    "Setter, getter or wrapper not allowed".into(),
                ));
            }
            if bits(u32::from(raw_flags), function::INDEX_SHIFT, 10) != 0 && !is_accessor {
                return Err(TypelibError::InvalidBlob(
                    "Must be setter, getter or wrapper".into(),
                ));
            }

            let signature_offset = v.u32(offset + function::SIGNATURE)?;
            v.validate_signature(signature_offset)?;

            if flags.contains(FunctionBlobFlags::CONSTRUCTOR) {
                let cell = v.return_type_of_signature(signature_offset)?;
                let returned = v.complex_type_of(cell)?;
                if returned.tag != TypeTag::Interface
                    && matches!(container, Some(BlobType::Object | BlobType::Interface))
                {
                    return Err(TypelibError::Invalid(format!(
                        "Invalid return type '{}' for constructor '{symbol}'",
                        returned.tag
                    )));
                }
            }
            Ok(())
        })
    }

    fn validate_callback(&mut self, offset: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.callback))?;
        self.expect_blob_type(offset, BlobType::Callback)?;
        let name = self.name("callback", self.u32(offset + callback::NAME)?)?;
        self.in_context(name, |v| {
            v.validate_signature(v.u32(offset + callback::SIGNATURE)?)
        })
    }

    fn validate_signal(&self, offset: u32, container: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.signal))?;
        self.name("signal", self.u32(offset + signal::NAME)?)?;

        let flags = SignalBlobFlags::from_bits_truncate(self.u16(offset + signal::FLAGS)?);
        let runs = [
            SignalBlobFlags::RUN_FIRST,
            SignalBlobFlags::RUN_LAST,
            SignalBlobFlags::RUN_CLEANUP,
        ]
        .iter()
        .filter(|f| flags.contains(**f))
        .count();
        if runs != 1 {
            return Err(TypelibError::InvalidBlob("Invalid signal run flags".into()));
        }

        if flags.contains(SignalBlobFlags::HAS_CLASS_CLOSURE) {
            let n_vfuncs = self.container_count(container, object::N_VFUNCS, interface::N_VFUNCS)?;
            if self.u16(offset + signal::CLASS_CLOSURE)? >= n_vfuncs {
                return Err(TypelibError::InvalidBlob(
                    "Invalid class closure index".into(),
                ));
            }
        }

        self.validate_signature(self.u32(offset + signal::SIGNATURE)?)
    }

    fn validate_vfunc(&self, offset: u32, container: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.vfunc))?;
        self.name("vfunc", self.u32(offset + vfunc::NAME)?)?;

        let flags = VFuncBlobFlags::from_bits_truncate(self.u16(offset + vfunc::FLAGS)?);
        if flags.contains(VFuncBlobFlags::CLASS_CLOSURE) {
            let n_signals = self.container_count(container, object::N_SIGNALS, interface::N_SIGNALS)?;
            if self.u16(offset + vfunc::SIGNAL)? >= n_signals {
                return Err(TypelibError::InvalidBlob(
                    "Invalid class closure index".into(),
                ));
            }
        }

        let invoker = bits(u32::from(self.u16(offset + vfunc::INVOKER)?), 0, 10);
        if invoker != ACCESSOR_SENTINEL {
            let n_methods = self.container_count(container, object::N_METHODS, interface::N_METHODS)?;
            if invoker >= u32::from(n_methods) {
                return Err(TypelibError::InvalidBlob("Invalid invoker index".into()));
            }
        }

        self.validate_signature(self.u32(offset + vfunc::SIGNATURE)?)
    }

    /// Read a count from an object or interface container
    fn container_count(&self, container: u32, object_field: u32, interface_field: u32) -> Result<u16> {
        if self.u16(container + common::BLOB_TYPE)? == BlobType::Object as u16 {
            self.u16(container + object_field)
        } else {
            self.u16(container + interface_field)
        }
    }

    // Members

    fn validate_constant(&mut self, offset: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.constant))?;
        self.expect_blob_type(offset, BlobType::Constant)?;
        self.name("constant", self.u32(offset + constant::NAME)?)?;
        self.validate_type(offset + constant::TYPE, 0)?;

        let value_offset = self.u32(offset + constant::OFFSET)?;
        let size = self.u32(offset + constant::SIZE)?;
        if !is_aligned(value_offset) {
            return Err(TypelibError::InvalidBlob(
                "Misaligned constant value".into(),
            ));
        }
        self.fits(value_offset, size)?;

        let raw = self.u32(offset + constant::TYPE)?;
        if SimpleType::is_inline(raw) {
            let tag = TypeTag::from_raw(bits(raw, 27, 5) as u8)?;
            if tag == TypeTag::Void {
                return Err(TypelibError::InvalidBlob("Constant value type void".into()));
            }
            let expected = tag.constant_value_size();
            if expected != 0 && size != expected {
                return Err(TypelibError::InvalidBlob(
                    "Constant value size mismatch".into(),
                ));
            }
        }
        Ok(())
    }

    fn validate_value(&self, offset: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.value))?;
        self.name("value", self.u32(offset + value::NAME)?)?;
        Ok(())
    }

    /// Validate a field and return the size it occupies, embedded callback included
    fn validate_field(&mut self, offset: u32) -> Result<(u32, bool)> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.field))?;
        self.name("field", self.u32(offset + field::NAME)?)?;
        let flags = FieldBlobFlags::from_bits_truncate(self.u8(offset + field::FLAGS)?);
        if flags.contains(FieldBlobFlags::HAS_EMBEDDED_TYPE) {
            self.validate_callback(offset + u32::from(sizes.field))?;
            Ok((u32::from(sizes.field) + u32::from(sizes.callback), true))
        } else {
            self.validate_type(offset + field::TYPE, 0)?;
            Ok((u32::from(sizes.field), false))
        }
    }

    fn validate_property(&self, offset: u32) -> Result<()> {
        self.fits(offset, u32::from(self.header.blob_sizes.property))?;
        self.name("property", self.u32(offset + property::NAME)?)?;
        self.validate_type(offset + property::TYPE, 0)
    }

    /// Walk `n_fields` fields from `offset`, returning the end offset and the
    /// number of embedded callbacks seen
    fn validate_fields(&mut self, mut offset: u32, n_fields: u16) -> Result<(u32, u16)> {
        let mut callbacks = 0u16;
        for _ in 0..n_fields {
            let (size, embedded) = self.validate_field(offset)?;
            offset += size;
            callbacks += u16::from(embedded);
        }
        Ok((offset, callbacks))
    }

    // Registered types

    fn validate_registration(&self, offset: u32, what: &str) -> Result<()> {
        let flags = RegisteredBlobFlags::from_bits_truncate(self.u16(offset + common::FLAGS)?);
        let gtype_name = self.u32(offset + registered::GTYPE_NAME)?;
        let gtype_init = self.u32(offset + registered::GTYPE_INIT)?;
        if flags.contains(RegisteredBlobFlags::UNREGISTERED) {
            if gtype_name != 0 || gtype_init != 0 {
                return Err(TypelibError::InvalidBlob(format!(
                    "Gtype data in unregistered {what}"
                )));
            }
        } else {
            self.name(what, gtype_name)?;
            self.name(what, gtype_init)?;
        }
        Ok(())
    }

    fn validate_struct(&mut self, offset: u32, blob_type: BlobType) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.structure))?;
        self.expect_blob_type(offset, blob_type)?;
        let name = self.name("struct", self.u32(offset + common::NAME)?)?;

        self.in_context(name, |v| {
            v.validate_registration(offset, "struct")?;
            let n_fields = v.u16(offset + structure::N_FIELDS)?;
            let n_methods = v.u16(offset + structure::N_METHODS)?;
            v.fits_sections(
                offset,
                sizes.structure,
                &[
                    (u32::from(n_fields), sizes.field),
                    (u32::from(n_methods), sizes.function),
                ],
            )?;

            let (mut at, _) = v.validate_fields(offset + u32::from(sizes.structure), n_fields)?;
            for _ in 0..n_methods {
                v.validate_function(at, Some(blob_type))?;
                at += u32::from(sizes.function);
            }
            Ok(())
        })
    }

    fn validate_union(&mut self, offset: u32) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.union))?;
        self.expect_blob_type(offset, BlobType::Union)?;
        let name = self.name("union", self.u32(offset + common::NAME)?)?;

        self.in_context(name, |v| {
            v.validate_registration(offset, "union")?;
            let n_fields = v.u16(offset + union::N_FIELDS)?;
            let n_functions = v.u16(offset + union::N_FUNCTIONS)?;
            v.fits_sections(
                offset,
                sizes.union,
                &[
                    (u32::from(n_fields), sizes.field),
                    (u32::from(n_functions), sizes.function),
                ],
            )?;

            let (mut at, _) = v.validate_fields(offset + u32::from(sizes.union), n_fields)?;
            for _ in 0..n_functions {
                v.validate_function(at, Some(BlobType::Union))?;
                at += u32::from(sizes.function);
            }

            let flags = u32::from(v.u16(offset + common::FLAGS)?);
            if bit(flags, union::DISCRIMINATED_BIT) {
                v.validate_type(offset + union::DISCRIMINATOR_TYPE, 0)?;
                if v.u32(offset + union::DISCRIMINATOR_TYPE)? == 0 {
                    return Err(TypelibError::InvalidBlob(
                        "Discriminated union without discriminator type".into(),
                    ));
                }
                for _ in 0..n_fields {
                    v.validate_constant(at)?;
                    at += u32::from(sizes.constant);
                }
            }
            Ok(())
        })
    }

    fn validate_enum(&mut self, offset: u32, blob_type: BlobType) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.enumeration))?;
        self.expect_blob_type(offset, blob_type)?;
        self.validate_registration(offset, "enum")?;
        let name = self.name("enum", self.u32(offset + common::NAME)?)?;

        let n_values = self.u16(offset + enumeration::N_VALUES)?;
        let n_methods = self.u16(offset + enumeration::N_METHODS)?;
        self.fits_sections(
            offset,
            sizes.enumeration,
            &[
                (u32::from(n_values), sizes.value),
                (u32::from(n_methods), sizes.function),
            ],
        )?;

        self.in_context(name, |v| {
            let mut at = offset + u32::from(sizes.enumeration);
            for _ in 0..n_values {
                v.validate_value(at)?;
                at += u32::from(sizes.value);
            }
            for _ in 0..n_methods {
                v.validate_function(at, Some(BlobType::Enum))?;
                at += u32::from(sizes.function);
            }
            Ok(())
        })
    }

    fn validate_object(&mut self, offset: u32) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.object))?;
        self.expect_blob_type(offset, BlobType::Object)?;
        self.name("object", self.u32(offset + registered::GTYPE_NAME)?)?;
        self.name("object", self.u32(offset + registered::GTYPE_INIT)?)?;
        let name = self.name("object", self.u32(offset + common::NAME)?)?;

        let parent = self.u16(offset + object::PARENT)?;
        if parent > self.header.n_entries {
            return Err(TypelibError::InvalidBlob("Invalid parent index".into()));
        }
        if parent != 0 {
            let entry = self.dir_entry_checked(parent)?;
            if entry.blob_type != BlobType::Object as u16 && (entry.local || entry.blob_type != 0) {
                return Err(TypelibError::InvalidBlob("Parent not object".into()));
            }
        }

        let gtype_struct = self.u16(offset + object::GTYPE_STRUCT)?;
        if gtype_struct != 0 {
            let entry = self.dir_entry_checked(gtype_struct)?;
            if entry.blob_type != BlobType::Struct as u16 && entry.local {
                return Err(TypelibError::InvalidBlob(
                    "Class struct invalid type or not local".into(),
                ));
            }
        }

        let count = |field: u32| -> Result<u32> { Ok(u32::from(self.u16(offset + field)?)) };
        let n_interfaces = count(object::N_INTERFACES)?;
        let n_fields = self.u16(offset + object::N_FIELDS)?;
        let n_properties = count(object::N_PROPERTIES)?;
        let n_methods = count(object::N_METHODS)?;
        let n_signals = count(object::N_SIGNALS)?;
        let n_vfuncs = count(object::N_VFUNCS)?;
        let n_constants = count(object::N_CONSTANTS)?;
        let n_field_callbacks = self.u16(offset + object::N_FIELD_CALLBACKS)?;

        self.fits_sections(
            offset,
            sizes.object,
            &[
                (n_interfaces + n_interfaces % 2, 2),
                (u32::from(n_fields), sizes.field),
                (n_properties, sizes.property),
                (n_methods, sizes.function),
                (n_signals, sizes.signal),
                (n_vfuncs, sizes.vfunc),
                (n_constants, sizes.constant),
            ],
        )?;

        let mut at = offset + u32::from(sizes.object);
        for _ in 0..n_interfaces {
            let iface = self.u16(at)?;
            if iface == 0 || iface > self.header.n_entries {
                return Err(TypelibError::InvalidBlob("Invalid interface index".into()));
            }
            let entry = self.dir_entry_checked(iface)?;
            if entry.blob_type != BlobType::Interface as u16
                && (entry.local || entry.blob_type != 0)
            {
                return Err(TypelibError::InvalidBlob("Not an interface".into()));
            }
            at += 2;
        }
        at += 2 * (n_interfaces % 2);

        self.in_context(name, |v| {
            let (mut at, callbacks) = v.validate_fields(at, n_fields)?;
            if callbacks != n_field_callbacks {
                return Err(TypelibError::InvalidBlob(format!(
                    "Incorrect number of field callbacks; expected {n_field_callbacks}, got {callbacks}"
                )));
            }
            for _ in 0..n_properties {
                v.validate_property(at)?;
                at += u32::from(sizes.property);
            }
            for _ in 0..n_methods {
                v.validate_function(at, Some(BlobType::Object))?;
                at += u32::from(sizes.function);
            }
            for _ in 0..n_signals {
                v.validate_signal(at, offset)?;
                at += u32::from(sizes.signal);
            }
            for _ in 0..n_vfuncs {
                v.validate_vfunc(at, offset)?;
                at += u32::from(sizes.vfunc);
            }
            for _ in 0..n_constants {
                v.validate_constant(at)?;
                at += u32::from(sizes.constant);
            }
            Ok(())
        })
    }

    fn validate_interface(&mut self, offset: u32) -> Result<()> {
        let sizes = self.header.blob_sizes;
        self.fits(offset, u32::from(sizes.interface))?;
        self.expect_blob_type(offset, BlobType::Interface)?;
        self.name("interface", self.u32(offset + registered::GTYPE_NAME)?)?;
        self.name("interface", self.u32(offset + registered::GTYPE_INIT)?)?;
        let name = self.name("interface", self.u32(offset + common::NAME)?)?;

        let count = |field: u32| -> Result<u32> { Ok(u32::from(self.u16(offset + field)?)) };
        let n_prerequisites = count(interface::N_PREREQUISITES)?;
        let n_properties = count(interface::N_PROPERTIES)?;
        let n_methods = count(interface::N_METHODS)?;
        let n_signals = count(interface::N_SIGNALS)?;
        let n_vfuncs = count(interface::N_VFUNCS)?;
        let n_constants = count(interface::N_CONSTANTS)?;

        self.fits_sections(
            offset,
            sizes.interface,
            &[
                (n_prerequisites + n_prerequisites % 2, 2),
                (n_properties, sizes.property),
                (n_methods, sizes.function),
                (n_signals, sizes.signal),
                (n_vfuncs, sizes.vfunc),
                (n_constants, sizes.constant),
            ],
        )?;

        let mut at = offset + u32::from(sizes.interface);
        for _ in 0..n_prerequisites {
            let req = self.u16(at)?;
            if req == 0 || req > self.header.n_entries {
                return Err(TypelibError::InvalidBlob(
                    "Invalid prerequisite index".into(),
                ));
            }
            let entry = self.dir_entry_checked(req)?;
            if entry.blob_type != BlobType::Interface as u16
                && entry.blob_type != BlobType::Object as u16
                && (entry.local || entry.blob_type != 0)
            {
                return Err(TypelibError::InvalidBlob(
                    "Not an interface or object".into(),
                ));
            }
            at += 2;
        }
        at += 2 * (n_prerequisites % 2);

        self.in_context(name, |v| {
            let mut at = at;
            for _ in 0..n_properties {
                v.validate_property(at)?;
                at += u32::from(sizes.property);
            }
            for _ in 0..n_methods {
                v.validate_function(at, Some(BlobType::Interface))?;
                at += u32::from(sizes.function);
            }
            for _ in 0..n_signals {
                v.validate_signal(at, offset)?;
                at += u32::from(sizes.signal);
            }
            for _ in 0..n_vfuncs {
                v.validate_vfunc(at, offset)?;
                at += u32::from(sizes.vfunc);
            }
            for _ in 0..n_constants {
                v.validate_constant(at)?;
                at += u32::from(sizes.constant);
            }
            Ok(())
        })
    }
}
