//! Composite offset resolver
//!
//! Composite blobs (objects, interfaces, structs, unions, enums) are followed
//! by variable-length sections in a fixed per-kind order. The n-th record of
//! a section is found by walking every preceding section, striding by the
//! header-declared blob sizes. Fields are the only records of variable size:
//! a field flagged as carrying an embedded type is followed directly by a
//! callback blob.
//!
//! Every lookup checks the index against the declared count and fails with
//! [`TypelibError::IndexOutOfRange`] instead of reading past the section.
//! Offset arithmetic is checked, so a blob that was never validated yields
//! an error rather than a wrapped offset.

use crate::core::blob::{
    BlobType, FieldBlobFlags,
    layout::{common, enumeration, field, interface, object, structure, union},
};
use crate::core::bytes::{advance, bit, record_offset, u16_at, u8_at};
use crate::core::header::BlobSizes;
use crate::error::{Result, TypelibError};

/// Composite descriptor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Object,
    Interface,
    /// Plain and boxed structs share a layout
    Struct,
    Union,
    /// Enums and flags share a layout
    Enum,
}

impl CompositeKind {
    pub fn from_blob_type(blob_type: BlobType) -> Result<Self> {
        match blob_type {
            BlobType::Object => Ok(CompositeKind::Object),
            BlobType::Interface => Ok(CompositeKind::Interface),
            BlobType::Struct | BlobType::Boxed => Ok(CompositeKind::Struct),
            BlobType::Union => Ok(CompositeKind::Union),
            BlobType::Enum | BlobType::Flags => Ok(CompositeKind::Enum),
            other => Err(TypelibError::precondition(
                "CompositeKind::from_blob_type",
                format!("{other:?} blobs have no sections"),
            )),
        }
    }

    /// Sections in the order they are laid out after the fixed blob
    pub fn sections(self) -> &'static [Section] {
        use Section::*;
        match self {
            CompositeKind::Object => &[
                Interfaces, Fields, Properties, Methods, Signals, VFuncs, Constants,
            ],
            CompositeKind::Interface => &[
                Prerequisites, Properties, Methods, Signals, VFuncs, Constants,
            ],
            CompositeKind::Struct => &[Fields, Methods],
            CompositeKind::Union => &[Fields, Methods, Discriminators],
            CompositeKind::Enum => &[Values, Methods],
        }
    }

    fn fixed_size(self, sizes: &BlobSizes) -> u32 {
        u32::from(match self {
            CompositeKind::Object => sizes.object,
            CompositeKind::Interface => sizes.interface,
            CompositeKind::Struct => sizes.structure,
            CompositeKind::Union => sizes.union,
            CompositeKind::Enum => sizes.enumeration,
        })
    }
}

/// Variable-length sections of a composite blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// `u16` directory indices, padded to an even count
    Interfaces,
    /// `u16` directory indices, padded to an even count
    Prerequisites,
    Fields,
    Properties,
    Methods,
    Signals,
    VFuncs,
    Constants,
    Values,
    /// One constant per field of a discriminated union
    Discriminators,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Interfaces => "interfaces",
            Section::Prerequisites => "prerequisites",
            Section::Fields => "fields",
            Section::Properties => "properties",
            Section::Methods => "methods",
            Section::Signals => "signals",
            Section::VFuncs => "vfuncs",
            Section::Constants => "constants",
            Section::Values => "values",
            Section::Discriminators => "discriminators",
        }
    }

    /// Size of one record, `None` for fields which vary
    fn record_size(self, sizes: &BlobSizes) -> Option<u32> {
        let size = match self {
            Section::Interfaces | Section::Prerequisites => 2,
            Section::Fields => return None,
            Section::Properties => sizes.property,
            Section::Methods => sizes.function,
            Section::Signals => sizes.signal,
            Section::VFuncs => sizes.vfunc,
            Section::Constants | Section::Discriminators => sizes.constant,
            Section::Values => sizes.value,
        };
        Some(u32::from(size))
    }
}

/// A composite blob inside a buffer
#[derive(Debug, Clone, Copy)]
pub struct Composite<'a> {
    data: &'a [u8],
    sizes: BlobSizes,
    kind: CompositeKind,
    offset: u32,
}

impl<'a> Composite<'a> {
    pub fn new(data: &'a [u8], sizes: BlobSizes, kind: CompositeKind, offset: u32) -> Self {
        Composite {
            data,
            sizes,
            kind,
            offset,
        }
    }

    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    fn count_at(&self, field: u32) -> Result<u32> {
        Ok(u32::from(u16_at(self.data, advance(self.offset, field)?)?))
    }

    /// Declared number of records in `section`
    pub fn count(&self, section: Section) -> Result<u32> {
        use CompositeKind as K;
        use Section as S;
        match (self.kind, section) {
            (K::Object, S::Interfaces) => self.count_at(object::N_INTERFACES),
            (K::Object, S::Fields) => self.count_at(object::N_FIELDS),
            (K::Object, S::Properties) => self.count_at(object::N_PROPERTIES),
            (K::Object, S::Methods) => self.count_at(object::N_METHODS),
            (K::Object, S::Signals) => self.count_at(object::N_SIGNALS),
            (K::Object, S::VFuncs) => self.count_at(object::N_VFUNCS),
            (K::Object, S::Constants) => self.count_at(object::N_CONSTANTS),
            (K::Interface, S::Prerequisites) => self.count_at(interface::N_PREREQUISITES),
            (K::Interface, S::Properties) => self.count_at(interface::N_PROPERTIES),
            (K::Interface, S::Methods) => self.count_at(interface::N_METHODS),
            (K::Interface, S::Signals) => self.count_at(interface::N_SIGNALS),
            (K::Interface, S::VFuncs) => self.count_at(interface::N_VFUNCS),
            (K::Interface, S::Constants) => self.count_at(interface::N_CONSTANTS),
            (K::Struct, S::Fields) => self.count_at(structure::N_FIELDS),
            (K::Struct, S::Methods) => self.count_at(structure::N_METHODS),
            (K::Union, S::Fields) => self.count_at(union::N_FIELDS),
            (K::Union, S::Methods) => self.count_at(union::N_FUNCTIONS),
            (K::Union, S::Discriminators) => {
                let flags = u32::from(u16_at(self.data, advance(self.offset, common::FLAGS)?)?);
                if bit(flags, union::DISCRIMINATED_BIT) {
                    self.count_at(union::N_FIELDS)
                } else {
                    Ok(0)
                }
            }
            (K::Enum, S::Values) => self.count_at(enumeration::N_VALUES),
            (K::Enum, S::Methods) => self.count_at(enumeration::N_METHODS),
            (kind, section) => Err(TypelibError::precondition(
                "Composite::count",
                format!("{kind:?} blobs have no {} section", section.as_str()),
            )),
        }
    }

    /// Size of the field record at `at`, embedded callback included
    pub fn field_size(&self, at: u32) -> Result<u32> {
        let flags = FieldBlobFlags::from_bits_truncate(u8_at(self.data, advance(at, field::FLAGS)?)?);
        let mut size = u32::from(self.sizes.field);
        if flags.contains(FieldBlobFlags::HAS_EMBEDDED_TYPE) {
            size += u32::from(self.sizes.callback);
        }
        Ok(size)
    }

    fn span(&self, section: Section, start: u32) -> Result<u32> {
        let count = self.count(section)?;
        match section {
            Section::Interfaces | Section::Prerequisites => Ok((count + count % 2) * 2),
            Section::Fields => {
                let mut at = start;
                for _ in 0..count {
                    at = advance(at, self.field_size(at)?)?;
                }
                Ok(at - start)
            }
            other => Ok(count * other.record_size(&self.sizes).unwrap_or_default()),
        }
    }

    /// Offset of the first byte of `section`, valid even when it is empty
    pub fn section_start(&self, section: Section) -> Result<u32> {
        let order = self.kind.sections();
        if !order.contains(&section) {
            return Err(TypelibError::precondition(
                "Composite::section_start",
                format!("{:?} blobs have no {} section", self.kind, section.as_str()),
            ));
        }
        let mut at = advance(self.offset, self.kind.fixed_size(&self.sizes))?;
        for preceding in order.iter().take_while(|s| **s != section) {
            at = advance(at, self.span(*preceding, at)?)?;
        }
        Ok(at)
    }

    /// Offset of record `index` of `section`
    pub fn offset_of(&self, section: Section, index: u32) -> Result<u32> {
        let count = self.count(section)?;
        if index >= count {
            return Err(TypelibError::IndexOutOfRange {
                section: section.as_str(),
                index,
                count,
            });
        }
        let start = self.section_start(section)?;
        match section.record_size(&self.sizes) {
            Some(size) => record_offset(start, index, size),
            None => {
                let mut at = start;
                for _ in 0..index {
                    at = advance(at, self.field_size(at)?)?;
                }
                Ok(at)
            }
        }
    }

    /// Offsets of every record of `section`, in order
    pub fn offsets(&self, section: Section) -> Result<Vec<u32>> {
        let count = self.count(section)?;
        let mut at = self.section_start(section)?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(at);
            let size = match section.record_size(&self.sizes) {
                Some(size) => size,
                None => self.field_size(at)?,
            };
            at = advance(at, size)?;
        }
        Ok(out)
    }
}

/// Offset of record `index` of `section` in the composite blob at `descriptor`
pub fn offset_of(
    data: &[u8],
    sizes: BlobSizes,
    kind: CompositeKind,
    descriptor: u32,
    section: Section,
    index: u32,
) -> Result<u32> {
    Composite::new(data, sizes, kind, descriptor).offset_of(section, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SIZES: BlobSizes = BlobSizes::KNOWN;

    fn put_u16(data: &mut [u8], at: u32, v: u16) {
        data[at as usize..at as usize + 2].copy_from_slice(&v.to_ne_bytes());
    }

    fn struct_blob(n_fields: u16, n_methods: u16) -> Vec<u8> {
        let mut data = vec![0u8; 512];
        put_u16(&mut data, 0, BlobType::Struct as u16);
        put_u16(&mut data, structure::N_FIELDS, n_fields);
        put_u16(&mut data, structure::N_METHODS, n_methods);
        data
    }

    #[test]
    fn test_struct_fields_then_methods() {
        let data = struct_blob(2, 1);
        let s = Composite::new(&data, SIZES, CompositeKind::Struct, 0);

        assert_eq!(s.offset_of(Section::Fields, 0).unwrap(), 32);
        assert_eq!(s.offset_of(Section::Fields, 1).unwrap(), 32 + 16);
        assert_eq!(s.offset_of(Section::Methods, 0).unwrap(), 32 + 2 * 16);
    }

    #[test]
    fn test_index_past_count_is_rejected() {
        let data = struct_blob(2, 1);
        let s = Composite::new(&data, SIZES, CompositeKind::Struct, 0);
        assert!(matches!(
            s.offset_of(Section::Fields, 2),
            Err(TypelibError::IndexOutOfRange {
                section: "fields",
                index: 2,
                count: 2
            })
        ));
        assert!(matches!(
            s.offset_of(Section::Signals, 0),
            Err(TypelibError::PreconditionViolation { .. })
        ));
    }

    #[test]
    fn test_embedded_callback_extends_field() {
        let mut data = struct_blob(2, 1);
        data[(32 + field::FLAGS) as usize] = FieldBlobFlags::HAS_EMBEDDED_TYPE.bits();
        let s = Composite::new(&data, SIZES, CompositeKind::Struct, 0);
        assert_eq!(s.offset_of(Section::Fields, 1).unwrap(), 32 + 16 + 12);
        assert_eq!(s.offset_of(Section::Methods, 0).unwrap(), 32 + 2 * 16 + 12);
    }

    #[test]
    fn test_interface_array_is_padded() {
        let mut data = vec![0u8; 1024];
        put_u16(&mut data, object::N_INTERFACES, 3);
        put_u16(&mut data, object::N_PROPERTIES, 1);
        let o = Composite::new(&data, SIZES, CompositeKind::Object, 0);
        assert_eq!(o.offset_of(Section::Interfaces, 2).unwrap(), 60 + 4);
        assert_eq!(o.offset_of(Section::Properties, 0).unwrap(), 60 + 8);
    }

    #[test]
    fn test_larger_declared_sizes_are_honored() {
        let data = struct_blob(2, 1);
        let mut sizes = SIZES;
        sizes.structure += 8;
        sizes.field += 4;
        let s = Composite::new(&data, sizes, CompositeKind::Struct, 0);
        assert_eq!(s.offset_of(Section::Methods, 0).unwrap(), 40 + 2 * 20);
    }

    #[test]
    fn test_offsets_past_u32_are_errors() {
        let mut data = vec![0u8; 1024];
        put_u16(&mut data, object::N_PROPERTIES, u16::MAX);
        put_u16(&mut data, object::N_METHODS, u16::MAX);
        put_u16(&mut data, object::N_SIGNALS, 1);
        let mut sizes = SIZES;
        sizes.property = u16::MAX;
        sizes.function = u16::MAX;
        let o = Composite::new(&data, sizes, CompositeKind::Object, 0);

        assert_eq!(o.offset_of(Section::Methods, 0).unwrap(), 60 + 65535 * 65535);
        assert!(matches!(
            o.section_start(Section::Signals),
            Err(TypelibError::Invalid(_))
        ));
        assert!(matches!(
            o.offset_of(Section::Signals, 0),
            Err(TypelibError::Invalid(_))
        ));
    }

    #[test]
    fn test_undiscriminated_union_has_no_discriminators() {
        let mut data = vec![0u8; 512];
        put_u16(&mut data, union::N_FIELDS, 2);
        let u = Composite::new(&data, SIZES, CompositeKind::Union, 0);
        assert_eq!(u.count(Section::Discriminators).unwrap(), 0);

        put_u16(&mut data, common::FLAGS, 1 << union::DISCRIMINATED_BIT);
        let u = Composite::new(&data, SIZES, CompositeKind::Union, 0);
        assert_eq!(u.count(Section::Discriminators).unwrap(), 2);
        assert_eq!(u.offset_of(Section::Discriminators, 1).unwrap(), 40 + 32 + 24);
    }

    fn object_strategy() -> impl Strategy<Value = (Vec<u16>, Vec<bool>)> {
        (
            proptest::collection::vec(0u16..6, 6),
            proptest::collection::vec(any::<bool>(), 0..6),
        )
    }

    proptest! {
        #[test]
        fn test_object_offsets_are_monotonic((counts, embedded) in object_strategy()) {
            let mut data = vec![0u8; 8192];
            let n_fields = embedded.len() as u16;
            put_u16(&mut data, object::N_INTERFACES, counts[0]);
            put_u16(&mut data, object::N_FIELDS, n_fields);
            put_u16(&mut data, object::N_PROPERTIES, counts[1]);
            put_u16(&mut data, object::N_METHODS, counts[2]);
            put_u16(&mut data, object::N_SIGNALS, counts[3]);
            put_u16(&mut data, object::N_VFUNCS, counts[4]);
            put_u16(&mut data, object::N_CONSTANTS, counts[5]);

            // Lay out field flags so the walk sees the embedded callbacks
            let fields_start = 60 + (u32::from(counts[0]) + u32::from(counts[0]) % 2) * 2;
            let mut at = fields_start;
            for has_callback in &embedded {
                if *has_callback {
                    data[(at + field::FLAGS) as usize] = FieldBlobFlags::HAS_EMBEDDED_TYPE.bits();
                    at += 16 + 12;
                } else {
                    at += 16;
                }
            }

            let o = Composite::new(&data, SIZES, CompositeKind::Object, 0);
            let mut previous: Option<u32> = None;
            for section in CompositeKind::Object.sections() {
                for index in 0..o.count(*section).unwrap() {
                    let offset = o.offset_of(*section, index).unwrap();
                    if let Some(prev) = previous {
                        prop_assert!(prev < offset);
                    }
                    previous = Some(offset);
                }
            }
            prop_assert_eq!(o.section_start(Section::Properties).unwrap(), at);
        }
    }
}
