//! Callables: functions, callbacks, signals and virtual functions

use super::{BaseInfo, InfoHandle, InfoType, StackInfo, TypeForm};
use crate::core::attributes::Attributes;
use crate::core::blob::{
    ACCESSOR_SENTINEL, ArgBlobFlags, Direction, FunctionBlobFlags, ScopeType, SignalBlobFlags,
    SignatureBlobFlags, Transfer, VFuncBlobFlags,
    layout::{arg, callback, function, signal, signature, vfunc},
};
use crate::core::bytes::{self, bits};
use crate::core::offsets::Section;
use crate::core::typelib::Typelib;
use crate::error::{Result, TypelibError};
use crate::info::members::PropertyInfo;
use crate::info::types::{StackTypeInfo, TypeInfo};
use crate::symbol::{SymbolAddress, SymbolResolver};
use bitflags::bitflags;
use tracing::debug;

info_kind! {
    /// Any callable
    CallableInfo: Function | Callback | Signal | VFunc
}

info_kind! {
    /// A function or method
    FunctionInfo: Function
}

info_kind! {
    /// A callback type
    CallbackInfo: Callback
}

info_kind! {
    SignalInfo: Signal
}

info_kind! {
    /// A virtual function slot of an object or interface
    VFuncInfo: VFunc
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionInfoFlags: u32 {
        const IS_METHOD = 1 << 0;
        const IS_CONSTRUCTOR = 1 << 1;
        const IS_GETTER = 1 << 2;
        const IS_SETTER = 1 << 3;
        const WRAPS_VFUNC = 1 << 4;
    }
}

bitflags! {
    /// Signal emission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalFlags: u32 {
        const RUN_FIRST = 1 << 0;
        const RUN_LAST = 1 << 1;
        const RUN_CLEANUP = 1 << 2;
        const NO_RECURSE = 1 << 3;
        const DETAILED = 1 << 4;
        const ACTION = 1 << 5;
        const NO_HOOKS = 1 << 6;
        const DEPRECATED = 1 << 8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VFuncInfoFlags: u32 {
        const MUST_CHAIN_UP = 1 << 0;
        const MUST_OVERRIDE = 1 << 1;
        const MUST_NOT_OVERRIDE = 1 << 2;
    }
}

/// Accessors shared by every callable kind
pub trait Callable: AsRef<BaseInfo> {
    /// Offset of the signature blob
    fn signature_offset(&self) -> u32 {
        let info = self.as_ref();
        let field = match info.info_type() {
            InfoType::Function => function::SIGNATURE,
            InfoType::VFunc => vfunc::SIGNATURE,
            InfoType::Callback => callback::SIGNATURE,
            InfoType::Signal => signal::SIGNATURE,
            _ => return 0,
        };
        info.read_u32(field)
    }

    fn signature_flags(&self) -> SignatureBlobFlags {
        let info = self.as_ref();
        SignatureBlobFlags::from_bits_truncate(
            info.typelib()
                .read_u16(self.signature_offset().saturating_add(signature::FLAGS)),
        )
    }

    /// True when the callable reports failures through an error out-argument
    fn can_throw_error(&self) -> bool {
        if self.signature_flags().contains(SignatureBlobFlags::THROWS) {
            return true;
        }
        let info = self.as_ref();
        match info.info_type() {
            InfoType::Function => FunctionBlobFlags::from_bits_truncate(info.read_u16(function::FLAGS))
                .contains(FunctionBlobFlags::THROWS),
            InfoType::VFunc => VFuncBlobFlags::from_bits_truncate(info.read_u16(vfunc::FLAGS))
                .contains(VFuncBlobFlags::THROWS),
            _ => false,
        }
    }

    /// True when the callable takes an instance as its first argument
    fn is_method(&self) -> bool {
        let info = self.as_ref();
        match info.info_type() {
            InfoType::Function => {
                let flags = FunctionBlobFlags::from_bits_truncate(info.read_u16(function::FLAGS));
                let is_static = info.read_u16(function::EXTRA) & 1 != 0;
                !flags.contains(FunctionBlobFlags::CONSTRUCTOR) && !is_static
            }
            InfoType::VFunc | InfoType::Signal => true,
            _ => false,
        }
    }

    fn return_type(&self) -> TypeInfo {
        TypeInfo::heap(
            self.as_ref().clone(),
            self.signature_offset().saturating_add(signature::RETURN_TYPE),
        )
    }

    /// Borrowed view of the return type
    fn load_return_type(&self) -> StackTypeInfo<'_> {
        TypeInfo::stack(self.as_ref(), self.signature_offset().saturating_add(signature::RETURN_TYPE))
    }

    fn may_return_null(&self) -> bool {
        self.signature_flags()
            .contains(SignatureBlobFlags::MAY_RETURN_NULL)
    }

    fn skip_return(&self) -> bool {
        self.signature_flags().contains(SignatureBlobFlags::SKIP_RETURN)
    }

    /// Ownership of the return value passed to the caller
    fn caller_owns(&self) -> Transfer {
        let flags = self.signature_flags();
        Transfer::from_bits(
            flags.contains(SignatureBlobFlags::CALLER_OWNS_RETURN_VALUE),
            flags.contains(SignatureBlobFlags::CALLER_OWNS_RETURN_CONTAINER),
        )
    }

    fn instance_ownership_transfer(&self) -> Transfer {
        if self
            .signature_flags()
            .contains(SignatureBlobFlags::INSTANCE_TRANSFER_OWNERSHIP)
        {
            Transfer::Everything
        } else {
            Transfer::Nothing
        }
    }

    fn n_args(&self) -> u32 {
        let info = self.as_ref();
        u32::from(
            info.typelib()
                .read_u16(self.signature_offset().saturating_add(signature::N_ARGUMENTS)),
        )
    }

    /// Offset of argument `n`, checked against the declared count
    fn arg_offset(&self, n: u32) -> Result<u32> {
        let count = self.n_args();
        if n >= count {
            return Err(TypelibError::IndexOutOfRange {
                section: "arguments",
                index: n,
                count,
            });
        }
        let sizes = self.as_ref().typelib().header().blob_sizes;
        let first = bytes::advance(self.signature_offset(), u32::from(sizes.signature))?;
        bytes::record_offset(first, n, u32::from(sizes.arg))
    }

    fn arg(&self, n: u32) -> Result<ArgInfo> {
        let info = self.as_ref();
        let at = self.arg_offset(n)?;
        Ok(ArgInfo(BaseInfo::new(
            InfoType::Arg,
            Some(info.clone()),
            info.typelib(),
            at,
        )))
    }

    /// Borrowed view of argument `n`
    fn load_arg(&self, n: u32) -> Result<StackArgInfo<'_>> {
        let at = self.arg_offset(n)?;
        Ok(ArgInfo(StackInfo::new(self.as_ref(), InfoType::Arg, at)))
    }

    fn args(&self) -> Vec<ArgInfo> {
        (0..self.n_args()).filter_map(|n| self.arg(n).ok()).collect()
    }

    /// Attribute attached to the return value
    fn return_attribute(&self, name: &str) -> Option<&str> {
        self.return_attributes()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    fn return_attributes(&self) -> Attributes<'_> {
        self.as_ref().typelib().attributes(self.signature_offset())
    }
}

impl Callable for CallableInfo {}
impl Callable for FunctionInfo {}
impl Callable for CallbackInfo {}
impl Callable for SignalInfo {}
impl Callable for VFuncInfo {}

/// Record `index` of a section of this handle's container
fn container_child(
    info: &BaseInfo,
    info_type: InfoType,
    section: Section,
    index: u32,
) -> Option<BaseInfo> {
    let container = info.container()?;
    container
        .require("container_child", &[InfoType::Object, InfoType::Interface])
        .ok()?;
    container.section_child(info_type, section, index).ok()
}

impl FunctionInfo {
    /// Exported symbol implementing the function
    pub fn symbol(&self) -> &str {
        self.0.string_field(function::SYMBOL).unwrap_or_default()
    }

    fn blob_flags(&self) -> FunctionBlobFlags {
        FunctionBlobFlags::from_bits_truncate(self.0.read_u16(function::FLAGS))
    }

    /// Property or vfunc index for accessors and wrappers
    fn index(&self) -> u32 {
        bits(u32::from(self.0.read_u16(function::FLAGS)), function::INDEX_SHIFT, 10)
    }

    pub fn flags(&self) -> FunctionInfoFlags {
        let blob = self.blob_flags();
        let mut flags = FunctionInfoFlags::empty();
        flags.set(FunctionInfoFlags::IS_METHOD, self.is_method());
        flags.set(
            FunctionInfoFlags::IS_CONSTRUCTOR,
            blob.contains(FunctionBlobFlags::CONSTRUCTOR),
        );
        flags.set(FunctionInfoFlags::IS_GETTER, blob.contains(FunctionBlobFlags::GETTER));
        flags.set(FunctionInfoFlags::IS_SETTER, blob.contains(FunctionBlobFlags::SETTER));
        flags.set(
            FunctionInfoFlags::WRAPS_VFUNC,
            blob.contains(FunctionBlobFlags::WRAPS_VFUNC),
        );
        flags
    }

    /// The property this function gets or sets
    pub fn property(&self) -> Option<PropertyInfo> {
        if !self
            .blob_flags()
            .intersects(FunctionBlobFlags::GETTER | FunctionBlobFlags::SETTER)
        {
            return None;
        }
        container_child(&self.0, InfoType::Property, Section::Properties, self.index())
            .map(PropertyInfo::new_unchecked)
    }

    /// The virtual function this function wraps
    pub fn vfunc(&self) -> Option<VFuncInfo> {
        if !self.blob_flags().contains(FunctionBlobFlags::WRAPS_VFUNC) {
            return None;
        }
        container_child(&self.0, InfoType::VFunc, Section::VFuncs, self.index())
            .map(VFuncInfo::new_unchecked)
    }

    /// Look the symbol up in the typelib's shared libraries
    pub fn resolve(&self, resolver: &dyn SymbolResolver) -> Result<SymbolAddress> {
        let libraries = self.0.typelib().shared_libraries();
        let symbol = self.symbol();
        resolver.resolve_symbol(&libraries, symbol).ok_or_else(|| {
            debug!(symbol, ?libraries, "symbol lookup failed");
            TypelibError::SymbolNotFound(symbol.to_string())
        })
    }
}

impl SignalInfo {
    fn blob_flags(&self) -> SignalBlobFlags {
        SignalBlobFlags::from_bits_truncate(self.0.read_u16(signal::FLAGS))
    }

    pub fn flags(&self) -> SignalFlags {
        let blob = self.blob_flags();
        let pairs = [
            (SignalBlobFlags::RUN_FIRST, SignalFlags::RUN_FIRST),
            (SignalBlobFlags::RUN_LAST, SignalFlags::RUN_LAST),
            (SignalBlobFlags::RUN_CLEANUP, SignalFlags::RUN_CLEANUP),
            (SignalBlobFlags::NO_RECURSE, SignalFlags::NO_RECURSE),
            (SignalBlobFlags::DETAILED, SignalFlags::DETAILED),
            (SignalBlobFlags::ACTION, SignalFlags::ACTION),
            (SignalBlobFlags::NO_HOOKS, SignalFlags::NO_HOOKS),
            (SignalBlobFlags::DEPRECATED, SignalFlags::DEPRECATED),
        ];
        pairs
            .iter()
            .filter(|(b, _)| blob.contains(*b))
            .fold(SignalFlags::empty(), |acc, (_, f)| acc | *f)
    }

    /// Class closure of the signal, a vfunc of the same container
    pub fn class_closure(&self) -> Option<VFuncInfo> {
        if !self.blob_flags().contains(SignalBlobFlags::HAS_CLASS_CLOSURE) {
            return None;
        }
        let index = u32::from(self.0.read_u16(signal::CLASS_CLOSURE));
        container_child(&self.0, InfoType::VFunc, Section::VFuncs, index).map(VFuncInfo::new_unchecked)
    }

    pub fn true_stops_emit(&self) -> bool {
        self.blob_flags().contains(SignalBlobFlags::TRUE_STOPS_EMIT)
    }
}

impl VFuncInfo {
    fn blob_flags(&self) -> VFuncBlobFlags {
        VFuncBlobFlags::from_bits_truncate(self.0.read_u16(vfunc::FLAGS))
    }

    pub fn flags(&self) -> VFuncInfoFlags {
        let blob = self.blob_flags();
        let mut flags = VFuncInfoFlags::empty();
        flags.set(
            VFuncInfoFlags::MUST_CHAIN_UP,
            blob.contains(VFuncBlobFlags::MUST_CHAIN_UP),
        );
        flags.set(
            VFuncInfoFlags::MUST_OVERRIDE,
            blob.contains(VFuncBlobFlags::MUST_BE_IMPLEMENTED),
        );
        flags.set(
            VFuncInfoFlags::MUST_NOT_OVERRIDE,
            blob.contains(VFuncBlobFlags::MUST_NOT_BE_IMPLEMENTED),
        );
        flags
    }

    /// Byte offset of the slot within the class or interface struct
    pub fn struct_offset(&self) -> u16 {
        self.0.read_u16(vfunc::STRUCT_OFFSET)
    }

    /// Signal this vfunc is the class closure of
    pub fn signal(&self) -> Option<SignalInfo> {
        if !self.blob_flags().contains(VFuncBlobFlags::CLASS_CLOSURE) {
            return None;
        }
        let index = u32::from(self.0.read_u16(vfunc::SIGNAL));
        container_child(&self.0, InfoType::Signal, Section::Signals, index).map(SignalInfo::new_unchecked)
    }

    /// Method of the container that invokes this vfunc
    pub fn invoker(&self) -> Option<FunctionInfo> {
        let index = bits(u32::from(self.0.read_u16(vfunc::INVOKER)), 0, 10);
        if index == ACCESSOR_SENTINEL {
            return None;
        }
        container_child(&self.0, InfoType::Function, Section::Methods, index)
            .map(FunctionInfo::new_unchecked)
    }
}

/// An argument of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo<H = BaseInfo>(H);

/// Argument view borrowed from its callable
pub type StackArgInfo<'a> = ArgInfo<StackInfo<'a>>;

impl TryFrom<BaseInfo> for ArgInfo {
    type Error = TypelibError;

    fn try_from(info: BaseInfo) -> Result<Self> {
        info.require("ArgInfo::try_from", &[InfoType::Arg])?;
        Ok(ArgInfo(info))
    }
}

impl From<ArgInfo> for BaseInfo {
    fn from(info: ArgInfo) -> Self {
        info.0
    }
}

impl<H: InfoHandle> ArgInfo<H> {
    pub fn handle(&self) -> &H {
        &self.0
    }

    fn raw_flags(&self) -> u32 {
        self.0.typelib().read_u32(self.0.offset().saturating_add(arg::FLAGS))
    }

    fn blob_flags(&self) -> ArgBlobFlags {
        ArgBlobFlags::from_bits_truncate(self.raw_flags())
    }

    pub fn direction(&self) -> Direction {
        let flags = self.blob_flags();
        match (flags.contains(ArgBlobFlags::IN), flags.contains(ArgBlobFlags::OUT)) {
            (true, true) => Direction::InOut,
            (_, true) => Direction::Out,
            _ => Direction::In,
        }
    }

    pub fn is_return_value(&self) -> bool {
        self.blob_flags().contains(ArgBlobFlags::RETURN_VALUE)
    }

    pub fn is_optional(&self) -> bool {
        self.blob_flags().contains(ArgBlobFlags::OPTIONAL)
    }

    pub fn is_caller_allocates(&self) -> bool {
        self.blob_flags().contains(ArgBlobFlags::CALLER_ALLOCATES)
    }

    pub fn may_be_null(&self) -> bool {
        self.blob_flags().contains(ArgBlobFlags::NULLABLE)
    }

    pub fn is_skip(&self) -> bool {
        self.blob_flags().contains(ArgBlobFlags::SKIP)
    }

    pub fn ownership_transfer(&self) -> Transfer {
        let flags = self.blob_flags();
        Transfer::from_bits(
            flags.contains(ArgBlobFlags::TRANSFER_OWNERSHIP),
            flags.contains(ArgBlobFlags::TRANSFER_CONTAINER_OWNERSHIP),
        )
    }

    pub fn scope(&self) -> ScopeType {
        ScopeType::from_raw(bits(self.raw_flags(), arg::SCOPE_SHIFT, 3))
    }

    fn index_field(&self, field: u32) -> Option<u32> {
        let raw = self.0.typelib().read_u8(self.0.offset().saturating_add(field)) as i8;
        u32::try_from(raw).ok()
    }

    /// Index of the user-data argument of a callback argument
    pub fn closure_index(&self) -> Option<u32> {
        self.index_field(arg::CLOSURE)
    }

    /// Index of the destroy-notify argument of a callback argument
    pub fn destroy_index(&self) -> Option<u32> {
        self.index_field(arg::DESTROY)
    }

    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::heap(self.0.to_base(), self.0.offset().saturating_add(arg::ARG_TYPE))
    }

    /// Borrowed view of the argument type
    pub fn load_type_info(&self) -> StackTypeInfo<'_> {
        TypeInfo::stack(self.0.stack_parent(), self.0.offset().saturating_add(arg::ARG_TYPE))
    }
}

impl<H: InfoHandle> InfoHandle for ArgInfo<H> {
    fn typelib(&self) -> &Typelib {
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
        None
    }

    fn unresolved_names(&self) -> Option<(&str, &str)> {
        None
    }
}
