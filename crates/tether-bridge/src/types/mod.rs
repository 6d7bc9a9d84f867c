//! Wire type system
//!
//! A wire type describes how one conceptual native type crosses the boundary
//! in both directions: host value → boundary word on write, boundary word →
//! host value on read, plus the scratch resources each direction needs.
//! Every wire type is registered exactly once under both its numeric id and
//! its printable name; lookups by either key must agree.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use crate::context::BridgeContext;
use crate::resource::ResourceId;

pub mod buffer;
pub mod callback;
pub mod class_ptr;
pub mod primitive;
pub mod string;
pub mod value_object;
pub mod vector;

pub use buffer::BufferType;
pub use callback::CallbackType;
pub use class_ptr::{ClassPtrType, SharedClassPtrType};
pub use primitive::{
    primitive_name, BooleanType, PrimitiveSpec, PrimitiveType, VoidType, STANDARD_PRIMITIVES,
};
pub use string::{CStringType, StringType};
pub use value_object::ValueObjectType;
pub use vector::{ArrayType, VectorType};

/// Numeric wire type identity, assigned by the registering native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural kind of a wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Plain numeric/boolean value
    Primitive,
    /// Value-object class copied across the boundary
    Class,
    /// Pointer to a bound class instance
    Pointer,
    /// Reference to a bound class instance
    Reference,
    /// Reference-counted shared-ownership pointer
    SharedPtr,
    /// Unique-ownership pointer
    UniquePtr,
    /// Count-prefixed variable-length sequence
    Vector,
    /// Fixed-length sequence
    Array,
    /// Anything else (strings, buffers, callbacks)
    Other,
}

impl TypeKind {
    /// Printable kind name (reflection output)
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Primitive => "primitive",
            TypeKind::Class => "class",
            TypeKind::Pointer => "pointer",
            TypeKind::Reference => "reference",
            TypeKind::SharedPtr => "shared-pointer",
            TypeKind::UniquePtr => "unique-pointer",
            TypeKind::Vector => "vector",
            TypeKind::Array => "array",
            TypeKind::Other => "other",
        }
    }
}

/// Numeric subkind flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFlags(u16);

impl TypeFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Unsigned integer subkind
    pub const UNSIGNED: Self = Self(0x01);
    /// Floating-point subkind
    pub const FLOAT: Self = Self(0x02);
    /// 64-bit integer needing wide emulation on narrow hosts
    pub const BIG: Self = Self(0x04);
    /// Signless character subkind
    pub const SIGNLESS: Self = Self(0x08);
    /// Const-qualified class pointer/reference
    pub const CONST: Self = Self(0x10);
    /// Reference (as opposed to pointer) binding
    pub const REFERENCE: Self = Self(0x20);
    /// Copied by value through a host-side constructor
    pub const VALUE_OBJECT: Self = Self(0x40);

    /// Create from raw bits
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Check whether all of `other`'s bits are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of two flag sets
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Named per-call-site modifiers of conversion behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicySet(u8);

impl PolicySet {
    /// No policies
    pub const NONE: Self = Self(0);
    /// Null/undefined maps to the zero sentinel instead of failing
    pub const NULLABLE: Self = Self(0x01);
    /// Reject implicit numeric widening
    pub const STRICT: Self = Self(0x02);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether all of `other`'s bits are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of two policy sets
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Policy names in declaration order (reflection output)
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.contains(Self::NULLABLE) {
            out.push("Nullable");
        }
        if self.contains(Self::STRICT) {
            out.push("Strict");
        }
        out
    }
}

/// Conversion contract of one wire type.
///
/// `write` converts a host value into a boundary word; `read` converts a
/// boundary word back into a host value. Both may touch the heap and the
/// registries through the context, and declare up front which scoped
/// resources their conversion needs.
pub trait WireType {
    /// Numeric identity
    fn id(&self) -> TypeId;

    /// Printable name
    fn name(&self) -> &str;

    /// Structural kind
    fn kind(&self) -> TypeKind;

    /// Numeric subkind flags
    fn flags(&self) -> TypeFlags {
        TypeFlags::NONE
    }

    /// Byte stride when stored as a vector/array element
    fn stride(&self) -> u32 {
        4
    }

    /// False when values of this type pass through without conversion,
    /// making the fast fixed-arity caller path eligible.
    fn needs_conversion(&self) -> bool {
        true
    }

    /// Convert a host value into a boundary word.
    ///
    /// Fails with `TypeMismatch` when the value's shape doesn't fit; under
    /// the `Nullable` policy a null host value maps to the zero sentinel.
    fn write(&self, ctx: &mut BridgeContext, value: &HostValue, policies: PolicySet)
        -> BridgeResult<Word>;

    /// Convert a boundary word back into a host value.
    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue>;

    /// Resources the write conversion needs
    fn write_resources(&self) -> &'static [ResourceId] {
        &[]
    }

    /// Resources the read conversion needs
    fn read_resources(&self) -> &'static [ResourceId] {
        &[]
    }
}

/// Shared handle to a registered wire type.
pub type WireTypeRef = Rc<dyn WireType>;

/// Process-context-wide wire type tables, keyed by id and by name.
#[derive(Default)]
pub struct TypeTable {
    by_id: FxHashMap<TypeId, WireTypeRef>,
    by_name: FxHashMap<String, TypeId>,
}

impl TypeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wire type under both its id and its name.
    ///
    /// Re-registering a taken id or name is an error unless the previous
    /// entry was unregistered first.
    pub fn register(&mut self, ty: WireTypeRef) -> BridgeResult<()> {
        let id = ty.id();
        let name = ty.name().to_string();
        if self.by_id.contains_key(&id) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "type id {id} already registered"
            )));
        }
        if self.by_name.contains_key(&name) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "type name '{name}' already registered"
            )));
        }
        self.by_name.insert(name, id);
        self.by_id.insert(id, ty);
        Ok(())
    }

    /// Remove a wire type from both tables.
    pub fn unregister(&mut self, id: TypeId) -> BridgeResult<()> {
        let ty = self
            .by_id
            .remove(&id)
            .ok_or_else(|| BridgeError::UnknownType(id.to_string()))?;
        self.by_name.remove(ty.name());
        Ok(())
    }

    /// Look up by numeric id. Absence is fatal to the call being built.
    pub fn by_id(&self, id: TypeId) -> BridgeResult<WireTypeRef> {
        self.by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownType(id.to_string()))
    }

    /// Look up by printable name.
    pub fn by_name(&self, name: &str) -> BridgeResult<WireTypeRef> {
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| BridgeError::UnknownType(name.to_string()))?;
        self.by_id(*id)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate registered types in ascending id order (reflection output)
    pub fn iter_sorted(&self) -> Vec<WireTypeRef> {
        let mut ids: Vec<TypeId> = self.by_id.keys().copied().collect();
        ids.sort();
        ids.iter().filter_map(|id| self.by_id.get(id).cloned()).collect()
    }
}
