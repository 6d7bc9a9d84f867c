//! tether-bridge — type-driven marshalling and dynamic invocation
//!
//! This crate turns a set of registered wire types and bound entry points
//! into callable host functions. Conversion is driven entirely by the
//! [`types::WireType`] table: a signature names its types by id, the caller
//! engine composes a thunk once per signature, and every later call runs
//! the composed conversions with no per-call decision making beyond
//! arity-based overload selection.
//!
//! Everything hangs off one [`BridgeContext`]: the boundary heap, the type
//! and class registries, the callback and external slot tables, and the
//! deferred reclamation queue. There are no globals; two contexts are fully
//! independent.
//!
//! ```
//! use std::rc::Rc;
//! use tether_abi::{HostValue, Word};
//! use tether_bridge::caller::Signature;
//! use tether_bridge::context::BridgeContext;
//! use tether_bridge::types::PolicySet;
//!
//! let mut ctx = BridgeContext::default();
//! ctx.register_standard_primitives().unwrap();
//!
//! let int32 = ctx.type_by_name("int32_t").unwrap().id();
//! let sig = Signature::new(int32, [int32, int32]);
//! ctx.bind_function(
//!     "add",
//!     &sig,
//!     Rc::new(|_ctx, words| Ok(Word::from_i64(words[0].as_i64() + words[1].as_i64()))),
//!     PolicySet::NONE,
//! )
//! .unwrap();
//!
//! let sum = ctx.call("add", &[HostValue::Int(2), HostValue::Int(3)]).unwrap();
//! assert_eq!(sum, HostValue::Int(5));
//! ```

pub mod caller;
pub mod class;
pub mod context;
pub mod gc;
pub mod reflect;
pub mod resource;
pub mod slots;
pub mod types;

pub use caller::{
    make_caller, make_callback_thunk, make_method_caller, CallbackThunk, HostThunk, MethodThunk,
    NativeFn, OverloadMap, OverloadSlot, Signature,
};
pub use class::{BindClass, ClassRegistry, MethodDef, MethodKind, PropertyDef, ValueClass};
pub use context::BridgeContext;
pub use gc::LightGc;
pub use reflect::{snapshot, Snapshot};
pub use resource::{list_resources, ResourceId, ResourceScope};
pub use slots::{CallbackTable, External, ExternalPayload, ExternalTable, SlotTable};
pub use types::{PolicySet, TypeFlags, TypeId, TypeKind, TypeTable, WireType, WireTypeRef};
