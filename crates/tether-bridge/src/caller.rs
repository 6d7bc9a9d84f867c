//! Caller-generation engine
//!
//! Given a signature — an ordered list of wire type ids, return type first —
//! this module builds the invocation thunk for a native function, a native
//! method, or a host callback invoked from native code. Thunks are composed
//! closures built once per signature and cached by their owner (function
//! table, class method table, callback signature cache); they are never
//! regenerated per call.
//!
//! A signature with no conversion on any side and at most three parameters
//! takes the direct path: a fixed-size word buffer, no resource scope. The
//! three-argument cap is an engineering constant, not a model limit.
//! Everything else takes the converted path: write-convert each parameter,
//! acquire the signature's deduplicated resources, invoke, read-convert the
//! result, and release the resources on every exit path.

use std::rc::Rc;

use tether_abi::{BridgeError, BridgeResult, HostValue, InstanceRef, Word};

use rustc_hash::FxHashMap;

use crate::context::BridgeContext;
use crate::resource::{list_resources, ResourceId, ResourceScope};
use crate::types::{PolicySet, TypeId, WireTypeRef};

/// A native entry point: takes boundary words, returns a boundary word.
pub type NativeFn = Rc<dyn Fn(&mut BridgeContext, &[Word]) -> BridgeResult<Word>>;

/// Generated thunk for a free function.
pub type HostThunk = Rc<dyn Fn(&mut BridgeContext, &[HostValue]) -> BridgeResult<HostValue>>;

/// Generated thunk for a method; `None` receiver for static members.
pub type MethodThunk =
    Rc<dyn Fn(&mut BridgeContext, Option<&InstanceRef>, &[HostValue]) -> BridgeResult<HostValue>>;

/// Generated inverse thunk: native words in, host callback by slot handle,
/// boundary word out.
pub type CallbackThunk = Rc<dyn Fn(&mut BridgeContext, u32, &[Word]) -> BridgeResult<Word>>;

/// Direct-path arity cap (design constant, see module docs).
pub const DIRECT_ARITY_CAP: usize = 3;

/// An ordered list of wire types: return type first, then parameters.
///
/// For methods the implicit receiver pointer (and overload slot) are hidden
/// runtime arguments, not signature entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    types: Vec<TypeId>,
}

impl Signature {
    /// Build from a return type and parameter types.
    pub fn new(ret: TypeId, params: impl IntoIterator<Item = TypeId>) -> Self {
        let mut types = vec![ret];
        types.extend(params);
        Self { types }
    }

    /// Return type id
    pub fn ret(&self) -> TypeId {
        self.types[0]
    }

    /// Parameter type ids
    pub fn params(&self) -> &[TypeId] {
        &self.types[1..]
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.types.len() - 1
    }

    /// All type ids, return type first
    pub fn type_ids(&self) -> &[TypeId] {
        &self.types
    }
}

struct ResolvedSignature {
    ret: WireTypeRef,
    params: Vec<WireTypeRef>,
    resources: Vec<ResourceId>,
}

fn resolve(ctx: &BridgeContext, sig: &Signature) -> BridgeResult<ResolvedSignature> {
    // UnknownType here is fatal: without the type there is no safe way to
    // marshal a value for this call.
    let ret = ctx.type_by_id(sig.ret())?;
    let params = sig
        .params()
        .iter()
        .map(|id| ctx.type_by_id(*id))
        .collect::<BridgeResult<Vec<_>>>()?;
    let resources = list_resources(&params, &ret);
    Ok(ResolvedSignature {
        ret,
        params,
        resources,
    })
}

fn check_arity(expected: usize, got: usize) -> BridgeResult<()> {
    if expected != got {
        return Err(BridgeError::mismatch(
            format!("{expected} argument(s)"),
            format!("{got} argument(s)"),
        ));
    }
    Ok(())
}

fn convert_and_invoke(
    ctx: &mut BridgeContext,
    resolved: &ResolvedSignature,
    native: &NativeFn,
    lead: &[Word],
    args: &[HostValue],
    policies: PolicySet,
) -> BridgeResult<HostValue> {
    let mut words = Vec::with_capacity(lead.len() + args.len());
    words.extend_from_slice(lead);
    for (ty, arg) in resolved.params.iter().zip(args) {
        words.push(ty.write(ctx, arg, policies)?);
    }
    let raw = native(ctx, &words)?;
    resolved.ret.read(ctx, raw)
}

/// Build the invocation thunk for a free native function.
pub fn make_caller(
    ctx: &BridgeContext,
    sig: &Signature,
    native: NativeFn,
    policies: PolicySet,
) -> BridgeResult<HostThunk> {
    let resolved = resolve(ctx, sig)?;
    let arity = resolved.params.len();

    let direct = resolved.resources.is_empty()
        && arity <= DIRECT_ARITY_CAP
        && !resolved.ret.needs_conversion()
        && resolved.params.iter().all(|t| !t.needs_conversion());

    if direct {
        let thunk = move |ctx: &mut BridgeContext, args: &[HostValue]| {
            check_arity(arity, args.len())?;
            let mut words = [Word::ZERO; DIRECT_ARITY_CAP];
            for (i, arg) in args.iter().enumerate() {
                words[i] = resolved.params[i].write(ctx, arg, policies)?;
            }
            let raw = native(ctx, &words[..arity])?;
            resolved.ret.read(ctx, raw)
        };
        return Ok(Rc::new(thunk));
    }

    let thunk = move |ctx: &mut BridgeContext, args: &[HostValue]| {
        check_arity(arity, args.len())?;
        let scope = ResourceScope::acquire(&mut ctx.heap, &resolved.resources);
        let result = convert_and_invoke(ctx, &resolved, &native, &[], args, policies);
        // Release on every exit path, error or not
        scope.release(&mut ctx.heap);
        result
    };
    Ok(Rc::new(thunk))
}

/// Build the invocation thunk for a native method.
///
/// The receiver's raw pointer (and, when overloaded, the numeric overload
/// slot) are prepended as hidden leading words before the declared
/// parameters. Static methods take no receiver and no hidden words.
#[allow(clippy::too_many_arguments)]
pub fn make_method_caller(
    ctx: &BridgeContext,
    sig: &Signature,
    native: NativeFn,
    policies: PolicySet,
    is_static: bool,
    is_const: bool,
    overload_slot: Option<u32>,
) -> BridgeResult<MethodThunk> {
    let resolved = resolve(ctx, sig)?;
    let arity = resolved.params.len();

    let thunk = move |ctx: &mut BridgeContext,
                      receiver: Option<&InstanceRef>,
                      args: &[HostValue]| {
        check_arity(arity, args.len())?;
        let mut lead = Vec::with_capacity(2);
        if !is_static {
            let inst = receiver
                .ok_or_else(|| BridgeError::mismatch("instance receiver", "none"))?;
            let b = inst.borrow();
            if b.is_const() && !is_const {
                return Err(BridgeError::ConstViolation(format!(
                    "mutable method called on const {}",
                    b.class_name()
                )));
            }
            lead.push(Word::from_offset(b.ptr()?));
            if let Some(slot) = overload_slot {
                lead.push(Word::from_u64(slot as u64));
            }
        }
        let scope = ResourceScope::acquire(&mut ctx.heap, &resolved.resources);
        let result = convert_and_invoke(ctx, &resolved, &native, &lead, args, policies);
        scope.release(&mut ctx.heap);
        result
    };
    Ok(Rc::new(thunk))
}

/// Build the inverse thunk for a host callback invoked from native code:
/// read-convert the native argument words, invoke the host function by its
/// slot handle, write-convert the host return value.
pub fn make_callback_thunk(ctx: &BridgeContext, sig: &Signature) -> BridgeResult<CallbackThunk> {
    let resolved = resolve(ctx, sig)?;
    let arity = resolved.params.len();

    let thunk = move |ctx: &mut BridgeContext, handle: u32, words: &[Word]| {
        check_arity(arity, words.len())?;
        let mut args = Vec::with_capacity(arity);
        for (ty, word) in resolved.params.iter().zip(words) {
            args.push(ty.read(ctx, *word)?);
        }
        let f = ctx
            .callbacks
            .get(handle)
            .cloned()
            .ok_or(BridgeError::BadHandle(handle))?;
        let result = f(&args)?;
        resolved.ret.write(ctx, &result, PolicySet::NONE)
    };
    Ok(Rc::new(thunk))
}

// ============================================================================
// Overload dispatch
// ============================================================================

/// One bound name: either a single thunk annotated with its arity, or an
/// arity-keyed dispatch table once a second overload arrives. Arity is the
/// sole selection key — there is no type-based overload resolution.
#[derive(Clone)]
pub enum OverloadSlot<T> {
    /// Single overload, stored directly with its arity
    Single {
        /// Declared parameter count
        arity: usize,
        /// The thunk
        thunk: T,
    },
    /// Arity-keyed dispatcher
    Table(FxHashMap<usize, T>),
}

impl<T: Clone> OverloadSlot<T> {
    /// Create with a first overload
    pub fn single(arity: usize, thunk: T) -> Self {
        OverloadSlot::Single { arity, thunk }
    }

    /// Add an overload. A second registration converts the slot into a
    /// dispatch table; re-registering an existing arity replaces it.
    pub fn add(&mut self, arity: usize, thunk: T) {
        match self {
            OverloadSlot::Single {
                arity: existing_arity,
                thunk: existing,
            } => {
                let mut table = FxHashMap::default();
                table.insert(*existing_arity, existing.clone());
                table.insert(arity, thunk);
                *self = OverloadSlot::Table(table);
            }
            OverloadSlot::Table(table) => {
                table.insert(arity, thunk);
            }
        }
    }

    /// Select the overload for a runtime argument count.
    pub fn resolve(&self, name: &str, arity: usize) -> BridgeResult<T> {
        match self {
            OverloadSlot::Single {
                arity: expected,
                thunk,
            } if *expected == arity => Ok(thunk.clone()),
            OverloadSlot::Table(table) => table.get(&arity).cloned().ok_or_else(|| {
                BridgeError::NoMatchingOverload {
                    name: name.to_string(),
                    arity,
                }
            }),
            _ => Err(BridgeError::NoMatchingOverload {
                name: name.to_string(),
                arity,
            }),
        }
    }

    /// Registered arities in unspecified order
    pub fn arities(&self) -> Vec<usize> {
        match self {
            OverloadSlot::Single { arity, .. } => vec![*arity],
            OverloadSlot::Table(table) => table.keys().copied().collect(),
        }
    }
}

/// Name → overload slot map: the global export surface for free functions,
/// and the per-class dispatch tables for methods.
pub struct OverloadMap<T> {
    entries: FxHashMap<String, OverloadSlot<T>>,
}

impl<T: Clone> Default for OverloadMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OverloadMap<T> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Bind a thunk under a name and arity.
    pub fn add_overload(&mut self, name: &str, arity: usize, thunk: T) {
        match self.entries.get_mut(name) {
            Some(slot) => slot.add(arity, thunk),
            None => {
                self.entries
                    .insert(name.to_string(), OverloadSlot::single(arity, thunk));
            }
        }
    }

    /// Select the thunk for a name and runtime argument count.
    pub fn resolve(&self, name: &str, arity: usize) -> BridgeResult<T> {
        let slot = self
            .entries
            .get(name)
            .ok_or_else(|| BridgeError::NoMatchingOverload {
                name: name.to_string(),
                arity,
            })?;
        slot.resolve(name, arity)
    }

    /// Check whether a name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of bound names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no names are bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
