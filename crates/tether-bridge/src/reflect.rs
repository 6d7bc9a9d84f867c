//! Binding reflection
//!
//! A serializable snapshot of everything a context has bound: wire types
//! with their kinds and flag words, classes with their supers, methods,
//! and properties. Hosts use this to generate typings or inspect a module
//! without calling into it. Output ordering is deterministic (ascending
//! ids) so snapshots diff cleanly.

use serde::Serialize;

use crate::class::MethodKind;
use crate::context::BridgeContext;
use tether_abi::BridgeResult;

/// One registered wire type.
#[derive(Debug, Serialize)]
pub struct TypeEntry {
    /// Numeric type id
    pub id: u32,
    /// Canonical name
    pub name: String,
    /// Structural kind
    pub kind: &'static str,
    /// Raw subkind flag bits
    pub flags: u16,
    /// Element stride in bytes
    pub stride: u32,
}

/// One bound method (own, not inherited).
#[derive(Debug, Serialize)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// `"instance"` or `"static"`
    pub kind: &'static str,
    /// Callable on const receivers
    pub is_const: bool,
    /// Return wire-type name
    pub returns: String,
    /// Parameter wire-type names
    pub params: Vec<String>,
    /// Active conversion policy names
    pub policies: Vec<&'static str>,
}

/// One property accessor's resolved signature.
#[derive(Debug, Serialize)]
pub struct AccessorEntry {
    /// Return wire-type name
    pub returns: String,
    /// Parameter wire-type names
    pub params: Vec<String>,
}

/// One bound property.
#[derive(Debug, Serialize)]
pub struct PropertyEntry {
    /// Property name
    pub name: String,
    /// Getter signature, absent when write-only
    pub read: Option<AccessorEntry>,
    /// Setter signature, absent when read-only
    pub write: Option<AccessorEntry>,
}

/// One bound class.
#[derive(Debug, Serialize)]
pub struct ClassEntry {
    /// Numeric class id
    pub id: u32,
    /// Class name
    pub name: String,
    /// Superclass names, in declaration order
    pub supers: Vec<String>,
    /// Whether a constructor is bound
    pub constructible: bool,
    /// Own methods (inherited members are derivable from `supers`)
    pub methods: Vec<MethodEntry>,
    /// Own properties
    pub properties: Vec<PropertyEntry>,
}

/// Full reflection snapshot of one context.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    /// Registered wire types, ascending by id
    pub types: Vec<TypeEntry>,
    /// Bound classes, ascending by id
    pub classes: Vec<ClassEntry>,
}

fn resolve_accessor(
    ctx: &BridgeContext,
    sig: &crate::caller::Signature,
) -> BridgeResult<AccessorEntry> {
    let returns = ctx.type_by_id(sig.ret())?.name().to_string();
    let params = sig
        .params()
        .iter()
        .map(|p| Ok(ctx.type_by_id(*p)?.name().to_string()))
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(AccessorEntry { returns, params })
}

/// Capture a snapshot of the context's bindings.
pub fn snapshot(ctx: &BridgeContext) -> BridgeResult<Snapshot> {
    let types = ctx
        .types
        .iter_sorted()
        .into_iter()
        .map(|ty| TypeEntry {
            id: ty.id().0,
            name: ty.name().to_string(),
            kind: ty.kind().name(),
            flags: ty.flags().bits(),
            stride: ty.stride(),
        })
        .collect();

    let mut classes = Vec::new();
    for id in ctx.classes.ids_sorted() {
        let class = ctx.classes.get(id)?;
        let supers = class
            .supers()
            .iter()
            .map(|sup| Ok(ctx.classes.get(*sup)?.name().to_string()))
            .collect::<BridgeResult<Vec<_>>>()?;
        let methods = class
            .own_methods()
            .iter()
            .map(|def| {
                let AccessorEntry { returns, params } = resolve_accessor(ctx, &def.sig)?;
                Ok(MethodEntry {
                    name: def.name.clone(),
                    kind: match def.kind {
                        MethodKind::Instance => "instance",
                        MethodKind::Static => "static",
                    },
                    is_const: def.is_const,
                    returns,
                    params,
                    policies: def.policies.names(),
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;
        let mut properties = Vec::new();
        for prop in class.properties() {
            let read = prop
                .read_sig
                .as_ref()
                .map(|sig| resolve_accessor(ctx, sig))
                .transpose()?;
            let write = prop
                .write_sig
                .as_ref()
                .map(|sig| resolve_accessor(ctx, sig))
                .transpose()?;
            properties.push(PropertyEntry {
                name: prop.name.clone(),
                read,
                write,
            });
        }
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        classes.push(ClassEntry {
            id,
            name: class.name().to_string(),
            supers,
            constructible: class.has_constructor(),
            methods,
            properties,
        });
    }

    Ok(Snapshot { types, classes })
}
