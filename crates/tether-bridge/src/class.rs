//! Class binding and inheritance
//!
//! A bound class owns its method and property tables while in the
//! *registered* state; `finish` computes the flat per-class dispatch table
//! and marks it *finished*, recursively finishing superclasses first.
//!
//! Dispatch merging models single-chain wrapper inheritance over a
//! multiple-inheritance native graph: instance methods are inherited along
//! the chain of first superclasses only, while every other ancestor
//! contributes its static members. This asymmetry is intentional — native
//! dispatch resolves instance calls on secondary bases itself — and is
//! preserved exactly.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tether_abi::{BridgeError, BridgeResult, HostValue};

use crate::caller::{HostThunk, MethodThunk, NativeFn, OverloadSlot, Signature};
use crate::context::BridgeContext;
use crate::types::PolicySet;

/// Whether a method dispatches on an instance or on the class itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Dispatches on an instance receiver
    Instance,
    /// Class-level member, no receiver
    Static,
}

/// One bound method overload.
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Signature (return type first)
    pub sig: Signature,
    /// Instance or static
    pub kind: MethodKind,
    /// Per-call-site conversion policies
    pub policies: PolicySet,
    /// Callable on const receivers
    pub is_const: bool,
    /// The generated thunk
    pub thunk: MethodThunk,
}

/// A bound property: optional read and write accessors.
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Getter signature, when readable
    pub read_sig: Option<Signature>,
    /// Setter signature, when writable
    pub write_sig: Option<Signature>,
    /// Getter thunk
    pub getter: Option<MethodThunk>,
    /// Setter thunk
    pub setter: Option<MethodThunk>,
}

/// Merged dispatch entry computed at finish time.
#[derive(Clone)]
pub struct DispatchEntry {
    /// Instance or static
    pub kind: MethodKind,
    /// Arity-keyed overloads
    pub overloads: OverloadSlot<MethodThunk>,
}

/// Host-side value class: explicit constructors copying a value object
/// across the boundary in each direction.
#[derive(Clone)]
pub struct ValueClass {
    /// Boundary offset → host value
    pub from_wire: Rc<dyn Fn(&mut BridgeContext, u32) -> BridgeResult<HostValue>>,
    /// Host value → boundary offset
    pub to_wire: Rc<dyn Fn(&mut BridgeContext, &HostValue) -> BridgeResult<u32>>,
}

/// A native class bound to the host.
pub struct BindClass {
    id: u32,
    name: String,
    supers: Vec<u32>,
    own_methods: Vec<MethodDef>,
    properties: FxHashMap<String, PropertyDef>,
    constructor: Option<OverloadSlot<HostThunk>>,
    destructor: Option<NativeFn>,
    finished: bool,
    dispatch: FxHashMap<String, DispatchEntry>,
}

impl BindClass {
    /// Create a class in the *registered* state.
    pub fn new(id: u32, name: impl Into<String>, supers: Vec<u32>) -> Self {
        Self {
            id,
            name: name.into(),
            supers,
            own_methods: Vec::new(),
            properties: FxHashMap::default(),
            constructor: None,
            destructor: None,
            finished: false,
            dispatch: FxHashMap::default(),
        }
    }

    /// Class id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared superclass ids, in declaration order
    pub fn supers(&self) -> &[u32] {
        &self.supers
    }

    /// True once the dispatch table has been computed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The class's own (non-inherited) methods
    pub fn own_methods(&self) -> &[MethodDef] {
        &self.own_methods
    }

    /// The class's own properties
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.values()
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// Destructor entry point, when bound
    pub fn destructor(&self) -> Option<&NativeFn> {
        self.destructor.as_ref()
    }

    /// Merged dispatch entry for a method name (valid after finish)
    pub fn dispatch(&self, name: &str) -> Option<&DispatchEntry> {
        self.dispatch.get(name)
    }

    /// Merged dispatch names (valid after finish)
    pub fn dispatch_names(&self) -> impl Iterator<Item = &str> {
        self.dispatch.keys().map(|s| s.as_str())
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.finished {
            return Err(BridgeError::DuplicateRegistration(format!(
                "class '{}' is already finished",
                self.name
            )));
        }
        Ok(())
    }

    /// Append a method to the class's own table. Inherited members are not
    /// visible here; they join the dispatch table at finish.
    pub fn register_method(&mut self, def: MethodDef) -> BridgeResult<()> {
        self.ensure_open()?;
        self.own_methods.push(def);
        Ok(())
    }

    /// Register a property accessor pair.
    pub fn register_property(&mut self, def: PropertyDef) -> BridgeResult<()> {
        self.ensure_open()?;
        if self.properties.contains_key(&def.name) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "property '{}' on class '{}'",
                def.name, self.name
            )));
        }
        self.properties.insert(def.name.clone(), def);
        Ok(())
    }

    /// Add a constructor overload.
    pub fn register_constructor(&mut self, arity: usize, thunk: HostThunk) -> BridgeResult<()> {
        self.ensure_open()?;
        match &mut self.constructor {
            Some(slot) => slot.add(arity, thunk),
            None => self.constructor = Some(OverloadSlot::single(arity, thunk)),
        }
        Ok(())
    }

    /// Bind the destructor entry point.
    pub fn set_destructor(&mut self, native: NativeFn) -> BridgeResult<()> {
        self.ensure_open()?;
        self.destructor = Some(native);
        Ok(())
    }

    /// True when at least one constructor overload is bound
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Resolve a constructor overload by argument count.
    pub fn constructor(&self, arity: usize) -> BridgeResult<HostThunk> {
        let slot = self
            .constructor
            .as_ref()
            .ok_or_else(|| BridgeError::NoMatchingOverload {
                name: format!("{}::new", self.name),
                arity,
            })?;
        slot.resolve(&format!("{}::new", self.name), arity)
    }
}

/// Registry of bound classes and host value classes.
#[derive(Default)]
pub struct ClassRegistry {
    by_id: FxHashMap<u32, BindClass>,
    by_name: FxHashMap<String, u32>,
    value_classes: FxHashMap<String, ValueClass>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class. Its id and name must both be unused.
    pub fn register(&mut self, class: BindClass) -> BridgeResult<()> {
        if self.by_id.contains_key(&class.id) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "class id {} already registered",
                class.id
            )));
        }
        if self.by_name.contains_key(&class.name) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "class name '{}' already registered",
                class.name
            )));
        }
        self.by_name.insert(class.name.clone(), class.id);
        self.by_id.insert(class.id, class);
        Ok(())
    }

    /// Look up a class by id.
    pub fn get(&self, id: u32) -> BridgeResult<&BindClass> {
        self.by_id
            .get(&id)
            .ok_or_else(|| BridgeError::UnknownClass(format!("#{id}")))
    }

    /// Look up a class mutably by id.
    pub fn get_mut(&mut self, id: u32) -> BridgeResult<&mut BindClass> {
        self.by_id
            .get_mut(&id)
            .ok_or_else(|| BridgeError::UnknownClass(format!("#{id}")))
    }

    /// Look up a class by name.
    pub fn get_by_name(&self, name: &str) -> BridgeResult<&BindClass> {
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| BridgeError::UnknownClass(name.to_string()))?;
        self.get(*id)
    }

    /// Registered class ids in ascending order (reflection output)
    pub fn ids_sorted(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True when `sub` lists `ancestor` anywhere in its inheritance graph.
    pub fn derives_from(&self, sub: u32, ancestor: u32) -> bool {
        if sub == ancestor {
            return true;
        }
        let Some(class) = self.by_id.get(&sub) else {
            return false;
        };
        class.supers.iter().any(|s| self.derives_from(*s, ancestor))
    }

    /// Register a host value class under its native class name.
    pub fn register_value_class(&mut self, name: &str, vc: ValueClass) -> BridgeResult<()> {
        if self.value_classes.contains_key(name) {
            return Err(BridgeError::DuplicateRegistration(format!(
                "value class '{name}'"
            )));
        }
        self.value_classes.insert(name.to_string(), vc);
        Ok(())
    }

    /// Look up the host value class for a native class name.
    pub fn value_class(&self, name: &str) -> BridgeResult<ValueClass> {
        self.value_classes
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::MissingValueClass(name.to_string()))
    }

    /// Finish a class: recursively finish unfinished superclasses first,
    /// then compute the flat dispatch table. Idempotent.
    pub fn finish(&mut self, id: u32) -> BridgeResult<()> {
        let mut visited = FxHashSet::default();
        self.finish_inner(id, &mut visited)
    }

    /// Finish every registered class.
    pub fn finish_all(&mut self) -> BridgeResult<()> {
        for id in self.ids_sorted() {
            self.finish(id)?;
        }
        Ok(())
    }

    fn finish_inner(&mut self, id: u32, visited: &mut FxHashSet<String>) -> BridgeResult<()> {
        let (name, supers, finished) = {
            let class = self.get(id)?;
            (class.name.clone(), class.supers.clone(), class.finished)
        };
        if finished {
            return Ok(());
        }
        // Visited set keyed by class name breaks inheritance cycles
        if !visited.insert(name) {
            return Ok(());
        }
        for sup in &supers {
            self.finish_inner(*sup, visited)?;
        }

        let mut dispatch = FxHashMap::default();
        let mut owners: FxHashMap<String, u32> = FxHashMap::default();
        let mut seen = FxHashSet::default();
        self.merge_into(&mut dispatch, &mut owners, &mut seen, id, true)?;

        let class = self.get_mut(id)?;
        class.dispatch = dispatch;
        class.finished = true;
        Ok(())
    }

    /// Depth-first merge, each class visited at most once (guarded by name).
    /// `instance_ok` is carried only along the chain of first superclasses;
    /// every other ancestor contributes static members only.
    fn merge_into(
        &self,
        dispatch: &mut FxHashMap<String, DispatchEntry>,
        owners: &mut FxHashMap<String, u32>,
        seen: &mut FxHashSet<String>,
        id: u32,
        instance_ok: bool,
    ) -> BridgeResult<()> {
        let class = self.get(id)?;
        if !seen.insert(class.name.clone()) {
            return Ok(());
        }
        for def in &class.own_methods {
            if def.kind == MethodKind::Instance && !instance_ok {
                continue;
            }
            match owners.get(&def.name) {
                // A closer class already claimed this name: shadowed
                Some(owner) if *owner != id => continue,
                _ => {}
            }
            owners.insert(def.name.clone(), id);
            let arity = def.sig.arity();
            match dispatch.get_mut(&def.name) {
                Some(entry) => entry.overloads.add(arity, def.thunk.clone()),
                None => {
                    dispatch.insert(
                        def.name.clone(),
                        DispatchEntry {
                            kind: def.kind,
                            overloads: OverloadSlot::single(arity, def.thunk.clone()),
                        },
                    );
                }
            }
        }
        for (index, sup) in class.supers.iter().enumerate() {
            self.merge_into(dispatch, owners, seen, *sup, instance_ok && index == 0)?;
        }
        Ok(())
    }
}
