//! Builder-internal data model (§3 "Builder definition", "Builder instance",
//! "Builder Parameter"; §4.5).

use std::collections::HashMap;

use crate::common::Location;
use crate::config::AnchorId;
use crate::link::ComponentId;

/// Index of a [`Definition`] in [`Tables`]'s definition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DefinitionId(pub usize);

/// Index of an [`InstanceSlot`] in [`Tables`]'s instance table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(pub usize);

/// A named or anonymous component template: a class name plus an ordered
/// parameter map. Starts as a placeholder ("dummy": `defined == false`) the
/// first time something references its name before it has been written out,
/// and becomes `defined` once its `class:`/parameters are filled in (§4.8
/// "Builder definition slot" state machine).
#[derive(Debug)]
pub struct Definition {
    /// The name this definition was declared under, if any (anonymous
    /// inline definitions have none).
    pub name: Option<String>,
    /// Registered class string, set once `defined`.
    pub class: Option<String>,
    /// Parameters in declaration order.
    pub params: Vec<(String, Parameter)>,
    /// `false` while this is a forward-reference placeholder.
    pub defined: bool,
    /// Where this definition's mapping appeared (or a synthetic location
    /// for a dummy never filled, caught by the dangling-reference check).
    pub location: Location,
}

impl Definition {
    fn dummy(name: Option<String>) -> Self {
        Self {
            name,
            class: None,
            params: Vec::new(),
            defined: false,
            location: Location::synthetic(),
        }
    }
}

/// One slot in the instance table: an allocated (or not-yet-allocated)
/// component built from some [`Definition`].
///
/// There is deliberately no separate `defined` flag here: an instance is
/// "dangling" exactly when the [`Definition`] it points to never got filled
/// in, so the end-of-pass-1 check reads that through `definition` instead of
/// tracking a second bit that could drift out of sync with it.
#[derive(Debug)]
pub struct InstanceSlot {
    /// The YAML anchor this instance was created for, if it was created for
    /// an anchor rather than a root definition or a definition-reference
    /// materialized during wiring.
    pub anchor: Option<AnchorId>,
    /// Which definition this instance is built from.
    pub definition: DefinitionId,
    /// Set once the concrete component has been allocated and installed in
    /// the engine. Wiring (`configure`) and later lookups key off this: a
    /// shared anchor instance referenced from two different peers is
    /// allocated exactly once, the first time anyone asks for it.
    pub component: Option<ComponentId>,
}

impl InstanceSlot {
    fn new(definition: DefinitionId) -> Self {
        Self {
            anchor: None,
            definition,
            component: None,
        }
    }
}

/// A parameter value as stored in a [`Definition`]'s parameter map, prior to
/// being asked for by a component's typed accessors.
///
/// Scalars are kept as raw text rather than split into int/float/bool
/// variants at collection time — consistent with §4.4's "tokenized later...
/// not at parse time." Whether a bare scalar is actually a component
/// reference (§4.5's "strings become definition-references") is resolved
/// lazily, the first time some component's `configure()` asks for that key
/// through [`super::ConfigContext::component_reference`] rather than through
/// [`super::ConfigContext::string`] — the raw text is ambiguous between "a
/// plain string value" and "the name of a peer" until the consumer says
/// which one it wants (see `DESIGN.md`).
#[derive(Clone, Debug)]
pub enum Parameter {
    /// Raw scalar text; interpreted as int/float/bool/string/definition-name
    /// depending on which typed accessor reads it.
    Scalar(String, Location),
    /// A YAML alias (`*name`): a pointer to a single shared instance.
    InstanceRef(InstanceId, Location),
    /// An inline nested mapping: an anonymous definition, materialized into
    /// a fresh instance every time it is consumed as a component reference.
    DefinitionRef(DefinitionId, Location),
    /// A YAML sequence of parameters.
    Array(Vec<Parameter>, Location),
}

impl Parameter {
    /// The location this parameter's value came from.
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::Scalar(_, loc) | Self::InstanceRef(_, loc) | Self::DefinitionRef(_, loc) | Self::Array(_, loc) => loc,
        }
    }
}

/// The fully-resolved value of a parameter (§3 "ConfigValue"), produced by
/// [`super::ConfigContext::array`] for heterogeneous sequences where each
/// element's eventual type cannot be known from the parameter's key alone.
#[derive(Clone, Debug)]
pub enum ConfigValue {
    /// A signed integer.
    Integer(i64),
    /// A floating-point number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// A nested array.
    Array(Vec<ConfigValue>),
    /// A resolved, already-instantiated component.
    ComponentRef(ComponentId),
}

/// Tables of [`Definition`]s and [`InstanceSlot`]s, with name/anchor lookup
/// indices. Owned by [`super::Builder`]; split into its own type purely to
/// keep the borrow in [`super::ConfigContext`] focused.
#[derive(Debug, Default)]
pub struct Tables {
    defs: Vec<Definition>,
    name_to_def: HashMap<String, DefinitionId>,
    anchor_to_def: HashMap<AnchorId, DefinitionId>,
    instances: Vec<InstanceSlot>,
    anchor_to_instance: HashMap<AnchorId, InstanceId>,
}

impl Tables {
    /// Returns the id of the definition named `name`, creating an
    /// undefined placeholder if this is the first reference.
    pub fn get_or_create_named_definition(&mut self, name: &str) -> DefinitionId {
        if let Some(id) = self.name_to_def.get(name) {
            return *id;
        }
        let id = DefinitionId(self.defs.len());
        self.defs.push(Definition::dummy(Some(name.to_string())));
        self.name_to_def.insert(name.to_string(), id);
        id
    }

    /// Returns the id of the definition reserved for anchor `aid` (the
    /// pre-scan calls this for every anchored node before any parameter
    /// is translated, so aliases can resolve regardless of source order).
    pub fn get_or_create_anchor_definition(&mut self, aid: AnchorId) -> DefinitionId {
        if let Some(id) = self.anchor_to_def.get(&aid) {
            return *id;
        }
        let id = DefinitionId(self.defs.len());
        self.defs.push(Definition::dummy(None));
        self.anchor_to_def.insert(aid, id);
        id
    }

    /// Allocates a brand-new anonymous definition (never looked up by
    /// name or anchor), used for un-anchored inline nested mappings.
    pub fn create_anonymous_definition(&mut self) -> DefinitionId {
        let id = DefinitionId(self.defs.len());
        self.defs.push(Definition::dummy(None));
        id
    }

    /// Fills in a previously-reserved (or brand new) definition slot.
    /// Filling an already-`defined` slot is a double-definition error,
    /// reported by the caller using the name/location it has in hand.
    pub fn fill_definition(&mut self, id: DefinitionId, class: String, params: Vec<(String, Parameter)>, location: Location) -> bool {
        let def = &mut self.defs[id.0];
        if def.defined {
            return false;
        }
        def.class = Some(class);
        def.params = params;
        def.location = location;
        def.defined = true;
        true
    }

    /// Read-only access to a definition.
    #[must_use]
    pub fn definition(&self, id: DefinitionId) -> &Definition {
        &self.defs[id.0]
    }

    /// Every definition, for the end-of-pass-1 dangling-reference scan.
    #[must_use]
    pub fn definitions(&self) -> &[Definition] {
        &self.defs
    }

    /// Returns the id of the instance anchored `anchor`, creating an
    /// unallocated placeholder (backed by its pre-reserved definition) if
    /// this is the first reference.
    pub fn get_or_create_anchor_instance(&mut self, anchor: AnchorId) -> InstanceId {
        if let Some(id) = self.anchor_to_instance.get(&anchor) {
            return *id;
        }
        let definition = self.get_or_create_anchor_definition(anchor);
        let id = InstanceId(self.instances.len());
        let mut slot = InstanceSlot::new(definition);
        slot.anchor = Some(anchor);
        self.instances.push(slot);
        self.anchor_to_instance.insert(anchor, id);
        id
    }

    /// Allocates a brand-new instance slot of `definition`, not tied to any
    /// anchor: either a root instance, or a fresh private copy materialized
    /// for a definition-reference parameter.
    pub fn push_instance(&mut self, definition: DefinitionId) -> InstanceId {
        let id = InstanceId(self.instances.len());
        self.instances.push(InstanceSlot::new(definition));
        id
    }

    /// Read-only access to an instance slot.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> &InstanceSlot {
        &self.instances[id.0]
    }

    /// Records the concrete component allocated for instance `id`.
    pub fn set_instance_component(&mut self, id: InstanceId, component: ComponentId) {
        self.instances[id.0].component = Some(component);
    }

    /// Every instance, for the end-of-pass-1 dangling-anchor scan.
    #[must_use]
    pub fn instances(&self) -> &[InstanceSlot] {
        &self.instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_definition_is_a_dummy_until_filled() {
        let mut tables = Tables::default();
        let id = tables.get_or_create_named_definition("core1");
        assert!(!tables.definition(id).defined);

        assert!(tables.fill_definition(id, "SimpleCore".to_string(), Vec::new(), Location::synthetic()));
        assert!(tables.definition(id).defined);
    }

    #[test]
    fn the_same_name_always_resolves_to_the_same_definition_id() {
        let mut tables = Tables::default();
        let first = tables.get_or_create_named_definition("core1");
        let second = tables.get_or_create_named_definition("core1");
        assert_eq!(first, second);
    }

    #[test]
    fn filling_an_already_defined_definition_is_rejected() {
        let mut tables = Tables::default();
        let id = tables.get_or_create_named_definition("core1");
        assert!(tables.fill_definition(id, "SimpleCore".to_string(), Vec::new(), Location::synthetic()));
        assert!(!tables.fill_definition(id, "SimpleCore".to_string(), Vec::new(), Location::synthetic()));
    }

    #[test]
    fn same_anchor_always_resolves_to_the_same_instance() {
        let mut tables = Tables::default();
        let aid = AnchorId(7);
        let first = tables.get_or_create_anchor_instance(aid);
        let second = tables.get_or_create_anchor_instance(aid);
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_push_instance_calls_never_collide() {
        let mut tables = Tables::default();
        let def = tables.get_or_create_named_definition("mem");
        let a = tables.push_instance(def);
        let b = tables.push_instance(def);
        assert_ne!(a, b);
        assert_eq!(tables.instance(a).definition, tables.instance(b).definition);
    }
}
