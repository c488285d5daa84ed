//! The configuration → component graph builder (§4.5).
//!
//! Four passes over the parsed YAML tree:
//!
//! 1. **collect** — pre-scan every anchor in the tree, then walk the
//!    top-level mapping, filling in a [`model::Definition`] (and a root
//!    [`model::InstanceSlot`]) for each entry; translate every parameter
//!    value into a [`model::Parameter`]; check for dangling references.
//! 2. **instantiate + wire** — for each root instance not already
//!    materialized, allocate its component via the [`ClassRegistry`] and
//!    call `configure()`. A component reached through an alias or a
//!    definition-reference parameter during another instance's wiring is
//!    materialized lazily, on first reference, by [`ConfigContext`] itself —
//!    so by the time this pass reaches it as a root, it may already exist.
//! 3. **finalize** — [`crate::engine::Engine::finish_build`] calls every
//!    installed component's `finish_setup()` once, in installation order.
//!
//! Forward references (an instance naming a peer defined later in the file)
//! and shared anchors (two instances naming the same `*alias`) both fall out
//! of this scheme for free: a reference is resolved by id, not by source
//! position, and an instance is materialized at most once no matter how many
//! parameters point at it.

mod model;
mod registry;

pub use model::{ConfigValue, DefinitionId, InstanceId, Parameter};
pub use registry::{ClassRegistry, Factory};

use crate::common::{Location, SimError, SimResult};
use crate::config::{YamlNode, YamlValue};
use crate::engine::Engine;
use crate::link::ComponentId;
use model::Tables;

/// Top-level key introducing an anonymous root instance.
const INSTANTIATE_KEY: &str = "instantiate";
/// Top-level (and nested, inside `include:`) key listing files to splice in;
/// already resolved away by [`crate::config::load_file`] before the builder
/// ever sees the tree, but skipped defensively if it survives.
const INCLUDE_KEY: &str = "include";
/// Reserved parameter key naming a definition's component class.
const CLASS_KEY: &str = "class";

/// Drives the four-pass build described in the module docs, consuming a
/// parsed configuration tree and populating an [`Engine`].
pub struct Builder<'a> {
    tables: Tables,
    registry: &'a ClassRegistry,
    roots: Vec<(String, InstanceId)>,
}

impl<'a> Builder<'a> {
    /// Runs the full build: parses `root` (already include-resolved) into
    /// definitions/instances, instantiates and wires every root, and leaves
    /// `engine` ready for [`Engine::finish_build`].
    pub fn build(root: &YamlNode, registry: &'a ClassRegistry, engine: &mut Engine) -> SimResult<()> {
        let mut builder = Self {
            tables: Tables::default(),
            registry,
            roots: Vec::new(),
        };
        builder.collect(root)?;
        builder.check_dangling()?;
        builder.instantiate_roots(engine)?;
        Ok(())
    }

    fn collect(&mut self, root: &YamlNode) -> SimResult<()> {
        let Some(entries) = root.as_mapping() else {
            return Err(SimError::semantic(root.location.clone(), "<root>", "configuration root must be a mapping"));
        };

        prescan_anchors(root, &mut self.tables);

        for (key, value) in entries {
            if key == INCLUDE_KEY {
                continue;
            }
            if key == INSTANTIATE_KEY {
                let def_id = self.translate_definition_value(value, None)?;
                let instance = self.tables.push_instance(def_id);
                self.roots.push((INSTANTIATE_KEY.to_string(), instance));
                continue;
            }

            let def_id = if let Some(anchor) = value.anchor {
                self.tables.get_or_create_anchor_definition(anchor)
            } else {
                self.tables.get_or_create_named_definition(key)
            };
            self.fill_named_definition(def_id, key, value)?;

            let instance = if let Some(anchor) = value.anchor {
                self.tables.get_or_create_anchor_instance(anchor)
            } else {
                self.tables.push_instance(def_id)
            };
            self.roots.push((key.clone(), instance));
        }

        Ok(())
    }

    /// Fills the definition for a named (`name: {class: ..., ...}`)
    /// top-level entry. Errors if `def_id` was already filled (double
    /// definition — two top-level keys sharing a name is impossible in a
    /// YAML mapping, but two anchored nodes both claiming the same anchor
    /// is not).
    fn fill_named_definition(&mut self, def_id: DefinitionId, name: &str, node: &YamlNode) -> SimResult<()> {
        let Some(entries) = node.as_mapping() else {
            return Err(SimError::semantic(node.location.clone(), name, "definition must be a mapping"));
        };
        let class = entries
            .iter()
            .find(|(k, _)| k == CLASS_KEY)
            .and_then(|(_, v)| v.as_scalar())
            .ok_or_else(|| SimError::semantic(node.location.clone(), name, "missing required \"class\" key"))?
            .to_string();

        let mut params = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if key == CLASS_KEY {
                continue;
            }
            params.push((key.clone(), self.translate_parameter(value)?));
        }

        if !self.tables.fill_definition(def_id, class, params, node.location.clone()) {
            return Err(SimError::semantic(node.location.clone(), name, "definition is declared more than once"));
        }
        Ok(())
    }

    /// Translates an inline definition value (used for `instantiate:`'s
    /// mapping form, and recursively for nested inline mappings): either a
    /// bare string naming an existing/forward-declared definition, or an
    /// inline mapping describing a fresh (possibly anchored) one.
    fn translate_definition_value(&mut self, node: &YamlNode, name: Option<&str>) -> SimResult<DefinitionId> {
        match &node.value {
            YamlValue::Scalar(text) => Ok(self.tables.get_or_create_named_definition(text)),
            YamlValue::Mapping(_) => {
                let def_id = if let Some(anchor) = node.anchor {
                    self.tables.get_or_create_anchor_definition(anchor)
                } else {
                    self.tables.create_anonymous_definition()
                };
                self.fill_named_definition(def_id, name.unwrap_or(INSTANTIATE_KEY), node)?;
                Ok(def_id)
            }
            YamlValue::Alias(_) | YamlValue::Array(_) => Err(SimError::semantic(
                node.location.clone(),
                name.unwrap_or(INSTANTIATE_KEY),
                "expected a definition name or an inline mapping",
            )),
        }
    }

    fn translate_parameter(&mut self, node: &YamlNode) -> SimResult<Parameter> {
        match &node.value {
            YamlValue::Scalar(text) => Ok(Parameter::Scalar(text.clone(), node.location.clone())),
            YamlValue::Alias(anchor) => Ok(Parameter::InstanceRef(self.tables.get_or_create_anchor_instance(*anchor), node.location.clone())),
            YamlValue::Mapping(_) => {
                let def_id = if let Some(anchor) = node.anchor {
                    self.tables.get_or_create_anchor_definition(anchor)
                } else {
                    self.tables.create_anonymous_definition()
                };
                self.fill_named_definition(def_id, "<inline>", node)?;
                Ok(Parameter::DefinitionRef(def_id, node.location.clone()))
            }
            YamlValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.translate_parameter(item)?);
                }
                Ok(Parameter::Array(out, node.location.clone()))
            }
        }
    }

    /// Every definition and anchor-backed instance must be filled in by now;
    /// anything still a placeholder is a dangling reference (§4.5).
    fn check_dangling(&self) -> SimResult<()> {
        for def in self.tables.definitions() {
            if !def.defined {
                let name = def.name.clone().unwrap_or_else(|| "<anchor>".to_string());
                return Err(SimError::semantic(def.location.clone(), name, "referenced but never defined"));
            }
        }
        Ok(())
    }

    fn instantiate_roots(&mut self, engine: &mut Engine) -> SimResult<()> {
        let roots = std::mem::take(&mut self.roots);
        for (name, instance) in &roots {
            if self.tables.instance(*instance).component.is_some() {
                continue;
            }
            self.allocate_and_configure(*instance, name, engine)?;
        }
        self.roots = roots;
        Ok(())
    }

    /// Allocates the concrete component for `instance` (if not already
    /// allocated), installs it in `engine`, and calls its `configure()`.
    /// Reused both by the root-instantiation loop and by
    /// [`ConfigContext::component_reference`] for lazily-materialized peers.
    fn allocate_and_configure(&mut self, instance: InstanceId, name: &str, engine: &mut Engine) -> SimResult<ComponentId> {
        if let Some(cid) = self.tables.instance(instance).component {
            return Ok(cid);
        }

        let def_id = self.tables.instance(instance).definition;
        let def = self.tables.definition(def_id);
        let class = def.class.clone().expect("instance's definition is checked defined before instantiate_roots runs");
        let location = def.location.clone();

        let factory = self
            .registry
            .lookup(&class)
            .ok_or_else(|| SimError::build(name, format!("unknown component class {class:?}")))?;

        let component = factory();
        let cid = engine.reserve_component();
        let display_name = if name == INSTANTIATE_KEY || name == "<inline>" {
            format!("{class}#{}", cid.0)
        } else {
            name.to_string()
        };
        engine.install_component(cid, display_name.clone(), component);
        self.tables.set_instance_component(instance, cid);

        let mut component = engine.take_component(cid);
        let mut ctx = ConfigContext {
            definition: def_id,
            location,
            self_id: cid,
            self_name: display_name,
            tables: &mut self.tables,
            registry: self.registry,
            engine: &mut *engine,
        };
        let result = component.configure(&mut ctx);
        engine.give_back_component(cid, component);
        result?;

        Ok(cid)
    }
}

/// Walks the whole tree once, reserving a definition id for every anchored
/// node, before any parameter is translated — so an alias referencing an
/// anchor that appears later in the file still resolves (§4.5 "anchors
/// resolved via pre-scanning").
fn prescan_anchors(node: &YamlNode, tables: &mut Tables) {
    if let Some(anchor) = node.anchor {
        tables.get_or_create_anchor_definition(anchor);
    }
    match &node.value {
        YamlValue::Mapping(entries) => {
            for (_, child) in entries {
                prescan_anchors(child, tables);
            }
        }
        YamlValue::Array(items) => {
            for item in items {
                prescan_anchors(item, tables);
            }
        }
        YamlValue::Scalar(_) | YamlValue::Alias(_) => {}
    }
}

/// The typed view a [`crate::link::Component::configure`] implementation
/// gets onto its own parameters, plus the ability to connect to peers.
///
/// Borrows the builder's tables and the engine for the duration of one
/// `configure()` call; resolving a `component_reference` may recursively
/// materialize (allocate + configure) other instances through the same
/// borrow, which is exactly how forward references and shared anchors both
/// resolve without a second pass.
pub struct ConfigContext<'b> {
    definition: DefinitionId,
    location: Location,
    self_id: ComponentId,
    self_name: String,
    tables: &'b mut Tables,
    registry: &'b ClassRegistry,
    engine: &'b mut Engine,
}

impl ConfigContext<'_> {
    fn find(&self, key: &str) -> Option<&Parameter> {
        self.tables.definition(self.definition).params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn missing(&self, key: &str) -> SimError {
        SimError::semantic(self.location.clone(), key, "missing required parameter")
    }

    /// This component's own id, for logging or self-registration (e.g. a
    /// fetcher registering itself as a fetch source with the engine).
    #[must_use]
    pub fn self_id(&self) -> ComponentId {
        self.self_id
    }

    /// This component's display name (its definition's key, or a
    /// synthesized `Class#id` for an anonymous instance).
    #[must_use]
    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    /// Connects `self` to `owner` as the peer, requesting `kind`-typed
    /// traffic with the given per-bank ring capacity. Delegates to
    /// [`crate::link::connect`], which rejects a kind mismatch.
    pub fn connect(&mut self, owner: ComponentId, kind: crate::link::MessageKind, capacity: usize) -> SimResult<crate::link::ConnectionId> {
        let owner_kind = self.engine.message_kind_of(owner);
        crate::link::connect(self.engine.conns_mut(), owner, owner_kind, self.self_id, kind, capacity, &self.location, &self.self_name)
    }

    /// Connects `self` directly to [`crate::link::ENGINE`] as a fetch
    /// source. Bypasses [`Self::connect`]'s kind check: the engine is not
    /// stored as a `Box<dyn Component>` (index `0` is reserved and never
    /// installed, see `engine::Engine::new`), so `message_kind_of(ENGINE)`
    /// is not callable — its connections are always [`crate::link::MessageKind::Fetch`]
    /// by construction.
    pub fn connect_fetch_source(&mut self, capacity: usize) -> crate::link::ConnectionId {
        self.engine.conns_mut().allocate(crate::link::ENGINE, self.self_id, capacity, crate::link::MessageKind::Fetch)
    }

    /// Registers connection `conn` as a fetch source for thread `tid`,
    /// forwarding to [`Engine::register_fetch_source`]. Used by the fetcher
    /// component.
    pub fn register_fetch_source(&mut self, conn: crate::link::ConnectionId, tid: usize) {
        self.engine.register_fetch_source(conn, tid);
    }

    fn scalar(&self, key: &str) -> SimResult<Option<&str>> {
        match self.find(key) {
            None => Ok(None),
            Some(Parameter::Scalar(text, _)) => Ok(Some(text.as_str())),
            Some(other) => Err(SimError::semantic(other.location().clone(), key, "expected a plain scalar value")),
        }
    }

    /// Reads a required or optional boolean parameter (`true`/`false`,
    /// `yes`/`no`, `1`/`0`).
    pub fn boolean(&self, key: &str, default: Option<bool>) -> SimResult<bool> {
        match self.scalar(key)? {
            Some(text) => parse_bool(text).ok_or_else(|| SimError::semantic(self.location.clone(), key, format!("{text:?} is not a boolean"))),
            None => default.ok_or_else(|| self.missing(key)),
        }
    }

    /// Reads a required or optional signed-integer parameter.
    pub fn integer(&self, key: &str, default: Option<i64>) -> SimResult<i64> {
        match self.scalar(key)? {
            Some(text) => text.parse().map_err(|_| SimError::semantic(self.location.clone(), key, format!("{text:?} is not an integer"))),
            None => default.ok_or_else(|| self.missing(key)),
        }
    }

    /// Reads a required or optional floating-point parameter.
    pub fn floating(&self, key: &str, default: Option<f64>) -> SimResult<f64> {
        match self.scalar(key)? {
            Some(text) => text.parse().map_err(|_| SimError::semantic(self.location.clone(), key, format!("{text:?} is not a number"))),
            None => default.ok_or_else(|| self.missing(key)),
        }
    }

    /// Reads a required or optional string parameter.
    pub fn string(&self, key: &str, default: Option<&str>) -> SimResult<String> {
        match self.scalar(key)? {
            Some(text) => Ok(text.to_string()),
            None => default.map(str::to_string).ok_or_else(|| self.missing(key)),
        }
    }

    /// Resolves `key` as a reference to another component, materializing it
    /// if this is the first time anyone has asked for it. Bare scalar text
    /// is treated as a definition name (a fresh private instance is built
    /// every time); a YAML alias always resolves to the single shared
    /// instance anchored at that point; an inline mapping is a fresh
    /// anonymous instance built on the spot.
    pub fn component_reference(&mut self, key: &str) -> SimResult<ComponentId> {
        let required = self
            .find(key)
            .ok_or_else(|| self.missing(key))?
            .clone();
        self.resolve_reference(&required, key)
    }

    /// Like [`Self::component_reference`], but returns `None` rather than
    /// erroring when `key` is absent.
    pub fn optional_component_reference(&mut self, key: &str) -> SimResult<Option<ComponentId>> {
        let Some(param) = self.find(key).cloned() else {
            return Ok(None);
        };
        self.resolve_reference(&param, key).map(Some)
    }

    fn resolve_reference(&mut self, param: &Parameter, key: &str) -> SimResult<ComponentId> {
        match param {
            Parameter::Scalar(name, loc) => {
                let def_id = self.tables.get_or_create_named_definition(name);
                if !self.tables.definition(def_id).defined {
                    return Err(SimError::semantic(loc.clone(), key, format!("references undefined component {name:?}")));
                }
                let instance = self.tables.push_instance(def_id);
                self.materialize(instance, name)
            }
            Parameter::DefinitionRef(def_id, _) => {
                let class = self.tables.definition(*def_id).class.clone().unwrap_or_default();
                let instance = self.tables.push_instance(*def_id);
                self.materialize(instance, &class)
            }
            Parameter::InstanceRef(instance, _) => {
                let name = format!("<shared:{}>", instance.0);
                self.materialize(*instance, &name)
            }
            Parameter::Array(_, loc) => Err(SimError::semantic(loc.clone(), key, "expected a single component reference, found an array")),
        }
    }

    fn materialize(&mut self, instance: InstanceId, name: &str) -> SimResult<ComponentId> {
        if let Some(cid) = self.tables.instance(instance).component {
            return Ok(cid);
        }

        let def_id = self.tables.instance(instance).definition;
        let def = self.tables.definition(def_id);
        if !def.defined {
            return Err(SimError::build(name, "referenced component's definition was never filled in"));
        }
        let class = def.class.clone().unwrap();
        let location = def.location.clone();

        let factory = self
            .registry
            .lookup(&class)
            .ok_or_else(|| SimError::build(name, format!("unknown component class {class:?}")))?;

        let component = factory();
        let cid = self.engine.reserve_component();
        let display_name = if def.name.is_some() { def.name.clone().unwrap() } else { format!("{class}#{}", cid.0) };
        self.engine.install_component(cid, display_name.clone(), component);
        self.tables.set_instance_component(instance, cid);

        let mut component = self.engine.take_component(cid);
        let mut ctx = ConfigContext {
            definition: def_id,
            location,
            self_id: cid,
            self_name: display_name,
            tables: &mut *self.tables,
            registry: self.registry,
            engine: &mut *self.engine,
        };
        let result = component.configure(&mut ctx);
        self.engine.give_back_component(cid, component);
        result?;

        Ok(cid)
    }

    /// Reads `key` as an array parameter, resolving every scalar element
    /// through the typed int/float/bool cascade used by the original
    /// loader (try integer, then float, then boolean, falling back to
    /// leaving it as an error) — used for parameters like a hardwired
    /// predictor's per-kind boolean list.
    pub fn array(&self, key: &str) -> SimResult<Vec<ConfigValue>> {
        match self.find(key) {
            None => Err(self.missing(key)),
            Some(Parameter::Array(items, _)) => items.iter().map(|p| config_value_of(p)).collect(),
            Some(other) => Err(SimError::semantic(other.location().clone(), key, "expected an array")),
        }
    }
}

fn config_value_of(param: &Parameter) -> SimResult<ConfigValue> {
    match param {
        Parameter::Scalar(text, loc) => {
            if let Some(b) = parse_bool(text) {
                Ok(ConfigValue::Boolean(b))
            } else if let Ok(i) = text.parse::<i64>() {
                Ok(ConfigValue::Integer(i))
            } else if let Ok(f) = text.parse::<f64>() {
                Ok(ConfigValue::Number(f))
            } else {
                Err(SimError::semantic(loc.clone(), text, "array element is not a recognized scalar type"))
            }
        }
        Parameter::Array(items, _) => items.iter().map(config_value_of).collect::<SimResult<Vec<_>>>().map(ConfigValue::Array),
        Parameter::InstanceRef(_, loc) | Parameter::DefinitionRef(_, loc) => {
            Err(SimError::semantic(loc.clone(), "<array>", "component references are not valid array elements; use component_reference instead"))
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_str;
    use crate::engine::Engine;
    use crate::link::{ConnTable, MessageKind};

    thread_local! {
        /// Guards against the unbounded recursion a naive mutual
        /// bare-string `peer` reference would otherwise trigger: resolving
        /// "a"'s peer materializes a fresh "b", which — if it resolved its
        /// own "peer" the same way — would materialize a fresh "a", forever.
        /// Only the outermost (root) resolution on each side chases the
        /// reference; anything reached through it leaves its own peer
        /// unresolved, which is all this test needs.
        static RESOLVING_PEER: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
    }

    /// A component whose only parameter is a peer reference, recording both
    /// its own id and its resolved peer's id so tests can check identity
    /// without a dedicated engine accessor.
    struct Peer {
        self_id: ComponentId,
        peer: Option<ComponentId>,
    }

    impl Peer {
        fn new() -> Self {
            Self { self_id: ComponentId(0), peer: None }
        }
    }

    impl crate::link::Component for Peer {
        fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
            self.self_id = ctx.self_id();
            if RESOLVING_PEER.with(std::cell::Cell::get) {
                return Ok(());
            }
            RESOLVING_PEER.with(|flag| flag.set(true));
            let resolved = ctx.component_reference("peer");
            RESOLVING_PEER.with(|flag| flag.set(false));
            self.peer = Some(resolved?);
            Ok(())
        }

        fn clock(&mut self, _id: ComponentId, _conns: &mut ConnTable) {}

        fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
            // Unresolved (guard short-circuited) peers print as 0, a sentinel
            // no real component ever holds: ComponentId 0 is reserved for
            // the engine itself.
            writeln!(out, "{name}.self_id={} peer_id={}", self.self_id.0, self.peer.map_or(0, |p| p.0))
        }

        fn message_kind(&self) -> MessageKind {
            MessageKind::Memory
        }
    }

    /// A component whose only parameter is a `dataMemory` reference; used to
    /// check that two consumers of the same alias share one instance.
    struct Consumer {
        self_id: ComponentId,
        data_memory: Option<ComponentId>,
    }

    impl Consumer {
        fn new() -> Self {
            Self { self_id: ComponentId(0), data_memory: None }
        }
    }

    impl crate::link::Component for Consumer {
        fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
            self.self_id = ctx.self_id();
            self.data_memory = Some(ctx.component_reference("dataMemory")?);
            Ok(())
        }

        fn clock(&mut self, _id: ComponentId, _conns: &mut ConnTable) {}

        fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
            writeln!(out, "{name}.self_id={} data_memory_id={}", self.self_id.0, self.data_memory.unwrap().0)
        }

        fn message_kind(&self) -> MessageKind {
            MessageKind::Memory
        }
    }

    /// Extracts `field`'s value from the `occurrence`-th line starting with
    /// `{name}.self_id=`. Two distinct instances can share a display name —
    /// a root instance and a fresh one materialized through a bare-string
    /// reference to that same name both print under it — so callers pick
    /// which occurrence (in print order, i.e. component-id order) they mean.
    fn nth_field(text: &str, name: &str, field: &str, occurrence: usize) -> usize {
        let needle = format!("{name}.self_id=");
        let line = text
            .lines()
            .filter(|l| l.starts_with(&needle))
            .nth(occurrence)
            .unwrap_or_else(|| panic!("no occurrence {occurrence} of {name} in:\n{text}"));
        let key = format!("{field}=");
        let start = line.find(&key).unwrap_or_else(|| panic!("no {field} in line {line:?}")) + key.len();
        line[start..].trim().parse().unwrap_or_else(|_| panic!("malformed {field} in line {line:?}"))
    }

    /// §8 scenario 5: forward references. `a` and `b` name each other before
    /// either is defined; bare strings are definition-references, so each
    /// peer field ends up pointing at a *fresh* instance of the other's
    /// definition, not at the other's own root instance.
    #[test]
    fn forward_references_resolve_to_fresh_instances() {
        let mut registry = ClassRegistry::new();
        registry.register("X", || Box::new(Peer::new()));
        registry.register("Y", || Box::new(Peer::new()));

        let root = parse_str("t.yaml", "a: {class: X, peer: b}\nb: {class: Y, peer: a}\n").unwrap();
        let mut engine = Engine::new();
        Builder::build(&root, &registry, &mut engine).unwrap();

        let mut out = Vec::new();
        engine.print_statistics(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        // Root "a" is configured first and is the first printed line named
        // "a" (occurrence 0); resolving its peer materializes a fresh "b"
        // before the root loop ever reaches the real root "b", so that fresh
        // instance prints as "b"'s occurrence 0, and root "b" itself is
        // occurrence 1 (and, symmetrically, the fresh "a" it materializes in
        // turn is "a"'s occurrence 1).
        let a_self = nth_field(&text, "a", "self_id", 0);
        let a_peer = nth_field(&text, "a", "peer_id", 0);
        let b_self = nth_field(&text, "b", "self_id", 1);
        let b_peer = nth_field(&text, "b", "peer_id", 1);

        assert_ne!(a_peer, b_self, "a's peer must be a fresh instance, not b's own root instance");
        assert_ne!(b_peer, a_self, "b's peer must be a fresh instance, not a's own root instance");
        assert_ne!(a_self, b_self);
        assert_ne!(a_peer, b_peer);
    }

    /// §8 scenario 6: a shared anchor. Two consumers referencing the same
    /// `*shared` alias resolve to the exact same component instance.
    #[test]
    fn shared_anchor_resolves_to_one_instance() {
        let mut registry = ClassRegistry::standard();
        registry.register("Consumer", || Box::new(Consumer::new()));

        let root = parse_str(
            "t.yaml",
            "mem: &shared {class: SimpleMemory}\n\
             core1: {class: Consumer, dataMemory: *shared}\n\
             core2: {class: Consumer, dataMemory: *shared}\n",
        )
        .unwrap();
        let mut engine = Engine::new();
        Builder::build(&root, &registry, &mut engine).unwrap();

        let mut out = Vec::new();
        engine.print_statistics(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let core1_mem = nth_field(&text, "core1", "data_memory_id", 0);
        let core2_mem = nth_field(&text, "core2", "data_memory_id", 0);
        assert_eq!(core1_mem, core2_mem, "both consumers must share the one instance anchored by *shared");
    }
}
