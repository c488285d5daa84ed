//! The `Linkable`/component contract (§3 "Component (Linkable)").
//!
//! Every hardware component in the standard library implements [`Component`].
//! The trait is deliberately free of generics so the engine can store every
//! component, regardless of concrete type or message kind, in one
//! homogeneous `Vec<Box<dyn Component>>` — the "polymorphic component
//! hierarchy with virtual dispatch" pattern called out in `DESIGN.md`.

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::connection::{ComponentId, ConnTable, MessageKind};

/// Capability set every component exposes to the builder and the engine.
pub trait Component {
    /// Applies configuration parameters, typically calling back into `ctx`
    /// to `connect()` to peers named by reference parameters.
    fn configure(&mut self, _ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Called once after every instance in the graph has been configured.
    /// A component that cannot complete setup (e.g. a missing required
    /// peer) returns `Err` here, aborting the whole build.
    fn finish_setup(&mut self) -> SimResult<()> {
        Ok(())
    }

    /// Per-cycle step: drain this cycle's visible requests/responses, do
    /// component-specific work, optionally enqueue new traffic.
    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable);

    /// Runs after every component's `clock()` has been called this cycle.
    /// The default swaps every connection this component owns, which is
    /// correct for the overwhelming majority of components; override only
    /// if a component needs to do more (none in the standard library do).
    fn post_clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        conns.swap_owned_by(id);
    }

    /// Prints this component's end-of-run statistics to stdout.
    fn print_statistics(&self, _name: &str, _out: &mut dyn std::io::Write) -> std::io::Result<()> {
        Ok(())
    }

    /// The message kind this component expects on its request-receiving
    /// connections. Used at `connect()` time as the capability test that
    /// replaces a dynamic cast: a peer wiring a `MemoryPacket` connection to
    /// a component that only understands `Predictor` messages is rejected
    /// immediately, with a diagnostic, instead of corrupting state later.
    fn message_kind(&self) -> MessageKind;
}
