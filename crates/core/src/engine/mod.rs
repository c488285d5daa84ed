//! The top-level clock loop and trace-pumping scheduler (§4.3 "Engine").
//!
//! The engine is conceptually component index `0` (see [`crate::link::ENGINE`]):
//! it owns every fetch connection a fetcher wires to it and answers requests
//! straight out of the [`TraceReader`], but it is not itself stored as a
//! `Box<dyn Component>` — giving it that exemption avoids forcing the trace
//! reader and the component vector to be borrowed through the same trait
//! object, which would otherwise fight the borrow checker every cycle.

use std::collections::HashSet;

use crate::common::{SimError, SimResult};
use crate::link::{ComponentId, ConnTable, ConnectionId, Component, Message, ENGINE};
use crate::packet::{FetchPacket, InstructionPacket};
use crate::trace::{FetchOutcome, TraceReader};

/// How often the engine logs a progress heartbeat (§4.3).
const HEARTBEAT_CYCLES: u64 = 256;

/// Drives the global clock loop: pumps the trace reader into fetch
/// connections, clocks every installed component once per cycle, swaps every
/// connection, and checks for termination.
pub struct Engine {
    components: Vec<Option<Box<dyn Component>>>,
    names: Vec<String>,
    conns: ConnTable,
    trace: Option<TraceReader>,
    fetch_sources: Vec<(ConnectionId, usize)>,
    lookahead: Vec<Option<InstructionPacket>>,
    done_threads: HashSet<usize>,
    cycle: u64,
    fetched_instructions: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An empty engine with no components, connections, or trace attached
    /// yet. Index `0` of the component table is reserved for
    /// [`crate::link::ENGINE`] and is never populated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: vec![None],
            names: vec!["engine".to_owned()],
            conns: ConnTable::new(),
            trace: None,
            fetch_sources: Vec::new(),
            lookahead: Vec::new(),
            done_threads: HashSet::new(),
            cycle: 0,
            fetched_instructions: 0,
        }
    }

    /// Shared access to the connection table, for builder-time wiring.
    pub fn conns_mut(&mut self) -> &mut ConnTable {
        &mut self.conns
    }

    /// Read-only access to the connection table, e.g. for end-of-run
    /// overflow statistics.
    #[must_use]
    pub fn conns(&self) -> &ConnTable {
        &self.conns
    }

    /// Reserves a [`ComponentId`] ahead of the component it names actually
    /// being instantiated, so forward references in the configuration graph
    /// can be wired before every instance exists (§4.5).
    pub fn reserve_component(&mut self) -> ComponentId {
        let id = ComponentId(self.components.len());
        self.components.push(None);
        self.names.push(String::new());
        id
    }

    /// Fills a previously reserved slot with its constructed component.
    pub fn install_component(&mut self, id: ComponentId, name: String, component: Box<dyn Component>) {
        self.components[id.0] = Some(component);
        self.names[id.0] = name;
    }

    /// The message kind a peer must request to `connect()` to `id`.
    ///
    /// # Panics
    /// Panics if `id` was reserved but never installed; the builder never
    /// calls this before `install_component`.
    #[must_use]
    pub fn message_kind_of(&self, id: ComponentId) -> crate::link::MessageKind {
        self.components[id.0]
            .as_ref()
            .expect("message_kind_of called on a reserved-but-uninstalled component")
            .message_kind()
    }

    /// The name installed for `id`, for diagnostics.
    #[must_use]
    pub fn name_of(&self, id: ComponentId) -> &str {
        &self.names[id.0]
    }

    /// Temporarily removes `id`'s component so the builder can call
    /// `configure()` on it while still holding a mutable borrow of the
    /// engine (needed for nested `component_reference` materialization).
    /// Must be paired with [`Engine::give_back_component`].
    ///
    /// # Panics
    /// Panics if `id`'s slot is empty (already taken, or never installed).
    pub fn take_component(&mut self, id: ComponentId) -> Box<dyn Component> {
        self.components[id.0].take().expect("take_component called on an empty slot")
    }

    /// Restores a component removed by [`Engine::take_component`].
    pub fn give_back_component(&mut self, id: ComponentId, component: Box<dyn Component>) {
        self.components[id.0] = Some(component);
    }

    /// Attaches the trace reader the fetch pump draws from.
    pub fn set_trace_reader(&mut self, reader: TraceReader) {
        self.lookahead = (0..reader.total_threads()).map(|_| None).collect();
        self.trace = Some(reader);
    }

    /// Registers `conn` (an [`ENGINE`]-owned connection) as the fetch source
    /// for thread `tid`. Called once per fetcher during the wiring pass.
    pub fn register_fetch_source(&mut self, conn: ConnectionId, tid: usize) {
        self.fetch_sources.push((conn, tid));
    }

    /// Calls `finish_setup()` on every installed component, in installation
    /// order, aborting the whole build on the first failure (§4.5).
    pub fn finish_build(&mut self) -> SimResult<()> {
        for (id, slot) in self.components.iter_mut().enumerate().skip(1) {
            let component = slot
                .as_mut()
                .ok_or_else(|| SimError::build("engine", format!("component {id} was reserved but never instantiated")))?;
            component.finish_setup()?;
        }
        Ok(())
    }

    /// Runs the clock loop until every fetch source's thread is exhausted,
    /// or `max_cycles` elapses (whichever first; `None` means unbounded).
    pub fn run(&mut self, max_cycles: Option<u64>) -> SimResult<()> {
        loop {
            if let Some(max) = max_cycles {
                if self.cycle >= max {
                    tracing::warn!(cycle = self.cycle, "stopping: reached max_cycles before trace exhaustion");
                    break;
                }
            }
            if self.all_sources_exhausted() {
                break;
            }

            self.cycle += 1;
            self.pump_fetch_sources()?;

            for id in 1..self.components.len() {
                let cid = ComponentId(id);
                if let Some(component) = self.components[id].as_mut() {
                    component.clock(cid, &mut self.conns);
                }
            }
            for id in 1..self.components.len() {
                let cid = ComponentId(id);
                if let Some(component) = self.components[id].as_mut() {
                    component.post_clock(cid, &mut self.conns);
                }
            }
            self.conns.swap_owned_by(ENGINE);

            if self.cycle % HEARTBEAT_CYCLES == 0 {
                tracing::info!(
                    cycle = self.cycle,
                    fetched = self.fetched_instructions,
                    overflows = self.conns.total_overflows(),
                    "heartbeat"
                );
            }
        }

        tracing::info!(cycles = self.cycle, fetched = self.fetched_instructions, "simulation ended");
        Ok(())
    }

    /// Writes every installed component's end-of-run statistics, in
    /// installation order, to `out`.
    pub fn print_statistics(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "cycles: {}", self.cycle)?;
        writeln!(out, "instructions_fetched: {}", self.fetched_instructions)?;
        writeln!(out, "connection_overflows: {}", self.conns.total_overflows())?;
        for (id, slot) in self.components.iter().enumerate().skip(1) {
            if let Some(component) = slot {
                component.print_statistics(&self.names[id], out)?;
            }
        }
        Ok(())
    }

    fn all_sources_exhausted(&self) -> bool {
        if self.fetch_sources.is_empty() {
            return self.cycle > 0;
        }
        self.fetch_sources
            .iter()
            .all(|(_, tid)| self.done_threads.contains(tid))
    }

    fn pump_fetch_sources(&mut self) -> SimResult<()> {
        for i in 0..self.fetch_sources.len() {
            let (conn, tid) = self.fetch_sources[i];
            let Ok(Message::Fetch(FetchPacket::Request { byte_budget })) = self.conns.dequeue_request(conn) else {
                continue;
            };

            for packet in self.satisfy_request(tid, byte_budget)? {
                self.fetched_instructions += 1;
                // A full response bank is counted as overflow by enqueue_response
                // itself; the engine does not treat it as fatal (§4.2, §7).
                let _ = self.conns.enqueue_response(conn, Message::Fetch(FetchPacket::Response(packet)));
            }
        }
        Ok(())
    }

    /// Pulls instructions for `tid` until the accumulated size meets or
    /// exceeds `byte_budget`. Per [`FetchPacket::Request`], the accumulator
    /// starts at the first instruction's own size, so a `0` budget is always
    /// satisfied after exactly one instruction.
    fn satisfy_request(&mut self, tid: usize, byte_budget: u32) -> SimResult<Vec<InstructionPacket>> {
        let mut packets = Vec::new();
        let mut weight: u32 = 0;
        loop {
            let Some(packet) = self.next_for_thread(tid)? else {
                self.done_threads.insert(tid);
                break;
            };
            weight += u32::from(packet.static_inst.size);
            packets.push(packet);
            if weight >= byte_budget {
                break;
            }
        }
        Ok(packets)
    }

    /// Returns the next dynamic instruction for `tid`, with `next_address`
    /// filled in from a one-instruction lookahead buffer maintained per
    /// thread.
    fn next_for_thread(&mut self, tid: usize) -> SimResult<Option<InstructionPacket>> {
        let trace = self.trace.as_mut().expect("trace reader attached before run()");

        let mut packet = match self.lookahead[tid].take() {
            Some(packet) => packet,
            None => match trace.fetch(tid)? {
                FetchOutcome::Packet(packet) => packet,
                FetchOutcome::End => return Ok(None),
            },
        };

        packet.next_address = match trace.fetch(tid)? {
            FetchOutcome::Packet(next) => {
                let address = next.static_inst.address;
                self.lookahead[tid] = Some(next);
                Some(address)
            }
            FetchOutcome::End => None,
        };

        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MessageKind;
    use std::fs;
    use std::path::Path;

    fn instruction_entry(address: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&address.to_le_bytes());
        for _ in 0..crate::packet::MAX_REGS * 2 {
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes()); // base_reg
        out.extend_from_slice(&0u16.to_le_bytes()); // index_reg
        out.extend_from_slice(&0u16.to_le_bytes()); // id
        out.push(0); // num_read_regs
        out.push(0); // num_write_regs
        out.push(4); // inst_size
        out.push(0); // branch_kind_tag = None
        out.push(0); // flags = none
        out.push(0); // num_std_mem_loads
        out.push(0); // num_std_mem_stores
        out.extend_from_slice(&[0u8; 32]); // mnemonic
        out
    }

    fn write_fixture(dir: &Path, image: &str, instruction_count: u32) {
        let mut static_bytes = vec![0u8];
        static_bytes.extend_from_slice(&1u16.to_le_bytes());
        static_bytes.extend_from_slice(&u64::from(instruction_count).to_le_bytes());
        static_bytes.extend_from_slice(&u64::from(instruction_count).to_le_bytes());
        for i in 0..instruction_count {
            static_bytes.push(0);
            static_bytes.extend_from_slice(&1u16.to_le_bytes());
            static_bytes.push(1);
            static_bytes.extend(instruction_entry(0x1000 + u64::from(i) * 4));
        }
        fs::write(dir.join(format!("static_{image}.trace")), static_bytes).unwrap();

        let mut dyn_bytes = vec![1u8];
        dyn_bytes.extend_from_slice(&u64::from(instruction_count).to_le_bytes());
        for i in 0..instruction_count {
            dyn_bytes.push(0);
            dyn_bytes.extend_from_slice(&i.to_le_bytes());
        }
        fs::write(dir.join(format!("dynamic_{image}_tid0.trace")), dyn_bytes).unwrap();

        fs::write(dir.join(format!("memory_{image}_tid0.trace")), Vec::<u8>::new()).unwrap();
    }

    struct Requester {
        conn: ConnectionId,
        budget: u32,
        received: Vec<InstructionPacket>,
    }

    impl Component for Requester {
        fn clock(&mut self, _id: ComponentId, conns: &mut ConnTable) {
            let _ = conns.enqueue_request(self.conn, Message::Fetch(FetchPacket::Request { byte_budget: self.budget }));
            while let Ok(Message::Fetch(FetchPacket::Response(packet))) = conns.dequeue_response(self.conn) {
                self.received.push(packet);
            }
        }

        fn message_kind(&self) -> MessageKind {
            MessageKind::Fetch
        }
    }

    #[test]
    fn fetch_budget_zero_yields_one_instruction() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "t", 4);

        let mut engine = Engine::new();
        let conn = engine.conns_mut().allocate(ENGINE, ComponentId(1), 8, MessageKind::Fetch);
        engine.register_fetch_source(conn, 0);
        engine.set_trace_reader(TraceReader::open(dir.path(), "t").unwrap());

        let id = engine.reserve_component();
        assert_eq!(id, ComponentId(1));
        engine.install_component(
            id,
            "requester".to_owned(),
            Box::new(Requester { conn, budget: 0, received: Vec::new() }),
        );

        engine.run(Some(20)).unwrap();

        // Budget zero means one response per request; four instructions in
        // the trace means exactly four fetched, never coalesced.
        assert_eq!(engine.fetched_instructions, 4);
    }

    #[test]
    fn run_terminates_once_every_fetch_source_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "small", 1);

        let mut engine = Engine::new();
        let conn = engine.conns_mut().allocate(ENGINE, ComponentId(1), 8, MessageKind::Fetch);
        engine.register_fetch_source(conn, 0);
        engine.set_trace_reader(TraceReader::open(dir.path(), "small").unwrap());

        let id = engine.reserve_component();
        engine.install_component(
            id,
            "requester".to_owned(),
            Box::new(Requester { conn, budget: 0, received: Vec::new() }),
        );

        engine.run(Some(1000)).unwrap();
        assert!(engine.cycle < 1000, "run() should stop once the trace is exhausted, not hit the safety cap");
    }
}
