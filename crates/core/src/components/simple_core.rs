//! Simple core (§4.7): the minimal complete consumer of a fetch stream —
//! issues a fetch pull, routes the instruction through instruction memory,
//! then issues one data-memory request per dynamic read/write operand
//! before moving to the next instruction. No branch prediction: this is
//! the component to reach for when a configuration only needs a traffic
//! generator exercising the memory hierarchy, not a full pipeline model
//! (see [`super::fetcher::Fetcher`] for that).

use std::collections::VecDeque;

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::{Component, ComponentId, ConnTable, ConnectionId, Message, MessageKind};
use crate::packet::{FetchPacket, InstructionPacket, MemoryPacket};

struct Entry {
    packet: InstructionPacket,
    sent_to_instruction_memory: bool,
    instruction_memory_acked: bool,
    data_ops_sent: usize,
    data_ops_acked: usize,
}

impl Entry {
    fn total_data_ops(&self) -> usize {
        self.packet.dynamic.reads.len() + self.packet.dynamic.writes.len()
    }

    fn ready_to_retire(&self) -> bool {
        self.instruction_memory_acked && self.data_ops_acked >= self.total_data_ops()
    }

    fn data_op_address(&self, index: usize) -> u64 {
        let reads = &self.packet.dynamic.reads;
        if index < reads.len() {
            reads[index].address
        } else {
            self.packet.dynamic.writes[index - reads.len()].address
        }
    }
}

pub struct SimpleCore {
    thread: usize,
    fetch_width: u32,
    buffer_size: usize,
    source: Option<ConnectionId>,
    instruction_memory: Option<ConnectionId>,
    data_memory: Option<ConnectionId>,
    buffer: VecDeque<Entry>,
    retired: u64,
}

impl SimpleCore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread: 0,
            fetch_width: 0,
            buffer_size: 4,
            source: None,
            instruction_memory: None,
            data_memory: None,
            buffer: VecDeque::new(),
            retired: 0,
        }
    }
}

impl Default for SimpleCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SimpleCore {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.thread = ctx.integer("thread", Some(0))?.max(0) as usize;
        self.fetch_width = ctx.integer("fetchWidth", Some(0))?.max(0) as u32;
        self.buffer_size = ctx.integer("bufferSize", Some(4))?.max(1) as usize;

        let instruction_memory_target = ctx.component_reference("instructionMemory")?;
        let instruction_memory_capacity = ctx.integer("instructionMemoryCapacity", Some(8))?.max(1) as usize;
        self.instruction_memory = Some(ctx.connect(instruction_memory_target, MessageKind::Memory, instruction_memory_capacity)?);

        if let Some(data_memory_target) = ctx.optional_component_reference("dataMemory")? {
            let data_memory_capacity = ctx.integer("dataMemoryCapacity", Some(8))?.max(1) as usize;
            self.data_memory = Some(ctx.connect(data_memory_target, MessageKind::Memory, data_memory_capacity)?);
        }

        let fetch_capacity = ctx.integer("fetchCapacity", Some(8))?.max(1) as usize;
        let conn = ctx.connect_fetch_source(fetch_capacity);
        ctx.register_fetch_source(conn, self.thread);
        self.source = Some(conn);

        Ok(())
    }

    fn clock(&mut self, _id: ComponentId, conns: &mut ConnTable) {
        if let Some(instruction_memory) = self.instruction_memory {
            while let Ok(Message::Memory(_)) = conns.dequeue_response(instruction_memory) {
                if let Some(entry) = self.buffer.iter_mut().find(|e| e.sent_to_instruction_memory && !e.instruction_memory_acked) {
                    entry.instruction_memory_acked = true;
                }
            }
        }
        if let Some(data_memory) = self.data_memory {
            while let Ok(Message::Memory(_)) = conns.dequeue_response(data_memory) {
                if let Some(entry) = self.buffer.iter_mut().find(|e| e.data_ops_acked < e.data_ops_sent) {
                    entry.data_ops_acked += 1;
                }
            }
        }

        while matches!(self.buffer.front(), Some(entry) if entry.ready_to_retire()) {
            self.buffer.pop_front();
            self.retired += 1;
        }

        if let Some(instruction_memory) = self.instruction_memory {
            for entry in &mut self.buffer {
                if !entry.sent_to_instruction_memory {
                    let addr = MemoryPacket::new(entry.packet.static_inst.address);
                    if conns.enqueue_request(instruction_memory, Message::Memory(addr)).is_ok() {
                        entry.sent_to_instruction_memory = true;
                    }
                }
            }
        }
        if let Some(data_memory) = self.data_memory {
            for entry in &mut self.buffer {
                while entry.data_ops_sent < entry.total_data_ops() {
                    let addr = MemoryPacket::new(entry.data_op_address(entry.data_ops_sent));
                    if conns.enqueue_request(data_memory, Message::Memory(addr)).is_ok() {
                        entry.data_ops_sent += 1;
                    } else {
                        break;
                    }
                }
            }
        }

        if let Some(source) = self.source {
            if self.buffer.len() < self.buffer_size {
                let _ = conns.enqueue_request(source, Message::Fetch(FetchPacket::Request { byte_budget: self.fetch_width }));
            }
            while let Ok(Message::Fetch(FetchPacket::Response(packet))) = conns.dequeue_response(source) {
                self.buffer.push_back(Entry {
                    packet,
                    sent_to_instruction_memory: false,
                    instruction_memory_acked: false,
                    data_ops_sent: 0,
                    data_ops_acked: 0,
                });
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{name}.retired: {}", self.retired)
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Fetch
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{Builder, ClassRegistry};
    use crate::config::parse_str;
    use crate::engine::Engine;
    use crate::trace::TraceReader;
    use std::fs;
    use std::path::Path;

    fn instruction_entry(address: u64, flags: u8, loads: u8, stores: u8) -> Vec<u8> {
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
        out.push(0); // branch_kind = None
        out.push(flags);
        out.push(loads);
        out.push(stores);
        out.extend_from_slice(&[0u8; 32]); // mnemonic
        out
    }

    /// LOAD @0x400, STORE @0x500, NOP — one basic block, one thread.
    fn write_fixture(dir: &Path) {
        let mut static_bytes = vec![0u8];
        static_bytes.extend_from_slice(&1u16.to_le_bytes()); // thread_count
        static_bytes.extend_from_slice(&1u64.to_le_bytes()); // bbl_count
        static_bytes.extend_from_slice(&3u64.to_le_bytes()); // inst_count

        static_bytes.push(0); // BblSize tag
        static_bytes.extend_from_slice(&3u16.to_le_bytes());
        static_bytes.push(1);
        static_bytes.extend(instruction_entry(0x400, 0b0010_0000, 1, 0)); // reads_memory
        static_bytes.push(1);
        static_bytes.extend(instruction_entry(0x500, 0b0100_0000, 0, 1)); // writes_memory
        static_bytes.push(1);
        static_bytes.extend(instruction_entry(0x504, 0, 0, 0)); // NOP

        fs::write(dir.join("static_t.trace"), static_bytes).unwrap();

        let mut dyn_bytes = vec![1u8];
        dyn_bytes.extend_from_slice(&3u64.to_le_bytes()); // total_executed
        dyn_bytes.push(0);
        dyn_bytes.extend_from_slice(&0u32.to_le_bytes()); // the one basic block
        fs::write(dir.join("dynamic_t_tid0.trace"), dyn_bytes).unwrap();

        let mut mem_bytes = Vec::new();
        mem_bytes.push(1); // Operation: the LOAD's read
        mem_bytes.extend_from_slice(&0x400u64.to_le_bytes());
        mem_bytes.extend_from_slice(&4u16.to_le_bytes());
        mem_bytes.push(0);
        mem_bytes.push(1); // Operation: the STORE's write
        mem_bytes.extend_from_slice(&0x500u64.to_le_bytes());
        mem_bytes.extend_from_slice(&4u16.to_le_bytes());
        mem_bytes.push(1);
        fs::write(dir.join("memory_t_tid0.trace"), mem_bytes).unwrap();
    }

    /// §8 scenario 4: a `SimpleCore` wired to instruction and data memory
    /// retires LOAD, STORE, NOP — three instruction-memory requests, and
    /// exactly two data-memory requests (one load, one store).
    #[test]
    fn fetch_load_store_nop_produces_expected_traffic() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let registry = ClassRegistry::standard();
        let mut engine = Engine::new();
        let root = parse_str(
            "t.yaml",
            "instMem: &instMem {class: SimpleMemory}\n\
             dataMem: &dataMem {class: SimpleMemory}\n\
             instantiate: {class: SimpleCore, instructionMemory: *instMem, dataMemory: *dataMem}\n",
        )
        .unwrap();
        Builder::build(&root, &registry, &mut engine).unwrap();
        engine.finish_build().unwrap();
        engine.set_trace_reader(TraceReader::open(dir.path(), "t").unwrap());
        engine.run(Some(100)).unwrap();

        let mut out = Vec::new();
        engine.print_statistics(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("retired: 3"), "{text}");
        assert!(text.contains("instMem.requests_served: 3"), "{text}");
        assert!(text.contains("dataMem.requests_served: 2"), "{text}");
    }
}
