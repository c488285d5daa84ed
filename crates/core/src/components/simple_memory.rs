//! Simple memory / Simple instruction memory (§4.7): a fixed-latency
//! backing store that always hits.
//!
//! Both standard classes share this one implementation: the wire protocol
//! for instruction-memory traffic is, by the substrate's own
//! [`crate::link::MessageKind`] set, identical to data-memory traffic — a
//! bare [`crate::packet::MemoryPacket`] address, with no separate
//! "instruction packet" kind. Distinguishing the two is purely a
//! configuration-class naming convenience for the YAML author; the
//! behavior (accept every address, answer after a fixed latency) does not
//! differ.
//!
//! An optional `forwardTo` peer turns this into the "optionally forwards to
//! a downstream component instead of responding" shape the contract summary
//! describes for simple instruction memory: instead of answering locally,
//! the request is relayed downstream and the eventual downstream response
//! is relayed back to the original requester. Requests are forwarded
//! in-order and never reordered relative to each other, so a plain FIFO of
//! waiting requester connections is enough to route each downstream
//! response back to the right caller.

use std::collections::VecDeque;

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::{Component, ComponentId, ConnTable, ConnectionId, Message, MessageKind};
use crate::packet::MemoryPacket;

/// Answers every request after a fixed number of cycles, unless `forwardTo`
/// is configured, in which case every request is instead relayed downstream
/// and the response relayed back once it arrives.
pub struct SimpleMemory {
    latency: u64,
    cycle: u64,
    pending: VecDeque<(ConnectionId, MemoryPacket, u64)>,
    forward_to: Option<ConnectionId>,
    awaiting_forward: VecDeque<ConnectionId>,
    served: u64,
    forwarded: u64,
}

impl SimpleMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            latency: 1,
            cycle: 0,
            pending: VecDeque::new(),
            forward_to: None,
            awaiting_forward: VecDeque::new(),
            served: 0,
            forwarded: 0,
        }
    }
}

impl Default for SimpleMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SimpleMemory {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.latency = ctx.integer("latency", Some(1))?.max(0) as u64;

        if let Some(downstream) = ctx.optional_component_reference("forwardTo")? {
            let capacity = ctx.integer("forwardCapacity", Some(8))?.max(1) as usize;
            self.forward_to = Some(ctx.connect(downstream, MessageKind::Memory, capacity)?);
        }
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        self.cycle += 1;

        while let Some((_, _, due)) = self.pending.front() {
            if *due > self.cycle {
                break;
            }
            let (conn, addr, _) = self.pending.pop_front().expect("front() just matched Some");
            let _ = conns.enqueue_response(conn, Message::Memory(addr));
            self.served += 1;
        }

        if let Some(forward_to) = self.forward_to {
            while let Ok(Message::Memory(addr)) = conns.dequeue_response(forward_to) {
                if let Some(requester) = self.awaiting_forward.pop_front() {
                    let _ = conns.enqueue_response(requester, Message::Memory(addr));
                    self.served += 1;
                }
            }
        }

        let due = self.cycle + self.latency;
        for inbound in conns.connections_owned_by(id) {
            while let Ok(Message::Memory(addr)) = conns.dequeue_request(inbound) {
                if let Some(forward_to) = self.forward_to {
                    if conns.enqueue_request(forward_to, Message::Memory(addr)).is_ok() {
                        self.awaiting_forward.push_back(inbound);
                        self.forwarded += 1;
                    }
                } else {
                    self.pending.push_back((inbound, addr, due));
                }
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{name}.requests_served: {}", self.served)?;
        if self.forward_to.is_some() {
            writeln!(out, "{name}.requests_forwarded: {}", self.forwarded)?;
        }
        Ok(())
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_instead_of_answering_when_configured() {
        let mut conns = ConnTable::new();
        let upstream_id = ComponentId(1);
        let downstream_id = ComponentId(2);
        let requester_id = ComponentId(3);

        let to_downstream = conns.allocate(downstream_id, upstream_id, 4, MessageKind::Memory);
        let to_upstream = conns.allocate(upstream_id, requester_id, 4, MessageKind::Memory);

        let mut mem = SimpleMemory::new();
        mem.forward_to = Some(to_downstream);

        // Requester enqueues a request visible to upstream this cycle.
        conns.enqueue_request(to_upstream, Message::Memory(MemoryPacket::new(0x1000))).unwrap();
        conns.swap(to_upstream);

        mem.clock(upstream_id, &mut conns);
        assert_eq!(mem.forwarded, 1);
        assert_eq!(mem.served, 0);

        // Downstream "answers" by placing a response and swapping.
        conns.enqueue_response(to_downstream, Message::Memory(MemoryPacket::new(0x1000))).unwrap();
        conns.swap(to_downstream);

        mem.clock(upstream_id, &mut conns);
        assert_eq!(mem.served, 1);
        conns.swap(to_upstream);
        assert!(matches!(conns.dequeue_response(to_upstream), Ok(Message::Memory(_))));
    }
}
