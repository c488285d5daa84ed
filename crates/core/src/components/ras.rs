//! Return-address stack (§4.7).
//!
//! Ported almost directly from the teacher's `Ras`: a fixed-capacity
//! buffer with a push pointer that simply stops advancing once full,
//! overwriting the last slot on further pushes, rather than wrapping
//! modulo capacity. Queries always succeed (§4.7 "queries always succeed")
//! — popping an empty stack returns whatever is at slot `0` rather than
//! erroring, since a RAS has no way to signal "wrong" through the
//! fixed predictor response shape.
//!
//! `target_update` pushes, using `target` as the return address to push
//! (the fetcher sends this on observing a call instruction, with `target`
//! set to the call's fall-through address rather than the call's own
//! destination — the packet has no separate field for "return address", so
//! this is the mapping available; see `DESIGN.md`). A query on a `Return`-
//! kind instruction pops.

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::{Component, ComponentId, ConnTable, Message, MessageKind};
use crate::packet::{BranchKind, PredictorPacket};

pub struct ReturnAddressStack {
    buffer: Vec<u64>,
    capacity: usize,
    ptr: usize,
    pushes: u64,
    pops: u64,
}

impl ReturnAddressStack {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new(), capacity: 8, ptr: 0, pushes: 0, pops: 0 }
    }

    fn push(&mut self, addr: u64) {
        self.pushes += 1;
        if self.ptr < self.capacity {
            self.buffer[self.ptr] = addr;
            self.ptr += 1;
        } else if self.capacity > 0 {
            self.buffer[self.capacity - 1] = addr;
        }
    }

    fn pop(&mut self) -> u64 {
        self.pops += 1;
        if self.ptr == 0 {
            return self.buffer.first().copied().unwrap_or(0);
        }
        self.ptr -= 1;
        self.buffer[self.ptr]
    }
}

impl Default for ReturnAddressStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ReturnAddressStack {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.capacity = ctx.integer("depth", Some(8))?.max(0) as usize;
        self.buffer = vec![0u64; self.capacity];
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        for inbound in conns.connections_owned_by(id) {
            while let Ok(Message::Predictor(packet)) = conns.dequeue_request(inbound) {
                match packet {
                    PredictorPacket::Query(inst) if inst.branch_kind == BranchKind::Return => {
                        let addr = self.pop();
                        let _ = conns.enqueue_response(inbound, Message::Predictor(PredictorPacket::TakeTo(addr)));
                    }
                    PredictorPacket::Query(_) => {
                        let _ = conns.enqueue_response(inbound, Message::Predictor(PredictorPacket::Unknown));
                    }
                    PredictorPacket::TargetUpdate { target, .. } => self.push(target),
                    PredictorPacket::DirectionUpdate { .. }
                    | PredictorPacket::Unknown
                    | PredictorPacket::Take
                    | PredictorPacket::TakeTo(_)
                    | PredictorPacket::DontTake => {}
                }
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{name}.pushes: {}", self.pushes)?;
        writeln!(out, "{name}.pops: {}", self.pops)
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Predictor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order_within_capacity() {
        let mut ras = ReturnAddressStack { buffer: vec![0; 4], capacity: 4, ptr: 0, pushes: 0, pops: 0 };
        ras.push(0x1000);
        ras.push(0x2000);
        ras.push(0x3000);
        assert_eq!(ras.pop(), 0x3000);
        assert_eq!(ras.pop(), 0x2000);
        assert_eq!(ras.pop(), 0x1000);
    }

    #[test]
    fn push_past_capacity_overwrites_last_slot() {
        let mut ras = ReturnAddressStack { buffer: vec![0; 2], capacity: 2, ptr: 0, pushes: 0, pops: 0 };
        ras.push(0x1);
        ras.push(0x2);
        ras.push(0x3);
        assert_eq!(ras.pop(), 0x3);
        assert_eq!(ras.pop(), 0x1);
    }

    #[test]
    fn pop_on_empty_stack_always_succeeds() {
        let mut ras = ReturnAddressStack { buffer: vec![0; 2], capacity: 2, ptr: 0, pushes: 0, pops: 0 };
        assert_eq!(ras.pop(), 0);
    }
}
