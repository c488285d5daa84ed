//! `Queue<T>` and `DelayQueue<T>` (§4.7): generic forwarding stages between
//! two components.
//!
//! The standard library's "generic" components are realized here as one
//! fixed-kind class per [`MessageKind`] (`QueueMemory`, `QueueFetch`,
//! `QueuePredictor`, and their `DelayQueue*` counterparts), rather than a
//! single class parameterized at configuration time. [`Component::message_kind`]
//! must answer truthfully the instant a peer calls `connect()`, which happens
//! during *that peer's* `configure()` — before this component's own
//! `configure()` has necessarily run, so the kind cannot be read out of a
//! config parameter. Fixing it at construction, via the factory, is the only
//! order-independent option.
//!
//! There is no teacher analogue for a bare forwarding stage: the substrate
//! itself ([`crate::link::connection`]) is the grounding, since every
//! connection already provides the one-cycle bank-swap delay this component
//! just relays through.

use std::collections::VecDeque;

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::{Component, ComponentId, ConnTable, ConnectionId, Message, MessageKind};

/// Plain pass-through queue: every message dequeued from any inbound
/// connection is forwarded, unmodified, to `sendTo` the same cycle it is
/// seen. The one-cycle latency a peer observes comes entirely from the
/// connection's own bank swap, not from any buffering here.
pub struct Queue {
    kind: MessageKind,
    send_to: Option<ConnectionId>,
}

impl Queue {
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self { kind, send_to: None }
    }
}

impl Component for Queue {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        let capacity = ctx.integer("capacity", Some(8))?;
        let target = ctx.component_reference("sendTo")?;
        self.send_to = Some(ctx.connect(target, self.kind, capacity.max(1) as usize)?);
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        let Some(send_to) = self.send_to else { return };
        for inbound in conns.connections_owned_by(id) {
            while let Ok(msg) = conns.dequeue_request(inbound) {
                let _ = conns.enqueue_request(send_to, msg);
            }
        }
    }

    fn message_kind(&self) -> MessageKind {
        self.kind
    }
}


/// Forwarding queue with a configurable extra delay and a per-cycle
/// throughput cap, on top of the ring-of-due-entries mechanism every delay
/// stage in this crate uses: each accepted message is tagged with the cycle
/// it becomes eligible to forward, and at most `throughput` eligible entries
/// leave per cycle.
pub struct DelayQueue {
    kind: MessageKind,
    send_to: Option<ConnectionId>,
    delay: u64,
    throughput: u32,
    cycle: u64,
    pending: VecDeque<(Message, u64)>,
}

impl DelayQueue {
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            send_to: None,
            delay: 0,
            throughput: u32::MAX,
            cycle: 0,
            pending: VecDeque::new(),
        }
    }
}

impl Component for DelayQueue {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.delay = ctx.integer("delay", Some(0))?.max(0) as u64;
        self.throughput = ctx.integer("throughput", Some(i64::from(u32::MAX)))?.clamp(1, i64::from(u32::MAX)) as u32;
        let capacity = ctx.integer("capacity", Some(8))?;
        let target = ctx.component_reference("sendTo")?;
        self.send_to = Some(ctx.connect(target, self.kind, capacity.max(1) as usize)?);
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        self.cycle += 1;

        if let Some(send_to) = self.send_to {
            let mut sent = 0u32;
            while sent < self.throughput {
                match self.pending.front() {
                    Some((_, due)) if *due <= self.cycle => {
                        let (msg, _) = self.pending.pop_front().expect("front() just matched Some");
                        let _ = conns.enqueue_request(send_to, msg);
                        sent += 1;
                    }
                    _ => break,
                }
            }
        }

        let due = self.cycle + self.delay;
        for inbound in conns.connections_owned_by(id) {
            while let Ok(msg) = conns.dequeue_request(inbound) {
                self.pending.push_back((msg, due));
            }
        }
    }

    fn message_kind(&self) -> MessageKind {
        self.kind
    }
}

#[cfg(test)]
mod delay_queue_tests {
    use super::*;
    use crate::packet::MemoryPacket;

    /// §8 scenario 3: throughput=4, delay=3. Four elements enqueued together
    /// stay buffered for `delay` cycles, then drain together, in order,
    /// never trickling out early.
    #[test]
    fn drains_together_after_delay_elapses_in_order() {
        let mut conns = ConnTable::new();
        let owner = ComponentId(1);
        let requester = ComponentId(3);
        let downstream = ComponentId(2);

        let inbound = conns.allocate(owner, requester, 8, MessageKind::Memory);
        let outbound = conns.allocate(downstream, owner, 8, MessageKind::Memory);

        for v in [1u64, 2, 3, 4] {
            conns.enqueue_request(inbound, Message::Memory(MemoryPacket::new(v))).unwrap();
        }
        conns.swap(inbound);

        let mut queue = DelayQueue::new(MessageKind::Memory);
        queue.delay = 3;
        queue.throughput = 4;
        queue.send_to = Some(outbound);

        // First clock call pulls the four messages in and schedules them
        // `delay` cycles out; nothing is forwarded yet.
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        assert!(conns.dequeue_request(outbound).is_err());

        // Two more calls: still not due.
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        assert!(conns.dequeue_request(outbound).is_err());
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        assert!(conns.dequeue_request(outbound).is_err());

        // The call that brings the internal cycle counter to `due` drains
        // every entry at once, in enqueue order.
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        for expected in [1u64, 2, 3, 4] {
            match conns.dequeue_request(outbound).unwrap() {
                Message::Memory(m) => assert_eq!(m.value(), expected),
                _ => panic!("wrong kind"),
            }
        }
        assert!(conns.dequeue_request(outbound).is_err());
    }

    #[test]
    fn throughput_caps_how_many_leave_per_cycle() {
        let mut conns = ConnTable::new();
        let owner = ComponentId(1);
        let requester = ComponentId(3);
        let downstream = ComponentId(2);

        let inbound = conns.allocate(owner, requester, 8, MessageKind::Memory);
        let outbound = conns.allocate(downstream, owner, 8, MessageKind::Memory);

        for v in [1u64, 2, 3] {
            conns.enqueue_request(inbound, Message::Memory(MemoryPacket::new(v))).unwrap();
        }
        conns.swap(inbound);

        let mut queue = DelayQueue::new(MessageKind::Memory);
        queue.delay = 0;
        queue.throughput = 2;
        queue.send_to = Some(outbound);

        // due = cycle(1) + delay(0) = 1, so the same call that schedules
        // them also drains up to `throughput` of them — but the send pass
        // runs before the schedule pass, so this first call sends nothing.
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        assert!(conns.dequeue_request(outbound).is_err());

        // Second call: due(1) <= cycle(2), so up to 2 leave.
        queue.clock(owner, &mut conns);
        conns.swap(outbound);
        assert!(conns.dequeue_request(outbound).is_ok());
        assert!(conns.dequeue_request(outbound).is_ok());
        assert!(conns.dequeue_request(outbound).is_err());
    }
}
