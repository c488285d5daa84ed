//! Instruction TLB (§4.7): an N-way set-associative cache of valid virtual
//! pages, sharing [`super::cache::policies`] with the data/instruction
//! cache rather than duplicating eviction logic.
//!
//! Grounded on the teacher's fully-associative `Tlb`, generalized to N-way
//! with a pluggable policy per the contract summary (the teacher's
//! implementation is fixed fully-associative, i.e. `sets == 1`, which this
//! component still supports as the degenerate case).

use std::collections::VecDeque;

use crate::builder::ConfigContext;
use crate::common::{Addr, SimError, SimResult};
use crate::components::cache::policies::{self, ReplacementPolicy};
use crate::link::{Component, ComponentId, ConnTable, ConnectionId, Message, MessageKind};

#[derive(Clone, Copy, Default)]
struct Entry {
    tag: u64,
    valid: bool,
}

pub struct ITlb {
    sets: usize,
    ways: usize,
    page_bits: u32,
    hit_latency: u64,
    miss_latency: u64,
    entries: Vec<Entry>,
    policy: Box<dyn ReplacementPolicy>,
    pending: VecDeque<(ConnectionId, Addr, u64)>,
    cycle: u64,
    hits: u64,
    misses: u64,
}

impl ITlb {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sets: 1,
            ways: 1,
            page_bits: 12,
            hit_latency: 1,
            miss_latency: 20,
            entries: vec![Entry::default(); 1],
            policy: Box::new(policies::RoundRobinPolicy::new(1, 1)),
            pending: VecDeque::new(),
            cycle: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn index(&self, addr: Addr) -> (usize, u64) {
        let page = addr.bits(self.page_bits, 64);
        let set = (page as usize) % self.sets;
        let tag = page / self.sets as u64;
        (set, tag)
    }

    fn access(&mut self, addr: Addr) -> bool {
        let (set, tag) = self.index(addr);
        let base = set * self.ways;

        for way in 0..self.ways {
            let entry = &self.entries[base + way];
            if entry.valid && entry.tag == tag {
                self.policy.update(set, way);
                return true;
            }
        }

        let victim = self.policy.get_victim(set);
        self.entries[base + victim] = Entry { tag, valid: true };
        self.policy.update(set, victim);
        false
    }
}

impl Default for ITlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ITlb {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.ways = ctx.integer("ways", Some(1))?.max(1) as usize;
        self.sets = crate::common::round_down_pow2(ctx.integer("sets", Some(1))?.max(1) as usize);
        self.page_bits = crate::common::round_down_pow2(ctx.integer("pageSize", Some(4096))?.max(1) as usize).trailing_zeros();
        self.hit_latency = ctx.integer("hitLatency", Some(1))?.max(0) as u64;
        self.miss_latency = ctx.integer("missPenalty", Some(20))?.max(0) as u64;

        let policy_name = ctx.string("policy", Some("LRU"))?;
        self.policy = policies::build(&policy_name, self.sets, self.ways)
            .ok_or_else(|| SimError::build(ctx.self_name(), format!("unknown replacement policy {policy_name:?}")))?;

        self.entries = vec![Entry::default(); self.sets * self.ways];
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
        }

        for inbound in conns.connections_owned_by(id) {
            while let Ok(Message::Memory(addr)) = conns.dequeue_request(inbound) {
                let hit = self.access(addr);
                if hit {
                    self.hits += 1;
                } else {
                    self.misses += 1;
                }
                let latency = if hit { self.hit_latency } else { self.miss_latency };
                self.pending.push_back((inbound, addr, self.cycle + latency));
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{name}.hits: {}", self.hits)?;
        writeln!(out, "{name}.misses: {}", self.misses)
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Memory
    }
}
