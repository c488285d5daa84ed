//! N-way set-associative cache (§4.7).
//!
//! Ported from the teacher's `CacheSim`: fixed set/tag bit-slicing, a
//! pluggable [`policies::ReplacementPolicy`], install-on-miss. Two
//! simplifications versus the teacher, both forced by this crate's wire
//! format rather than chosen for convenience:
//!
//! - [`crate::packet::MemoryPacket`] carries a bare address with no
//!   load/store tag, so there is no `is_write` to track — lines carry
//!   `tag`/`valid` only, no dirty bit or write-back penalty.
//! - Miss latency is a configured constant (`missLatency`) rather than a
//!   live connection to a next-level component: the contract summary
//!   describes lookup/replacement mechanics, not an additional chaining
//!   protocol beyond what Simple memory already provides for backing
//!   storage (see `DESIGN.md`).
//!
//! The prefetcher the teacher's `CacheSim` carries is dropped entirely: it
//! has no counterpart in the standard component list.

pub mod policies;

use std::collections::VecDeque;

use policies::ReplacementPolicy;

use crate::builder::ConfigContext;
use crate::common::{Addr, SimResult};
use crate::link::{Component, ComponentId, ConnTable, ConnectionId, Message, MessageKind};

#[derive(Clone, Copy, Default)]
struct Line {
    tag: u64,
    valid: bool,
}

/// A fixed-size set-associative cache of [`crate::packet::MemoryPacket`]
/// addresses.
pub struct Cache {
    sets: usize,
    ways: usize,
    line_bits: u32,
    hit_latency: u64,
    miss_latency: u64,
    lines: Vec<Line>,
    policy: Box<dyn ReplacementPolicy>,
    pending: VecDeque<(ConnectionId, Addr, u64)>,
    cycle: u64,
    hits: u64,
    misses: u64,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sets: 1,
            ways: 1,
            line_bits: 6,
            hit_latency: 1,
            miss_latency: 10,
            lines: vec![Line::default(); 1],
            policy: Box::new(policies::RoundRobinPolicy::new(1, 1)),
            pending: VecDeque::new(),
            cycle: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn index(&self, addr: Addr) -> (usize, u64) {
        let line = addr.bits(self.line_bits, 64);
        let set = (line as usize) % self.sets;
        let tag = line / self.sets as u64;
        (set, tag)
    }

    /// Looks the address up, updating replacement state and installing a
    /// line on miss. Returns whether it was a hit.
    fn access(&mut self, addr: Addr) -> bool {
        let (set, tag) = self.index(addr);
        let base = set * self.ways;

        for way in 0..self.ways {
            let line = &self.lines[base + way];
            if line.valid && line.tag == tag {
                self.policy.update(set, way);
                return true;
            }
        }

        let victim = self.policy.get_victim(set);
        self.lines[base + victim] = Line { tag, valid: true };
        self.policy.update(set, victim);
        false
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Cache {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.ways = ctx.integer("ways", Some(1))?.max(1) as usize;
        self.sets = crate::common::round_down_pow2(ctx.integer("sets", Some(64))?.max(1) as usize);
        let line_bytes = crate::common::round_down_pow2(ctx.integer("lineSize", Some(64))?.max(1) as usize);
        self.line_bits = line_bytes.trailing_zeros();
        self.hit_latency = ctx.integer("hitLatency", Some(1))?.max(0) as u64;
        self.miss_latency = ctx.integer("missLatency", Some(10))?.max(0) as u64;

        let policy_name = ctx.string("policy", Some("LRU"))?;
        self.policy = policies::build(&policy_name, self.sets, self.ways)
            .ok_or_else(|| crate::common::SimError::build(ctx.self_name(), format!("unknown replacement policy {policy_name:?}")))?;

        self.lines = vec![Line::default(); self.sets * self.ways];
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        self.cycle += 1;

        while matches!(self.pending.front(), Some((_, _, due)) if *due <= self.cycle) {
            if let Some((conn, addr, _)) = self.pending.pop_front() {
                let _ = conns.enqueue_response(conn, Message::Memory(addr));
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MemoryPacket;

    fn small_cache() -> Cache {
        Cache {
            sets: 2,
            ways: 2,
            line_bits: 4,
            hit_latency: 1,
            miss_latency: 1,
            lines: vec![Line::default(); 4],
            policy: Box::new(policies::RoundRobinPolicy::new(2, 2)),
            pending: VecDeque::new(),
            cycle: 0,
            hits: 0,
            misses: 0,
        }
    }

    #[test]
    fn first_access_is_always_a_miss() {
        let mut cache = small_cache();
        assert!(!cache.access(Addr::new(0x1000)));
    }

    #[test]
    fn repeated_access_to_the_same_line_hits() {
        let mut cache = small_cache();
        assert!(!cache.access(Addr::new(0x1000)));
        assert!(cache.access(Addr::new(0x1000)));
    }

    #[test]
    fn clock_reports_one_hit_and_one_miss_through_statistics() {
        let mut conns = ConnTable::new();
        let cache_id = ComponentId(1);
        let requester_id = ComponentId(2);
        let conn = conns.allocate(cache_id, requester_id, 4, MessageKind::Memory);

        let mut cache = small_cache();

        conns.enqueue_request(conn, Message::Memory(MemoryPacket::new(0x1000))).unwrap();
        conns.swap(conn);
        cache.clock(cache_id, &mut conns); // miss, installed
        conns.swap(conn);

        conns.enqueue_request(conn, Message::Memory(MemoryPacket::new(0x1000))).unwrap();
        conns.swap(conn);
        cache.clock(cache_id, &mut conns); // hit
        conns.swap(conn);

        assert_eq!(cache.hits, 1);
        assert_eq!(cache.misses, 1);
    }
}
