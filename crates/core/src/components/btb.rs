//! Interleaved branch target buffer (§4.7).
//!
//! Grounded on the teacher's direct-mapped `Btb` (index/lookup/update on a
//! flat `Vec<BtbEntry>`), extended with `interleaving_factor` independent
//! banks per entry so nearby branches don't alias the same 2-bit counter.
//! Entry count and interleaving factor are both rounded down to powers of
//! two (§9) and the interleaving factor additionally clamps to a hard
//! maximum, logging a warning when it does (§8 boundary behavior).
//!
//! [`crate::packet::PredictorPacket`] is a per-instruction query/response
//! protocol, not a per-fetch-block one: this component answers one
//! instruction at a time, and the interleaving factor governs which bank
//! of the matched entry that instruction's counter lives in (derived from
//! the address, not from its position in a wider fetch group).

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::components::counter::SaturatingCounter2;
use crate::link::{Component, ComponentId, ConnTable, Message, MessageKind};
use crate::packet::PredictorPacket;

/// Hard ceiling on `interleaving_factor`, independent of configuration.
const MAX_INTERLEAVING: usize = 16;

#[derive(Clone)]
struct Bank {
    target: u64,
    valid: bool,
    counter: SaturatingCounter2,
}

impl Default for Bank {
    fn default() -> Self {
        Self { target: 0, valid: false, counter: SaturatingCounter2::new() }
    }
}

#[derive(Clone, Default)]
struct Entry {
    tag: u64,
    banks: Vec<Bank>,
}

pub struct InterleavedBtb {
    num_entries: usize,
    interleaving_factor: usize,
    entries: Vec<Entry>,
    queries: u64,
    hits: u64,
}

impl InterleavedBtb {
    #[must_use]
    pub fn new() -> Self {
        Self { num_entries: 1, interleaving_factor: 1, entries: Vec::new(), queries: 0, hits: 0 }
    }

    fn locate(&self, address: u64) -> (usize, u64, usize) {
        let entry_index = (address as usize / 4) % self.num_entries;
        let tag = address / (4 * self.num_entries as u64);
        let bank_index = (address as usize / 2) % self.interleaving_factor;
        (entry_index, tag, bank_index)
    }

    fn query(&mut self, address: u64) -> PredictorPacket {
        let (entry_index, tag, bank_index) = self.locate(address);
        self.queries += 1;
        let entry = &self.entries[entry_index];
        if entry.tag != tag {
            return PredictorPacket::Unknown;
        }
        let bank = &entry.banks[bank_index];
        if !bank.valid {
            return PredictorPacket::Unknown;
        }
        self.hits += 1;
        if bank.counter.predicts_taken() {
            PredictorPacket::TakeTo(bank.target)
        } else {
            PredictorPacket::DontTake
        }
    }

    fn direction_update(&mut self, address: u64, taken: bool) {
        let (entry_index, tag, bank_index) = self.locate(address);
        let entry = &mut self.entries[entry_index];
        if entry.tag != tag {
            *entry = Entry { tag, banks: vec![Bank::default(); self.interleaving_factor] };
        }
        entry.banks[bank_index].counter.update(taken);
    }

    fn target_update(&mut self, address: u64, target: u64) {
        let (entry_index, tag, bank_index) = self.locate(address);
        let entry = &mut self.entries[entry_index];
        if entry.tag != tag {
            *entry = Entry { tag, banks: vec![Bank::default(); self.interleaving_factor] };
        }
        let bank = &mut entry.banks[bank_index];
        bank.target = target;
        bank.valid = true;
    }
}

impl Default for InterleavedBtb {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for InterleavedBtb {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.num_entries = crate::common::round_down_pow2(ctx.integer("entries", Some(256))?.max(1) as usize);
        let requested = crate::common::round_down_pow2(ctx.integer("interleavingFactor", Some(1))?.max(1) as usize);
        self.interleaving_factor = if requested > MAX_INTERLEAVING {
            tracing::warn!(component = ctx.self_name(), requested, clamped = MAX_INTERLEAVING, "interleaving factor clamped to hard maximum");
            MAX_INTERLEAVING
        } else {
            requested
        };
        self.entries = vec![Entry::default(); self.num_entries];
        for entry in &mut self.entries {
            entry.banks = vec![Bank::default(); self.interleaving_factor];
        }
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        for inbound in conns.connections_owned_by(id) {
            while let Ok(Message::Predictor(packet)) = conns.dequeue_request(inbound) {
                let response = match packet {
                    PredictorPacket::Query(inst) => Some(self.query(inst.address)),
                    PredictorPacket::DirectionUpdate { inst, taken } => {
                        self.direction_update(inst.address, taken);
                        None
                    }
                    PredictorPacket::TargetUpdate { inst, target } => {
                        self.target_update(inst.address, target);
                        None
                    }
                    PredictorPacket::Unknown | PredictorPacket::Take | PredictorPacket::TakeTo(_) | PredictorPacket::DontTake => None,
                };
                if let Some(response) = response {
                    let _ = conns.enqueue_response(inbound, Message::Predictor(response));
                }
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{name}.queries: {}", self.queries)?;
        writeln!(out, "{name}.hits: {}", self.hits)
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Predictor
    }
}
