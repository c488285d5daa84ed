//! Hardwired predictor (§4.7): a test double with one boolean knob per
//! branch kind, for scripting exact predictor behavior in builder/fetcher
//! tests without pulling in a learning structure.

use crate::builder::ConfigContext;
use crate::common::SimResult;
use crate::link::{Component, ComponentId, ConnTable, Message, MessageKind};
use crate::packet::{BranchKind, PredictorPacket};

pub struct HardwiredPredictor {
    correct: [bool; 6],
    invocations: [u64; 6],
}

fn slot(kind: BranchKind) -> Option<usize> {
    match kind {
        BranchKind::Syscall => Some(0),
        BranchKind::SysRet => Some(1),
        BranchKind::Call => Some(2),
        BranchKind::Return => Some(3),
        BranchKind::Unconditional => Some(4),
        BranchKind::Conditional => Some(5),
        BranchKind::None => None,
    }
}

impl HardwiredPredictor {
    #[must_use]
    pub fn new() -> Self {
        Self { correct: [true; 6], invocations: [0; 6] }
    }
}

impl Default for HardwiredPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for HardwiredPredictor {
    fn configure(&mut self, ctx: &mut ConfigContext<'_>) -> SimResult<()> {
        self.correct[0] = ctx.boolean("correctSyscall", Some(true))?;
        self.correct[1] = ctx.boolean("correctSysRet", Some(true))?;
        self.correct[2] = ctx.boolean("correctCall", Some(true))?;
        self.correct[3] = ctx.boolean("correctReturn", Some(true))?;
        self.correct[4] = ctx.boolean("correctUnconditional", Some(true))?;
        self.correct[5] = ctx.boolean("correctConditional", Some(true))?;
        Ok(())
    }

    fn clock(&mut self, id: ComponentId, conns: &mut ConnTable) {
        for inbound in conns.connections_owned_by(id) {
            while let Ok(Message::Predictor(PredictorPacket::Query(inst))) = conns.dequeue_request(inbound) {
                let response = match slot(inst.branch_kind) {
                    None => PredictorPacket::Unknown,
                    Some(i) => {
                        self.invocations[i] += 1;
                        if self.correct[i] {
                            PredictorPacket::Take
                        } else {
                            PredictorPacket::TakeTo(!inst.address)
                        }
                    }
                };
                let _ = conns.enqueue_response(inbound, Message::Predictor(response));
            }
        }
    }

    fn print_statistics(&self, name: &str, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        const LABELS: [&str; 6] = ["syscall", "sysret", "call", "return", "unconditional", "conditional"];
        for (label, count) in LABELS.iter().zip(self.invocations) {
            writeln!(out, "{name}.invocations.{label}: {count}")?;
        }
        Ok(())
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Predictor
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::packet::StaticInstruction;

    fn inst(branch_kind: BranchKind) -> Rc<StaticInstruction> {
        Rc::new(StaticInstruction {
            address: 0x1000,
            size: 4,
            mnemonic: "b".to_string(),
            branch_kind,
            read_regs: vec![],
            write_regs: vec![],
            flags: Default::default(),
            num_std_mem_loads: 0,
            num_std_mem_stores: 0,
        })
    }

    #[test]
    fn unknown_branch_kind_gets_an_unknown_response() {
        let mut conns = ConnTable::new();
        let pred_id = ComponentId(1);
        let requester_id = ComponentId(2);
        let conn = conns.allocate(pred_id, requester_id, 4, MessageKind::Predictor);

        let mut pred = HardwiredPredictor::new();
        conns.enqueue_request(conn, Message::Predictor(PredictorPacket::Query(inst(BranchKind::None)))).unwrap();
        conns.swap(conn);
        pred.clock(pred_id, &mut conns);
        conns.swap(conn);

        assert!(matches!(conns.dequeue_response(conn), Ok(Message::Predictor(PredictorPacket::Unknown))));
    }

    #[test]
    fn correct_knob_predicts_take_with_no_target() {
        let mut conns = ConnTable::new();
        let pred_id = ComponentId(1);
        let requester_id = ComponentId(2);
        let conn = conns.allocate(pred_id, requester_id, 4, MessageKind::Predictor);

        let mut pred = HardwiredPredictor::new();
        conns.enqueue_request(conn, Message::Predictor(PredictorPacket::Query(inst(BranchKind::Conditional)))).unwrap();
        conns.swap(conn);
        pred.clock(pred_id, &mut conns);
        conns.swap(conn);

        assert!(matches!(conns.dequeue_response(conn), Ok(Message::Predictor(PredictorPacket::Take))));
        assert_eq!(pred.invocations[5], 1);
    }

    #[test]
    fn incorrect_knob_predicts_the_complemented_address() {
        let mut conns = ConnTable::new();
        let pred_id = ComponentId(1);
        let requester_id = ComponentId(2);
        let conn = conns.allocate(pred_id, requester_id, 4, MessageKind::Predictor);

        let mut pred = HardwiredPredictor { correct: [false; 6], invocations: [0; 6] };
        let query = inst(BranchKind::Call);
        let address = query.address;
        conns.enqueue_request(conn, Message::Predictor(PredictorPacket::Query(query))).unwrap();
        conns.swap(conn);
        pred.clock(pred_id, &mut conns);
        conns.swap(conn);

        match conns.dequeue_response(conn) {
            Ok(Message::Predictor(PredictorPacket::TakeTo(target))) => assert_eq!(target, !address),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
