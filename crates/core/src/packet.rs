//! Wire types exchanged over connections (§3 data model).
//!
//! These are the payloads components actually move through the substrate:
//! instruction packets from fetchers, bare memory addresses between cores/
//! TLBs/caches, and predictor queries/responses. All are plain values (no
//! raw pointers): where the original design would carry a pointer into the
//! static instruction dictionary, these carry a [`StaticId`] — a stable
//! index that stays valid independent of how the dictionary itself is
//! stored (see `DESIGN.md`, redesign notes).

use std::rc::Rc;

/// One of the branch classifications a static instruction can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BranchKind {
    /// Not a control-flow instruction.
    #[default]
    None,
    /// System call entry.
    Syscall,
    /// System call return.
    SysRet,
    /// Direct or indirect call.
    Call,
    /// Return instruction; RAS consumers should query on this kind.
    Return,
    /// Unconditional jump.
    Unconditional,
    /// Conditional branch.
    Conditional,
}

impl BranchKind {
    /// `true` for any of the control-flow-affecting kinds (everything but
    /// [`BranchKind::None`]).
    #[must_use]
    pub fn is_control_flow(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Maximum number of register operands tracked per instruction, and the
/// maximum number of (address, size) memory operands per dynamic occurrence.
pub const MAX_REGS: usize = 16;
/// See [`MAX_REGS`].
pub const MAX_MEM_OPS: usize = 16;

/// Boolean flags carried by every static instruction record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstructionFlags {
    /// Software prefetch hint, not a real memory access.
    pub is_prefetch_hint: bool,
    /// Executes conditionally on architectural predicate state.
    pub is_predicated: bool,
    /// Target is computed at runtime (indirect call/jump/return).
    pub is_indirect_control_flow: bool,
    /// Causes an architectural cache flush (e.g. `fence.i`-like instructions).
    pub causes_cache_flush: bool,
    /// Performs a read-modify-write atomic.
    pub performs_atomic: bool,
    /// Reads memory as part of execution.
    pub reads_memory: bool,
    /// Writes memory as part of execution.
    pub writes_memory: bool,
}

/// The static, address-interned part of an instruction (§3: "Instruction
/// record (static part)"). One of these exists per distinct instruction
/// address; every dynamic occurrence shares it by reference.
#[derive(Clone, Debug)]
pub struct StaticInstruction {
    /// Instruction address.
    pub address: u64,
    /// Encoded length in bytes.
    pub size: u8,
    /// Disassembled mnemonic, bounded to 25 bytes + NUL in the trace format.
    pub mnemonic: String,
    /// Control-flow classification.
    pub branch_kind: BranchKind,
    /// Architectural register ids read by this instruction.
    pub read_regs: Vec<u16>,
    /// Architectural register ids written by this instruction.
    pub write_regs: Vec<u16>,
    /// Boolean flag bundle.
    pub flags: InstructionFlags,
    /// Number of memory loads this instruction performs when its operand
    /// count is not derivable from context (non-standard in the trace's
    /// memory stream).
    pub num_std_mem_loads: u8,
    /// See [`StaticInstruction::num_std_mem_loads`].
    pub num_std_mem_stores: u8,
}

/// A stable, copyable handle to a [`StaticInstruction`] stored in the trace
/// reader's dictionary. This is the non-owning "reference" mentioned in the
/// ownership rules: packets carry this index, never a raw pointer, so the
/// dictionary's storage strategy is free to change independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StaticId(pub u32);

/// One (address, size) memory operand, as produced by the trace's memory
/// stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemOp {
    /// Byte address of the access.
    pub address: u64,
    /// Access size in bytes.
    pub size: u16,
}

/// The dynamic, per-occurrence part of an instruction (§3: "Instruction
/// record (dynamic part)"). Created fresh on every fetch; discarded once the
/// packet is consumed downstream.
#[derive(Clone, Debug, Default)]
pub struct DynamicInstruction {
    /// Memory reads performed by this occurrence.
    pub reads: Vec<MemOp>,
    /// Memory writes performed by this occurrence.
    pub writes: Vec<MemOp>,
}

/// The pair handed from the engine to fetchers and downstream consumers:
/// a reference to the interned static instruction, its freshly-materialized
/// dynamic part, and the address of the instruction that follows it in
/// program order (needed by fetchers/BTBs to know the fall-through target).
#[derive(Clone, Debug)]
pub struct InstructionPacket {
    /// Stable handle into the trace reader's static dictionary.
    pub static_id: StaticId,
    /// Shared static record (cheaply cloned; all packets at this address
    /// share the same allocation).
    pub static_inst: Rc<StaticInstruction>,
    /// Freshly materialized dynamic operands.
    pub dynamic: DynamicInstruction,
    /// Address of the next instruction in program order, if known.
    pub next_address: Option<u64>,
}

/// A fetch-connection message: either a pull request or the instruction it
/// was answered with.
#[derive(Clone, Debug)]
pub enum FetchPacket {
    /// Request for up to `byte_budget` bytes of instructions; `0` means
    /// "exactly one instruction regardless of its size" (§4.3 fetch pump
    /// detail — the engine's accumulation loop starts `weight` at the first
    /// instruction's size, so a `0` budget is satisfied after exactly one
    /// iteration).
    Request {
        /// Byte budget for this pull; see variant docs for the `0` case.
        byte_budget: u32,
    },
    /// The instruction satisfying a prior request.
    Response(InstructionPacket),
}

/// A bare machine address exchanged between cores, TLBs, caches, and
/// instruction-memory components.
pub type MemoryPacket = crate::common::Addr;

/// Messages exchanged on a predictor connection (§3: "Predictor packet").
#[derive(Clone, Debug)]
pub enum PredictorPacket {
    /// Query: "what do you predict for this static instruction?"
    Query(Rc<StaticInstruction>),
    /// Update: the instruction's actual taken/not-taken outcome.
    DirectionUpdate {
        /// Instruction the outcome belongs to.
        inst: Rc<StaticInstruction>,
        /// Whether the branch was actually taken.
        taken: bool,
    },
    /// Update: the instruction's actual resolved target address.
    TargetUpdate {
        /// Instruction the target belongs to.
        inst: Rc<StaticInstruction>,
        /// Resolved target address.
        target: u64,
    },
    /// Response: no useful prediction available.
    Unknown,
    /// Response: predict taken, but no target is known (e.g. RAS-less
    /// return prediction).
    Take,
    /// Response: predict taken, to a known target.
    TakeTo(u64),
    /// Response: predict not taken.
    DontTake,
}
