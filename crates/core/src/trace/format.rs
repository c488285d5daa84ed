//! Binary record layout for the three-file trace format (§6 "Binary trace
//! format").
//!
//! Every record starts with a one-byte tag identifying which union member
//! follows; the rest of this module is concerned with reading exactly that
//! many little-endian bytes off a buffered reader and never more.

use std::io::{self, Read};

use crate::common::{SimError, SimResult};
use crate::packet::{BranchKind, InstructionFlags, MAX_REGS};

const MNEMONIC_BYTES: usize = 32;

fn reader_err(reason: impl Into<String>) -> SimError {
    SimError::trace("sinuca", reason.into())
}

fn io_err(reason: &str, e: io::Error) -> SimError {
    reader_err(format!("{reason}: {e}"))
}

/// Thin little-endian cursor over anything implementing [`Read`]. Used by
/// every trace sub-reader (static/dynamic/memory) so the byte-layout code is
/// written once.
pub struct ByteReader<R> {
    inner: R,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &str) -> SimResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                reader_err(format!("truncated file reading {what}"))
            } else {
                io_err(what, e)
            }
        })
    }

    pub fn u8(&mut self) -> SimResult<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b, "u8")?;
        Ok(b[0])
    }

    /// Reads one byte without erroring on end-of-file; `None` signals a
    /// clean EOF at a record boundary (used to detect the end of a stream
    /// of variable-length records).
    pub fn u8_opt(&mut self) -> SimResult<Option<u8>> {
        let mut b = [0u8; 1];
        match self.inner.read(&mut b) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(b[0])),
            Err(e) => Err(io_err("u8", e)),
        }
    }

    pub fn u16(&mut self) -> SimResult<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b, "u16")?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn u32(&mut self) -> SimResult<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b, "u32")?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn u64(&mut self) -> SimResult<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b, "u64")?;
        Ok(u64::from_le_bytes(b))
    }

    pub fn bytes(&mut self, n: usize) -> SimResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf, "fixed-size field")?;
        Ok(buf)
    }
}

/// File-type tag at the front of every trace file (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Static,
    Dynamic,
    Memory,
}

impl FileType {
    pub fn from_tag(tag: u8) -> SimResult<Self> {
        match tag {
            0 => Ok(Self::Static),
            1 => Ok(Self::Dynamic),
            2 => Ok(Self::Memory),
            other => Err(reader_err(format!("unknown file_type tag {other}"))),
        }
    }
}

/// Parsed `{file_type, thread_count, bbl_count, inst_count}` static header.
pub struct StaticHeader {
    pub thread_count: u16,
    pub bbl_count: u64,
    pub inst_count: u64,
}

pub fn read_static_header<R: Read>(r: &mut ByteReader<R>) -> SimResult<StaticHeader> {
    let tag = r.u8()?;
    if FileType::from_tag(tag)? != FileType::Static {
        return Err(reader_err("static file does not start with file_type=0"));
    }
    let thread_count = r.u16()?;
    let bbl_count = r.u64()?;
    let inst_count = r.u64()?;
    Ok(StaticHeader {
        thread_count,
        bbl_count,
        inst_count,
    })
}

/// Tag for a static-file record: a basic-block size header, or a single
/// instruction entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticRecordTag {
    BblSize,
    Instruction,
}

pub fn read_static_record_tag<R: Read>(r: &mut ByteReader<R>) -> SimResult<StaticRecordTag> {
    match r.u8()? {
        0 => Ok(StaticRecordTag::BblSize),
        1 => Ok(StaticRecordTag::Instruction),
        other => Err(reader_err(format!("unknown static record tag {other}"))),
    }
}

/// One `instruction_entry` as it exists on disk, before the branch-kind tag
/// is decoded into [`BranchKind`] and the flags bitfield into
/// [`InstructionFlags`].
pub struct RawInstructionEntry {
    pub address: u64,
    pub read_regs: Vec<u16>,
    pub write_regs: Vec<u16>,
    pub id: u16,
    pub inst_size: u8,
    pub branch_kind_tag: u8,
    pub flags_bitfield: u8,
    pub num_std_mem_loads: u8,
    pub num_std_mem_stores: u8,
    pub mnemonic: String,
}

pub fn read_instruction_entry<R: Read>(r: &mut ByteReader<R>) -> SimResult<RawInstructionEntry> {
    let address = r.u64()?;

    let mut read_regs = Vec::with_capacity(MAX_REGS);
    for _ in 0..MAX_REGS {
        read_regs.push(r.u16()?);
    }
    let mut write_regs = Vec::with_capacity(MAX_REGS);
    for _ in 0..MAX_REGS {
        write_regs.push(r.u16()?);
    }

    let _base_reg = r.u16()?;
    let _index_reg = r.u16()?;
    let id = r.u16()?;

    let num_read_regs = r.u8()?;
    let num_write_regs = r.u8()?;
    let inst_size = r.u8()?;
    let branch_kind_tag = r.u8()?;
    let flags_bitfield = r.u8()?;
    let num_std_mem_loads = r.u8()?;
    let num_std_mem_stores = r.u8()?;

    read_regs.truncate(num_read_regs as usize);
    write_regs.truncate(num_write_regs as usize);

    let mnemonic_bytes = r.bytes(MNEMONIC_BYTES)?;
    let nul = mnemonic_bytes.iter().position(|&b| b == 0).unwrap_or(mnemonic_bytes.len());
    let mnemonic = String::from_utf8_lossy(&mnemonic_bytes[..nul]).into_owned();

    Ok(RawInstructionEntry {
        address,
        read_regs,
        write_regs,
        id,
        inst_size,
        branch_kind_tag,
        flags_bitfield,
        num_std_mem_loads,
        num_std_mem_stores,
        mnemonic,
    })
}

/// Decodes the one-byte branch-kind tag, in the order named by §3: none,
/// syscall, sysret, call, return, unconditional, conditional.
pub fn decode_branch_kind(tag: u8) -> SimResult<BranchKind> {
    match tag {
        0 => Ok(BranchKind::None),
        1 => Ok(BranchKind::Syscall),
        2 => Ok(BranchKind::SysRet),
        3 => Ok(BranchKind::Call),
        4 => Ok(BranchKind::Return),
        5 => Ok(BranchKind::Unconditional),
        6 => Ok(BranchKind::Conditional),
        other => Err(reader_err(format!("unknown branch_kind tag {other}"))),
    }
}

/// Decodes the eight-bit flag bundle, bit 0 through bit 6 in the order
/// [`InstructionFlags`] declares its fields; bit 7 is reserved/unused.
pub fn decode_flags(bits: u8) -> InstructionFlags {
    InstructionFlags {
        is_prefetch_hint: bits & 0b0000_0001 != 0,
        is_predicated: bits & 0b0000_0010 != 0,
        is_indirect_control_flow: bits & 0b0000_0100 != 0,
        causes_cache_flush: bits & 0b0000_1000 != 0,
        performs_atomic: bits & 0b0001_0000 != 0,
        reads_memory: bits & 0b0010_0000 != 0,
        writes_memory: bits & 0b0100_0000 != 0,
    }
}

/// Parsed `{file_type=1, total_executed_instructions}` dynamic header.
pub fn read_dynamic_header<R: Read>(r: &mut ByteReader<R>) -> SimResult<u64> {
    let tag = r.u8()?;
    if FileType::from_tag(tag)? != FileType::Dynamic {
        return Err(reader_err("dynamic file does not start with file_type=1"));
    }
    r.u64()
}

/// One dynamic-file record: either a basic-block index, or a thread event
/// surfaced through a side channel (never as an instruction).
#[derive(Clone, Copy, Debug)]
pub enum DynamicRecord {
    BasicBlock(u32),
    ThreadEvent { tid: u8, event: ThreadEvent },
}

/// §6 glossary: create, destroy, lock-request, barrier-sync, critical-start,
/// critical-end, abrupt-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadEvent {
    Create,
    Destroy,
    LockRequest,
    BarrierSync,
    CriticalStart,
    CriticalEnd,
    AbruptEnd,
}

fn decode_thread_event(tag: u8) -> Option<ThreadEvent> {
    match tag {
        0 => Some(ThreadEvent::Create),
        1 => Some(ThreadEvent::Destroy),
        2 => Some(ThreadEvent::LockRequest),
        3 => Some(ThreadEvent::BarrierSync),
        4 => Some(ThreadEvent::CriticalStart),
        5 => Some(ThreadEvent::CriticalEnd),
        6 => Some(ThreadEvent::AbruptEnd),
        _ => None,
    }
}

/// Reads one dynamic-file record, or `None` on a clean end-of-file at a
/// record boundary. Thread events that fail to decode are logged and
/// skipped, per §4.6's failure model, by returning the next real record.
pub fn read_dynamic_record<R: Read>(r: &mut ByteReader<R>) -> SimResult<Option<DynamicRecord>> {
    loop {
        let Some(kind) = r.u8_opt()? else { return Ok(None) };
        match kind {
            0 => return Ok(Some(DynamicRecord::BasicBlock(r.u32()?))),
            1 => {
                let tid = r.u8()?;
                let event_tag = r.u8()?;
                match decode_thread_event(event_tag) {
                    Some(event) => return Ok(Some(DynamicRecord::ThreadEvent { tid, event })),
                    None => {
                        tracing::warn!(tag = event_tag, "skipping undecodable thread-event record");
                        continue;
                    }
                }
            }
            other => return Err(reader_err(format!("unknown dynamic record kind {other}"))),
        }
    }
}

/// One memory-file record.
#[derive(Clone, Copy, Debug)]
pub enum MemoryRecord {
    NonStdHeader { read_count: u16, write_count: u16 },
    Operation { address: u64, size: u16, is_store: bool },
}

pub fn read_memory_record<R: Read>(r: &mut ByteReader<R>) -> SimResult<MemoryRecord> {
    match r.u8()? {
        0 => {
            let read_count = r.u16()?;
            let write_count = r.u16()?;
            Ok(MemoryRecord::NonStdHeader { read_count, write_count })
        }
        1 => {
            let address = r.u64()?;
            let size = r.u16()?;
            let tag = r.u8()?;
            let is_store = match tag {
                0 => false,
                1 => true,
                other => return Err(reader_err(format!("unknown load_or_store tag {other}"))),
            };
            Ok(MemoryRecord::Operation { address, size, is_store })
        }
        other => Err(reader_err(format!("unknown memory record kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case(0, BranchKind::None)]
    #[case(1, BranchKind::Syscall)]
    #[case(2, BranchKind::SysRet)]
    #[case(3, BranchKind::Call)]
    #[case(4, BranchKind::Return)]
    #[case(5, BranchKind::Unconditional)]
    #[case(6, BranchKind::Conditional)]
    fn decodes_every_branch_kind_tag(#[case] tag: u8, #[case] expected: BranchKind) {
        assert_eq!(decode_branch_kind(tag).unwrap(), expected);
    }

    #[test]
    fn roundtrips_static_header() {
        let mut bytes = vec![0u8]; // file_type = Static
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&10u64.to_le_bytes());
        bytes.extend_from_slice(&42u64.to_le_bytes());
        let mut r = ByteReader::new(Cursor::new(bytes));
        let header = read_static_header(&mut r).unwrap();
        assert_eq!(header.thread_count, 3);
        assert_eq!(header.bbl_count, 10);
        assert_eq!(header.inst_count, 42);
    }

    #[test]
    fn decodes_flags_bitfield() {
        let flags = decode_flags(0b0110_0000);
        assert!(flags.reads_memory);
        assert!(flags.writes_memory);
        assert!(!flags.is_prefetch_hint);
    }

    #[test]
    fn rejects_unknown_branch_kind() {
        assert!(decode_branch_kind(200).is_err());
    }
}
