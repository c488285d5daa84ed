//! Reference hardware component library (§4.7), exercising every capability
//! the substrate and builder provide: fixed-latency memories, a fetch
//! engine with branch prediction, a set-associative cache/TLB, and generic
//! forwarding stages.

mod btb;
mod cache;
mod counter;
mod fetcher;
mod itlb;
mod predictor;
mod queue;
mod ras;
mod simple_core;
mod simple_memory;

use crate::builder::ClassRegistry;
use crate::link::MessageKind;

/// Registers every standard-library component class under the `class:`
/// name a configuration names it by.
pub fn register_standard(registry: &mut ClassRegistry) {
    registry.register_default("SimpleMemory", || Box::new(simple_memory::SimpleMemory::new()));
    registry.register_default("SimpleInstructionMemory", || Box::new(simple_memory::SimpleMemory::new()));
    registry.register_default("SimpleCore", || Box::new(simple_core::SimpleCore::new()));
    registry.register_default("Cache", || Box::new(cache::Cache::new()));
    registry.register_default("ITlb", || Box::new(itlb::ITlb::new()));
    registry.register_default("InterleavedBtb", || Box::new(btb::InterleavedBtb::new()));
    registry.register_default("ReturnAddressStack", || Box::new(ras::ReturnAddressStack::new()));
    registry.register_default("HardwiredPredictor", || Box::new(predictor::HardwiredPredictor::new()));
    registry.register_default("Fetcher", || Box::new(fetcher::Fetcher::new()));

    registry.register_default("QueueMemory", || Box::new(queue::Queue::new(MessageKind::Memory)));
    registry.register_default("QueueFetch", || Box::new(queue::Queue::new(MessageKind::Fetch)));
    registry.register_default("QueuePredictor", || Box::new(queue::Queue::new(MessageKind::Predictor)));
    registry.register_default("DelayQueueMemory", || Box::new(queue::DelayQueue::new(MessageKind::Memory)));
    registry.register_default("DelayQueueFetch", || Box::new(queue::DelayQueue::new(MessageKind::Fetch)));
    registry.register_default("DelayQueuePredictor", || Box::new(queue::DelayQueue::new(MessageKind::Predictor)));
}
