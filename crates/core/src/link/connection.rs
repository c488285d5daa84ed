//! Connections: the double-buffered request/response channel pair that
//! every pair of wired components communicates over (§4.2).
//!
//! Connections live in a single central table owned by the [`crate::engine::Engine`]
//! rather than inside the components themselves. A component that owns a raw
//! field referencing its peer, which in turn references it back, is exactly
//! the aliased-mutable-borrow shape Rust's borrow checker forbids; indexing
//! into a shared table by [`ConnectionId`] sidesteps that while preserving
//! the logical owner/peer roles and per-connection diagnostics the original
//! design relies on.

use crate::packet::{FetchPacket, MemoryPacket, PredictorPacket};
use crate::ring::{Ring, RingError};

/// Which message type flows over a connection. Declared once when the
/// connection is allocated and fixed for its lifetime — this is the
/// "element size" invariant from §4.2, and doing the type check once at
/// `connect()` time is the capability test that replaces a dynamic cast on
/// every message (see `DESIGN.md`, source-pattern notes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Carries [`FetchPacket`] values.
    Fetch,
    /// Carries [`MemoryPacket`] values.
    Memory,
    /// Carries [`PredictorPacket`] values.
    Predictor,
}

/// The union of every message type any standard-library component exchanges.
/// A connection's `kind` pins it to exactly one variant; `Ring<Message>`
/// gives us the homogeneous, fixed-element-size channel the spec describes
/// without requiring unsafe type erasure.
#[derive(Clone, Debug)]
pub enum Message {
    /// A fetch request/response.
    Fetch(FetchPacket),
    /// A bare memory address.
    Memory(MemoryPacket),
    /// A predictor query/update/response.
    Predictor(PredictorPacket),
}

impl Message {
    /// The [`MessageKind`] this value belongs to.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Fetch(_) => MessageKind::Fetch,
            Self::Memory(_) => MessageKind::Memory,
            Self::Predictor(_) => MessageKind::Predictor,
        }
    }
}

/// Index of a component within the engine's component vector. Index `0` is
/// always the engine itself (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub usize);

/// The well-known id reserved for the engine, usable as a link target by any
/// component (e.g. a fetcher connecting its fetch source to the engine).
pub const ENGINE: ComponentId = ComponentId(0);

/// Handle to one allocated [`Connection`] inside a [`ConnTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub usize);

/// One double-buffered request/response channel between an owner and a peer
/// component.
///
/// `req`/`resp` each hold two banks; `current` selects which bank is
/// producer-visible right now (the other is consumer-visible). `swap` flips
/// it for both directions at once, matching the spec's single `swap()`
/// operation per connection.
#[derive(Debug)]
pub struct Connection {
    owner: ComponentId,
    peer: ComponentId,
    kind: MessageKind,
    req: [Ring<Message>; 2],
    resp: [Ring<Message>; 2],
    current: usize,
    /// Count of enqueue attempts dropped because the target bank was full;
    /// surfaced to statistics as `RuntimeOverflow` occurrences (§7).
    pub overflow_count: u64,
}

impl Connection {
    fn new(owner: ComponentId, peer: ComponentId, capacity: usize, kind: MessageKind) -> Self {
        Self {
            owner,
            peer,
            kind,
            req: [Ring::allocate(capacity), Ring::allocate(capacity)],
            resp: [Ring::allocate(capacity), Ring::allocate(capacity)],
            current: 0,
            overflow_count: 0,
        }
    }

    /// The component that called `connect()` to create this connection; the
    /// receive side for requests, send side for responses.
    #[must_use]
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// The component on the other end; the send side for requests, receive
    /// side for responses.
    #[must_use]
    pub fn peer(&self) -> ComponentId {
        self.peer
    }

    /// The fixed message kind this connection was allocated for.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    fn other_bank(&self) -> usize {
        1 - self.current
    }

    /// Flips the producer/consumer bank selector for both directions.
    pub fn swap(&mut self) {
        self.current = self.other_bank();
    }
}

/// Central table owning every [`Connection`] in the simulation, indexed by
/// [`ConnectionId`].
#[derive(Debug, Default)]
pub struct ConnTable {
    connections: Vec<Connection>,
}

impl ConnTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new connection with `owner` as the receive side for
    /// requests (and send side for responses), returning its id.
    pub fn allocate(
        &mut self,
        owner: ComponentId,
        peer: ComponentId,
        capacity: usize,
        kind: MessageKind,
    ) -> ConnectionId {
        let id = ConnectionId(self.connections.len());
        self.connections.push(Connection::new(owner, peer, capacity, kind));
        id
    }

    fn get(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0]
    }

    fn get_mut(&mut self, id: ConnectionId) -> &mut Connection {
        &mut self.connections[id.0]
    }

    /// The declared kind of connection `id`.
    #[must_use]
    pub fn kind_of(&self, id: ConnectionId) -> MessageKind {
        self.get(id).kind()
    }

    /// The owner component of connection `id`.
    #[must_use]
    pub fn owner_of(&self, id: ConnectionId) -> ComponentId {
        self.get(id).owner()
    }

    /// Called by the peer: enqueues `msg` onto the producer-visible request
    /// bank. Overflow is counted, not fatal.
    pub fn enqueue_request(&mut self, id: ConnectionId, msg: Message) -> Result<(), RingError> {
        let conn = self.get_mut(id);
        let bank = conn.current;
        let result = conn.req[bank].enqueue(msg);
        if result.is_err() {
            conn.overflow_count += 1;
        }
        result
    }

    /// Called by the owner: pops from the consumer-visible request bank.
    pub fn dequeue_request(&mut self, id: ConnectionId) -> Result<Message, RingError> {
        let conn = self.get_mut(id);
        let bank = conn.other_bank();
        conn.req[bank].dequeue()
    }

    /// Called by the owner: enqueues `msg` onto the producer-visible
    /// response bank.
    pub fn enqueue_response(&mut self, id: ConnectionId, msg: Message) -> Result<(), RingError> {
        let conn = self.get_mut(id);
        let bank = conn.current;
        let result = conn.resp[bank].enqueue(msg);
        if result.is_err() {
            conn.overflow_count += 1;
        }
        result
    }

    /// Called by the peer: pops from the consumer-visible response bank.
    pub fn dequeue_response(&mut self, id: ConnectionId) -> Result<Message, RingError> {
        let conn = self.get_mut(id);
        let bank = conn.other_bank();
        conn.resp[bank].dequeue()
    }

    /// Flips the bank selector on a single connection.
    pub fn swap(&mut self, id: ConnectionId) {
        self.get_mut(id).swap();
    }

    /// Flips the bank selector on every connection owned by `owner`. This is
    /// the default `post_clock` behavior every component gets for free.
    pub fn swap_owned_by(&mut self, owner: ComponentId) {
        for conn in &mut self.connections {
            if conn.owner == owner {
                conn.swap();
            }
        }
    }

    /// Every connection owned by `owner`, in allocation order. Lets a
    /// forwarding/aggregating component (a queue, a cache, a TLB) drain
    /// traffic from however many peers wired to it without tracking its own
    /// inbound connection ids separately.
    #[must_use]
    pub fn connections_owned_by(&self, owner: ComponentId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, conn)| conn.owner == owner)
            .map(|(i, _)| ConnectionId(i))
            .collect()
    }

    /// Total overflow occurrences across every connection, for the
    /// end-of-run statistics summary.
    #[must_use]
    pub fn total_overflows(&self) -> u64 {
        self.connections.iter().map(|c| c.overflow_count).sum()
    }

    /// Number of connections allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// `true` iff no connections have been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
