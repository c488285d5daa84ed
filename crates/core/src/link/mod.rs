//! The component/link substrate (§4.1, §4.2): rings, connections, and the
//! `Component` capability contract every hardware model implements.

mod connection;
mod linkable;

pub use connection::{ComponentId, ConnTable, Connection, ConnectionId, Message, MessageKind, ENGINE};
pub use linkable::Component;

use crate::common::{Location, SimError, SimResult};

/// Implements the "Connect protocol" (§4.2): `peer` wishes to exchange
/// `kind`-typed messages with `owner`. Validates that `owner`'s declared
/// [`MessageKind`] matches, then allocates the connection in the shared
/// table and returns its id to the caller, who stores it for later
/// `send`/`recv` calls.
///
/// This free function is what the design notes call "a capability/trait
/// test" replacing a dynamic cast: the mismatch is caught once, at wiring
/// time, with a location-bearing diagnostic, rather than deferred to a
/// runtime panic or silent corruption on the first message.
pub fn connect(
    conns: &mut ConnTable,
    owner: ComponentId,
    owner_kind: MessageKind,
    peer: ComponentId,
    requested_kind: MessageKind,
    capacity: usize,
    location: &Location,
    owner_name: &str,
) -> SimResult<ConnectionId> {
    if owner_kind != requested_kind {
        return Err(SimError::semantic(
            location.clone(),
            owner_name,
            format!(
                "connect() requested a {requested_kind:?} connection but component accepts {owner_kind:?}"
            ),
        ));
    }
    Ok(conns.allocate(owner, peer, capacity, requested_kind))
}
