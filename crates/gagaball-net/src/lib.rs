//! Host/client authority for gagaball rooms.
//!
//! The host owns the ball, confirms eliminations and starts and ends the
//! match; each client owns only its local player's position. Everything runs
//! over the [`Transport`] abstraction, drained once per tick.

pub mod driver;
pub mod error;
pub mod event;
pub mod roster;
pub mod session;
pub mod transport;

pub use driver::PeerMatch;
pub use error::{SessionError, SetupError};
pub use event::{EventBus, SessionEvent};
pub use session::{MatchInput, NetworkSession, Role, SessionConfig};
pub use transport::{ConnectionId, MemoryNetwork, MemoryTransport, Transport, TransportEvent};
