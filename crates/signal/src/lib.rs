//! Thread-safe signals and slots.
//!
//! A [`Signal`] dispatches a shared argument to every connected slot. Slots are
//! arranged in ordered groups, connected through a [`Connection`] handle that
//! never keeps them alive, and may be bound to targets that are held strongly,
//! tracked weakly, or that record their connections in an [`Observer`].
//!
//! Emission runs on a snapshot of the registry taken under a short lock, so any
//! thread may connect, disconnect or emit concurrently, including from inside a
//! slot, and two signals may emit each other from two threads without
//! deadlocking.

/// Connection handles and RAII guards.
pub mod connection;
/// Checked emission errors.
pub mod error;
/// Callable and owner identities, weak owner tracking.
pub mod identity;
/// Registry lock policies.
pub mod lock;
/// Owner-side connection bookkeeping.
pub mod observer;
mod registry;
mod signal;
mod slot;

pub use connection::{Connection, ConnectionBlocker, ScopedConnection};
pub use error::EmitError;
pub use identity::{CallableId, OwnerId, Trackable, Tracker};
pub use lock::{Blocking, Local, LockPolicy, Spin};
pub use observer::{Observer, Observes};
pub use registry::GroupId;
pub use signal::{LocalSignal, Signal, SpinSignal};
pub use slot::SlotBuilder;
