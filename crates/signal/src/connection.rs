//! Non-owning handles to connected slots.
//!
//! A [`Connection`] never keeps its slot alive. Once the signal drops the slot
//! (after a disconnect and after every in-flight emission released its snapshot),
//! all operations on the handle become neutral no-ops.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Slot operations reachable through a handle.
pub(crate) trait SlotControl: Send + Sync {
	/// Connected and, for tracked slots, owner still alive.
	fn connected(&self) -> bool;
	/// Performs the one-way connected transition; true if this call did it.
	fn disconnect(&self) -> bool;
	fn blocked(&self) -> bool;
	/// Sets the block flag, returning the previous value.
	fn set_blocked(&self, blocked: bool) -> bool;
}

/// Handle to a slot connected to a signal.
///
/// Cloning a connection yields another handle to the same slot. Holding a
/// connection is not required to keep the slot connected.
#[derive(Clone, Default)]
pub struct Connection {
	slot: Option<Weak<dyn SlotControl>>,
}

impl Connection {
	pub(crate) fn new(slot: Weak<dyn SlotControl>) -> Self {
		Self { slot: Some(slot) }
	}

	fn upgrade(&self) -> Option<Arc<dyn SlotControl>> {
		self.slot.as_ref()?.upgrade()
	}

	/// Returns true while the slot still exists.
	pub fn valid(&self) -> bool {
		self.slot.as_ref().is_some_and(|slot| slot.strong_count() > 0)
	}

	/// Returns true while the slot exists and has not been disconnected.
	pub fn connected(&self) -> bool {
		self.upgrade().is_some_and(|slot| slot.connected())
	}

	/// Disconnects the slot.
	///
	/// Returns true only for the call that actually performed the disconnection.
	pub fn disconnect(&self) -> bool {
		self.upgrade().is_some_and(|slot| slot.disconnect())
	}

	/// Returns true if the slot exists and is blocked.
	pub fn blocked(&self) -> bool {
		self.upgrade().is_some_and(|slot| slot.blocked())
	}

	/// Blocks the slot; emissions skip it until [`Connection::unblock`].
	pub fn block(&self) {
		if let Some(slot) = self.upgrade() {
			slot.set_blocked(true);
		}
	}

	/// Unblocks the slot.
	pub fn unblock(&self) {
		if let Some(slot) = self.upgrade() {
			slot.set_blocked(false);
		}
	}

	/// Blocks the slot for the lifetime of the returned guard.
	pub fn blocker(&self) -> ConnectionBlocker {
		ConnectionBlocker::new(self.slot.clone())
	}
}

impl PartialEq for Connection {
	fn eq(&self, other: &Self) -> bool {
		match (&self.slot, &other.slot) {
			(Some(a), Some(b)) => Weak::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		}
	}
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection")
			.field("valid", &self.valid())
			.field("connected", &self.connected())
			.field("blocked", &self.blocked())
			.finish()
	}
}

/// Connection that disconnects its slot when dropped.
///
/// Moving the value moves the obligation; [`ScopedConnection::release`] gives
/// the plain handle back without disconnecting.
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "dropping a ScopedConnection disconnects its slot immediately"]
pub struct ScopedConnection {
	conn: Connection,
}

impl ScopedConnection {
	/// Returns the underlying handle.
	pub fn connection(&self) -> &Connection {
		&self.conn
	}

	/// Gives up the disconnect-on-drop obligation.
	pub fn release(mut self) -> Connection {
		std::mem::take(&mut self.conn)
	}
}

impl From<Connection> for ScopedConnection {
	fn from(conn: Connection) -> Self {
		Self { conn }
	}
}

impl Deref for ScopedConnection {
	type Target = Connection;

	fn deref(&self) -> &Connection {
		&self.conn
	}
}

impl Drop for ScopedConnection {
	fn drop(&mut self) {
		self.conn.disconnect();
	}
}

/// Blocks a slot while alive and restores the previous block state on drop.
#[must_use = "the slot is unblocked again as soon as the blocker is dropped"]
pub struct ConnectionBlocker {
	slot: Option<Weak<dyn SlotControl>>,
	was_blocked: bool,
}

impl ConnectionBlocker {
	fn new(slot: Option<Weak<dyn SlotControl>>) -> Self {
		let was_blocked = slot
			.as_ref()
			.and_then(Weak::upgrade)
			.is_some_and(|slot| slot.set_blocked(true));
		Self { slot, was_blocked }
	}
}

impl Drop for ConnectionBlocker {
	fn drop(&mut self) {
		if let Some(slot) = self.slot.as_ref().and_then(Weak::upgrade) {
			slot.set_blocked(self.was_blocked);
		}
	}
}

impl fmt::Debug for ConnectionBlocker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionBlocker")
			.field("active", &self.slot.as_ref().is_some_and(|slot| slot.strong_count() > 0))
			.field("was_blocked", &self.was_blocked)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, Ordering};

	use super::*;

	#[derive(Default)]
	struct FakeSlot {
		connected: AtomicBool,
		blocked: AtomicBool,
	}

	impl FakeSlot {
		fn live() -> Arc<Self> {
			let slot = Arc::new(Self::default());
			slot.connected.store(true, Ordering::SeqCst);
			slot
		}
	}

	impl SlotControl for FakeSlot {
		fn connected(&self) -> bool {
			self.connected.load(Ordering::SeqCst)
		}

		fn disconnect(&self) -> bool {
			self.connected.swap(false, Ordering::SeqCst)
		}

		fn blocked(&self) -> bool {
			self.blocked.load(Ordering::SeqCst)
		}

		fn set_blocked(&self, blocked: bool) -> bool {
			self.blocked.swap(blocked, Ordering::SeqCst)
		}
	}

	fn handle(slot: &Arc<FakeSlot>) -> Connection {
		let slot: Arc<dyn SlotControl> = slot.clone();
		Connection::new(Arc::downgrade(&slot))
	}

	#[test]
	fn disconnect_reports_only_the_first_transition() {
		let slot = FakeSlot::live();
		let conn = handle(&slot);
		assert!(conn.connected());
		assert!(conn.disconnect());
		assert!(!conn.disconnect());
		assert!(!conn.connected());
		assert!(conn.valid());
	}

	#[test]
	fn expired_handles_are_neutral() {
		let slot = FakeSlot::live();
		let conn = handle(&slot);
		drop(slot);

		assert!(!conn.valid());
		assert!(!conn.connected());
		assert!(!conn.blocked());
		assert!(!conn.disconnect());
		conn.block();
		conn.unblock();
		let _blocker = conn.blocker();

		let empty = Connection::default();
		assert!(!empty.valid());
		assert!(!empty.disconnect());
	}

	#[test]
	fn scoped_connection_disconnects_on_drop() {
		let slot = FakeSlot::live();
		{
			let _scoped = ScopedConnection::from(handle(&slot));
			assert!(slot.connected());
		}
		assert!(!slot.connected());
	}

	#[test]
	fn released_scoped_connection_stays_connected() {
		let slot = FakeSlot::live();
		let scoped = ScopedConnection::from(handle(&slot));
		let conn = scoped.release();
		assert!(conn.connected());
		assert!(slot.connected());
	}

	#[test]
	fn moved_scoped_connection_disconnects_once() {
		let slot = FakeSlot::live();
		let scoped = ScopedConnection::from(handle(&slot));
		let moved = scoped;
		assert!(moved.connected());
		drop(moved);
		assert!(!slot.connected());
	}

	#[test]
	fn blocker_restores_previous_state() {
		let slot = FakeSlot::live();
		let conn = handle(&slot);
		{
			let _blocker = conn.blocker();
			assert!(conn.blocked());
		}
		assert!(!conn.blocked());

		conn.block();
		{
			let _blocker = conn.blocker();
			assert!(conn.blocked());
		}
		assert!(conn.blocked(), "blocker must not unblock a slot that was already blocked");
	}

	#[test]
	fn handles_compare_by_slot() {
		let a = FakeSlot::live();
		let b = FakeSlot::live();
		assert_eq!(handle(&a), handle(&a));
		assert_ne!(handle(&a), handle(&b));
		assert_ne!(handle(&a), Connection::default());
		assert_eq!(Connection::default(), Connection::default());
	}
}
