//! Owner-side bookkeeping of connections.
//!
//! A type that embeds an [`Observer`] and implements [`Observes`] can be bound
//! with [`Signal::bind_observer`]. Every such connection is recorded in the
//! observer as a [`ScopedConnection`], so the owner disconnects all of its slots
//! in one call during teardown, or implicitly when the observer is dropped.
//!
//! Call [`Observer::disconnect_all`] at the start of the owner's own teardown if
//! slots read state that is torn down before the observer field is dropped.
//!
//! [`Signal::bind_observer`]: crate::Signal::bind_observer

use std::fmt;
use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::connection::{Connection, ScopedConnection};
use crate::lock::{Blocking, LockPolicy};

/// Types owning an [`Observer`].
pub trait Observes {
	/// Lock policy of the embedded observer.
	type Lock: LockPolicy;

	fn observer(&self) -> &Observer<Self::Lock>;
}

/// Lock-guarded list of the connections bound to one owner.
pub struct Observer<L: LockPolicy = Blocking> {
	connections: Mutex<Vec<ScopedConnection>>,
	_policy: PhantomData<L>,
}

impl<L: LockPolicy> Observer<L> {
	pub fn new() -> Self {
		Self {
			connections: Mutex::new(Vec::new()),
			_policy: PhantomData,
		}
	}

	/// Records `conn`, dropping entries whose slot no longer exists.
	pub(crate) fn add_connection(&self, conn: Connection) {
		let mut connections = L::acquire(&self.connections);
		connections.retain(|scoped| scoped.valid());
		connections.push(conn.into());
	}

	/// Number of recorded connections, including ones already disconnected
	/// elsewhere but not yet pruned.
	pub fn len(&self) -> usize {
		L::acquire(&self.connections).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Disconnects every recorded connection.
	///
	/// Slots are disconnected after the observer lock is released, so a slot
	/// destructor may bind new connections to the same owner.
	pub fn disconnect_all(&self) {
		let connections = std::mem::take(&mut *L::acquire(&self.connections));
		tracing::debug!(count = connections.len(), "observer.disconnect_all");
		drop(connections);
	}
}

impl<L: LockPolicy> Default for Observer<L> {
	fn default() -> Self {
		Self::new()
	}
}

impl<L: LockPolicy> fmt::Debug for Observer<L> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observer").field("connections", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::Signal;

	#[derive(Default)]
	struct Counter {
		hits: AtomicUsize,
		observer: Observer,
	}

	impl Counter {
		fn on_value(&self, v: &usize) {
			self.hits.fetch_add(*v, Ordering::Relaxed);
		}

		fn hits(&self) -> usize {
			self.hits.load(Ordering::Relaxed)
		}
	}

	impl Observes for Counter {
		type Lock = Blocking;

		fn observer(&self) -> &Observer {
			&self.observer
		}
	}

	#[test]
	fn bound_connections_are_recorded() {
		let sig = Signal::<usize>::new();
		let counter = Arc::new(Counter::default());
		let conn = sig.bind_observer(&counter, Counter::on_value).connect();

		assert_eq!(counter.observer().len(), 1);
		sig.emit(&2);
		assert_eq!(counter.hits(), 2);
		assert!(conn.connected());
	}

	#[test]
	fn disconnect_all_removes_slots_from_signals() {
		let first = Signal::<usize>::new();
		let second = Signal::<usize>::new();
		let counter = Arc::new(Counter::default());
		let a = first.bind_observer(&counter, Counter::on_value).connect();
		let b = second.bind_observer(&counter, Counter::on_value).connect();

		counter.observer().disconnect_all();
		assert!(counter.observer().is_empty());
		assert!(!a.connected());
		assert!(!b.connected());
		assert_eq!(first.slot_count(), 0);
		assert_eq!(second.slot_count(), 0);

		first.emit(&1);
		second.emit(&1);
		assert_eq!(counter.hits(), 0);
	}

	#[test]
	fn dropping_the_owner_disconnects() {
		let sig = Signal::<usize>::new();
		let counter = Arc::new(Counter::default());
		let conn = sig.bind_observer(&counter, Counter::on_value).connect();
		drop(counter);

		assert!(!conn.connected());
		assert_eq!(sig.slot_count(), 0);
		sig.emit(&1);
	}

	#[test]
	fn stale_entries_are_pruned_on_insert() {
		let sig = Signal::<usize>::new();
		let counter = Arc::new(Counter::default());
		let first = sig.bind_observer(&counter, Counter::on_value).connect();
		first.disconnect();
		assert_eq!(counter.observer().len(), 1);

		let _second = sig.bind_observer(&counter, Counter::on_value).connect();
		assert_eq!(counter.observer().len(), 1);
	}

	#[test]
	fn unconnected_builder_records_nothing() {
		let sig = Signal::<usize>::new();
		let counter = Arc::new(Counter::default());
		drop(sig.bind_observer(&counter, Counter::on_value));
		assert!(counter.observer().is_empty());
		assert_eq!(sig.slot_count(), 0);
	}
}
