use std::fmt;
use std::sync::Arc;

use super::{Outcome, SlotParts};
use crate::connection::{Connection, ScopedConnection};
use crate::identity::{Trackable, Tracker};
use crate::lock::LockPolicy;
use crate::registry::GroupId;
use crate::signal::Signal;

type ConnectHook<'s> = Box<dyn FnOnce(&Connection) + 's>;

/// Pending slot registration.
///
/// Created by [`Signal::slot`] and friends; nothing is registered until
/// [`SlotBuilder::connect`] or [`SlotBuilder::connect_scoped`] is called.
#[must_use = "a slot is only registered once `connect` or `connect_scoped` is called"]
pub struct SlotBuilder<'s, A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	signal: &'s Signal<A, G, L>,
	parts: SlotParts<A>,
	group: G,
	on_connect: Option<ConnectHook<'s>>,
}

impl<'s, A: ?Sized + 'static, G: GroupId, L: LockPolicy> SlotBuilder<'s, A, G, L> {
	pub(crate) fn new(signal: &'s Signal<A, G, L>, parts: SlotParts<A>) -> Self {
		Self {
			signal,
			parts,
			group: G::default(),
			on_connect: None,
		}
	}

	pub(crate) fn on_connect(mut self, hook: impl FnOnce(&Connection) + 's) -> Self {
		self.on_connect = Some(Box::new(hook));
		self
	}

	pub(crate) fn parts_mut(&mut self) -> &mut SlotParts<A> {
		&mut self.parts
	}

	/// Places the slot in `group`. Groups run in ascending order during emission.
	pub fn group(mut self, group: G) -> Self {
		self.group = group;
		self
	}

	/// Gates invocation on the liveness of `owner`.
	///
	/// The slot only keeps a [`Tracker`] to the owner. Once the owner is gone the
	/// next emission skips the slot and disconnects it. The owner also becomes the
	/// slot's identity for [`Signal::disconnect_owner`].
	pub fn track<T: Trackable>(mut self, owner: &T) -> Self {
		let tracker = Arc::new(owner.tracker());
		let gate = Arc::clone(&tracker);
		let invoker = self.parts.invoker;
		self.parts.invoker = Box::new(move |conn: &Connection, args: &A| match gate.resolve() {
			Some(_alive) => invoker(conn, args),
			None => Outcome::Expired,
		});
		self.parts.owner = Some(<T::Tracker as Tracker>::owner_id(&tracker));
		let previous = self.parts.liveness.take();
		self.parts.liveness = Some(Box::new(move || !tracker.expired() && previous.as_ref().is_none_or(|alive| alive())));
		self
	}

	/// Registers the slot.
	pub fn connect(self) -> Connection {
		let conn = self.signal.register(self.parts, self.group);
		if let Some(hook) = self.on_connect {
			hook(&conn);
		}
		conn
	}

	/// Registers the slot and ties its lifetime to the returned guard.
	pub fn connect_scoped(self) -> ScopedConnection {
		self.connect().into()
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> fmt::Debug for SlotBuilder<'_, A, G, L> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SlotBuilder")
			.field("group", &self.group)
			.field("callable", &self.parts.callable)
			.field("owner", &self.parts.owner)
			.field("tracked", &self.parts.liveness.is_some())
			.finish_non_exhaustive()
	}
}
