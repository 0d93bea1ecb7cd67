//! Slots: a registered callable plus its connection state.
//!
//! Every callable shape collapses into one [`Slot`] type. The capabilities a shape
//! needs are assembled at connect time:
//!
//! * the invoker closure applies the callable, binding a target object or passing
//!   the slot's own [`Connection`] when the shape asks for it;
//! * an optional liveness probe reports whether a tracked owner still exists;
//! * optional identities ([`CallableId`], [`OwnerId`]) enable value-based
//!   disconnection.

mod builder;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

pub use builder::SlotBuilder;

use crate::connection::{Connection, SlotControl};
use crate::identity::{CallableId, OwnerId};
use crate::lock::LockPolicy;
use crate::registry::GroupId;
use crate::signal::Anchor;

/// Result of running a slot's invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
	Invoked,
	/// The tracked owner is gone; the callable was not run.
	Expired,
}

pub(crate) type Invoker<A> = Box<dyn Fn(&Connection, &A) -> Outcome + Send + Sync>;
pub(crate) type Liveness = Box<dyn Fn() -> bool + Send + Sync>;

/// Capability set of a slot before it is registered.
pub(crate) struct SlotParts<A: ?Sized> {
	pub invoker: Invoker<A>,
	pub callable: Option<CallableId>,
	pub owner: Option<OwnerId>,
	pub liveness: Option<Liveness>,
}

impl<A: ?Sized> SlotParts<A> {
	pub fn new(invoker: Invoker<A>) -> Self {
		Self {
			invoker,
			callable: None,
			owner: None,
			liveness: None,
		}
	}
}

/// Type independent slot state shared with connection handles.
pub(crate) struct SlotState<G> {
	connected: AtomicBool,
	blocked: AtomicBool,
	/// Position inside the group's slot list; written under the registry lock.
	index: AtomicUsize,
	group: G,
}

impl<G: GroupId> SlotState<G> {
	pub fn new(group: G) -> Self {
		Self {
			connected: AtomicBool::new(true),
			blocked: AtomicBool::new(false),
			index: AtomicUsize::new(0),
			group,
		}
	}

	pub fn connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	/// One-way transition; returns true for the caller that performed it.
	pub fn mark_disconnected(&self) -> bool {
		self.connected.swap(false, Ordering::AcqRel)
	}

	pub fn blocked(&self) -> bool {
		self.blocked.load(Ordering::Acquire)
	}

	pub fn set_blocked(&self, blocked: bool) -> bool {
		self.blocked.swap(blocked, Ordering::AcqRel)
	}

	pub fn index(&self) -> usize {
		self.index.load(Ordering::Relaxed)
	}

	pub fn set_index(&self, index: usize) {
		self.index.store(index, Ordering::Relaxed);
	}

	pub fn group(&self) -> G {
		self.group
	}
}

/// A connected callable.
pub(crate) struct Slot<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	state: SlotState<G>,
	invoker: Invoker<A>,
	callable: Option<CallableId>,
	owner: Option<OwnerId>,
	liveness: Option<Liveness>,
	/// Handle to this slot, handed to extended callables.
	this: Connection,
	anchor: Arc<Anchor<A, G, L>>,
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Slot<A, G, L> {
	pub fn new(parts: SlotParts<A>, group: G, anchor: Arc<Anchor<A, G, L>>) -> Arc<Self> {
		Arc::new_cyclic(|this: &Weak<Self>| {
			let this: Weak<dyn SlotControl> = this.clone();
			Self {
				state: SlotState::new(group),
				invoker: parts.invoker,
				callable: parts.callable,
				owner: parts.owner,
				liveness: parts.liveness,
				this: Connection::new(this),
				anchor,
			}
		})
	}

	pub fn state(&self) -> &SlotState<G> {
		&self.state
	}

	pub fn connection(&self) -> Connection {
		self.this.clone()
	}

	pub fn is_connected(&self) -> bool {
		self.state.connected() && self.liveness.as_ref().is_none_or(|alive| alive())
	}

	pub fn matches_callable(&self, callable: CallableId) -> bool {
		self.callable == Some(callable)
	}

	pub fn matches_owner(&self, owner: OwnerId) -> bool {
		self.owner == Some(owner)
	}

	/// Runs the callable if the slot is connected and unblocked.
	///
	/// Returns true when the callable ran. A tracked slot whose owner expired
	/// disconnects itself instead.
	pub fn call(&self, args: &A) -> bool {
		if !self.state.connected() || self.state.blocked() {
			return false;
		}
		match (self.invoker)(&self.this, args) {
			Outcome::Invoked => true,
			Outcome::Expired => {
				tracing::debug!(group = ?self.state.group, "signal.slot.expired");
				self.disconnect_and_clean();
				false
			}
		}
	}

	fn disconnect_and_clean(&self) -> bool {
		if !self.state.mark_disconnected() {
			return false;
		}
		self.anchor.clean(self);
		true
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> SlotControl for Slot<A, G, L> {
	fn connected(&self) -> bool {
		self.is_connected()
	}

	fn disconnect(&self) -> bool {
		self.disconnect_and_clean()
	}

	fn blocked(&self) -> bool {
		self.state.blocked()
	}

	fn set_blocked(&self, blocked: bool) -> bool {
		self.state.set_blocked(blocked)
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> fmt::Debug for Slot<A, G, L> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Slot")
			.field("group", &self.state.group)
			.field("index", &self.state.index())
			.field("connected", &self.state.connected())
			.field("blocked", &self.state.blocked())
			.field("callable", &self.callable)
			.field("owner", &self.owner)
			.finish_non_exhaustive()
	}
}
