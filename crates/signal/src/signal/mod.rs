//! The emitter.
//!
//! A [`Signal`] owns a group-ordered registry of slots behind a short lock.
//! Emission copies the registry pointer under the lock, releases it, and then
//! invokes the snapshot's slots group by group in ascending id order. Writers
//! mutate the registry in place while no emission holds a snapshot and clone it
//! otherwise, so emissions never block connects or disconnects and a slot may
//! freely connect, disconnect or emit from inside its own invocation.

mod shared;

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub(crate) use shared::Anchor;
use shared::Core;

use crate::connection::{Connection, ScopedConnection};
use crate::error::{EmitError, panic_message};
use crate::identity::{CallableId, OwnerId, Trackable, Tracker};
use crate::lock::{Blocking, Local, LockPolicy, Spin};
use crate::observer::Observes;
use crate::registry::{GroupId, SlotRef};
use crate::slot::{Outcome, Slot, SlotBuilder, SlotParts};

/// Thread-safe signal carrying arguments of type `A`.
///
/// Several arguments are passed as a tuple: `Signal<(i32, String)>`. Slots are
/// arranged in groups of type `G` (ascending order on emission, default group
/// `G::default()`), and the registry lock follows the policy `L`.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// use tether_signal::Signal;
///
/// let sig = Signal::<i32>::new();
/// let sum = Arc::new(AtomicI32::new(0));
/// let total = Arc::clone(&sum);
/// let conn = sig.connect(move |v: &i32| {
/// 	total.fetch_add(*v, Ordering::Relaxed);
/// });
///
/// sig.emit(&2);
/// conn.disconnect();
/// sig.emit(&3);
/// assert_eq!(sum.load(Ordering::Relaxed), 2);
/// ```
pub struct Signal<A: ?Sized + 'static, G: GroupId = i32, L: LockPolicy = Blocking> {
	core: Arc<Core<A, G, L>>,
	_marker: L::Marker,
}

/// Signal whose registry lock spins instead of parking.
pub type SpinSignal<A, G = i32> = Signal<A, G, Spin>;

/// Single-threaded signal; the handle is `!Sync`.
pub type LocalSignal<A, G = i32> = Signal<A, G, Local>;

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Signal<A, G, L> {
	pub fn new() -> Self {
		Self {
			core: Core::new(),
			_marker: L::Marker::default(),
		}
	}

	/// Whether this signal's lock policy allows sharing it between threads.
	pub fn is_thread_safe(&self) -> bool {
		L::THREAD_SAFE
	}

	pub(crate) fn register(&self, parts: SlotParts<A>, group: G) -> Connection {
		let mut inner = self.core.lock();
		let slot = Slot::new(parts, group, Arc::clone(&inner.anchor));
		let conn = slot.connection();
		let copied = inner.registry.is_shared();
		let registry = inner.registry.write();
		registry.insert(slot);
		let slots = registry.len();
		drop(inner);
		tracing::trace!(?group, slots, copied, "signal.connect");
		conn
	}

	/// Starts a registration for a plain callable.
	pub fn slot<F>(&self, f: F) -> SlotBuilder<'_, A, G, L>
	where
		F: Fn(&A) + Send + Sync + 'static,
	{
		SlotBuilder::new(
			self,
			SlotParts::new(Box::new(move |_: &Connection, args: &A| {
				f(args);
				Outcome::Invoked
			})),
		)
	}

	/// Connects `f` to the default group.
	pub fn connect<F>(&self, f: F) -> Connection
	where
		F: Fn(&A) + Send + Sync + 'static,
	{
		self.slot(f).connect()
	}

	/// Connects `f` and disconnects it when the returned guard drops.
	pub fn connect_scoped<F>(&self, f: F) -> ScopedConnection
	where
		F: Fn(&A) + Send + Sync + 'static,
	{
		self.slot(f).connect_scoped()
	}

	/// Starts a registration for a callable receiving its own connection.
	pub fn slot_extended<F>(&self, f: F) -> SlotBuilder<'_, A, G, L>
	where
		F: Fn(&Connection, &A) + Send + Sync + 'static,
	{
		SlotBuilder::new(
			self,
			SlotParts::new(Box::new(move |conn: &Connection, args: &A| {
				f(conn, args);
				Outcome::Invoked
			})),
		)
	}

	/// Connects a callable receiving its own connection, typically to let it
	/// disconnect itself.
	pub fn connect_extended<F>(&self, f: F) -> Connection
	where
		F: Fn(&Connection, &A) + Send + Sync + 'static,
	{
		self.slot_extended(f).connect()
	}

	/// Starts a registration for a function pointer.
	///
	/// Function pointers carry an identity, so the slot can later be removed
	/// with [`Signal::disconnect_fn`].
	pub fn slot_fn(&self, f: fn(&A)) -> SlotBuilder<'_, A, G, L> {
		let mut parts = SlotParts::new(Box::new(move |_: &Connection, args: &A| {
			f(args);
			Outcome::Invoked
		}));
		parts.callable = Some(CallableId::from_addr(f as usize));
		SlotBuilder::new(self, parts)
	}

	pub fn connect_fn(&self, f: fn(&A)) -> Connection {
		self.slot_fn(f).connect()
	}

	/// Binds `f` to a strongly held target.
	///
	/// The slot keeps `target` alive until it is disconnected. The target is the
	/// slot's owner for [`Signal::disconnect_owner`].
	pub fn bind<T, F>(&self, target: &Arc<T>, f: F) -> SlotBuilder<'_, A, G, L>
	where
		T: ?Sized + Send + Sync + 'static,
		F: Fn(&T, &A) + Send + Sync + 'static,
	{
		let owner = OwnerId::of(Arc::as_ptr(target));
		let target = Arc::clone(target);
		let mut parts = SlotParts::new(Box::new(move |_: &Connection, args: &A| {
			f(&*target, args);
			Outcome::Invoked
		}));
		parts.owner = Some(owner);
		SlotBuilder::new(self, parts)
	}

	/// Binds a method-like function pointer to a strongly held target.
	///
	/// The pair of function and target can later be removed with
	/// [`Signal::disconnect_method`].
	pub fn bind_method<T>(&self, target: &Arc<T>, f: fn(&T, &A)) -> SlotBuilder<'_, A, G, L>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		let mut builder = self.bind(target, f);
		builder.parts_mut().callable = Some(CallableId::from_addr(f as usize));
		builder
	}

	/// Binds `f` to a strongly held target and passes it the slot's connection.
	pub fn bind_extended<T, F>(&self, target: &Arc<T>, f: F) -> SlotBuilder<'_, A, G, L>
	where
		T: ?Sized + Send + Sync + 'static,
		F: Fn(&T, &Connection, &A) + Send + Sync + 'static,
	{
		let owner = OwnerId::of(Arc::as_ptr(target));
		let target = Arc::clone(target);
		let mut parts = SlotParts::new(Box::new(move |conn: &Connection, args: &A| {
			f(&*target, conn, args);
			Outcome::Invoked
		}));
		parts.owner = Some(owner);
		SlotBuilder::new(self, parts)
	}

	/// Binds `f` to a weakly tracked target.
	///
	/// The target is resolved before every invocation and kept alive for its
	/// duration. Once it is gone the slot is skipped and disconnects itself.
	pub fn bind_tracked<T, F>(&self, owner: &T, f: F) -> SlotBuilder<'_, A, G, L>
	where
		T: Trackable,
		F: Fn(&<T::Tracker as Tracker>::Target, &A) + Send + Sync + 'static,
	{
		let tracker = Arc::new(owner.tracker());
		let gate = Arc::clone(&tracker);
		let mut parts = SlotParts::new(Box::new(move |_: &Connection, args: &A| match gate.resolve() {
			Some(target) => {
				f(&*target, args);
				Outcome::Invoked
			}
			None => Outcome::Expired,
		}));
		parts.owner = Some(<T::Tracker as Tracker>::owner_id(&tracker));
		parts.liveness = Some(Box::new(move || !tracker.expired()));
		SlotBuilder::new(self, parts)
	}

	/// Binds `f` to a target that records its connections in an
	/// [`Observer`](crate::Observer).
	///
	/// The target is tracked weakly like [`Signal::bind_tracked`], and the
	/// connection is added to the target's observer on connect, so tearing the
	/// observer down disconnects the slot.
	pub fn bind_observer<T, F>(&self, target: &Arc<T>, f: F) -> SlotBuilder<'_, A, G, L>
	where
		T: Observes + Send + Sync + 'static,
		F: Fn(&T, &A) + Send + Sync + 'static,
	{
		let owner = Arc::clone(target);
		self.bind_tracked(target, f)
			.on_connect(move |conn: &Connection| owner.observer().add_connection(conn.clone()))
	}

	/// Invokes every connected, unblocked slot with `args`.
	///
	/// Groups run in ascending order. A panicking slot unwinds to the caller and
	/// the remaining slots of this emission are skipped.
	pub fn emit(&self, args: &A) {
		if self.blocked() {
			return;
		}
		let snapshot = self.core.snapshot();
		for slot in snapshot.slots() {
			slot.call(args);
		}
	}

	/// Like [`Signal::emit`], but stops at the first panicking slot and reports it.
	///
	/// Returns the number of slots invoked.
	pub fn try_emit(&self, args: &A) -> Result<usize, EmitError> {
		if self.blocked() {
			return Ok(0);
		}
		let snapshot = self.core.snapshot();
		let mut invoked = 0;
		for slot in snapshot.slots() {
			match panic::catch_unwind(AssertUnwindSafe(|| slot.call(args))) {
				Ok(true) => invoked += 1,
				Ok(false) => {}
				Err(payload) => {
					let group = format!("{:?}", slot.state().group());
					let message = panic_message(&*payload);
					tracing::warn!(%group, %message, invoked, "signal.emit.panicked");
					return Err(EmitError::SlotPanicked { group, message });
				}
			}
		}
		Ok(invoked)
	}

	/// Removes every slot matching `pred`, returning how many were disconnected.
	fn disconnect_where(&self, pred: impl Fn(&Slot<A, G, L>) -> bool) -> usize {
		let removed = {
			let mut inner = self.core.lock();
			if !inner.registry.get().slots().any(|slot| pred(slot)) {
				return 0;
			}
			inner.registry.write().remove_if(|slot| pred(slot))
		};
		mark_disconnected(&removed)
	}

	/// Disconnects every slot connected through `f`.
	pub fn disconnect_fn(&self, f: fn(&A)) -> usize {
		let callable = CallableId::from_addr(f as usize);
		let count = self.disconnect_where(|slot| slot.matches_callable(callable));
		tracing::trace!(count, "signal.disconnect.callable");
		count
	}

	/// Disconnects every slot owned by `owner`.
	pub fn disconnect_owner<T: Trackable>(&self, owner: &T) -> usize {
		let id = Trackable::owner_id(owner);
		let count = self.disconnect_where(|slot| slot.matches_owner(id));
		tracing::trace!(count, "signal.disconnect.owner");
		count
	}

	/// Disconnects the slots binding method `f` to `owner`.
	pub fn disconnect_method<T, O>(&self, f: fn(&T, &A), owner: &O) -> usize
	where
		T: ?Sized,
		O: Trackable,
	{
		let callable = CallableId::from_addr(f as usize);
		let id = Trackable::owner_id(owner);
		let count = self.disconnect_where(|slot| slot.matches_callable(callable) && slot.matches_owner(id));
		tracing::trace!(count, "signal.disconnect.method");
		count
	}

	/// Disconnects a whole group, returning its former size.
	pub fn disconnect_group(&self, group: G) -> usize {
		let removed = {
			let mut inner = self.core.lock();
			if inner.registry.get().group(group).is_none() {
				return 0;
			}
			inner.registry.write().remove_group(group)
		};
		mark_disconnected(&removed);
		tracing::trace!(?group, count = removed.len(), "signal.disconnect.group");
		removed.len()
	}

	/// Disconnects every slot.
	pub fn disconnect_all(&self) {
		let removed = {
			let mut inner = self.core.lock();
			if inner.registry.get().is_empty() {
				return;
			}
			inner.registry.write().clear()
		};
		mark_disconnected(&removed);
		tracing::trace!(count = removed.len(), "signal.disconnect.all");
	}

	/// Blocks the whole signal; emissions become no-ops.
	pub fn block(&self) {
		self.core.set_blocked(true);
	}

	pub fn unblock(&self) {
		self.core.set_blocked(false);
	}

	pub fn blocked(&self) -> bool {
		self.core.blocked()
	}

	/// Blocks every slot currently in `group`.
	pub fn block_group(&self, group: G) {
		self.set_group_blocked(group, true);
	}

	/// Unblocks every slot currently in `group`.
	pub fn unblock_group(&self, group: G) {
		self.set_group_blocked(group, false);
	}

	fn set_group_blocked(&self, group: G, blocked: bool) {
		let inner = self.core.lock();
		if let Some(group) = inner.registry.get().group(group) {
			for slot in group.slots() {
				slot.state().set_blocked(blocked);
			}
		}
	}

	/// Number of slots in the registry.
	///
	/// Slots disconnected through their handle or by owner expiry leave the
	/// registry as soon as they are cleaned, not when their flag flips.
	pub fn slot_count(&self) -> usize {
		self.core.snapshot().len()
	}

	/// Exchanges the slots and block state of two signals.
	///
	/// Both registry locks are taken in address order, so two threads swapping
	/// the same pair in opposite directions cannot deadlock.
	pub fn swap(&self, other: &Self) {
		if Arc::ptr_eq(&self.core, &other.core) {
			return;
		}
		let (first, second) = if Arc::as_ptr(&self.core) < Arc::as_ptr(&other.core) {
			(&self.core, &other.core)
		} else {
			(&other.core, &self.core)
		};
		let mut a = first.lock();
		let mut b = second.lock();
		mem::swap(&mut *a, &mut *b);
		a.anchor.retarget(Arc::downgrade(first));
		b.anchor.retarget(Arc::downgrade(second));
		let blocked = first.set_blocked(second.blocked());
		second.set_blocked(blocked);
		tracing::debug!(first = a.registry.get().len(), second = b.registry.get().len(), "signal.swap");
	}

	/// Moves every slot and the block state out of this signal into a new one.
	pub fn take(&self) -> Self {
		let taken = Self::new();
		self.swap(&taken);
		taken
	}
}

fn mark_disconnected<A: ?Sized + 'static, G: GroupId, L: LockPolicy>(removed: &[SlotRef<A, G, L>]) -> usize {
	removed.iter().filter(|slot| slot.state().mark_disconnected()).count()
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Default for Signal<A, G, L> {
	fn default() -> Self {
		Self::new()
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Drop for Signal<A, G, L> {
	fn drop(&mut self) {
		self.disconnect_all();
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> fmt::Debug for Signal<A, G, L> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("groups", &*self.core.snapshot())
			.field("blocked", &self.blocked())
			.field("thread_safe", &L::THREAD_SAFE)
			.finish()
	}
}
