use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::lock::LockPolicy;
use crate::registry::{CopyOnWrite, GroupId, Registry};
use crate::slot::Slot;

/// State guarded by the registry lock.
pub(crate) struct Inner<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	pub registry: CopyOnWrite<Registry<A, G, L>>,
	/// Anchor shared by every slot stored in `registry`. Travels with the
	/// registry when two signals swap contents.
	pub anchor: Arc<Anchor<A, G, L>>,
}

/// Heap part of a signal: registry lock and global block flag.
pub(crate) struct Core<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	inner: Mutex<Inner<A, G, L>>,
	blocked: AtomicBool,
	_policy: PhantomData<L>,
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Core<A, G, L> {
	pub fn new() -> Arc<Self> {
		Arc::new_cyclic(|core: &Weak<Self>| Self {
			inner: Mutex::new(Inner {
				registry: CopyOnWrite::default(),
				anchor: Arc::new(Anchor::new(core.clone())),
			}),
			blocked: AtomicBool::new(false),
			_policy: PhantomData,
		})
	}

	pub fn lock(&self) -> MutexGuard<'_, Inner<A, G, L>> {
		L::acquire(&self.inner)
	}

	/// Shares the current registry; the lock is held only for the refcount bump.
	pub fn snapshot(&self) -> Arc<Registry<A, G, L>> {
		self.lock().registry.read()
	}

	pub fn blocked(&self) -> bool {
		self.blocked.load(Ordering::Acquire)
	}

	pub fn set_blocked(&self, blocked: bool) -> bool {
		self.blocked.swap(blocked, Ordering::AcqRel)
	}
}

/// Back reference from slots to the core currently holding their registry.
///
/// A slot disconnected through its handle uses the anchor to find and lock the
/// registry it lives in. Swapping two signals moves registries between cores, so
/// the anchor is retargeted while both registry locks are held.
pub(crate) struct Anchor<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	core: Mutex<Weak<Core<A, G, L>>>,
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Anchor<A, G, L> {
	fn new(core: Weak<Core<A, G, L>>) -> Self {
		Self { core: Mutex::new(core) }
	}

	/// A detached anchor, for slots built outside of a signal.
	#[cfg(test)]
	pub fn detached() -> Arc<Self> {
		Arc::new(Self::new(Weak::new()))
	}

	fn core(&self) -> Option<Arc<Core<A, G, L>>> {
		L::acquire(&self.core).upgrade()
	}

	/// Must be called with the registry lock of `core` held.
	pub fn retarget(&self, core: Weak<Core<A, G, L>>) {
		*L::acquire(&self.core) = core;
	}

	/// Removes `slot` from whichever registry currently holds it.
	pub fn clean(self: &Arc<Self>, slot: &Slot<A, G, L>) {
		let removed = loop {
			let Some(core) = self.core() else {
				return;
			};
			let mut inner = core.lock();
			if !Arc::ptr_eq(&inner.anchor, self) {
				// Registry moved by a concurrent swap; the anchor now names its new core.
				continue;
			}
			if !inner.registry.get().contains(slot) {
				return;
			}
			break inner.registry.write().remove(slot);
		};
		tracing::trace!(group = ?slot.state().group(), "signal.clean");
		drop(removed);
	}
}
