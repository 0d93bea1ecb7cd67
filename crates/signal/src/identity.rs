//! Identity and liveness adapters used for value-based disconnection and owner
//! tracking.
//!
//! Value-based disconnection is an opt-in capability. Only function pointers carry
//! a [`CallableId`]; closures are connected without one and can only be removed
//! through their [`Connection`](crate::Connection), their owner, or their group.
//! Owners are identified by the address of the object they manage, which stays
//! stable for the whole life of an `Arc` allocation and is readable through a
//! `Weak` even after the object is gone.

use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Address of a function pointer connected to a signal.
///
/// The compiler may merge identical functions, so two distinct functions with the
/// same body can share an id. Disconnection by id removes every matching slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId(usize);

impl CallableId {
	pub(crate) const fn from_addr(addr: usize) -> Self {
		Self(addr)
	}
}

/// Address of an object owning one or more slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
	/// Identifies the object at `ptr`. Metadata of fat pointers is ignored.
	pub fn of<T: ?Sized>(ptr: *const T) -> Self {
		Self(ptr.cast::<()>() as usize)
	}
}

/// Checked, revocable reference to an owner.
///
/// A slot resolves its tracker before every invocation and skips (then
/// disconnects itself) once the owner is gone.
pub trait Tracker: Send + Sync + 'static {
	/// Object reached through the tracker.
	type Target: ?Sized;
	/// Strong handle keeping the target alive while a slot runs.
	type Guard: Deref<Target = Self::Target>;

	/// Resolves the owner, or `None` once it has expired.
	fn resolve(&self) -> Option<Self::Guard>;

	/// Returns true once the owner can no longer be resolved.
	fn expired(&self) -> bool {
		self.resolve().is_none()
	}

	/// Identity of the tracked owner.
	fn owner_id(&self) -> OwnerId;
}

impl<T: ?Sized + Send + Sync + 'static> Tracker for Weak<T> {
	type Target = T;
	type Guard = Arc<T>;

	fn resolve(&self) -> Option<Arc<T>> {
		self.upgrade()
	}

	fn expired(&self) -> bool {
		self.strong_count() == 0
	}

	fn owner_id(&self) -> OwnerId {
		OwnerId::of(self.as_ptr())
	}
}

/// Owning handles that can produce a [`Tracker`] for their object.
///
/// Implement this for custom handle types to make them usable with
/// [`SlotBuilder::track`](crate::SlotBuilder::track),
/// [`Signal::bind_tracked`](crate::Signal::bind_tracked) and
/// [`Signal::disconnect_owner`](crate::Signal::disconnect_owner).
pub trait Trackable {
	/// Tracker produced from this handle.
	type Tracker: Tracker;

	/// Produces a tracker that does not keep the owner alive.
	fn tracker(&self) -> Self::Tracker;

	/// Identity of the owner, matching [`Tracker::owner_id`].
	fn owner_id(&self) -> OwnerId;
}

impl<T: ?Sized + Send + Sync + 'static> Trackable for Arc<T> {
	type Tracker = Weak<T>;

	fn tracker(&self) -> Weak<T> {
		Arc::downgrade(self)
	}

	fn owner_id(&self) -> OwnerId {
		OwnerId::of(Arc::as_ptr(self))
	}
}

impl<T: ?Sized + Send + Sync + 'static> Trackable for Weak<T> {
	type Tracker = Weak<T>;

	fn tracker(&self) -> Weak<T> {
		self.clone()
	}

	fn owner_id(&self) -> OwnerId {
		OwnerId::of(self.as_ptr())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn arc_and_weak_share_owner_identity() {
		let owner = Arc::new(String::from("owner"));
		let weak = Arc::downgrade(&owner);
		assert_eq!(Trackable::owner_id(&owner), Trackable::owner_id(&weak));
		assert_eq!(Trackable::owner_id(&owner), Tracker::owner_id(&owner.tracker()));

		let other = Arc::new(String::from("owner"));
		assert_ne!(Trackable::owner_id(&owner), Trackable::owner_id(&other));
	}

	#[test]
	fn weak_tracker_expires_with_owner() {
		let owner = Arc::new(7u32);
		let tracker = owner.tracker();
		let id = Tracker::owner_id(&tracker);
		assert_eq!(tracker.resolve().as_deref(), Some(&7));
		assert!(!tracker.expired());

		drop(owner);
		assert!(tracker.expired());
		assert!(tracker.resolve().is_none());
		assert_eq!(Tracker::owner_id(&tracker), id, "identity survives expiry");
	}

	#[test]
	fn unsized_owners_are_tracked() {
		let owner: Arc<dyn Fn() -> u8 + Send + Sync> = Arc::new(|| 3);
		let tracker = owner.tracker();
		assert_eq!(tracker.resolve().map(|f| (*f)()), Some(3));
	}
}
