//! Group-ordered slot registry.
//!
//! # Invariants
//!
//! 1. Groups are sorted by strictly ascending id; ids are unique.
//! 2. A group is never empty; it is dropped together with its last slot.
//! 3. A slot's stored index equals its position in its group's slot list.
//!
//! Removal swaps the slot with the last one of its group, so the order inside a
//! group is not stable across removals. Removed slots are returned to the caller
//! so they can be dropped after the registry lock is released.

mod cow;

use std::fmt;
use std::sync::Arc;

pub(crate) use cow::CopyOnWrite;

use crate::lock::LockPolicy;
use crate::slot::Slot;

/// Ordering key for slot groups.
///
/// Implemented for every ordered, copyable, thread-safe type; the default value
/// is the group used when none is specified.
pub trait GroupId: Ord + Copy + Default + fmt::Debug + Send + Sync + 'static {}

impl<T: Ord + Copy + Default + fmt::Debug + Send + Sync + 'static> GroupId for T {}

pub(crate) type SlotRef<A, G, L> = Arc<Slot<A, G, L>>;

/// Slots sharing one group id.
pub(crate) struct Group<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	id: G,
	slots: Vec<SlotRef<A, G, L>>,
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Group<A, G, L> {
	fn new(id: G) -> Self {
		Self { id, slots: Vec::new() }
	}

	pub fn id(&self) -> G {
		self.id
	}

	pub fn slots(&self) -> &[SlotRef<A, G, L>] {
		&self.slots
	}

	fn push(&mut self, slot: SlotRef<A, G, L>) {
		slot.state().set_index(self.slots.len());
		self.slots.push(slot);
	}

	fn holds(&self, slot: &Slot<A, G, L>) -> bool {
		self.slots
			.get(slot.state().index())
			.is_some_and(|held| std::ptr::eq(Arc::as_ptr(held), slot))
	}

	fn swap_remove(&mut self, index: usize) -> SlotRef<A, G, L> {
		let removed = self.slots.swap_remove(index);
		if let Some(moved) = self.slots.get(index) {
			moved.state().set_index(index);
		}
		removed
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Clone for Group<A, G, L> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			slots: self.slots.clone(),
		}
	}
}

/// Ordered sequence of groups.
pub(crate) struct Registry<A: ?Sized + 'static, G: GroupId, L: LockPolicy> {
	groups: Vec<Group<A, G, L>>,
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Registry<A, G, L> {
	pub fn groups(&self) -> &[Group<A, G, L>] {
		&self.groups
	}

	pub fn group(&self, id: G) -> Option<&Group<A, G, L>> {
		self.position(id).ok().map(|pos| &self.groups[pos])
	}

	pub fn slots(&self) -> impl Iterator<Item = &SlotRef<A, G, L>> {
		self.groups.iter().flat_map(|group| group.slots.iter())
	}

	pub fn len(&self) -> usize {
		self.groups.iter().map(|group| group.slots.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	fn position(&self, id: G) -> Result<usize, usize> {
		self.groups.binary_search_by(|group| group.id.cmp(&id))
	}

	/// Appends `slot` to its group, creating the group at its sorted position.
	pub fn insert(&mut self, slot: SlotRef<A, G, L>) {
		let id = slot.state().group();
		let pos = match self.position(id) {
			Ok(pos) => pos,
			Err(pos) => {
				self.groups.insert(pos, Group::new(id));
				pos
			}
		};
		self.groups[pos].push(slot);
	}

	/// Returns true if `slot` sits at its stored position.
	pub fn contains(&self, slot: &Slot<A, G, L>) -> bool {
		self.group(slot.state().group()).is_some_and(|group| group.holds(slot))
	}

	/// Removes `slot` if its stored index still designates it.
	///
	/// A second clean of the same slot, or a clean racing another removal that
	/// already moved it out, finds a different slot (or none) at that index and
	/// leaves the registry untouched.
	pub fn remove(&mut self, slot: &Slot<A, G, L>) -> Option<SlotRef<A, G, L>> {
		let pos = self.position(slot.state().group()).ok()?;
		let group = &mut self.groups[pos];
		if !group.holds(slot) {
			return None;
		}
		let removed = group.swap_remove(slot.state().index());
		if group.slots.is_empty() {
			self.groups.remove(pos);
		}
		Some(removed)
	}

	/// Removes every slot matching `pred`.
	pub fn remove_if(&mut self, mut pred: impl FnMut(&Slot<A, G, L>) -> bool) -> Vec<SlotRef<A, G, L>> {
		let mut removed = Vec::new();
		for group in &mut self.groups {
			let mut i = 0;
			while i < group.slots.len() {
				if pred(&group.slots[i]) {
					removed.push(group.swap_remove(i));
				} else {
					i += 1;
				}
			}
		}
		self.groups.retain(|group| !group.slots.is_empty());
		removed
	}

	/// Removes the whole group `id`.
	pub fn remove_group(&mut self, id: G) -> Vec<SlotRef<A, G, L>> {
		match self.position(id) {
			Ok(pos) => self.groups.remove(pos).slots,
			Err(_) => Vec::new(),
		}
	}

	/// Removes every slot.
	pub fn clear(&mut self) -> Vec<SlotRef<A, G, L>> {
		self.groups.drain(..).flat_map(|group| group.slots).collect()
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Default for Registry<A, G, L> {
	fn default() -> Self {
		Self { groups: Vec::new() }
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> Clone for Registry<A, G, L> {
	fn clone(&self) -> Self {
		Self {
			groups: self.groups.clone(),
		}
	}
}

impl<A: ?Sized + 'static, G: GroupId, L: LockPolicy> fmt::Debug for Registry<A, G, L> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map()
			.entries(self.groups().iter().map(|group| (group.id(), group.slots().len())))
			.finish()
	}
}
