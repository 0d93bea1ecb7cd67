use std::sync::Arc;

/// Copy-on-write cell over an [`Arc`].
///
/// Readers take a cheap snapshot with [`CopyOnWrite::read`]. A writer mutates in
/// place when no snapshot is outstanding and clones the value otherwise, so a
/// snapshot never observes a later write. The cell itself is not synchronized;
/// it lives behind the registry lock.
#[derive(Debug)]
pub(crate) struct CopyOnWrite<T> {
	value: Arc<T>,
}

impl<T: Clone> CopyOnWrite<T> {
	pub fn new(value: T) -> Self {
		Self { value: Arc::new(value) }
	}

	/// Shares the current value.
	pub fn read(&self) -> Arc<T> {
		Arc::clone(&self.value)
	}

	pub fn get(&self) -> &T {
		&self.value
	}

	/// Exclusive access, cloning first if a snapshot is still alive.
	pub fn write(&mut self) -> &mut T {
		Arc::make_mut(&mut self.value)
	}

	pub fn is_shared(&self) -> bool {
		Arc::strong_count(&self.value) > 1
	}
}

impl<T: Clone + Default> Default for CopyOnWrite<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_without_snapshot_is_in_place() {
		let mut cell = CopyOnWrite::new(vec![1, 2]);
		let before = Arc::as_ptr(&cell.value);
		cell.write().push(3);
		assert!(!cell.is_shared());
		assert_eq!(cell.get(), &[1, 2, 3]);
		assert_eq!(Arc::as_ptr(&cell.value), before);
	}

	#[test]
	fn write_with_snapshot_detaches() {
		let mut cell = CopyOnWrite::new(vec![1, 2]);
		let snapshot = cell.read();
		assert!(cell.is_shared());

		cell.write().push(3);
		assert_eq!(*snapshot, vec![1, 2]);
		assert_eq!(cell.get(), &[1, 2, 3]);
		assert!(!cell.is_shared());
	}
}
