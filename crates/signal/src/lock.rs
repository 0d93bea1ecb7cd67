//! Locking policies for signal registries and observer collections.
//!
//! A policy decides how the registry lock is acquired and whether handles built on
//! it may be shared between threads. The guarded data always lives in a
//! [`parking_lot::Mutex`], so every policy stays sound even when a [`Connection`]
//! migrates to another thread; the policies only differ in acquisition strategy.
//!
//! Critical sections guarded this way are short and never run user callables.
//!
//! [`Connection`]: crate::Connection

use std::cell::Cell;
use std::marker::PhantomData;

use parking_lot::{Mutex, MutexGuard};

/// Strategy used to acquire the lock guarding a registry.
pub trait LockPolicy: Send + Sync + 'static {
	/// Marker embedded in signal handles. Single-threaded policies use a `!Sync`
	/// marker so the handle cannot be shared across threads.
	type Marker: Default;

	/// Whether handles using this policy may be shared between threads.
	const THREAD_SAFE: bool;

	/// Acquires `mutex`, returning its guard.
	fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T>;
}

/// Parks the calling thread while the lock is contended.
///
/// This is the default policy and the right choice for almost every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

impl LockPolicy for Blocking {
	type Marker = ();

	const THREAD_SAFE: bool = true;

	#[inline]
	fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
		mutex.lock()
	}
}

/// Spins, yielding to the scheduler, until the lock becomes free.
///
/// Only worth it for signals emitted at a very high pace with tiny critical
/// sections; prefer [`Blocking`] otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl LockPolicy for Spin {
	type Marker = ();

	const THREAD_SAFE: bool = true;

	fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
		loop {
			if let Some(guard) = mutex.try_lock() {
				return guard;
			}
			while mutex.is_locked() {
				std::thread::yield_now();
			}
		}
	}
}

/// Single-threaded policy.
///
/// Signals using it are `!Sync`: connect, disconnect and emit all happen on the
/// thread owning the signal, so the lock is never contended by the signal itself.
/// Connection handles remain `Send`, which is why the registry is still stored
/// behind a real mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

impl LockPolicy for Local {
	type Marker = PhantomData<Cell<()>>;

	const THREAD_SAFE: bool = false;

	#[inline]
	fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
		mutex.lock()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn hammer<L: LockPolicy>() -> usize {
		let counter = Arc::new(Mutex::new(0usize));
		let observed = Arc::new(AtomicUsize::new(0));
		let handles: Vec<_> = (0..4)
			.map(|_| {
				let counter = Arc::clone(&counter);
				let observed = Arc::clone(&observed);
				std::thread::spawn(move || {
					for _ in 0..1_000 {
						let mut guard = L::acquire(&counter);
						*guard += 1;
						observed.fetch_add(1, Ordering::Relaxed);
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().expect("worker thread panicked");
		}
		assert_eq!(observed.load(Ordering::Relaxed), 4_000);
		*counter.lock()
	}

	#[test]
	fn blocking_policy_serializes_writers() {
		assert_eq!(hammer::<Blocking>(), 4_000);
	}

	#[test]
	fn spin_policy_serializes_writers() {
		assert_eq!(hammer::<Spin>(), 4_000);
	}

	#[test]
	fn local_policy_is_not_thread_safe() {
		assert!(Blocking::THREAD_SAFE);
		assert!(Spin::THREAD_SAFE);
		assert!(!Local::THREAD_SAFE);
		let mutex = Mutex::new(1);
		*Local::acquire(&mutex) += 1;
		assert_eq!(*mutex.lock(), 2);
	}
}
