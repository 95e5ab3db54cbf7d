use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shorthand for the load/store pairs used on shared flags and counters.
///
/// All accesses are `SeqCst`; these values sit between a control thread and a
/// media thread and are never on a path where the ordering cost matters.
pub trait EasyAtomic {
    type Item;

    fn get(&self) -> Self::Item;
    fn set(&self, value: Self::Item);
    /// Stores the value and returns the previous one.
    ///
    /// Std atomics have an inherent `update` with a different signature that
    /// wins method resolution, so call this as `EasyAtomic::update(&it, value)`.
    fn update(&self, value: Self::Item) -> Self::Item;
}

impl EasyAtomic for AtomicBool {
    type Item = bool;

    fn get(&self) -> Self::Item {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: Self::Item) {
        self.store(value, Ordering::SeqCst);
    }

    fn update(&self, value: Self::Item) -> Self::Item {
        self.swap(value, Ordering::SeqCst)
    }
}

impl EasyAtomic for AtomicU64 {
    type Item = u64;

    fn get(&self) -> Self::Item {
        self.load(Ordering::SeqCst)
    }

    fn set(&self, value: Self::Item) {
        self.store(value, Ordering::SeqCst);
    }

    fn update(&self, value: Self::Item) -> Self::Item {
        self.swap(value, Ordering::SeqCst)
    }
}

/// Increments a counter by one.
pub fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
