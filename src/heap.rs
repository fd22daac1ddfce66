//! Heap usage accounting.
//!
//! [`CountingAllocator`] wraps the system allocator and keeps running
//! totals of bytes handed out and given back. A binary opts in with
//! `#[global_allocator]`; without it every sample reads zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
static FREED: AtomicUsize = AtomicUsize::new(0);

/// Global allocator that counts allocated and freed bytes
///
/// ```ignore
/// use heapstack::heap::CountingAllocator;
///
/// #[global_allocator]
/// static GLOBAL: CountingAllocator = CountingAllocator::system();
/// ```
#[derive(Debug, Default)]
pub struct CountingAllocator {
    inner: System,
}

impl CountingAllocator {
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        FREED.fetch_add(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            FREED.fetch_add(layout.size(), Ordering::Relaxed);
            ALLOCATED.fetch_add(new_size, Ordering::Relaxed);
        }
        new_ptr
    }
}

/// A sample of the allocation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapUsage {
    /// Bytes ever allocated
    pub allocated: usize,
    /// Bytes ever freed
    pub freed: usize,
}

impl HeapUsage {
    /// Bytes currently in use
    pub fn in_use(&self) -> usize {
        self.allocated.saturating_sub(self.freed)
    }
}

/// Read the counters.
///
/// The two loads are not atomic together; under concurrent allocation the
/// result is approximate, which is all a usage report needs.
pub fn sample() -> HeapUsage {
    let freed = FREED.load(Ordering::Relaxed);
    let allocated = ALLOCATED.load(Ordering::Relaxed);
    HeapUsage { allocated, freed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_use_never_underflows() {
        let usage = HeapUsage {
            allocated: 10,
            freed: 25,
        };
        assert_eq!(usage.in_use(), 0);

        let usage = HeapUsage {
            allocated: 100,
            freed: 40,
        };
        assert_eq!(usage.in_use(), 60);
    }

    #[test]
    fn counting_allocator_tracks_direct_calls() {
        let allocator = CountingAllocator::system();
        let layout = Layout::from_size_align(256, 8).unwrap();
        let before = sample();

        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            let grown = allocator.realloc(ptr, layout, 512);
            assert!(!grown.is_null());
            allocator.dealloc(grown, Layout::from_size_align(512, 8).unwrap());
        }

        let after = sample();
        assert!(after.allocated >= before.allocated + 256 + 512);
        assert!(after.freed >= before.freed + 256 + 512);
    }
}
