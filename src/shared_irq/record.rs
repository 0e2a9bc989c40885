use core::{alloc::Layout, ptr::{self, NonNull}, sync::atomic::{AtomicPtr, Ordering}};

use linked_list_allocator::Heap as LinkedListHeap;

use super::{IsrArg, IsrFlags, IsrHandler, SharedIrqError};

/// One consumer registered on a shared line.
pub(crate) struct HandlerRecord {
    handler: IsrHandler,
    arg: IsrArg,
    flags: IsrFlags,

    // chain link, followed by dispatch without the lock
    pub(super) next: AtomicPtr<HandlerRecord>,

    // retired-list link, only touched under the registry lock
    pub(super) retired_next: AtomicPtr<HandlerRecord>,
}

/// Records that have been unlinked but may still be seen by an in-flight dispatch.
#[derive(Clone, Copy)]
pub(crate) struct RetiredList {
    head: *mut HandlerRecord,
}

// a retired list is only reachable through the registry lock
unsafe impl Send for RetiredList {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordPoolUsage {
    pub used: usize,
    pub free: usize,
}

/// Backing store for handler records, carved out of a caller-supplied region.
pub(crate) struct RecordPool {
    heap: LinkedListHeap,
    initialized: bool,
}

impl HandlerRecord {
    pub fn new(handler: IsrHandler, arg: IsrArg, flags: IsrFlags) -> Self {
        Self {
            handler,
            arg,
            flags,
            next: AtomicPtr::new(ptr::null_mut()),
            retired_next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn invoke(&self) {
        (self.handler)(self.arg)
    }

    pub fn handler(&self) -> IsrHandler {
        self.handler
    }

    pub fn arg(&self) -> IsrArg {
        self.arg
    }

    pub fn is_exclusive(&self) -> bool {
        self.flags.contains(IsrFlags::NONSHARED)
    }

    pub fn matches(&self, handler: IsrHandler, arg: IsrArg) -> bool {
        self.handler as *const () == handler as *const () && self.arg == arg
    }
}

impl RetiredList {
    pub const fn new() -> Self {
        Self { head: ptr::null_mut() }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut current = self.head;

        while let Some(record) = NonNull::new(current) {
            count += 1;
            // safety: retired records stay allocated until popped off the list
            current = unsafe { record.as_ref() }.retired_next.load(Ordering::Relaxed);
        }

        count
    }

    pub fn push(&mut self, record: NonNull<HandlerRecord>) {
        // safety: the record was just unlinked and is owned by whoever holds this list
        unsafe { record.as_ref() }.retired_next.store(self.head, Ordering::Relaxed);
        self.head = record.as_ptr();
    }

    pub fn pop(&mut self) -> Option<NonNull<HandlerRecord>> {
        let record = NonNull::new(self.head)?;

        // safety: see `len`
        self.head = unsafe { record.as_ref() }.retired_next.load(Ordering::Relaxed);

        Some(record)
    }

    /// Move every record of `other` onto this list.
    pub fn append(&mut self, other: &mut RetiredList) {
        while let Some(record) = other.pop() {
            self.push(record);
        }
    }

    pub fn take(&mut self) -> RetiredList {
        core::mem::replace(self, RetiredList::new())
    }
}

impl RecordPool {
    pub const fn new() -> Self {
        Self {
            heap: LinkedListHeap::empty(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// # safety
    /// - `start..start + size` must be valid, writable memory used by nothing else for the rest
    ///   of the program
    pub unsafe fn init(&mut self, start: *mut u8, size: usize) {
        self.heap.init(start, size);
        self.initialized = true;
    }

    pub fn alloc(&mut self, record: HandlerRecord) -> Result<NonNull<HandlerRecord>, SharedIrqError> {
        if !self.initialized {
            return Err(SharedIrqError::Allocation);
        }

        let storage = self.heap
            .allocate_first_fit(Layout::new::<HandlerRecord>())
            .map_err(|_| SharedIrqError::Allocation)?
            .cast::<HandlerRecord>();

        // safety: freshly allocated with the layout of a record
        unsafe { storage.as_ptr().write(record) };

        Ok(storage)
    }

    /// # safety
    /// - `record` must come from `alloc` on this pool and be unreachable from any chain and any
    ///   in-flight dispatch
    pub unsafe fn free(&mut self, record: NonNull<HandlerRecord>) {
        ptr::drop_in_place(record.as_ptr());
        self.heap.deallocate(record.cast::<u8>(), Layout::new::<HandlerRecord>());
    }

    pub fn usage(&self) -> RecordPoolUsage {
        RecordPoolUsage {
            used: self.heap.used(),
            free: self.heap.free(),
        }
    }
}
