use core::{marker::PhantomData, ptr::{self, NonNull}, sync::atomic::{fence, AtomicPtr, Ordering}};

use super::{record::HandlerRecord, IsrArg, IsrHandler};

/// Singly linked list of handler records, newest first.
///
/// Writers are serialized by the registry lock. Readers (dispatch) take no lock and only ever
/// follow `next` pointers, so each mutation is a single pointer store: a reader sees either the
/// old or the new chain.
pub(crate) struct HandlerChain {
    head: AtomicPtr<HandlerRecord>,
}

pub(crate) struct Iter<'chain> {
    next: *const HandlerRecord,
    _chain: PhantomData<&'chain HandlerChain>,
}

impl HandlerChain {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// # safety
    /// - the caller holds the registry lock
    /// - `record` is owned by the caller and not on any chain
    pub unsafe fn push_front(&self, record: NonNull<HandlerRecord>) {
        let head = self.head.load(Ordering::Relaxed);

        record.as_ref().next.store(head, Ordering::Relaxed);
        self.head.store(record.as_ptr(), Ordering::Release);
    }

    /// Unlink the first record matching `(handler, arg)` and hand its ownership to the caller.
    ///
    /// The unlinked record keeps its `next` pointer, so a dispatch currently standing on it
    /// still reaches the rest of the chain.
    ///
    /// # safety
    /// - the caller holds the registry lock
    pub unsafe fn unlink(&self, handler: IsrHandler, arg: IsrArg) -> Option<NonNull<HandlerRecord>> {
        let mut link: &AtomicPtr<HandlerRecord> = &self.head;

        loop {
            let current = link.load(Ordering::Relaxed);
            let record: &HandlerRecord = current.as_ref()?;

            if record.matches(handler, arg) {
                link.store(record.next.load(Ordering::Relaxed), Ordering::SeqCst);
                // pairs with the fence in dispatch entry: after this, either the dispatcher's
                // in-flight count is visible to us or the dispatcher sees the new link
                fence(Ordering::SeqCst);

                return NonNull::new(current);
            }

            link = &record.next;
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.load(Ordering::Acquire),
            _chain: PhantomData,
        }
    }
}

impl<'chain> Iterator for Iter<'chain> {
    type Item = &'chain HandlerRecord;

    fn next(&mut self) -> Option<Self::Item> {
        // safety: a record reachable from a chain is not freed before every dispatch that could
        // have reached it has left the slot
        let record = unsafe { self.next.as_ref()? };

        self.next = record.next.load(Ordering::Acquire);

        Some(record)
    }
}
