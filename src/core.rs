use std::cell::Cell;
use std::ptr::NonNull;

use log::trace;

use crate::utils::{allocate, free};

/**
Shared heap allocated block behind every non-empty [`Shared`](crate::Shared)

The block owns the value (through its original [`Box`]) together with the count of
handles pointing at it. For arrays the element count is part of the boxed slice, so it is
stored once here rather than in every handle.
*/
pub(crate) struct SharedBlock<T: ?Sized> {
    count: Cell<usize>,
    value: Box<T>,
}

impl<T: ?Sized> SharedBlock<T> {
    /// Move `value` into a freshly allocated block with a count of one
    pub fn adopt(value: Box<T>) -> NonNull<Self> {
        let block = allocate(SharedBlock {
            count: Cell::new(1),
            value,
        });
        trace!("allocated shared block at {:p}", block);
        block
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn increment(&self) {
        let count = self.count.get();

        // Wrapping around would free the value while handles are still alive
        if count == usize::MAX {
            std::process::abort();
        }

        self.count.set(count + 1);
    }

    /// Give up one handle's share of the block, freeing it if it was the last one
    ///
    /// SAFETY:
    /// - `block` must point to a live block obtained from [`SharedBlock::adopt`]
    /// - The caller's handle must not touch the block afterwards
    pub unsafe fn release(block: NonNull<Self>) {
        let count = {
            let inner = block.as_ref();
            let count = inner.count.get() - 1;
            inner.count.set(count);
            count
        };

        if count == 0 {
            trace!("releasing shared block at {:p}", block);
            // SAFETY: No other handle is left, and no reference into the block is held
            free(block);
        }
    }

    /// Mutable access to the value
    ///
    /// SAFETY:
    /// - `block` must point to a live block
    /// - The caller must be the only handle (count of one) and hold it mutably
    pub unsafe fn value_mut<'a>(block: NonNull<Self>) -> &'a mut T {
        &mut *(*block.as_ptr()).value
    }

    /// Free the block and hand back the boxed value it owned
    ///
    /// SAFETY:
    /// - `block` must point to a live block with a count of one
    /// - The caller's handle must not touch the block afterwards
    pub unsafe fn into_value(block: NonNull<Self>) -> Box<T> {
        debug_assert_eq!(block.as_ref().count(), 1);
        trace!("unwrapping shared block at {:p}", block);
        let block = Box::from_raw(block.as_ptr());
        block.value
    }
}
