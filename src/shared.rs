use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, Index, IndexMut};
use std::ptr::NonNull;

use log::debug;

use crate::core::SharedBlock;
use crate::error::AccessError;

/**
Shared ownership of a heap allocated value, or of an array when used as `Shared<[T]>`

Cloning a [`Shared`] gives another handle to the same allocation and bumps the reference
count. Dropping, [`reset`](Shared::reset)ting or reassigning a handle gives its share
back, and the last one to go frees the value.

A handle may also be *empty*: it then owns nothing, reports a [`use_count`](Shared::use_count)
of zero, and every access through it fails with [`AccessError::Empty`].

```
# use shrd::Shared;
#
let first = Shared::new(String::from("shared"));
let second = Shared::clone(&first);

assert_eq!(first.use_count(), 2);
assert_eq!(*second, "shared");
assert!(Shared::ptr_eq(&first, &second));
```

The reference count is not atomic, so handles can not leave the thread they were made on:

```compile_fail
# use shrd::Shared;
#
fn assert_send<T: Send>(_: T) {}
assert_send(Shared::new(0));
```
*/
pub struct Shared<T: ?Sized> {
    block: Option<NonNull<SharedBlock<T>>>,
    marker: PhantomData<SharedBlock<T>>,
}

// Private methods
impl<T: ?Sized> Shared<T> {
    fn block(&self) -> Option<&SharedBlock<T>> {
        // SAFETY: The block is kept alive for as long as this handle points at it
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }
}

impl<T: ?Sized> Shared<T> {
    /// Construct a handle that owns nothing
    pub const fn empty() -> Self {
        Shared {
            block: None,
            marker: PhantomData,
        }
    }

    /**
    Take ownership of an existing heap allocation

    This is the same as [`Shared::from`], the box is adopted as is and only the
    reference count is allocated next to it.

    ```
    # use shrd::Shared;
    #
    let boxed: Box<[u8]> = Box::new([1, 2, 3]);
    let shared = Shared::from_box(boxed);
    assert_eq!(shared.size(), 3);
    assert_eq!(shared.use_count(), 1);
    ```
    */
    pub fn from_box(boxed: Box<T>) -> Self {
        Shared {
            block: Some(SharedBlock::adopt(boxed)),
            marker: PhantomData,
        }
    }

    /// Whether the handle owns nothing
    ///
    /// Note that for `Shared<[T]>` this is not the same as holding a zero length array.
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /**
    Number of handles sharing the value, zero for an empty handle

    ```
    # use shrd::Shared;
    #
    let a = Shared::new(1);
    let b = a.clone();
    assert_eq!(a.use_count(), 2);
    drop(b);
    assert_eq!(a.use_count(), 1);
    assert_eq!(Shared::<i32>::empty().use_count(), 0);
    ```
    */
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, SharedBlock::count)
    }

    /// Whether this is the only handle to the value
    pub fn is_unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Reference to the value, or `None` if the handle is empty
    pub fn get(&self) -> Option<&T> {
        self.block().map(SharedBlock::value)
    }

    /// Reference to the value, failing with [`AccessError::Empty`] if the handle is empty
    pub fn try_get(&self) -> Result<&T, AccessError> {
        self.get().ok_or(AccessError::Empty)
    }

    /**
    Mutable reference to the value, only given out to the unique owner

    ```
    # use shrd::{AccessError, Shared};
    #
    let mut a = Shared::new(10);
    *a.get_mut().unwrap() += 1;

    let b = a.clone();
    assert_eq!(a.get_mut(), Err(AccessError::Shared { count: 2 }));

    drop(b);
    assert_eq!(a.get_mut(), Ok(&mut 11));
    ```
    */
    pub fn get_mut(&mut self) -> Result<&mut T, AccessError> {
        let block = self.block.ok_or(AccessError::Empty)?;

        let count = self.use_count();
        if count != 1 {
            return Err(AccessError::shared(count));
        }

        // SAFETY: This handle is the only one, and it is borrowed mutably
        Ok(unsafe { SharedBlock::value_mut(block) })
    }

    /**
    Move the contents out into a new handle, leaving this one empty

    The reference count is not touched, ownership is just handed over.

    ```
    # use shrd::Shared;
    #
    let mut a = Shared::new(5);
    let b = a.take();
    assert!(a.is_empty());
    assert_eq!(*b, 5);
    assert_eq!(b.use_count(), 1);
    ```
    */
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Give up this handle's share of the value, leaving the handle empty
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /**
    Make this handle share `source`'s value

    The value held previously is released first, so if this was its last handle it is
    freed. Assigning from a handle to the same allocation does nothing.

    ```
    # use shrd::Shared;
    #
    let mut a = Shared::new("x");
    let b = Shared::new("y");
    a.assign(&b);
    assert_eq!(*a, "y");
    assert_eq!(b.use_count(), 2);
    ```
    */
    pub fn assign(&mut self, source: &Self) {
        if Shared::ptr_eq(self, source) {
            return;
        }

        let previous = std::mem::replace(self, source.clone());
        drop(previous);
    }

    /// Exchange the contents of two handles, without touching either count
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Whether both handles point at the same allocation (two empty handles do)
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.block == other.block
    }
}

impl<T> Shared<T> {
    /// Allocate `value` on the heap and wrap it with a count of one
    pub fn new(value: T) -> Self {
        Shared::from_box(Box::new(value))
    }

    /**
    Take ownership of a raw pointer, as given out by [`Box::into_raw`]

    A null pointer gives an empty handle.

    # Safety
    A non-null `ptr` must come from `Box::<T>::into_raw`, and must not be used or freed
    by the caller afterwards.

    ```
    # use shrd::Shared;
    #
    let raw = Box::into_raw(Box::new(7));
    let shared = unsafe { Shared::from_raw(raw) };
    assert_eq!(shared.as_ptr(), raw as *const i32);

    let empty = unsafe { Shared::<i32>::from_raw(std::ptr::null_mut()) };
    assert!(empty.is_empty());
    ```
    */
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if ptr.is_null() {
            return Shared::empty();
        }

        Shared::from_box(Box::from_raw(ptr))
    }

    /// Raw, non-owning pointer to the value (null for an empty handle)
    pub fn as_ptr(&self) -> *const T {
        self.get().map_or(std::ptr::null(), |value| value as *const T)
    }

    /**
    Take the value out if this is the only handle to it

    Otherwise (or if the handle is empty) the handle is given back unchanged.

    ```
    # use shrd::Shared;
    #
    let a = Shared::new(3);
    let b = a.clone();
    let a = Shared::try_unwrap(a).unwrap_err();
    drop(b);
    assert_eq!(Shared::try_unwrap(a), Ok(3));
    ```
    */
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        let Some(block) = this.block.filter(|_| this.is_unique()) else {
            return Err(this);
        };

        std::mem::forget(this);

        // SAFETY: This was the only handle, and it has been forgotten
        let boxed = unsafe { SharedBlock::into_value(block) };
        Ok(*boxed)
    }

    /**
    Mutable reference to the value, cloning it first if it is shared

    After this call the handle is the unique owner of its (possibly new) value.

    # Panics
    If the handle is empty.

    ```
    # use shrd::Shared;
    #
    let mut a = Shared::new(vec![1, 2]);
    let b = a.clone();
    a.make_mut().push(3);
    assert_eq!(*a, [1, 2, 3]);
    assert_eq!(*b, [1, 2]);
    ```
    */
    #[track_caller]
    pub fn make_mut(&mut self) -> &mut T
    where
        T: Clone,
    {
        let count = self.use_count();
        if count > 1 {
            debug!("detaching from {} handles sharing the value", count);
            let value = (**self).clone();
            *self = Shared::new(value);
        }

        self.get_mut().unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T> Shared<[T]> {
    /**
    Take ownership of a raw array pointer together with its element count

    A null pointer gives an empty handle.

    # Safety
    A non-null `ptr` must come from `Box::<[T]>::into_raw` of a slice of exactly `len`
    elements, and must not be used or freed by the caller afterwards.

    ```
    # use shrd::Shared;
    #
    let boxed: Box<[i32]> = vec![1, 2, 3].into_boxed_slice();
    let raw = Box::into_raw(boxed) as *mut i32;
    let shared = unsafe { Shared::from_raw_parts(raw, 3) };
    assert_eq!(shared.size(), 3);
    assert_eq!(shared[2], 3);
    ```
    */
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        if ptr.is_null() {
            return Shared::empty();
        }

        let slice = std::ptr::slice_from_raw_parts_mut(ptr, len);
        Shared::from_box(Box::from_raw(slice))
    }

    /// Number of elements in the array, zero for an empty handle
    pub fn size(&self) -> usize {
        self.get().map_or(0, <[T]>::len)
    }

    /// The array as a slice (an empty slice for an empty handle)
    pub fn as_slice(&self) -> &[T] {
        self.get().unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Bounds checked element access
    pub fn try_index(&self, index: usize) -> Result<&T, AccessError> {
        let slice = self.try_get()?;
        slice
            .get(index)
            .ok_or_else(|| AccessError::out_of_bounds(index, slice.len()))
    }

    /**
    Bounds checked mutable element access, only given out to the unique owner

    ```
    # use shrd::{AccessError, Shared};
    #
    let mut arr = shrd::make_shared_array::<u8, 2>();
    *arr.try_index_mut(1).unwrap() = 9;
    assert_eq!(arr.try_index_mut(2), Err(AccessError::OutOfBounds { index: 2, size: 2 }));
    assert_eq!(arr.as_slice(), [0, 9]);
    ```
    */
    pub fn try_index_mut(&mut self, index: usize) -> Result<&mut T, AccessError> {
        let slice = self.get_mut()?;
        let size = slice.len();
        slice
            .get_mut(index)
            .ok_or_else(|| AccessError::out_of_bounds(index, size))
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    /// Another handle to the same value, increasing the reference count
    ///
    /// Cloning an empty handle gives another empty handle.
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.increment();
        }

        Shared {
            block: self.block,
            marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: The block was live while this handle pointed at it,
            // and the handle no longer does
            unsafe { SharedBlock::release(block) };
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Shared::empty()
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    /// If the handle is empty, see [`Shared::get`] for a non-panicking alternative.
    #[track_caller]
    fn deref(&self) -> &T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T> Index<usize> for Shared<[T]> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        self.try_index(index).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T> IndexMut<usize> for Shared<[T]> {
    /// # Panics
    /// If the handle is empty, the index is out of bounds or the array is shared.
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.try_index_mut(index).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Shared::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for Shared<T> {
    fn from(boxed: Box<T>) -> Self {
        Shared::from_box(boxed)
    }
}

impl<T> From<Vec<T>> for Shared<[T]> {
    fn from(vec: Vec<T>) -> Self {
        Shared::from_box(vec.into_boxed_slice())
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Shared<T> {
    /// Handles are equal if their values are, or if both are empty
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: ?Sized + Eq> Eq for Shared<T> {}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Pointer::fmt(&(value as *const T), f),
            None => fmt::Pointer::fmt(&std::ptr::null::<u8>(), f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Tracked<'a>(&'a Cell<usize>);

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn shallow_drop_test() {
        let _ = Shared::new(0);
    }

    #[test]
    fn deep_drop_test() {
        let _ = Shared::new(vec![1, 2, 3]);
    }

    #[test]
    fn empty_handle() {
        let empty = Shared::<String>::default();
        assert!(empty.is_empty());
        assert_eq!(empty.use_count(), 0);
        assert!(empty.get().is_none());
        assert_eq!(empty.try_get(), Err(AccessError::Empty));
        assert!(empty.as_ptr().is_null());

        let copy = empty.clone();
        assert!(copy.is_empty());
        assert!(Shared::ptr_eq(&empty, &copy));
    }

    #[test]
    #[should_panic(expected = "empty shared handle")]
    fn deref_empty() {
        let empty = Shared::<i32>::empty();
        let _value: i32 = *empty;
    }

    #[test]
    fn clone_and_drop() {
        let drops = Cell::new(0);
        let a = Shared::new(Tracked(&drops));
        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.use_count(), 3);
        assert_eq!(a.as_ptr(), c.as_ptr());

        drop(a);
        drop(c);
        assert_eq!(drops.get(), 0);
        assert_eq!(b.use_count(), 1);

        drop(b);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn take_conserves_count() {
        let mut a = Shared::new(1);
        let b = a.clone();
        let ptr = a.as_ptr();

        let c = a.take();
        assert!(a.is_empty());
        assert_eq!(c.as_ptr(), ptr);
        assert_eq!(c.use_count(), 2);
        assert_eq!(b.use_count(), 2);
    }

    #[test]
    fn assign_releases_previous() {
        let drops = Cell::new(0);
        let mut a = Shared::new(Tracked(&drops));
        let b = Shared::new(Tracked(&drops));

        a.clone_from(&b);
        assert_eq!(drops.get(), 1);
        assert_eq!(a.use_count(), 2);
        assert!(Shared::ptr_eq(&a, &b));

        drop(a);
        drop(b);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn assign_from_alias() {
        let mut a = Shared::new(String::from("same"));
        let b = a.clone();

        a.assign(&b);
        assert_eq!(a.use_count(), 2);

        let c = a.clone();
        a.clone_from(&c);
        assert_eq!(a.use_count(), 3);
    }

    #[test]
    fn assign_from_empty() {
        let drops = Cell::new(0);
        let mut a = Shared::new(Tracked(&drops));
        a.assign(&Shared::empty());
        assert!(a.is_empty());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn swap() {
        let mut a = Shared::new('a');
        let mut b = Shared::new('b');
        let b2 = b.clone();

        a.swap(&mut b);
        assert_eq!(*a, 'b');
        assert_eq!(*b, 'a');
        assert_eq!(a.use_count(), 2);
        assert_eq!(b.use_count(), 1);
        assert!(Shared::ptr_eq(&a, &b2));
    }

    #[test]
    fn reset() {
        let drops = Cell::new(0);
        let mut a = Shared::new(Tracked(&drops));
        a.reset();
        assert!(a.is_empty());
        assert_eq!(drops.get(), 1);

        a.reset();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn unique_access() {
        let mut a = Shared::new(0);
        assert!(a.is_unique());
        *a.get_mut().unwrap() = 5;

        let b = a.clone();
        assert!(!a.is_unique());
        assert_eq!(a.get_mut(), Err(AccessError::Shared { count: 2 }));
        assert_eq!(*b, 5);

        assert_eq!(Shared::<i32>::empty().get_mut(), Err(AccessError::Empty));
    }

    #[test]
    fn unwrap_unique() {
        let drops = Cell::new(0);
        let a = Shared::new(Tracked(&drops));
        let b = a.clone();

        let a = match Shared::try_unwrap(a) {
            Ok(_) => panic!("value is shared"),
            Err(a) => a,
        };
        drop(b);

        let tracked = match Shared::try_unwrap(a) {
            Ok(tracked) => tracked,
            Err(_) => panic!("value is unique"),
        };
        assert_eq!(drops.get(), 0);
        drop(tracked);
        assert_eq!(drops.get(), 1);

        assert!(Shared::try_unwrap(Shared::<i32>::empty()).is_err());
    }

    #[test]
    fn clone_on_write() {
        let mut a = Shared::new(String::from("a"));
        a.make_mut().push('b');
        assert_eq!(*a, "ab");

        let b = a.clone();
        a.make_mut().push('c');
        assert_eq!(*a, "abc");
        assert_eq!(*b, "ab");
        assert_eq!(a.use_count(), 1);
        assert_eq!(b.use_count(), 1);
    }

    #[test]
    fn from_raw() {
        let drops = Cell::new(0);
        let raw = Box::into_raw(Box::new(Tracked(&drops)));
        let a = unsafe { Shared::from_raw(raw) };
        assert_eq!(a.as_ptr(), raw as *const _);
        assert_eq!(a.use_count(), 1);
        drop(a);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn array_access() {
        let mut arr: Shared<[i32]> = Shared::from(vec![1, 2, 3]);
        assert_eq!(arr.size(), 3);
        assert_eq!(arr[1], 2);

        arr[1] = 20;
        assert_eq!(arr.as_slice(), [1, 20, 3]);
        assert_eq!(arr.try_index(3), Err(AccessError::OutOfBounds { index: 3, size: 3 }));
        assert_eq!(arr.iter().sum::<i32>(), 24);
    }

    #[test]
    fn array_size_shared_between_handles() {
        let arr: Shared<[u8]> = Shared::from(vec![0u8; 8]);
        let copy = arr.clone();
        assert_eq!(arr.size(), copy.size());
        assert_eq!(copy.size(), 8);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn array_out_of_bounds() {
        let arr: Shared<[i32]> = Shared::from(vec![1, 2, 3]);
        let _value = arr[3];
    }

    #[test]
    #[should_panic(expected = "requires a unique owner")]
    fn array_write_while_shared() {
        let mut arr: Shared<[i32]> = Shared::from(vec![1, 2, 3]);
        let _copy = arr.clone();
        arr[0] = 5;
    }

    #[test]
    fn array_drops_each_element_once() {
        let drops = Cell::new(0);
        let arr: Shared<[Tracked]> = Shared::from(vec![Tracked(&drops), Tracked(&drops)]);
        let copy = arr.clone();
        drop(arr);
        assert_eq!(drops.get(), 0);
        drop(copy);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn empty_array() {
        let arr = Shared::<[i32]>::empty();
        assert_eq!(arr.size(), 0);
        assert!(arr.as_slice().is_empty());
        assert_eq!(arr.try_index(0), Err(AccessError::Empty));

        let null = unsafe { Shared::<[i32]>::from_raw_parts(std::ptr::null_mut(), 4) };
        assert!(null.is_empty());
        assert_eq!(null.size(), 0);
    }

    #[test]
    fn formatting() {
        let a = Shared::new(42);
        assert_eq!(format!("{a}"), "42");
        assert_eq!(format!("{a:?}"), "42");
        assert_eq!(format!("{a:p}"), format!("{:p}", a.as_ptr()));
        assert_eq!(format!("{:?}", Shared::<i32>::empty()), "<empty>");
    }

    #[test]
    fn equality() {
        assert_eq!(Shared::new(1), Shared::new(1));
        assert_ne!(Shared::new(1), Shared::new(2));
        assert_ne!(Shared::new(1), Shared::empty());
        assert_eq!(Shared::<i32>::empty(), Shared::empty());
    }
}
