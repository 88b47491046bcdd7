/*!
This crate provides [`Shared`], a reference-counted handle giving shared ownership of a
heap allocated value, and its array form `Shared<[T]>`.

Every clone of a handle points to the same allocation and increases its reference count.
When the last handle is dropped (or [`reset`](Shared::reset), or reassigned) the value is
freed, exactly once.

```
let h1 = shrd::make_shared(42);
assert_eq!(*h1, 42);
assert_eq!(h1.use_count(), 1);

let h2 = h1.clone();
assert_eq!(h1.use_count(), 2);
assert_eq!(*h2, 42);

drop(h2);
assert_eq!(h1.use_count(), 1);
```

Arrays keep their element count in the shared allocation, and indexing is always bounds
checked:

```
let mut arr = shrd::make_shared_array::<i32, 5>();
assert_eq!(arr.size(), 5);

arr[0] = 10;
arr[4] = 50;
assert_eq!(arr[0], 10);
assert_eq!(arr[4], 50);
```

The reference count is a plain (non-atomic) integer, handles are therefore neither
[`Send`] nor [`Sync`]. Misuse that would be undefined behaviour for a raw pointer (accessing
an empty handle, indexing out of bounds, writing to a shared value) is reported through
[`AccessError`], or a panic carrying it when going through `*` or `[]`.
*/

mod core;
mod error;
mod shared;
mod utils;

pub use crate::error::AccessError;
pub use crate::shared::Shared;

/// Allocate `value` on the heap and give back the only handle to it
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/**
Construct a value with `f` and give back the only handle to it

Handy when the value is built from constructor arguments:

```
# use shrd::make_shared_with;
#
let name = make_shared_with(|| String::from_utf8_lossy(b"shared").into_owned());
assert_eq!(*name, "shared");
```
*/
pub fn make_shared_with<T, F>(f: F) -> Shared<T>
where
    F: FnOnce() -> T,
{
    Shared::new(f())
}

/**
Allocate an array of `N` default values and give back the only handle to it

For an element count only known at runtime use [`Shared::from`] with a [`Vec`] or
boxed slice instead.

```
# use shrd::make_shared_array;
#
let arr = make_shared_array::<String, 3>();
assert_eq!(arr.size(), 3);
assert!(arr.iter().all(String::is_empty));
```
*/
pub fn make_shared_array<T: Default, const N: usize>() -> Shared<[T]> {
    let array: Vec<T> = std::iter::repeat_with(T::default).take(N).collect();
    Shared::from(array)
}
