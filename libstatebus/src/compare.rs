//! Shallow structural equality for change detection
//!
//! Views produced by a [`Store`](crate::Store) only deliver a value when it
//! differs from the previously delivered one according to [`ShallowEq`].
//!
//! The comparison is shallow on purpose: plain values (numbers, strings,
//! booleans) compare by value, while nested structures held behind an
//! [`Arc`] compare by pointer. Replacing a nested `Arc` registers a change;
//! mutating the data behind it in place does not.

use std::sync::Arc;

/// Shallow structural equality
///
/// Record-shaped snapshots implement this field by field, calling
/// `shallow_eq` on each top-level field:
///
/// ```
/// use std::sync::Arc;
/// use libstatebus::ShallowEq;
///
/// #[derive(Clone)]
/// struct Cart {
///     items: Arc<Vec<String>>,
///     busy: bool,
/// }
///
/// impl ShallowEq for Cart {
///     fn shallow_eq(&self, other: &Self) -> bool {
///         self.items.shallow_eq(&other.items) && self.busy.shallow_eq(&other.busy)
///     }
/// }
///
/// let items = Arc::new(vec!["apple".to_string()]);
/// let a = Cart { items: Arc::clone(&items), busy: false };
/// let b = Cart { items, busy: false };
/// assert!(a.shallow_eq(&b));
///
/// // Equal contents, different allocation: a change.
/// let c = Cart { items: Arc::new(vec!["apple".to_string()]), busy: false };
/// assert!(!a.shallow_eq(&c));
/// ```
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

macro_rules! shallow_eq_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ShallowEq for $ty {
                #[inline]
                fn shallow_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

shallow_eq_by_value!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T: ?Sized> ShallowEq for Arc<T> {
    #[inline]
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ShallowEq> ShallowEq for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.shallow_eq(b))
    }
}

impl<A: ShallowEq, B: ShallowEq> ShallowEq for (A, B) {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.0.shallow_eq(&other.0) && self.1.shallow_eq(&other.1)
    }
}

impl<A: ShallowEq, B: ShallowEq, C: ShallowEq> ShallowEq for (A, B, C) {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.0.shallow_eq(&other.0) && self.1.shallow_eq(&other.1) && self.2.shallow_eq(&other.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_compare_by_value() {
        assert!(3_i64.shallow_eq(&3));
        assert!(!3_i64.shallow_eq(&4));
        assert!("a".to_string().shallow_eq(&"a".to_string()));
        assert!(true.shallow_eq(&true));
    }

    #[test]
    fn test_arc_compares_by_pointer() {
        let a = Arc::new(vec![1, 2, 3]);
        let same = Arc::clone(&a);
        let copy = Arc::new(vec![1, 2, 3]);

        assert!(a.shallow_eq(&same));
        assert!(!a.shallow_eq(&copy));
    }

    #[test]
    fn test_option_and_tuple() {
        assert!(Some(1_u32).shallow_eq(&Some(1)));
        assert!(!Some(1_u32).shallow_eq(&None));
        assert!(None::<u32>.shallow_eq(&None));
        assert!((1_u8, "x").shallow_eq(&(1, "x")));
        assert!(!(1_u8, "x").shallow_eq(&(1, "y")));
    }

    #[test]
    fn test_vec_is_elementwise_one_level() {
        let shared = Arc::new(String::from("inner"));
        let a = vec![Arc::clone(&shared)];
        let b = vec![Arc::clone(&shared)];
        let c = vec![Arc::new(String::from("inner"))];

        assert!(a.shallow_eq(&b));
        assert!(!a.shallow_eq(&c));
        assert!(!vec![1, 2].shallow_eq(&vec![1, 2, 3]));
    }
}
