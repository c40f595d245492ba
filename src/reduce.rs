//! Element-wise reduction kernels shared by the collective implementations.

use crate::types::ReduceOp;

/// Element types the harness can fold.
pub trait Reducible: Copy + 'static {
    fn reduce(acc: Self, incoming: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    ($($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(acc: Self, incoming: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => acc + incoming,
                        ReduceOp::Noop => acc,
                    }
                }
            }
        )*
    };
}

impl_reducible!(f32, f64);

/// Fold `src` into `dst` element by element.
///
/// Both slices must have the same length. Plain IEEE-754 arithmetic: NaN
/// and infinity propagate.
pub fn reduce_into<T: Reducible>(dst: &mut [T], src: &[T], op: ReduceOp) {
    debug_assert_eq!(dst.len(), src.len());
    if op == ReduceOp::Noop {
        return;
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d = T::reduce(*d, *s, op);
    }
}

/// Fold `contributions` in order into `out`, starting from the first one.
///
/// Every participant must see the same result, so callers always pass the
/// contributions ordered by rank.
pub fn fold_ordered<'a, T, I>(out: &mut [T], mut contributions: I, op: ReduceOp)
where
    T: Reducible,
    I: Iterator<Item = &'a [T]>,
{
    if let Some(first) = contributions.next() {
        out.copy_from_slice(first);
    }
    for c in contributions {
        reduce_into(out, c, op);
    }
}
