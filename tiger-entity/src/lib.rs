//! Densely numbered entity references as mapping keys.
//!
//! This crate defines reusable infrastructure for working with entity references. An entity
//! reference is a small integer wrapped in a newtype, giving strong Rust types for the different
//! kinds of nodes in the compiler's intermediate data structures (graph nodes, temps, frame
//! locals) without paying for a 64-bit pointer everywhere one is needed.

#![deny(missing_docs)]

pub use crate::iter::{Iter, IterMut};
pub use crate::keys::Keys;
pub use crate::map::SecondaryMap;
pub use crate::packed_option::{PackedOption, ReservedValue};
pub use crate::primary::PrimaryMap;
pub use crate::set::EntitySet;

mod iter;
mod keys;
mod map;
mod packed_option;
mod primary;
mod set;

/// A type wrapping a small integer index should implement `EntityRef` so it can be used as the
/// key of a `PrimaryMap` or `SecondaryMap`.
///
/// The index is turned into a `usize` and used to index arrays and vectors. The `new` and
/// `index` methods are typically trivial, generated by the `entity_impl!` macro.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a small integer. This should crash if the requested
    /// index is not representable.
    fn new(index: usize) -> Self;

    /// Get the index that was used to create this entity reference.
    fn index(self) -> usize;
}

/// Macro that defines a new entity reference type along with a `Display` and `Debug`
/// implementation that matches the `prefixNN` convention used in the textual IR.
///
/// This is the same shape as `cranelift_entity::entity_impl!`, used here for `Temp`, `Label`,
/// and the graph node keys.
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::packed_option::ReservedValue for $entity {
            fn reserved_value() -> Self {
                $entity(u32::MAX)
            }
        }

        impl core::fmt::Display for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", stringify!($entity).to_lowercase(), self.0)
            }
        }

        impl core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                (self as &dyn core::fmt::Display).fmt(f)
            }
        }
    };

    ($entity:ident, $prefix:expr) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::packed_option::ReservedValue for $entity {
            fn reserved_value() -> Self {
                $entity(u32::MAX)
            }
        }

        impl core::fmt::Display for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                (self as &dyn core::fmt::Display).fmt(f)
            }
        }
    };
}
