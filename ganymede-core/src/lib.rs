// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object identity primitives of the Ganymede directory-management system.
//!
//! Objects are addressed by [`Invid`]s, pairs of an object type code and an object number. Large
//! query results contain many repeated Invids, so the crate offers [`InvidPool`], a weak interning
//! table which canonicalises structurally equal Invids without keeping them alive.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ganymede_core::{InvidFactory, InvidPool};
//!
//! let factory = InvidFactory::with_allocator(Arc::new(InvidPool::new()));
//!
//! let a = factory.create(5, 134);
//! let b = factory.parse("5:134").unwrap();
//! assert!(a.ptr_eq(&b));
//! ```
pub mod field_type;
pub mod invid;
pub mod pool;
mod serde;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use field_type::{FieldType, FieldTypeError};
pub use invid::{INVID_LEN, Invid, InvidAllocator, InvidCounters, InvidError, InvidFactory};
pub use pool::{
    DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, InvidPool, PoolConfig, PoolConfigError,
};
