// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers shared by the test suites of the Ganymede crates.
use std::sync::Arc;

use crate::invid::{Invid, InvidFactory};
use crate::pool::InvidPool;

/// Installs a `tracing` subscriber printing to stdout when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Factory backed by a fresh, small pool which is independent of the process-wide allocator.
pub fn pooled_factory() -> (InvidFactory, Arc<InvidPool>) {
    let pool = Arc::new(InvidPool::with_capacity(31));
    (InvidFactory::with_allocator(pool.clone()), pool)
}

/// Unpooled Invid for fixtures.
pub fn invid(type_id: i16, num: i32) -> Invid {
    InvidFactory::new().create(type_id, num)
}
