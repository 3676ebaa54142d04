//! A minimal example showing how Invids are canonicalised through a pool.
//!
//! We register a process-wide pool, create a couple of Invids and check that structurally equal
//! ones share the same allocation. Once every handle is dropped the pool forgets them again.
use std::sync::Arc;

use ganymede_core::{Invid, InvidAllocator, InvidPool};

fn main() {
    let pool = Arc::new(InvidPool::with_capacity(101));
    Invid::set_allocator(pool.clone());

    // Object 134 of object type 5.
    let user = Invid::new(5, 134);

    // Received from somewhere else in string form.
    let same_user: Invid = "5:134".parse().expect("valid invid string");
    assert!(user.ptr_eq(&same_user));

    let group = Invid::new(6, 1);
    println!("{user} and {group} pooled, {} entries", pool.size());

    // Lookups never insert.
    assert!(pool.find_invid(&Invid::new(5, 134)).is_some());

    drop(user);
    drop(same_user);
    drop(group);
    println!("after release: {} entries", pool.size());

    let counters = Invid::counters();
    println!(
        "created {} invids, reused {}",
        counters.created, counters.reused
    );

    Invid::clear_allocator();
}
