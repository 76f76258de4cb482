//! Hashing backends for the reconciler's key indices, switchable with the
//! `std-hash` feature.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type HashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
}
