//! Hash map alias.
//!
//! Node class lookup, shader reflection tables (uniform/attribute/binding
//! name -> location) and format lookup tables are all keyed by short ASCII
//! strings or small integers; `fxhash` trades DoS-resistance we don't need
//! here for speed, matching the teacher's own use of it elsewhere in the
//! workspace.

pub type HashMap<K, V> = std::collections::HashMap<K, V, fxhash::FxBuildHasher>;
pub type HashSet<K> = std::collections::HashSet<K, fxhash::FxBuildHasher>;

pub fn new_hashmap<K, V>() -> HashMap<K, V> {
    HashMap::default()
}

pub fn new_hashset<K>() -> HashSet<K> {
    HashSet::default()
}
