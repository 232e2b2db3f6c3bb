// src/utils/atom.rs

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// An interned identifier. Two atoms are equal iff their names are equal,
/// so comparing and hashing an atom is O(1).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

/// Name-keyed map that remembers insertion order.
pub type AtomMap<T> = IndexMap<Atom, T>;

#[derive(Default)]
struct AtomTable {
    names: Vec<&'static str>,
    index: HashMap<&'static str, u32>,
}

fn table() -> &'static Mutex<AtomTable> {
    static TABLE: OnceLock<Mutex<AtomTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(AtomTable::default()))
}

impl Atom {
    pub fn intern(name: &str) -> Atom {
        let mut table = table().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(&id) = table.index.get(name) {
            return Atom(id);
        }
        // The table is append-only, so leaked names live as long as the process.
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let id = table.names.len() as u32;
        table.names.push(name);
        table.index.insert(name, id);
        Atom(id)
    }

    pub fn as_str(self) -> &'static str {
        let table = table().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table.names[self.0 as usize]
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::intern(name)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.as_str())
    }
}
