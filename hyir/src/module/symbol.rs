//! Name-uniqued ownership of module entities.
//!
//! A [`SymbolTable`] owns its entries and keeps two structures in sync: a name
//! index giving O(1) lookups, and an append-only list of boxed entries giving a
//! deterministic, first-insertion enumeration order. Boxing keeps the address of
//! every entry stable for the lifetime of the table.
use std::{collections::HashMap, fmt};

use crate::hy_fatal;

/// An entity that can be uniqued by name.
pub trait Symbol {
    fn name(&self) -> &str;
}

/// Stable handle of an entry within one [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct SymbolTable<T> {
    index: HashMap<String, SymbolId>,
    entries: Vec<Box<T>>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<T: Symbol> SymbolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only path adding entries. Keeps the index and the list consistent.
    fn push(&mut self, entry: T) -> SymbolId {
        let Ok(raw) = u32::try_from(self.entries.len()) else {
            hy_fatal!("symbol table overflow while inserting `{}`", entry.name());
        };
        let id = SymbolId(raw);
        let previous = self.index.insert(entry.name().to_string(), id);
        if previous.is_some() {
            hy_fatal!("symbol table index already holds `{}`", entry.name());
        }
        self.entries.push(Box::new(entry));
        id
    }

    /// Return the entry named `name`, creating it with `make` if absent.
    ///
    /// `make` must build an entry whose [`Symbol::name`] equals `name`.
    pub fn get_or_insert_with(
        &mut self,
        name: &str,
        make: impl FnOnce() -> T,
    ) -> (SymbolId, &mut T) {
        let id = match self.id_of(name) {
            Some(id) => id,
            None => {
                let entry = make();
                if entry.name() != name {
                    hy_fatal!(
                        "symbol table entry built for `{}` is named `{}`",
                        name,
                        entry.name()
                    );
                }
                self.push(entry)
            }
        };
        (id, &mut *self.entries[id.index()])
    }

    /// Insert `entry` unless its name is taken, in which case the existing entry
    /// is returned and `entry` is dropped.
    pub fn try_insert(&mut self, entry: T) -> Result<SymbolId, &mut T> {
        if let Some(id) = self.id_of(entry.name()) {
            return Err(&mut *self.entries[id.index()]);
        }
        Ok(self.push(entry))
    }

    pub fn id_of(&self, name: &str) -> Option<SymbolId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.id_of(name).map(|id| &*self.entries[id.index()])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let id = self.id_of(name)?;
        Some(&mut *self.entries[id.index()])
    }

    pub fn by_id(&self, id: SymbolId) -> Option<&T> {
        self.entries.get(id.index()).map(|entry| &**entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &**entry)
    }

    /// Names in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|entry| entry.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Symbol + fmt::Debug> fmt::Debug for SymbolTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Entry {
        name: String,
        hits: u32,
    }

    impl Entry {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                hits: 0,
            }
        }
    }

    impl Symbol for Entry {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn get_or_insert_is_idempotent() {
        let mut table = SymbolTable::new();
        let (a, entry) = table.get_or_insert_with("a", || Entry::new("a"));
        entry.hits += 1;
        let first = entry as *const Entry;

        let (b, entry) = table.get_or_insert_with("a", || panic!("must not be rebuilt"));
        entry.hits += 1;
        assert_eq!(a, b);
        assert!(std::ptr::eq(first, entry));
        assert_eq!(table.get("a").unwrap().hits, 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn entries_keep_their_address() {
        let mut table = SymbolTable::new();
        let first = table.get_or_insert_with("first", || Entry::new("first")).1 as *const Entry;
        for i in 0..256 {
            let name = format!("n{i}");
            table.get_or_insert_with(&name, || Entry::new(&name));
        }
        let again = table.get_or_insert_with("first", || Entry::new("first")).1 as *const Entry;
        assert!(std::ptr::eq(first, again));
    }

    #[test]
    fn iteration_follows_first_insertion() {
        let mut table = SymbolTable::new();
        for name in ["c", "a", "b", "a", "c"] {
            table.get_or_insert_with(name, || Entry::new(name));
        }
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["c", "a", "b"]);
        assert_eq!(table.id_of("b"), Some(SymbolId(2)));
        assert_eq!(table.by_id(SymbolId(1)).map(|e| e.name()), Some("a"));
    }

    #[test]
    fn try_insert_returns_existing_on_collision() {
        let mut table = SymbolTable::new();
        assert!(table.try_insert(Entry::new("x")).is_ok());
        let mut duplicate = Entry::new("x");
        duplicate.hits = 7;
        let existing = table.try_insert(duplicate).unwrap_err();
        assert_eq!(existing.hits, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn absent_lookups_are_none() {
        let mut table: SymbolTable<Entry> = SymbolTable::new();
        assert!(table.get("missing").is_none());
        assert!(table.get_mut("missing").is_none());
        assert!(table.by_id(SymbolId(0)).is_none());
        assert!(!table.contains("missing"));
        assert!(table.is_empty());
    }
}
