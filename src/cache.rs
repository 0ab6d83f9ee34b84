use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// The default length, in bytes, above which values are not interned.
pub const DEFAULT_MAX_INTERNED_LEN: usize = 64;

const DEFAULT_SHARDS: usize = 16;

/// Selects how a reader interns the values returned by
/// `Reader::interned_field`.
///
/// Interning trades a hash lookup per field for shared storage of repeated
/// values, which pays off for low cardinality columns such as enums, codes
/// or country names.
#[derive(Clone)]
pub enum Interning {
    /// Every call allocates a new string. This is the default.
    None,
    /// One table per column index. Values in different columns are never
    /// shared.
    PerColumn,
    /// One table for all columns.
    Global,
    /// A table shared with other readers, possibly on other threads.
    Shared(Arc<SharedStringPool>),
}

impl Default for Interning {
    fn default() -> Interning {
        Interning::None
    }
}

impl fmt::Debug for Interning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Interning::None => write!(f, "None"),
            Interning::PerColumn => write!(f, "PerColumn"),
            Interning::Global => write!(f, "Global"),
            Interning::Shared(ref pool) => {
                write!(f, "Shared({} values)", pool.len())
            }
        }
    }
}

/// A string interning table owned by a single reader.
///
/// Lookups hash the candidate `&str` and compare contents, so they never
/// allocate. Entries are never evicted.
#[derive(Debug)]
pub struct StringPool {
    per_column: bool,
    columns: Vec<HashSet<Arc<str>>>,
    empty: Arc<str>,
}

impl StringPool {
    /// Create a pool with one table per column index.
    pub fn per_column() -> StringPool {
        StringPool { per_column: true, columns: vec![], empty: Arc::from("") }
    }

    /// Create a pool with a single table for all columns.
    pub fn global() -> StringPool {
        StringPool {
            per_column: false,
            columns: vec![HashSet::new()],
            empty: Arc::from(""),
        }
    }

    /// Return the shared copy of `value` for the given column, inserting
    /// it if this is the first time it has been seen.
    pub fn intern(&mut self, column: usize, value: &str) -> Arc<str> {
        if value.is_empty() {
            return Arc::clone(&self.empty);
        }
        let table = if self.per_column {
            if column >= self.columns.len() {
                self.columns.resize_with(column + 1, HashSet::new);
            }
            &mut self.columns[column]
        } else {
            &mut self.columns[0]
        };
        if let Some(found) = table.get(value) {
            return Arc::clone(found);
        }
        let value: Arc<str> = Arc::from(value);
        table.insert(Arc::clone(&value));
        value
    }

    /// The number of distinct values held across all tables.
    pub fn len(&self) -> usize {
        self.columns.iter().map(|t| t.len()).sum()
    }

    /// Returns true if no value has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A string interning table that can be shared by many readers.
///
/// Values live in a `DashMap` keyed by content. The map is split into
/// shards, each behind its own lock, so threads interning different values
/// rarely contend.
pub struct SharedStringPool {
    table: DashMap<Arc<str>, ()>,
    empty: Arc<str>,
}

impl Default for SharedStringPool {
    fn default() -> SharedStringPool {
        SharedStringPool::new(DEFAULT_SHARDS)
    }
}

impl fmt::Debug for SharedStringPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SharedStringPool").field("len", &self.len()).finish()
    }
}

impl SharedStringPool {
    /// Create a pool split into at least the given number of shards.
    ///
    /// The count is rounded up to a power of two, and to no less than two.
    pub fn new(shards: usize) -> SharedStringPool {
        SharedStringPool {
            table: DashMap::with_shard_amount(
                shards.max(2).next_power_of_two(),
            ),
            empty: Arc::from(""),
        }
    }

    /// Return the shared copy of `value`, inserting it if this is the first
    /// time any reader has seen it.
    pub fn intern(&self, value: &str) -> Arc<str> {
        if value.is_empty() {
            return Arc::clone(&self.empty);
        }
        if let Some(found) = self.table.get(value) {
            return Arc::clone(found.key());
        }
        // The entry holds the shard lock. A value stored by another thread
        // since the lookup is returned instead.
        let entry = self.table.entry(Arc::from(value)).or_insert(());
        Arc::clone(entry.key())
    }

    /// The number of distinct values held.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no value has been interned.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
