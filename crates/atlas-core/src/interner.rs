//! Dense string interning for viewer identifiers.
//!
//! Viewer names are interned to `u32` ids at the ingestion boundary so
//! that the aggregation maps, the inverted index, and the detector all
//! operate on dense integers instead of strings.

use std::collections::HashMap;

/// Bidirectional string-to-id table. Ids are assigned contiguously from
/// zero in first-intern order.
#[derive(Debug, Clone, Default)]
pub struct ViewerInterner {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl ViewerInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, allocating one on first sight.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// Looks up an already-interned name.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Resolves an id back to its name.
    pub fn resolve(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Number of distinct names interned so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
