use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NatKey {
    pub internal_addr: Ipv4Addr,
    pub internal_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatEntry {
    pub internal_addr: Ipv4Addr,
    pub internal_port: u16,
    pub external_addr: Ipv4Addr,
    pub external_port: u16,
}

impl NatEntry {
    pub fn key(&self) -> NatKey {
        NatKey {
            internal_addr: self.internal_addr,
            internal_port: self.internal_port,
        }
    }
}

/// Internal to external mappings.
///
/// Translation does not read from this table yet: the rewriter is a plain
/// address substitution. Port allocation is not enforced here either.
#[derive(Debug, Default)]
pub struct NatTable {
    entries: Mutex<HashMap<NatKey, NatEntry>>,
}

impl NatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous entry stored under the same key.
    pub fn insert(&self, entry: NatEntry) -> Option<NatEntry> {
        self.lock().insert(entry.key(), entry)
    }

    pub fn get(&self, key: &NatKey) -> Option<NatEntry> {
        self.lock().get(key).copied()
    }

    pub fn remove(&self, key: &NatKey) -> Option<NatEntry> {
        self.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NatKey, NatEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
