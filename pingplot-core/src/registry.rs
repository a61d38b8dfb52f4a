/*!
 * HOST REGISTRY - ordered set of monitored hosts and their sample storage
 *
 * The registry publishes an immutable `Layout` (host list + storage block).
 * Every membership change builds a fresh layout sized `hosts × capacity` and
 * swaps it in one step, so readers see either the whole old state or the
 * whole new one. History is not migrated across a swap.
 */

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::Host;
use crate::storage::{SampleStore, StoreError};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("host not found: {0}")]
    HostNotFound(String),
    #[error("no host at index {index} (registry holds {len})")]
    IndexNotFound { index: usize, len: usize },
    #[error("host already monitored: {0}")]
    Duplicate(String),
    #[error("invalid host address: {0:?}")]
    InvalidHost(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Snapshot of the registry: host order defines each host's ring index.
#[derive(Debug)]
pub struct Layout {
    hosts: Vec<Host>,
    store: Arc<SampleStore>,
}

impl Layout {
    fn build(hosts: Vec<Host>, capacity: usize) -> Result<Self, StoreError> {
        let store = Arc::new(SampleStore::new(hosts.len(), capacity)?);
        Ok(Self { hosts, store })
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.hosts.iter().position(|h| h == address)
    }
}

pub struct HostRegistry {
    capacity: usize,
    layout: RwLock<Arc<Layout>>,
}

impl HostRegistry {
    /// Create a registry from configured hosts. Duplicates are skipped with a
    /// warning instead of failing the whole configuration.
    pub fn new(capacity: usize, hosts: impl IntoIterator<Item = Host>) -> Result<Self, RegistryError> {
        let mut unique: Vec<Host> = Vec::new();
        for host in hosts {
            if unique.contains(&host) {
                warn!(host = %host, "duplicate host in configuration, skipping");
                continue;
            }
            unique.push(host);
        }
        let layout = Layout::build(unique, capacity)?;
        Ok(Self {
            capacity,
            layout: RwLock::new(Arc::new(layout)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current snapshot. Holding it keeps that storage block alive.
    pub fn layout(&self) -> Arc<Layout> {
        self.layout.read().clone()
    }

    pub fn hosts(&self) -> Vec<Host> {
        self.layout.read().hosts.clone()
    }

    pub fn len(&self) -> usize {
        self.layout.read().hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, address: &str) -> Result<Host, RegistryError> {
        let host = Host::new(address)?;
        self.rebuild(|hosts| {
            if hosts.contains(&host) {
                return Err(RegistryError::Duplicate(host.to_string()));
            }
            hosts.push(host.clone());
            Ok(host)
        })
    }

    pub fn remove_at(&self, index: usize) -> Result<Host, RegistryError> {
        self.rebuild(|hosts| {
            if index >= hosts.len() {
                return Err(RegistryError::IndexNotFound {
                    index,
                    len: hosts.len(),
                });
            }
            Ok(hosts.remove(index))
        })
    }

    pub fn remove(&self, address: &str) -> Result<Host, RegistryError> {
        let address = address.trim();
        self.rebuild(|hosts| {
            let index = hosts
                .iter()
                .position(|h| h == address)
                .ok_or_else(|| RegistryError::HostNotFound(address.to_string()))?;
            Ok(hosts.remove(index))
        })
    }

    /// Apply `change` to a copy of the host list and swap in a freshly sized
    /// layout. On error nothing is swapped.
    fn rebuild<F>(&self, change: F) -> Result<Host, RegistryError>
    where
        F: FnOnce(&mut Vec<Host>) -> Result<Host, RegistryError>,
    {
        let current = self.layout.upgradable_read();
        let mut hosts = current.hosts.clone();
        let changed = change(&mut hosts)?;
        let next = Arc::new(Layout::build(hosts, self.capacity)?);
        debug!(hosts = next.hosts.len(), slots = next.store.len(), "registry layout rebuilt");
        *RwLockUpgradableReadGuard::upgrade(current) = next;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;

    fn hosts(names: &[&str]) -> Vec<Host> {
        names.iter().map(|n| Host::new(n).unwrap()).collect()
    }

    #[test]
    fn test_new_skips_duplicates() {
        let registry = HostRegistry::new(8, hosts(&["a", "b", "a"])).unwrap();
        assert_eq!(registry.hosts(), hosts(&["a", "b"]));
        assert_eq!(registry.layout().store().len(), 16);
    }

    #[test]
    fn test_append_resizes_storage_and_discards_history() {
        let registry = HostRegistry::new(4, hosts(&["a"])).unwrap();
        let before = registry.layout();
        before.store().write(0, 1, Sample::Latency(9)).unwrap();

        let added = registry.append("b").unwrap();
        assert_eq!(added, "b");

        let after = registry.layout();
        assert_eq!(after.hosts(), &hosts(&["a", "b"])[..]);
        assert_eq!(after.store().host_count(), 2);
        assert_eq!(after.store().len(), 8);
        assert_eq!(after.store().read(0, 1), Ok(Sample::Pending));
        // the old snapshot is untouched for whoever still holds it
        assert_eq!(before.store().read(0, 1), Ok(Sample::Latency(9)));
    }

    #[test]
    fn test_append_then_remove_round_trips() {
        let registry = HostRegistry::new(4, hosts(&["a", "b"])).unwrap();
        registry.append("c").unwrap();
        let removed = registry.remove("c").unwrap();

        assert_eq!(removed, "c");
        assert_eq!(registry.hosts(), hosts(&["a", "b"]));
        assert_eq!(registry.layout().store().len(), 8);
    }

    #[test]
    fn test_append_duplicate_fails_without_swap() {
        let registry = HostRegistry::new(4, hosts(&["a"])).unwrap();
        let before = registry.layout();

        assert_eq!(registry.append(" a "), Err(RegistryError::Duplicate("a".into())));
        assert!(Arc::ptr_eq(&before, &registry.layout()));
    }

    #[test]
    fn test_remove_unknown_leaves_registry_unchanged() {
        let registry = HostRegistry::new(4, hosts(&["a"])).unwrap();
        let before = registry.layout();
        before.store().write(0, 0, Sample::Latency(3)).unwrap();

        assert_eq!(registry.remove("zzz"), Err(RegistryError::HostNotFound("zzz".into())));
        assert_eq!(
            registry.remove_at(5),
            Err(RegistryError::IndexNotFound { index: 5, len: 1 })
        );

        let after = registry.layout();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.store().read(0, 0), Ok(Sample::Latency(3)));
    }

    #[test]
    fn test_remove_at_shifts_indexes() {
        let registry = HostRegistry::new(4, hosts(&["a", "b", "c"])).unwrap();
        assert_eq!(registry.remove_at(0).unwrap(), "a");

        let layout = registry.layout();
        assert_eq!(layout.index_of("b"), Some(0));
        assert_eq!(layout.index_of("c"), Some(1));
        assert_eq!(layout.index_of("a"), None);
    }

    #[test]
    fn test_zero_capacity_is_a_store_error() {
        assert!(matches!(
            HostRegistry::new(0, hosts(&["a"])),
            Err(RegistryError::Store(StoreError::ZeroCapacity))
        ));
    }
}
