//! ClientRegistry: the set of receivers a UDP sender fans frames out to.
//!
//! Receivers join in one of two ways:
//!
//! - **Discovery**: the receiver sends a `connect` handshake datagram and the
//!   sender records the datagram's source address.
//! - **Manual**: the operator lists receiver addresses in the sender config.
//!
//! # Liveness
//!
//! Entries never expire on their own.  Each entry records when it was last
//! seen (a repeated handshake refreshes it), and callers that want eviction
//! call [`ClientRegistry::prune_stale`] with a time-to-live.  Manual entries
//! are never pruned.
//!
//! # Self address
//!
//! The sender's own bound address is never a transmission target, even if a
//! looped-back handshake or a config mistake would otherwise add it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One registered receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    pub addr: SocketAddr,
    pub registered_at: Instant,
    pub last_seen: Instant,
    /// `true` for addresses added from configuration rather than a handshake.
    pub manual: bool,
}

/// In-memory registry of UDP receivers keyed by socket address.
///
/// The registry itself is not synchronised.  A sender that runs discovery on
/// another thread wraps it in a `Mutex` (see `SharedRegistry` in the sender
/// crate).
#[derive(Debug, Default, Clone)]
pub struct ClientRegistry {
    self_addr: Option<SocketAddr>,
    clients: HashMap<SocketAddr, ClientEntry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that will never target `self_addr`.
    pub fn with_self_addr(self_addr: SocketAddr) -> Self {
        Self {
            self_addr: Some(self_addr),
            clients: HashMap::new(),
        }
    }

    pub fn self_addr(&self) -> Option<SocketAddr> {
        self.self_addr
    }

    pub fn set_self_addr(&mut self, addr: SocketAddr) {
        self.self_addr = Some(addr);
    }

    /// Registers a discovered receiver, or refreshes it if already known.
    ///
    /// Returns `true` if the address was not previously registered.
    pub fn add(&mut self, addr: SocketAddr) -> bool {
        self.insert(addr, false)
    }

    /// Registers a manually configured receiver.
    ///
    /// Returns `true` if the address was not previously registered.
    pub fn add_manual(&mut self, addr: SocketAddr) -> bool {
        self.insert(addr, true)
    }

    /// Removes a receiver.  Returns `true` if it was registered.
    pub fn remove(&mut self, addr: SocketAddr) -> bool {
        self.clients.remove(&addr).is_some()
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.clients.contains_key(&addr)
    }

    /// Returns the entry for `addr`.
    pub fn get(&self, addr: SocketAddr) -> Option<&ClientEntry> {
        self.clients.get(&addr)
    }

    /// Returns every registered address, sorted for stable iteration.
    pub fn list(&self) -> Vec<SocketAddr> {
        let mut addrs: Vec<SocketAddr> = self.clients.keys().copied().collect();
        addrs.sort();
        addrs
    }

    /// Returns the addresses a frame should be sent to: every registered
    /// address except the sender's own.
    pub fn targets(&self) -> Vec<SocketAddr> {
        self.list()
            .into_iter()
            .filter(|addr| Some(*addr) != self.self_addr)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Removes discovered entries not seen within `ttl` and returns them.
    pub fn prune_stale(&mut self, ttl: Duration) -> Vec<SocketAddr> {
        self.prune_stale_at(ttl, Instant::now())
    }

    fn prune_stale_at(&mut self, ttl: Duration, now: Instant) -> Vec<SocketAddr> {
        let mut stale: Vec<SocketAddr> = self
            .clients
            .values()
            .filter(|e| !e.manual && now.saturating_duration_since(e.last_seen) > ttl)
            .map(|e| e.addr)
            .collect();
        stale.sort();
        for addr in &stale {
            self.clients.remove(addr);
        }
        stale
    }

    fn insert(&mut self, addr: SocketAddr, manual: bool) -> bool {
        let now = Instant::now();
        match self.clients.get_mut(&addr) {
            Some(entry) => {
                entry.last_seen = now;
                entry.manual |= manual;
                false
            }
            None => {
                self.clients.insert(
                    addr,
                    ClientEntry {
                        addr,
                        registered_at: now,
                        last_seen: now,
                        manual,
                    },
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.targets().is_empty());
    }

    #[test]
    fn test_add_returns_true_only_for_new_address() {
        // Arrange
        let mut registry = ClientRegistry::new();

        // Act
        let first = registry.add(addr("10.0.0.2:4445"));
        let again = registry.add(addr("10.0.0.2:4445"));

        // Assert
        assert!(first);
        assert!(!again);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = ClientRegistry::new();
        registry.add(addr("10.0.0.9:1"));
        registry.add(addr("10.0.0.2:1"));
        registry.add(addr("10.0.0.5:1"));
        assert_eq!(
            registry.list(),
            vec![addr("10.0.0.2:1"), addr("10.0.0.5:1"), addr("10.0.0.9:1")]
        );
    }

    #[test]
    fn test_targets_exclude_self_address() {
        // Arrange
        let me = addr("192.168.1.10:4444");
        let mut registry = ClientRegistry::with_self_addr(me);
        registry.add(me);
        registry.add(addr("192.168.1.20:4444"));

        // Act
        let targets = registry.targets();

        // Assert
        assert_eq!(targets, vec![addr("192.168.1.20:4444")]);
        assert!(registry.contains(me), "self stays listed but is never targeted");
    }

    #[test]
    fn test_remove_unregisters_address() {
        let mut registry = ClientRegistry::new();
        registry.add(addr("10.0.0.2:4445"));
        assert!(registry.remove(addr("10.0.0.2:4445")));
        assert!(!registry.remove(addr("10.0.0.2:4445")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_prune_stale_removes_only_old_discovered_entries() {
        // Arrange
        let mut registry = ClientRegistry::new();
        registry.add(addr("10.0.0.2:1"));
        registry.add_manual(addr("10.0.0.3:1"));
        let later = Instant::now() + Duration::from_secs(120);

        // Act
        let pruned = registry.prune_stale_at(Duration::from_secs(60), later);

        // Assert
        assert_eq!(pruned, vec![addr("10.0.0.2:1")]);
        assert_eq!(registry.list(), vec![addr("10.0.0.3:1")]);
    }

    #[test]
    fn test_prune_stale_keeps_recent_entries() {
        let mut registry = ClientRegistry::new();
        registry.add(addr("10.0.0.2:1"));
        let pruned = registry.prune_stale(Duration::from_secs(60));
        assert!(pruned.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_re_adding_refreshes_last_seen() {
        let mut registry = ClientRegistry::new();
        let a = addr("10.0.0.2:1");
        registry.add(a);
        let before = registry.get(a).unwrap().last_seen;
        std::thread::sleep(Duration::from_millis(5));
        registry.add(a);
        let entry = registry.get(a).unwrap();
        assert!(entry.last_seen > before);
        assert!(entry.registered_at <= before);
    }

    #[test]
    fn test_manual_flag_sticks_after_handshake() {
        let mut registry = ClientRegistry::new();
        let a = addr("10.0.0.2:1");
        registry.add_manual(a);
        registry.add(a);
        assert!(registry.get(a).unwrap().manual);
    }
}
