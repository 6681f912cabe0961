//! Host port allocation.
//!
//! Ports are drawn at random from an inclusive range and recorded in a
//! concurrent set the moment they are chosen, so two concurrent creations
//! can never pick the same port.

use crate::error::CoreError;
use dashmap::DashSet;
use rand::Rng;

/// Candidates drawn per requested port before giving up.
pub const MAX_ATTEMPTS_PER_PORT: u32 = 100;

/// Tracks host ports reserved for sandboxes.
#[derive(Debug)]
pub struct PortAllocator {
    min: u16,
    max: u16,
    occupied: DashSet<u16>,
}

impl PortAllocator {
    /// Create an allocator over the inclusive range `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the range is empty or starts at 0.
    pub fn new(min: u16, max: u16) -> Result<Self, CoreError> {
        if min == 0 || min > max {
            return Err(CoreError::InvalidConfig(format!(
                "invalid port range {min}-{max}"
            )));
        }
        Ok(Self {
            min,
            max,
            occupied: DashSet::new(),
        })
    }

    /// The configured range.
    pub fn range(&self) -> (u16, u16) {
        (self.min, self.max)
    }

    /// Reserve `count` distinct ports.
    ///
    /// On failure every port reserved by this call is released again.
    pub fn allocate(&self, count: usize) -> Result<Vec<u16>, CoreError> {
        let mut ports = Vec::with_capacity(count);
        for _ in 0..count {
            match self.reserve_one() {
                Some(port) => ports.push(port),
                None => {
                    self.release(&ports);
                    tracing::warn!(
                        min = self.min,
                        max = self.max,
                        occupied = self.occupied.len(),
                        "Port range exhausted"
                    );
                    return Err(CoreError::ResourceExhausted {
                        min: self.min,
                        max: self.max,
                    });
                }
            }
        }
        tracing::trace!(?ports, "Ports allocated");
        Ok(ports)
    }

    fn reserve_one(&self) -> Option<u16> {
        let mut rng = rand::thread_rng();
        (0..MAX_ATTEMPTS_PER_PORT)
            .map(|_| rng.gen_range(self.min..=self.max))
            // insert is the membership test: false means someone holds it
            .find(|port| self.occupied.insert(*port))
    }

    /// Return ports to the pool.
    pub fn release(&self, ports: &[u16]) {
        for port in ports {
            self.occupied.remove(port);
        }
        if !ports.is_empty() {
            tracing::trace!(?ports, "Ports released");
        }
    }

    /// Whether a port is currently reserved.
    pub fn is_occupied(&self, port: u16) -> bool {
        self.occupied.contains(&port)
    }

    /// Number of reserved ports.
    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_invalid_ranges() {
        assert!(PortAllocator::new(0, 10).is_err());
        assert!(PortAllocator::new(2000, 1000).is_err());
        assert!(PortAllocator::new(2000, 2000).is_ok());
    }

    #[test]
    fn test_allocate_distinct_in_range() {
        let alloc = PortAllocator::new(20000, 20100).unwrap();
        let ports = alloc.allocate(4).unwrap();
        assert_eq!(ports.len(), 4);
        assert_eq!(ports.iter().collect::<HashSet<_>>().len(), 4);
        assert!(ports.iter().all(|p| (20000..=20100).contains(p)));
        assert!(ports.iter().all(|p| alloc.is_occupied(*p)));
        assert_eq!(alloc.occupied_count(), 4);
    }

    #[test]
    fn test_release_makes_ports_allocatable() {
        let alloc = PortAllocator::new(30000, 30000).unwrap();
        let first = alloc.allocate(1).unwrap();
        assert!(alloc.allocate(1).is_err());

        alloc.release(&first);
        assert!(!alloc.is_occupied(30000));
        assert_eq!(alloc.allocate(1).unwrap(), vec![30000]);
    }

    #[test]
    fn test_exhaustion_releases_partial_allocation() {
        let alloc = PortAllocator::new(40000, 40001).unwrap();
        let err = alloc.allocate(3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ResourceExhausted {
                min: 40000,
                max: 40001
            }
        ));
        assert_eq!(alloc.occupied_count(), 0);
    }

    #[test]
    fn test_concurrent_allocations_are_disjoint() {
        let alloc = Arc::new(PortAllocator::new(21000, 21999).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || alloc.allocate(4).unwrap())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for port in handle.join().unwrap() {
                assert!(seen.insert(port), "port {port} handed out twice");
            }
        }
        assert_eq!(seen.len(), 64);
        assert_eq!(alloc.occupied_count(), 64);
    }
}
