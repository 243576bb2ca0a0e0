#![deny(missing_docs)]
//! Host port allocator for container-runtime hook instances.
//!
//! Holds its own lock, independent of the Hook Lifecycle Engine's instance
//! map, per the locking discipline: no operation holds two locks
//! simultaneously, and the allocator never blocks on I/O while holding its
//! lock, so a plain [`std::sync::Mutex`] is correct here — there is no
//! `.await` inside the critical section.

use std::collections::HashSet;
use std::sync::Mutex;

use forgehook_core::config::PortRange;
use forgehook_core::ForgehookError;

/// Assigns unique host ports from a configured, inclusive range.
pub struct PortAllocator {
    range: PortRange,
    allocated: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    /// Create an allocator over the given inclusive range, with nothing
    /// allocated yet.
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            allocated: Mutex::new(HashSet::new()),
        }
    }

    /// Mark ports as already in use, e.g. from persisted `usedPorts()` or
    /// from adoption & reconciliation at boot. Idempotent.
    pub fn reconcile(&self, used_ports: impl IntoIterator<Item = u16>) {
        let mut guard = self.allocated.lock().expect("port allocator mutex poisoned");
        guard.extend(used_ports);
    }

    /// Assign the lowest free port in range. Overflow (no port free) raises
    /// `conflict`.
    pub fn allocate(&self) -> Result<u16, ForgehookError> {
        let mut guard = self.allocated.lock().expect("port allocator mutex poisoned");
        for port in self.range.start..=self.range.end {
            if !guard.contains(&port) {
                guard.insert(port);
                return Ok(port);
            }
            if port == self.range.end {
                break;
            }
        }
        Err(ForgehookError::Conflict(format!(
            "no available host port in range {}-{}",
            self.range.start, self.range.end
        )))
    }

    /// Release a previously allocated port, e.g. on install failure or
    /// uninstall. Releasing an unallocated port is a no-op.
    pub fn release(&self, port: u16) {
        let mut guard = self.allocated.lock().expect("port allocator mutex poisoned");
        guard.remove(&port);
    }

    /// Whether a port is currently held.
    pub fn is_allocated(&self, port: u16) -> bool {
        let guard = self.allocated.lock().expect("port allocator mutex poisoned");
        guard.contains(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_range() -> PortRange {
        PortRange { start: 9000, end: 9002 }
    }

    #[test]
    fn allocates_within_range() {
        let allocator = PortAllocator::new(small_range());
        let port = allocator.allocate().unwrap();
        assert!((9000..=9002).contains(&port));
    }

    #[test]
    fn allocated_ports_are_unique() {
        let allocator = PortAllocator::new(small_range());
        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        let c = allocator.allocate().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn overflow_raises_conflict() {
        let allocator = PortAllocator::new(small_range());
        allocator.allocate().unwrap();
        allocator.allocate().unwrap();
        allocator.allocate().unwrap();
        let err = allocator.allocate().unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn release_frees_port_for_reuse() {
        let allocator = PortAllocator::new(PortRange { start: 9000, end: 9000 });
        let port = allocator.allocate().unwrap();
        assert!(allocator.allocate().is_err());
        allocator.release(port);
        assert!(allocator.allocate().is_ok());
    }

    #[test]
    fn reconcile_marks_ports_used_without_double_allocating() {
        let allocator = PortAllocator::new(small_range());
        allocator.reconcile([9000, 9001]);
        assert!(allocator.is_allocated(9000));
        assert!(allocator.is_allocated(9001));
        let port = allocator.allocate().unwrap();
        assert_eq!(port, 9002);
    }

    #[test]
    fn full_u16_range_does_not_infinite_loop_on_overflow() {
        let allocator = PortAllocator::new(PortRange { start: u16::MAX, end: u16::MAX });
        assert_eq!(allocator.allocate().unwrap(), u16::MAX);
        assert!(allocator.allocate().is_err());
    }
}
