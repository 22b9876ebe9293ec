//! Overlay window identifiers.
//!
//! Window names carry a three-digit identifier, so a registry hands out at
//! most [`MAX_OVERLAY_WINDOWS`] identifiers at a time. An identifier returns
//! to the registry when its [`WindowLease`] is dropped, which happens after
//! the window it named has been destroyed.
use parking_lot::Mutex;

use crate::error::Error;

/// Size of the three-digit identifier space.
pub const MAX_OVERLAY_WINDOWS: u32 = 1000;

/// Prefix of every overlay window name.
pub const WINDOW_NAME_PREFIX: &str = "OVERLAY_SURFACE_";

static GLOBAL: WindowRegistry = WindowRegistry::new(MAX_OVERLAY_WINDOWS);

#[derive(Debug)]
struct IdPool {
    next: u32,
    free: Vec<u32>,
    live: u32,
}

/// Bounded allocator of overlay window identifiers.
#[derive(Debug)]
pub struct WindowRegistry {
    limit: u32,
    pool: Mutex<IdPool>,
}

impl WindowRegistry {
    /// Creates a registry of `limit` identifiers, capped at [`MAX_OVERLAY_WINDOWS`].
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        let limit = if limit > MAX_OVERLAY_WINDOWS { MAX_OVERLAY_WINDOWS } else { limit };
        Self { limit, pool: parking_lot::const_mutex(IdPool { next: 0, free: Vec::new(), live: 0 }) }
    }

    /// The process-wide registry used by default.
    #[inline]
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Maximum number of live identifiers.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of identifiers currently leased.
    #[inline]
    #[must_use]
    pub fn live(&self) -> u32 {
        self.pool.lock().live
    }

    /// Leases the lowest free identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowLimitReached`] when every identifier is leased.
    pub fn lease(&'static self) -> Result<WindowLease, Error> {
        let mut pool = self.pool.lock();

        let id = if let Some(index) = pool.free.iter().enumerate().min_by_key(|(_, id)| **id).map(|(i, _)| i) {
            pool.free.swap_remove(index)
        } else if pool.next < self.limit {
            pool.next += 1;
            pool.next - 1
        } else {
            return Err(Error::WindowLimitReached { limit: self.limit });
        };
        pool.live += 1;

        Ok(WindowLease { registry: self, id, name: format!("{WINDOW_NAME_PREFIX}{id:03}") })
    }

    fn give_back(&self, id: u32) {
        let mut pool = self.pool.lock();
        pool.free.push(id);
        pool.live -= 1;
    }
}

/// A leased overlay window identifier and the window name derived from it.
#[derive(Debug)]
pub struct WindowLease {
    registry: &'static WindowRegistry,
    id: u32,
    name: String,
}

impl WindowLease {
    /// Gets the identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Gets the window name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WindowLease {
    fn drop(&mut self) {
        self.registry.give_back(self.id);
    }
}
