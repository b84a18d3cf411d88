//! The shared fuel inventory.

use parking_lot::{Condvar, Mutex, MutexGuard};

use std::time::Instant;

/// Type of fuel quantities, in liters.
///
/// All quantities handled by the inventory are whole, non-negative amounts;
/// no fractional liters are ever moved.
pub type Fuel = u64;

/// Fuel levels of an [`Inventory`] at a given instant.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    /// Fuel not yet transferred out of the tankers.
    pub tanker: Fuel,
    /// Fuel available at the station for vehicles.
    pub storage: Fuel,
    /// Total fuel handed out to vehicles so far.
    pub dispensed: Fuel,
    /// Fuel that was in a tanker that never came.
    pub written_off: Fuel,
    /// Highest value `storage` has ever held.
    pub peak_storage: Fuel
}

impl Levels {
    /// Constructs a new `Levels` with all fuel still in the tankers.
    pub fn new(load: Fuel) -> Self {
        Self { tanker: load, ..Self::default() }
    }

    /// Returns the most fuel that could still be handed out, counting
    /// both the storage and what the tankers have yet to deliver.
    pub fn max_possible(&self) -> Fuel {
        self.tanker + self.storage
    }

    /// Moves `chunk` liters from the tankers into storage.
    ///
    /// # Panics
    ///
    /// Panics if `chunk` is zero or greater than [`tanker`](`Levels::tanker`).
    pub fn deliver(&mut self, chunk: Fuel) {
        assert!(chunk > 0, "delivery of zero fuel");
        assert!(chunk <= self.tanker, "delivery of {chunk} exceeds tanker load {}", self.tanker);

        self.tanker -= chunk;
        self.storage += chunk;
        self.peak_storage = self.peak_storage.max(self.storage);
    }

    /// Removes `amount` liters from the tankers without delivering them.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is greater than [`tanker`](`Levels::tanker`).
    pub fn write_off(&mut self, amount: Fuel) {
        assert!(amount <= self.tanker, "write-off of {amount} exceeds tanker load {}", self.tanker);

        self.tanker -= amount;
        self.written_off += amount;
    }

    /// Takes `amount` liters out of storage if that much is available.
    ///
    /// Returns whether the fuel was taken; on `false` nothing changes.
    pub fn try_consume(&mut self, amount: Fuel) -> bool {
        let Some(left) = self.storage.checked_sub(amount) else {
            return false;
        };

        self.storage = left;
        self.dispensed += amount;
        true
    }
}

/// Fuel shared between tankers and vehicles.
///
/// Every read and write of the levels happens under a single mutex, which
/// puts all deliveries and consumptions in one total order. Waiters on the
/// inventory are woken (all of them) every time a delivery raises the
/// storage and every time a vehicle takes fuel, since the latter may make
/// some other waiter's demand impossible to meet.
pub struct Inventory {
    initial: Fuel,
    levels: Mutex<Levels>,
    changed: Condvar
}

impl Inventory {
    /// Constructs a new `Inventory` with `load` liters in the tankers and
    /// an empty storage.
    pub fn new(load: Fuel) -> Self {
        Self {
            initial: load,
            levels: Mutex::new(Levels::new(load)),
            changed: Condvar::new()
        }
    }

    /// Returns the load the inventory was constructed with.
    pub fn initial(&self) -> Fuel {
        self.initial
    }

    /// Returns a snapshot of the current levels.
    pub fn levels(&self) -> Levels {
        *self.levels.lock()
    }

    /// Delivers `chunk` liters into storage and wakes every waiter.
    ///
    /// Returns the levels right after the delivery.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Levels::deliver`].
    pub fn deliver(&self, chunk: Fuel) -> Levels {
        let mut levels = self.levels.lock();
        levels.deliver(chunk);
        let out = *levels;

        self.changed.notify_all();
        out
    }

    /// Gives up on `amount` liters of tanker fuel that will never be
    /// delivered, and wakes every waiter so they can tell.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Levels::write_off`].
    pub fn write_off(&self, amount: Fuel) -> Levels {
        let mut levels = self.levels.lock();
        levels.write_off(amount);
        let out = *levels;

        self.changed.notify_all();
        out
    }

    /// Locks the inventory for a check-and-consume sequence.
    pub fn lock(&self) -> Stock<'_> {
        Stock {
            levels: self.levels.lock(),
            changed: &self.changed
        }
    }
}

/// Locked view of an [`Inventory`].
///
/// The lock is held for as long as the `Stock` lives, except while blocked
/// in [`wait`](`Stock::wait`) or [`wait_until`](`Stock::wait_until`).
pub struct Stock<'a> {
    levels: MutexGuard<'a, Levels>,
    changed: &'a Condvar
}

impl Stock<'_> {
    /// Returns the current levels.
    pub fn levels(&self) -> Levels {
        *self.levels
    }

    /// See [`Levels::max_possible`].
    pub fn max_possible(&self) -> Fuel {
        self.levels.max_possible()
    }

    /// Takes `amount` liters out of storage if that much is available,
    /// waking every waiter on success.
    pub fn try_consume(&mut self, amount: Fuel) -> bool {
        let taken = self.levels.try_consume(amount);

        if taken {
            self.changed.notify_all();
        }

        taken
    }

    /// Releases the lock until the levels change, then takes it back.
    ///
    /// Wakes may be spurious; callers must re-check whatever they were
    /// waiting for.
    pub fn wait(&mut self) {
        self.changed.wait(&mut self.levels);
    }

    /// Like [`wait`](`Stock::wait`), but gives up at `deadline`.
    ///
    /// Timed waits may return early or late; callers compare the clock
    /// against their own deadline after every return.
    pub fn wait_until(&mut self, deadline: Instant) {
        let _ = self.changed.wait_until(&mut self.levels, deadline);
    }
}
