//! The pump pool.

use crate::vehicle::VehicleId;

use parking_lot::{Condvar, Mutex};

use tracing::warn;

#[derive(Clone, Copy)]
struct Permits {
    available: usize,
    peak: usize
}

/// Bounded pool of fuel pumps.
///
/// Admission is decided by a counting semaphore alone. The pool also keeps
/// a table of which vehicle stands at which pump, but that table only
/// serves reporting and is never looked at when admitting a vehicle.
pub struct PumpPool {
    capacity: usize,
    permits: Mutex<Permits>,
    freed: Condvar,
    slots: Mutex<Box<[Option<VehicleId>]>>
}

impl PumpPool {
    /// Constructs a new `PumpPool` with `capacity` free pumps.
    ///
    /// Returns `None` if `capacity` is zero.
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then(|| Self {
            capacity,
            permits: Mutex::new(Permits { available: capacity, peak: 0 }),
            freed: Condvar::new(),
            slots: Mutex::new(vec![None; capacity].into_boxed_slice())
        })
    }

    /// Returns the number of pumps.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pumps nobody holds right now.
    pub fn available(&self) -> usize {
        self.permits.lock().available
    }

    /// Returns the largest number of pumps ever held at once.
    pub fn peak(&self) -> usize {
        self.permits.lock().peak
    }

    /// Returns which vehicle stands at each pump, by pump index.
    pub fn occupancy(&self) -> Box<[Option<VehicleId>]> {
        self.slots.lock().clone()
    }

    /// Blocks until a pump is free, then takes it for `vehicle`.
    ///
    /// The pump is given back when the returned [`Pump`] is dropped.
    pub fn acquire(&self, vehicle: VehicleId) -> Pump<'_> {
        {
            let mut permits = self.permits.lock();

            while permits.available == 0 {
                self.freed.wait(&mut permits);
            }

            permits.available -= 1;
            permits.peak = permits.peak.max(self.capacity - permits.available);
        }

        Pump { pool: self, vehicle, slot: self.occupy(vehicle) }
    }

    fn occupy(&self, vehicle: VehicleId) -> Option<usize> {
        let mut slots = self.slots.lock();
        let slot = slots.iter().position(Option::is_none);

        match slot {
            Some(i) => slots[i] = Some(vehicle),
            None => warn!(vehicle, "no free pump slot to record vehicle in")
        }

        slot
    }

    fn free(&self, slot: usize, vehicle: VehicleId) {
        let mut slots = self.slots.lock();

        if slots[slot] == Some(vehicle) {
            slots[slot] = None;
        } else {
            warn!(vehicle, pump = slot + 1, occupant = ?slots[slot], "pump slot held by someone else");
        }
    }

    fn release(&self) {
        let mut permits = self.permits.lock();
        debug_assert!(permits.available < self.capacity);
        permits.available += 1;
        drop(permits);

        self.freed.notify_one();
    }
}

/// A pump held by a vehicle.
///
/// Dropping it hands the pump back to its [`PumpPool`]; this is the only
/// way a pump is ever released, so it happens exactly once per
/// [`acquire`](`PumpPool::acquire`) whichever way the holder leaves.
pub struct Pump<'a> {
    pool: &'a PumpPool,
    vehicle: VehicleId,
    slot: Option<usize>
}

impl Pump<'_> {
    /// Returns the 1-based number of the pump, if one was recorded.
    pub fn number(&self) -> Option<usize> {
        self.slot.map(|i| i + 1)
    }
}

impl Drop for Pump<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot {
            self.pool.free(slot, self.vehicle);
        }

        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{atomic::{AtomicUsize, Ordering}, Arc},
        thread,
        time::Duration
    };

    #[test]
    fn zero_pumps_is_rejected() {
        assert!(PumpPool::new(0).is_none());
    }

    #[test]
    fn pumps_are_numbered_in_order_and_returned_on_drop() {
        let pool = PumpPool::new(2).unwrap();

        let first = pool.acquire(7);
        let second = pool.acquire(9);

        assert_eq!(first.number(), Some(1));
        assert_eq!(second.number(), Some(2));
        assert_eq!(pool.available(), 0);
        assert_eq!(&*pool.occupancy(), &[Some(7), Some(9)]);

        drop(first);
        assert_eq!(pool.available(), 1);
        assert_eq!(&*pool.occupancy(), &[None, Some(9)]);

        // the freed slot is reused
        let third = pool.acquire(11);
        assert_eq!(third.number(), Some(1));

        drop(second);
        drop(third);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.peak(), 2);
    }

    #[test]
    fn pump_is_released_on_unwind() {
        let pool = PumpPool::new(1).unwrap();

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _pump = pool.acquire(1);
            panic!("vehicle task failed");
        }));

        assert!(res.is_err());
        assert_eq!(pool.available(), 1);
        assert_eq!(&*pool.occupancy(), &[None]);
    }

    #[test]
    fn never_more_holders_than_pumps() {
        const PUMPS: usize = 3;

        let pool = Arc::new(PumpPool::new(PUMPS).unwrap());
        let holding = Arc::new(AtomicUsize::new(0));
        let most = Arc::new(AtomicUsize::new(0));

        let handles = (0 .. 16).map(|id| {
            let pool = Arc::clone(&pool);
            let holding = Arc::clone(&holding);
            let most = Arc::clone(&most);

            thread::spawn(move || {
                let _pump = pool.acquire(id);
                let now = holding.fetch_add(1, Ordering::SeqCst) + 1;
                most.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                holding.fetch_sub(1, Ordering::SeqCst);
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(most.load(Ordering::SeqCst) <= PUMPS);
        assert!(pool.peak() <= PUMPS);
        assert_eq!(pool.available(), PUMPS);
        assert!(pool.occupancy().iter().all(Option::is_none));
    }
}
