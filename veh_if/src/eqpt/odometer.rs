//! # Odometer Interface
//!
//! The odometer counts encoder clicks on each wheel since the last reset. Clicks are produced by
//! an edge-triggered source running concurrently with the control loop, so the counts are held in
//! a single packed atomic word. This means a snapshot of both wheels is always taken from the same
//! instant and a half-written count can never be observed.
//!
//! The encoder cannot tell which way the wheel is turning, only that it has turned. Each wheel
//! therefore carries a counting-direction flag which decides whether a click adds or subtracts
//! from the count. Keeping that flag in agreement with the real motion is the job of the distance
//! controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Per-wheel click counts plus the counting-direction flags.
pub trait Odometer {
    /// Clicks counted on the left wheel since the last clear.
    fn left_clicks(&self) -> i32;

    /// Clicks counted on the right wheel since the last clear.
    fn right_clicks(&self) -> i32;

    /// Both counts taken as a single consistent snapshot, `(left, right)`.
    ///
    /// The default reads each wheel separately. Implementations backed by a concurrent source
    /// shall override this.
    fn snapshot(&self) -> (i32, i32) {
        (self.left_clicks(), self.right_clicks())
    }

    /// Zero both accumulators.
    fn clear_counts(&mut self);

    fn set_left_counting_forward(&mut self, forward: bool);

    fn set_right_counting_forward(&mut self, forward: bool);

    fn is_left_counting_forward(&self) -> bool;

    fn is_right_counting_forward(&self) -> bool;

    fn toggle_left_counting_direction(&mut self) {
        let fwd = self.is_left_counting_forward();
        self.set_left_counting_forward(!fwd);
    }

    fn toggle_right_counting_direction(&mut self) {
        let fwd = self.is_right_counting_forward();
        self.set_right_counting_forward(!fwd);
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Lock-free click accumulator for both wheels.
///
/// The left count lives in the upper 32 bits of `counts` and the right count in the lower 32.
/// `on_left_edge`/`on_right_edge` are safe to call from an interrupt handler or another thread.
#[derive(Debug)]
pub struct ClickCounter {
    counts: AtomicU64,
    left_fwd: AtomicBool,
    right_fwd: AtomicBool,
}

/// An [`Odometer`] handle sharing a [`ClickCounter`] with the edge source.
#[derive(Debug, Clone)]
pub struct SharedOdometer {
    counter: Arc<ClickCounter>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ClickCounter {
    /// Create a zeroed counter, counting forwards on both wheels.
    pub const fn new() -> Self {
        Self {
            counts: AtomicU64::new(0),
            left_fwd: AtomicBool::new(true),
            right_fwd: AtomicBool::new(true),
        }
    }

    /// Register one encoder edge on the left wheel.
    pub fn on_left_edge(&self) {
        let delta = direction_delta(self.left_fwd.load(Ordering::Acquire));
        self.add(delta, 0);
    }

    /// Register one encoder edge on the right wheel.
    pub fn on_right_edge(&self) {
        let delta = direction_delta(self.right_fwd.load(Ordering::Acquire));
        self.add(0, delta);
    }

    /// Both counts from a single atomic load, `(left, right)`.
    pub fn snapshot(&self) -> (i32, i32) {
        unpack(self.counts.load(Ordering::Acquire))
    }

    pub fn clear(&self) {
        self.counts.store(0, Ordering::Release);
    }

    pub fn set_left_forward(&self, forward: bool) {
        self.left_fwd.store(forward, Ordering::Release);
    }

    pub fn set_right_forward(&self, forward: bool) {
        self.right_fwd.store(forward, Ordering::Release);
    }

    pub fn is_left_forward(&self) -> bool {
        self.left_fwd.load(Ordering::Acquire)
    }

    pub fn is_right_forward(&self) -> bool {
        self.right_fwd.load(Ordering::Acquire)
    }

    fn add(&self, delta_left: i32, delta_right: i32) {
        // The closure never returns None so the update cannot fail
        let _ = self
            .counts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                let (l, r) = unpack(packed);
                Some(pack(
                    l.wrapping_add(delta_left),
                    r.wrapping_add(delta_right),
                ))
            });
    }
}

impl Default for ClickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedOdometer {
    /// Create an odometer over a fresh counter.
    pub fn new() -> Self {
        Self {
            counter: Arc::new(ClickCounter::new()),
        }
    }

    /// Create an odometer over an existing counter.
    pub fn from_counter(counter: Arc<ClickCounter>) -> Self {
        Self { counter }
    }

    /// Get a handle to the underlying counter, to be given to the edge source.
    pub fn counter(&self) -> Arc<ClickCounter> {
        self.counter.clone()
    }
}

impl Default for SharedOdometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Odometer for SharedOdometer {
    fn left_clicks(&self) -> i32 {
        self.counter.snapshot().0
    }

    fn right_clicks(&self) -> i32 {
        self.counter.snapshot().1
    }

    fn snapshot(&self) -> (i32, i32) {
        self.counter.snapshot()
    }

    fn clear_counts(&mut self) {
        self.counter.clear()
    }

    fn set_left_counting_forward(&mut self, forward: bool) {
        self.counter.set_left_forward(forward)
    }

    fn set_right_counting_forward(&mut self, forward: bool) {
        self.counter.set_right_forward(forward)
    }

    fn is_left_counting_forward(&self) -> bool {
        self.counter.is_left_forward()
    }

    fn is_right_counting_forward(&self) -> bool {
        self.counter.is_right_forward()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn direction_delta(forward: bool) -> i32 {
    if forward {
        1
    } else {
        -1
    }
}

fn pack(left: i32, right: i32) -> u64 {
    ((left as u32 as u64) << 32) | (right as u32 as u64)
}

fn unpack(packed: u64) -> (i32, i32) {
    ((packed >> 32) as u32 as i32, packed as u32 as i32)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_counting_direction() {
        let counter = ClickCounter::new();

        for _ in 0..5 {
            counter.on_left_edge();
        }
        counter.set_right_forward(false);
        for _ in 0..3 {
            counter.on_right_edge();
        }

        assert_eq!(counter.snapshot(), (5, -3));

        counter.clear();
        assert_eq!(counter.snapshot(), (0, 0));
        assert!(!counter.is_right_forward());
    }

    #[test]
    fn test_negative_counts_do_not_bleed_between_wheels() {
        let counter = ClickCounter::new();
        counter.set_left_forward(false);
        counter.on_left_edge();
        counter.on_right_edge();

        assert_eq!(counter.snapshot(), (-1, 1));
    }

    #[test]
    fn test_concurrent_edges() {
        let odo = SharedOdometer::new();
        let counter = odo.counter();

        let handle = thread::spawn(move || {
            for _ in 0..10_000 {
                counter.on_left_edge();
                counter.on_right_edge();
            }
        });

        // Every snapshot must see the wheels at most one edge apart since they're incremented in
        // lockstep
        for _ in 0..1_000 {
            let (l, r) = odo.snapshot();
            assert!(l - r == 0 || l - r == 1);
        }

        handle.join().unwrap();
        assert_eq!(odo.snapshot(), (10_000, 10_000));
    }

    #[test]
    fn test_toggle_through_trait() {
        let mut odo = SharedOdometer::new();
        assert!(odo.is_left_counting_forward());
        odo.toggle_left_counting_direction();
        assert!(!odo.is_left_counting_forward());
        assert!(odo.is_right_counting_forward());
    }
}
