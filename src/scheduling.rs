// ============================================================================
// ripple-store - Flush Scheduling
// Injectable deferral for automatic flushes
// ============================================================================
//
// The first mutation recorded outside any buffering scope schedules a flush
// for "the end of the current turn". Rust has no ambient microtask queue, so
// the deferral point is an explicit capability injected into the store: the
// default scheduler queues the flush and the caller drains the queue with
// run_pending() (usually via Store::tick()).
// ============================================================================

use std::cell::RefCell;

// =============================================================================
// SCHEDULER TRAIT
// =============================================================================

/// A deferred flush, ready to run.
pub type ScheduledFlush = Box<dyn FnOnce()>;

/// Deferral capability for automatic flushes.
///
/// `defer` receives the flush task; `run_pending` runs everything deferred
/// so far. Implementations decide the boundary between the two: the default
/// [`DeferredScheduler`] queues until drained, [`EagerScheduler`] collapses
/// the boundary entirely.
pub trait FlushScheduler {
    /// Accept a flush task for later execution.
    fn defer(&self, task: ScheduledFlush);

    /// Run every task deferred so far, including tasks deferred while
    /// running (listeners may mutate the store and open new scopes).
    fn run_pending(&self);
}

// =============================================================================
// DEFERRED SCHEDULER
// =============================================================================

/// Maximum drain iterations before we consider it an infinite loop
const MAX_DRAIN_COUNT: u32 = 1000;

/// The default scheduler: queues deferred flushes until `run_pending`.
///
/// Draining re-checks the queue after each pass so flushes scheduled by
/// listeners run in the same drain, with loop detection for listeners that
/// keep scheduling forever.
#[derive(Default)]
pub struct DeferredScheduler {
    queue: RefCell<Vec<ScheduledFlush>>,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushes waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl FlushScheduler for DeferredScheduler {
    fn defer(&self, task: ScheduledFlush) {
        self.queue.borrow_mut().push(task);
    }

    fn run_pending(&self) {
        let mut drain_count = 0u32;

        loop {
            let tasks = self.queue.replace(Vec::new());
            if tasks.is_empty() {
                break;
            }

            drain_count += 1;
            if drain_count > MAX_DRAIN_COUNT {
                panic!(
                    "Maximum flush depth exceeded. This can happen when a \
                     listener keeps mutating the store from inside its own \
                     change notification."
                );
            }

            tracing::trace!(tasks = tasks.len(), "draining deferred flushes");
            for task in tasks {
                task();
            }
        }
    }
}

// =============================================================================
// EAGER SCHEDULER
// =============================================================================

/// Runs each deferred flush at schedule time.
///
/// This changes only the timing of automatic flushes - events fire as soon
/// as the first mutation of a batch returns instead of waiting for a drain.
/// Coalescing inside manual `buffered` scopes is unaffected, since no
/// automatic flush is scheduled while a scope is open.
#[derive(Default)]
pub struct EagerScheduler;

impl EagerScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl FlushScheduler for EagerScheduler {
    fn defer(&self, task: ScheduledFlush) {
        task();
    }

    fn run_pending(&self) {
        // nothing is ever queued
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn deferred_scheduler_queues_until_drained() {
        let sched = DeferredScheduler::new();
        let ran = Rc::new(Cell::new(0));

        let ran_clone = ran.clone();
        sched.defer(Box::new(move || ran_clone.set(ran_clone.get() + 1)));

        assert_eq!(ran.get(), 0);
        assert_eq!(sched.pending(), 1);

        sched.run_pending();
        assert_eq!(ran.get(), 1);
        assert_eq!(sched.pending(), 0);

        // Draining an empty queue is a no-op
        sched.run_pending();
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn deferred_scheduler_drains_tasks_scheduled_while_draining() {
        let sched = Rc::new(DeferredScheduler::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let sched_clone = sched.clone();
        let order_clone = order.clone();
        sched.defer(Box::new(move || {
            order_clone.borrow_mut().push("outer");
            let order_inner = order_clone.clone();
            sched_clone.defer(Box::new(move || {
                order_inner.borrow_mut().push("inner");
            }));
        }));

        sched.run_pending();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn eager_scheduler_runs_immediately() {
        let sched = EagerScheduler::new();
        let ran = Rc::new(Cell::new(false));

        let ran_clone = ran.clone();
        sched.defer(Box::new(move || ran_clone.set(true)));

        assert!(ran.get());
    }

    #[test]
    #[should_panic(expected = "Maximum flush depth exceeded")]
    fn runaway_rescheduling_panics() {
        fn reschedule(sched: &Rc<DeferredScheduler>) {
            let sched_clone = sched.clone();
            sched.defer(Box::new(move || reschedule(&sched_clone)));
        }

        let sched = Rc::new(DeferredScheduler::new());
        reschedule(&sched);
        sched.run_pending();
    }
}
