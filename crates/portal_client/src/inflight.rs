use std::sync::atomic::{AtomicBool, Ordering};

/// Marks a single outstanding request. A second caller is turned away until
/// the guard from the first is dropped, including when its future is cancelled.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    pub(crate) fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: &self.busy })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
