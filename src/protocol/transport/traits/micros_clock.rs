//! Monotonic time source used for reception timestamps and transmit deadlines.
use crate::core::Microsecond;

/// Microsecond clock; must never go backwards.
pub trait MicrosClock {
    fn micros(&self) -> Microsecond;
}

impl<F> MicrosClock for F
where
    F: Fn() -> Microsecond,
{
    fn micros(&self) -> Microsecond {
        self()
    }
}

/// Clock backed by the `embassy-time` driver of the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl MicrosClock for EmbassyClock {
    fn micros(&self) -> Microsecond {
        embassy_time::Instant::now().as_micros()
    }
}
