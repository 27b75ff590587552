use super::{Event, Trace};
use embedded_hal::delay::DelayNs;

/// A delay provider that returns instantly, optionally recording each
/// requested duration to the shared trace.
///
/// Drivers still issue the same delay calls in the same order as on real
/// hardware, so tests can reconstruct the timing of a produced waveform
/// without waiting for it.
#[derive(Clone, Debug, Default)]
pub struct Delay {
    trace: Option<Trace>,
}

impl Delay {
    pub fn new() -> Delay {
        Delay { trace: None }
    }

    pub fn with_trace(trace: Trace) -> Delay {
        Delay { trace: Some(trace) }
    }

    fn record(&mut self, us: u32) {
        if let Some(trace) = &self.trace {
            trace.borrow_mut().push(Event::DelayUs(us));
        }
    }
}

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns / 1_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms.saturating_mul(1_000));
    }
}
