use super::{Event, Trace};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

/// A scripted bidirectional pin.
///
/// Each read consumes the next level from the script; once the script is
/// exhausted, reads return the default level (high, matching the idle state
/// of a pulled-up line). Clones share state, so a test can keep a handle
/// after moving the pin into a driver.
#[derive(Clone, Debug)]
pub struct Pin {
    inner: Rc<RefCell<PinInner>>,
}

#[derive(Debug)]
struct PinInner {
    name: &'static str,
    levels: Vec<bool>,
    index: usize,
    default_level: bool,
    reads: usize,
    trace: Option<Trace>,
}

impl Pin {
    pub fn new(name: &'static str) -> Pin {
        Pin {
            inner: Rc::new(RefCell::new(PinInner {
                name,
                levels: Vec::new(),
                index: 0,
                default_level: true,
                reads: 0,
                trace: None,
            })),
        }
    }

    pub fn with_trace(name: &'static str, trace: Trace) -> Pin {
        let pin = Pin::new(name);
        pin.inner.borrow_mut().trace = Some(trace);
        pin
    }

    /// Scripts the levels returned by successive reads, restarting the
    /// script.
    pub fn set_levels(&self, levels: Vec<bool>) {
        let mut inner = self.inner.borrow_mut();
        inner.levels = levels;
        inner.index = 0;
    }

    /// The level returned once the script is exhausted.
    pub fn set_default_level(&self, level: bool) {
        self.inner.borrow_mut().default_level = level;
    }

    /// Total number of samples taken from this pin.
    pub fn reads(&self) -> usize {
        self.inner.borrow().reads
    }

    fn sample(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let level = if inner.index < inner.levels.len() {
            let level = inner.levels[inner.index];
            inner.index += 1;
            level
        } else {
            inner.default_level
        };
        inner.reads += 1;
        let name = inner.name;
        if let Some(trace) = &inner.trace {
            trace.borrow_mut().push(Event::Read(name, level));
        }
        level
    }

    fn record(&self, event: Event) {
        let inner = self.inner.borrow();
        if let Some(trace) = &inner.trace {
            trace.borrow_mut().push(event);
        }
    }
}

impl ErrorType for Pin {
    type Error = Infallible;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sample())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sample())
    }
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let name = self.inner.borrow().name;
        self.record(Event::SetLow(name));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let name = self.inner.borrow().name;
        self.record(Event::SetHigh(name));
        Ok(())
    }
}
