#![allow(dead_code)]

//! A deterministic fake HAL for driving the sensor protocols in tests.
//!
//! Pins are scripted with a queue of line levels that successive reads
//! consume, and every pin transition, sample and requested delay can be
//! recorded to a shared [`Trace`]. The trace doubles as a virtual clock:
//! tests reconstruct the produced waveform from the recorded delays instead
//! of measuring real time.

pub mod delay;
pub mod digital;

use std::cell::RefCell;
use std::rc::Rc;

/// One bus event as observed by the fake pins and delay provider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    SetHigh(&'static str),
    SetLow(&'static str),
    Read(&'static str, bool),
    DelayUs(u32),
}

pub type Trace = Rc<RefCell<Vec<Event>>>;

pub fn new_trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

/// The data line level latched by each rising clock edge.
///
/// Expects the pins to be named `"sda"` and `"scl"`; the data line starts
/// released (high).
pub fn sda_levels_at_clock_rise(events: &[Event]) -> Vec<bool> {
    let mut levels = Vec::new();
    let mut sda = true;
    for event in events {
        match event {
            Event::SetHigh("sda") => sda = true,
            Event::SetLow("sda") => sda = false,
            Event::SetHigh("scl") => levels.push(sda),
            _ => {}
        }
    }
    levels
}
