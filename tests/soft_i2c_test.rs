mod fake_hal;

use bitbang_sensors::soft_i2c::{SoftI2c, WAIT_POLL_LIMIT};
use fake_hal::delay::Delay;
use fake_hal::digital::Pin;
use fake_hal::{new_trace, sda_levels_at_clock_rise};

fn bus_with_trace() -> (SoftI2c<Pin, Pin, Delay>, Pin, fake_hal::Trace) {
    let trace = new_trace();
    let sda = Pin::with_trace("sda", trace.clone());
    let scl = Pin::with_trace("scl", trace.clone());
    let bus = SoftI2c::new(sda.clone(), scl, Delay::with_trace(trace.clone()));
    (bus, sda, trace)
}

#[test]
fn write_shifts_msb_first() {
    let (mut bus, sda, trace) = bus_with_trace();
    // Device acknowledges by pulling the data line low.
    sda.set_levels(vec![false]);

    assert_eq!(bus.write(0xB5), Ok(true));
    let levels = sda_levels_at_clock_rise(&trace.borrow());
    // Eight data bits MSB-first, then the released line for the ack clock.
    assert_eq!(levels.len(), 9);
    assert_eq!(
        levels[0..8],
        [true, false, true, true, false, true, false, true]
    );
    assert!(levels[8]);
}

#[test]
fn write_reports_missing_ack() {
    let (mut bus, sda, _trace) = bus_with_trace();
    sda.set_levels(vec![true]);
    assert_eq!(bus.write(0xB5), Ok(false));
}

#[test]
fn read_shifts_msb_first_and_drives_ack() {
    let (mut bus, sda, trace) = bus_with_trace();
    sda.set_levels(vec![true, false, false, true, true, true, false, false]);

    assert_eq!(bus.read(true), Ok(0x9C));
    // The ninth clock pulse carries the acknowledge, driven low.
    let levels = sda_levels_at_clock_rise(&trace.borrow());
    assert_eq!(levels.len(), 9);
    assert!(!levels[8]);
}

#[test]
fn read_without_ack_releases_the_line() {
    let (mut bus, sda, trace) = bus_with_trace();
    sda.set_levels(vec![false; 8]);

    assert_eq!(bus.read(false), Ok(0x00));
    let levels = sda_levels_at_clock_rise(&trace.borrow());
    assert!(levels[8]);
}

#[test]
fn wait_returns_false_after_exactly_the_poll_limit() {
    let (mut bus, sda, _trace) = bus_with_trace();
    sda.set_levels(vec![true; WAIT_POLL_LIMIT as usize]);

    assert_eq!(bus.wait(), Ok(false));
    assert_eq!(sda.reads() as u32, WAIT_POLL_LIMIT);
}

#[test]
fn wait_returns_true_on_the_final_poll() {
    let (mut bus, sda, _trace) = bus_with_trace();
    let mut script = vec![true; WAIT_POLL_LIMIT as usize - 1];
    script.push(false);
    sda.set_levels(script);

    assert_eq!(bus.wait(), Ok(true));
    assert_eq!(sda.reads() as u32, WAIT_POLL_LIMIT);
}

#[test]
fn wait_returns_immediately_when_acknowledged() {
    let (mut bus, sda, _trace) = bus_with_trace();
    sda.set_levels(vec![false]);

    assert_eq!(bus.wait(), Ok(true));
    assert_eq!(sda.reads(), 1);
}

#[test]
fn set_frequency_derives_half_cycle() {
    let (mut bus, _sda, _trace) = bus_with_trace();
    // Default is a 100kHz bus.
    assert_eq!(bus.half_cycle_us(), 10);
    bus.set_frequency(50_000);
    assert_eq!(bus.half_cycle_us(), 20);
}

#[test]
fn reset_clocks_nine_ones_before_restarting() {
    let (mut bus, _sda, trace) = bus_with_trace();
    bus.reset().unwrap();

    let levels = sda_levels_at_clock_rise(&trace.borrow());
    // Nine release pulses let a device stuck mid-byte finish its transfer.
    assert!(levels.len() > 9);
    assert!(levels[0..9].iter().all(|level| *level));
}
