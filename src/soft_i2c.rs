use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Maximum number of 1ms acknowledge polls in [`SoftI2c::wait`].
pub const WAIT_POLL_LIMIT: u32 = 500;

// 10us per half cycle, i.e. a 100kHz bus.
const DEFAULT_HALF_CYCLE_US: u32 = 10;

/// A two-wire (clock + data) bus driven entirely by timed GPIO toggling.
///
/// The data line is open-drain: `set_high` releases it so a device (or the
/// pull-up) sets the level, `set_low` drives it. The clock line is only ever
/// driven. Bits are shifted most-significant first on both read and write;
/// this is the opposite of the 1-wire convention and is dictated by the
/// device family, not by any global rule.
#[derive(Debug)]
pub struct SoftI2c<Sda, Scl, D> {
    sda: Sda,
    scl: Scl,
    delay: D,
    half_cycle_us: u32,
}

impl<Sda, Scl, D, E> SoftI2c<Sda, Scl, D>
where
    Sda: InputPin<Error = E> + OutputPin<Error = E>,
    Scl: OutputPin<Error = E>,
    D: DelayNs,
{
    pub fn new(sda: Sda, scl: Scl, delay: D) -> SoftI2c<Sda, Scl, D> {
        SoftI2c {
            sda,
            scl,
            delay,
            half_cycle_us: DEFAULT_HALF_CYCLE_US,
        }
    }

    /// Releases the pins and delay provider.
    pub fn free(self) -> (Sda, Scl, D) {
        (self.sda, self.scl, self.delay)
    }

    /// Sets the bus frequency in hertz.
    ///
    /// Takes effect on the next line transition, not retroactively.
    pub fn set_frequency(&mut self, hz: u32) {
        self.half_cycle_us = 1_000_000 / hz.max(1);
    }

    /// The per-half-cycle delay derived from the requested frequency.
    pub fn half_cycle_us(&self) -> u32 {
        self.half_cycle_us
    }

    /// Issues the transmission-start pattern.
    pub fn start(&mut self) -> Result<(), E> {
        self.sda_write(true)?;
        self.scl_write(true)?;
        self.sda_write(false)?;
        self.scl_write(false)?;
        self.scl_write(true)?;
        self.sda_write(true)?;
        self.scl_write(false)
    }

    /// Issues the stop pattern, releasing both lines high.
    pub fn stop(&mut self) -> Result<(), E> {
        self.sda_write(false)?;
        self.scl_write(true)?;
        self.sda_write(true)
    }

    /// Writes a byte most-significant bit first and clocks in the
    /// acknowledge bit.
    ///
    /// Returns `true` when the device pulled the data line low to
    /// acknowledge.
    pub fn write(&mut self, byte: u8) -> Result<bool, E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.shift_out(byte & 0x80 != 0)?;
            byte <<= 1;
        }
        self.release_sda()?;
        Ok(!self.shift_in()?)
    }

    /// Reads a byte most-significant bit first, then drives the acknowledge
    /// bit (low when `ack` is `true`).
    pub fn read(&mut self, ack: bool) -> Result<u8, E> {
        let mut byte = 0u8;
        self.release_sda()?;
        for _ in 0..8 {
            byte <<= 1;
            if self.shift_in()? {
                byte |= 1;
            }
        }
        self.shift_out(!ack)?;
        Ok(byte)
    }

    /// Polls for a device-driven acknowledge on the data line.
    ///
    /// Some devices signal completion of a slow operation by pulling the
    /// released data line low. Polls once per millisecond, up to
    /// [`WAIT_POLL_LIMIT`] times; returns `Ok(true)` as soon as the line is
    /// sampled low and `Ok(false)` once the bound is exhausted.
    pub fn wait(&mut self) -> Result<bool, E> {
        self.release_sda()?;
        for _ in 0..WAIT_POLL_LIMIT {
            self.delay.delay_ms(1);
            if self.sda.is_low()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resets a stuck bus.
    ///
    /// Clocks out nine 1 bits with the data line released so a device stuck
    /// mid-byte finishes its transfer and lets go of the line, then issues a
    /// fresh start pattern and leaves the clock high. Device state is not
    /// touched.
    pub fn reset(&mut self) -> Result<(), E> {
        for _ in 0..9 {
            self.shift_out(true)?;
        }
        self.start()?;
        self.scl_write(true)
    }

    pub(crate) fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    fn sda_write(&mut self, high: bool) -> Result<(), E> {
        if high {
            self.sda.set_high()?;
        } else {
            self.sda.set_low()?;
        }
        self.delay.delay_us(self.half_cycle_us);
        Ok(())
    }

    fn scl_write(&mut self, high: bool) -> Result<(), E> {
        if high {
            self.scl.set_high()?;
        } else {
            self.scl.set_low()?;
        }
        self.delay.delay_us(self.half_cycle_us);
        Ok(())
    }

    // Release without a half-cycle delay; mirrors a direction switch rather
    // than a driven transition.
    fn release_sda(&mut self) -> Result<(), E> {
        self.sda.set_high()
    }

    fn shift_out(&mut self, bit: bool) -> Result<(), E> {
        self.sda_write(bit)?;
        self.scl_write(true)?;
        self.scl_write(false)
    }

    fn shift_in(&mut self) -> Result<bool, E> {
        self.delay.delay_us(self.half_cycle_us);
        self.scl_write(true)?;
        let bit = self.sda.is_high()?;
        self.scl_write(false)?;
        Ok(bit)
    }
}
