use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

// Standard-speed 1-wire slot delays in microseconds (the classic Maxim
// "letter" delays A through J). The ratios between these are protocol
// mandated; stretching one without the others corrupts bits silently
// instead of raising an error.
const WRITE_1_LOW_US: u32 = 6; // A
const WRITE_1_RELEASE_US: u32 = 64; // B
const WRITE_0_LOW_US: u32 = 60; // C
const WRITE_0_RELEASE_US: u32 = 10; // D
const READ_INIT_LOW_US: u32 = 6; // A
const READ_SAMPLE_DELAY_US: u32 = 9; // E
const READ_SLOT_REMAINDER_US: u32 = 55; // F
const RESET_LOW_US: u32 = 480; // H
const PRESENCE_SAMPLE_DELAY_US: u32 = 70; // I
const RESET_RECOVERY_US: u32 = 410; // J

// Bus commands. Each transaction is a reset followed by a ROM command and,
// usually, a function command.
const READ_ROM: u8 = 0x33;
const CONVERT: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;
const WRITE_SCRATCHPAD: u8 = 0x4E;
const SKIP_ROM: u8 = 0xCC;

// Alarm threshold bytes written alongside the configuration byte. The alarm
// feature itself is unused; these are the widest possible window.
const ALARM_HIGH_BYTE: u8 = 0x7F;
const ALARM_LOW_BYTE: u8 = 0x80;

/// Upper bound on conversion-completion read slots before giving up with
/// [`Error::Timeout`].
///
/// A 12-bit conversion takes up to 750ms and each read slot lasts roughly
/// 70us, so this bound comfortably covers the slowest legal conversion while
/// keeping an absent or wedged device from hanging the caller forever.
pub const CONVERSION_POLL_SLOTS: u32 = 12_000;

/// The legacy out-of-range sentinel for "no valid reading".
///
/// This driver reports failures through [`Error`] instead, but callers that
/// need the historical wire-compatible code can flatten errors to it, e.g.
/// `sensor.raw_temperature().unwrap_or(INVALID_TEMPERATURE)`.
pub const INVALID_TEMPERATURE: i16 = -10000;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Wrapped error from the HAL pin.
    Pin(E),
    /// No device pulled the line low during the presence window after a
    /// reset.
    NoPresence,
    /// The device did not signal conversion completion within
    /// [`CONVERSION_POLL_SLOTS`] read slots.
    Timeout,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Error<E> {
        Error::Pin(error)
    }
}

/// Temperature conversion bit widths.
///
/// Fewer bits shorten the conversion, from 750ms at 12 bits down to 93.75ms
/// at 9 bits. The discriminant doubles as the scratchpad configuration byte.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 0.5 degree increments, 93.75ms conversions.
    NineBit = 0x1F,
    /// 0.25 degree increments, 187.5ms conversions.
    TenBit = 0x3F,
    /// 0.125 degree increments, 375ms conversions.
    ElevenBit = 0x5F,
    /// 0.0625 degree increments, 750ms conversions.
    TwelveBit = 0x7F,
}

/// The factory-programmed 8-byte ROM of a device: a family code, a 6-byte
/// serial number and a check byte.
///
/// The check byte is carried as read; this driver does not validate it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RomCode(pub [u8; 8]);

impl RomCode {
    pub fn family_code(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&self.0[1..7]);
        serial
    }

    pub fn check_byte(&self) -> u8 {
        self.0[7]
    }
}

/// A DS18B20 Dallas 1-wire digital thermometer on a single open-drain line.
///
/// The driver exclusively owns the line for its lifetime: `set_low` drives
/// the bus and `set_high` releases it so the pull-up (or a device) sets the
/// level. Every operation blocks for the full protocol duration.
#[derive(Debug)]
pub struct Ds18b20<P, D> {
    pin: P,
    delay: D,
}

impl<P, D, E> Ds18b20<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Ds18b20<P, D> {
        Ds18b20 { pin, delay }
    }

    /// Releases the pin and delay provider.
    pub fn free(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// Resets the bus and checks for a presence pulse.
    ///
    /// Drives the line low for the reset hold time, releases it, then samples
    /// within the presence window; a listening device holds the line low.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.pin.set_low()?;
        self.delay.delay_us(RESET_LOW_US);
        self.pin.set_high()?;
        self.delay.delay_us(PRESENCE_SAMPLE_DELAY_US);
        let present = self.pin.is_low()?;
        self.delay.delay_us(RESET_RECOVERY_US);
        if !present {
            return Err(Error::NoPresence);
        }
        Ok(())
    }

    /// Writes a single bit as a timed low pulse.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), Error<E>> {
        self.pin.set_low()?;
        if bit {
            self.delay.delay_us(WRITE_1_LOW_US);
            self.pin.set_high()?;
            self.delay.delay_us(WRITE_1_RELEASE_US);
        } else {
            self.delay.delay_us(WRITE_0_LOW_US);
            self.pin.set_high()?;
            self.delay.delay_us(WRITE_0_RELEASE_US);
        }
        Ok(())
    }

    /// Opens a read slot and samples the bit driven by the device.
    pub fn read_bit(&mut self) -> Result<bool, Error<E>> {
        self.pin.set_low()?;
        self.delay.delay_us(READ_INIT_LOW_US);
        self.pin.set_high()?;
        self.delay.delay_us(READ_SAMPLE_DELAY_US);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(READ_SLOT_REMAINDER_US);
        Ok(bit)
    }

    /// Writes a byte least-significant bit first.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(byte & 0x01 != 0)?;
            byte >>= 1;
        }
        Ok(())
    }

    /// Reads a byte least-significant bit first.
    pub fn read_byte(&mut self) -> Result<u8, Error<E>> {
        let mut byte = 0u8;
        for bit in 0..8 {
            if self.read_bit()? {
                byte |= 1 << bit;
            }
        }
        Ok(byte)
    }

    /// Sets the conversion resolution by rewriting the scratchpad.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_byte(SKIP_ROM)?;
        self.write_byte(WRITE_SCRATCHPAD)?;
        self.write_byte(ALARM_HIGH_BYTE)?;
        self.write_byte(ALARM_LOW_BYTE)?;
        self.write_byte(resolution as u8)
    }

    /// Triggers a temperature conversion and waits for it to complete.
    ///
    /// The device answers read slots with 0 while converting and 1 once the
    /// result is in the scratchpad. The poll is bounded at
    /// [`CONVERSION_POLL_SLOTS`] slots so an unresponsive device surfaces as
    /// [`Error::Timeout`] instead of hanging the calling thread.
    pub fn convert(&mut self) -> Result<(), Error<E>> {
        self.reset()?;
        self.write_byte(SKIP_ROM)?;
        self.write_byte(CONVERT)?;
        for _ in 0..CONVERSION_POLL_SLOTS {
            if self.read_bit()? {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Runs a conversion and reads the raw temperature back.
    ///
    /// The value is a sign-extended two's-complement s12.4 fixed-point
    /// number: divide by 16 for degrees Celsius.
    pub fn raw_temperature(&mut self) -> Result<i16, Error<E>> {
        self.convert()?;
        self.reset()?;
        self.write_byte(SKIP_ROM)?;
        self.write_byte(READ_SCRATCHPAD)?;
        let lsb = self.read_byte()?;
        let msb = self.read_byte()?;
        // Terminate the scratchpad read early; only the temperature bytes
        // matter. A missing presence pulse on this terminating reset does not
        // invalidate the bytes already read.
        if let Err(Error::Pin(error)) = self.reset() {
            return Err(Error::Pin(error));
        }
        Ok(raw_from_scratchpad(lsb, msb))
    }

    /// Runs a conversion and reads the temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32, Error<E>> {
        Ok(self.raw_temperature()? as f32 / 16.0)
    }

    /// Reads the 8-byte factory ROM.
    ///
    /// Only valid when a single device is on the line; with several devices
    /// the responses collide.
    pub fn read_rom(&mut self) -> Result<RomCode, Error<E>> {
        self.reset()?;
        self.write_byte(READ_ROM)?;
        let mut rom = [0u8; 8];
        for byte in rom.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(RomCode(rom))
    }
}

fn raw_from_scratchpad(lsb: u8, msb: u8) -> i16 {
    i16::from_le_bytes([lsb, msb])
}
