use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

// The host start signal and the settle delays before listening.
const START_LOW_MS: u32 = 18;
const HOST_RELEASE_US: u32 = 40;
const ACK_SETTLE_US: u32 = 80;
// Sample point within a response pulse: a pulse still high after this delay
// encodes a 1.
const BIT_DECODE_DELAY_US: u32 = 50;

/// Upper bound, in 1us polls, on each wait for the line to change level
/// during the 40-bit response.
///
/// The longest legal response pulse is around 80us; an unresponsive device
/// surfaces as [`Error::Timeout`] instead of hanging the caller.
pub const LEVEL_TIMEOUT_US: u32 = 200;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Wrapped error from the HAL pin.
    Pin(E),
    /// The response frame failed its checksum; cached readings are left
    /// untouched.
    Checksum,
    /// The line never reached the expected level within
    /// [`LEVEL_TIMEOUT_US`] polls.
    Timeout,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Error<E> {
        Error::Pin(error)
    }
}

/// A DHT22 combined temperature/humidity sensor on a single open-drain line.
///
/// A sample is requested with an 18ms low start signal, after which the
/// device answers with 40 pulse-width-encoded bits: humidity high/low byte,
/// temperature high/low byte, checksum. Readings are cached as scaled
/// integers in tenths of a unit; callers divide by 10 for physical values.
#[derive(Debug)]
pub struct Dht22<P, D> {
    pin: P,
    delay: D,
    humidity_x10: u16,
    temperature_x10: u16,
}

impl<P, D, E> Dht22<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Dht22<P, D> {
        Dht22 {
            pin,
            delay,
            humidity_x10: 0,
            temperature_x10: 0,
        }
    }

    /// Releases the pin and delay provider.
    pub fn free(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// The last sampled relative humidity in tenths of a percent.
    pub fn humidity_x10(&self) -> u16 {
        self.humidity_x10
    }

    /// The last sampled temperature in tenths of a degree.
    pub fn temperature_x10(&self) -> u16 {
        self.temperature_x10
    }

    /// Requests and decodes one reading, updating the cached values.
    ///
    /// On any failure, including a checksum mismatch, the previously cached
    /// readings are left unchanged rather than overwritten with partial
    /// data.
    pub fn sample(&mut self) -> Result<(), Error<E>> {
        self.pin.set_low()?;
        self.delay.delay_ms(START_LOW_MS);
        self.pin.set_high()?;
        self.delay.delay_us(HOST_RELEASE_US);
        self.delay.delay_us(ACK_SETTLE_US);

        let mut frame = [0u8; 5];
        for byte in frame.iter_mut() {
            for _ in 0..8 {
                // Let the previous pulse (or the device's acknowledge)
                // finish, wait out the low preamble, then sample the pulse
                // width at the decode point.
                self.wait_for_level(false)?;
                self.wait_for_level(true)?;
                self.delay.delay_us(BIT_DECODE_DELAY_US);
                let bit = self.pin.is_high()?;
                *byte = (*byte << 1) | bit as u8;
            }
        }

        if !checksum_matches(&frame) {
            return Err(Error::Checksum);
        }
        self.humidity_x10 = ((frame[0] as u16) << 8) | frame[1] as u16;
        self.temperature_x10 = ((frame[2] as u16) << 8) | frame[3] as u16;
        Ok(())
    }

    fn wait_for_level(&mut self, high: bool) -> Result<(), Error<E>> {
        for _ in 0..LEVEL_TIMEOUT_US {
            let at_level = if high {
                self.pin.is_high()?
            } else {
                self.pin.is_low()?
            };
            if at_level {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(Error::Timeout)
    }
}

fn checksum_matches(frame: &[u8; 5]) -> bool {
    let sum = frame[0] as u16 + frame[1] as u16 + frame[2] as u16 + frame[3] as u16;
    (sum & 0xFF) as u8 == frame[4]
}
