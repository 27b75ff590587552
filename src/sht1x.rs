use crate::soft_i2c::SoftI2c;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Device power-up time after hard or soft reset.
const POWER_UP_DELAY_MS: u32 = 11;

// Commands that read a value back, MSB-first on the data line.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ReadCommand {
    Temperature = 0x03,
    Humidity = 0x05,
    Status = 0x07,
}

const WRITE_STATUS: u8 = 0x06;
const SOFT_RESET: u8 = 0x1E;

// Status register flags.
const FLAG_RESOLUTION: u8 = 0x01;
const FLAG_OTP_RELOAD: u8 = 0x02;
const FLAG_HEATER: u8 = 0x04;
const FLAG_BATTERY: u8 = 0x40;

// Calibration coefficients from the device datasheet, indexed by the
// resolution flag: 0 = high resolution (12-bit humidity, 14-bit
// temperature), 1 = low resolution (8-bit humidity, 12-bit temperature).
struct Coefficients {
    // Humidity conversion.
    c1: [f32; 2],
    c2: [f32; 2],
    c3: [f32; 2],
    // Temperature conversion: Celsius, Fahrenheit, and the offset per scale.
    dc: [f32; 2],
    df: [f32; 2],
    dv: [f32; 2],
    // Temperature compensation of the humidity reading.
    t1: [f32; 2],
    t2: [f32; 2],
}

const COEFFICIENTS: Coefficients = Coefficients {
    c1: [-2.046, -2.046],
    c2: [0.036, 0.587],
    c3: [-0.000_001_595_5, -0.000_408_45],
    dc: [0.01, 0.04],
    df: [0.018, 0.072],
    dv: [-39.7, -39.5],
    t1: [0.01, 0.01],
    t2: [0.000_08, 0.001_28],
};

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Wrapped error from a HAL pin on the underlying bus.
    Bus(E),
    /// The device did not acknowledge a command byte.
    NoAck,
    /// The device never signalled measurement completion within the bounded
    /// acknowledge wait.
    MeasurementTimeout,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Error<E> {
        Error::Bus(error)
    }
}

/// A Sensirion SHT1x temperature/humidity sensor on a bit-banged two-wire
/// bus.
///
/// Raw readings and the status register are cached in the driver; the device
/// is the source of truth and the cache is refreshed by [`Sht1x::update`]
/// and invalidated by [`Sht1x::reset`]. The getters are pure functions of
/// the cache.
///
/// Every transaction is bracketed by a cooperative readiness flag. This is a
/// single-threaded-caller contract, not a lock: it keeps re-entrant calls
/// from interleaving bus bytes, but offers no protection against a second
/// thread of execution. The guard spins without yielding and carries no
/// timeout.
#[derive(Debug)]
pub struct Sht1x<Sda, Scl, D> {
    bus: SoftI2c<Sda, Scl, D>,
    ready: bool,
    fahrenheit: bool,
    status_register: u8,
    humidity: u16,
    temperature: u16,
}

impl<Sda, Scl, D, E> Sht1x<Sda, Scl, D>
where
    Sda: InputPin<Error = E> + OutputPin<Error = E>,
    Scl: OutputPin<Error = E>,
    D: DelayNs,
{
    /// Constructs the driver and waits out the device power-up time.
    pub fn new(sda: Sda, scl: Scl, delay: D) -> Sht1x<Sda, Scl, D> {
        let mut bus = SoftI2c::new(sda, scl, delay);
        bus.delay_mut().delay_ms(POWER_UP_DELAY_MS);
        Sht1x {
            bus,
            ready: true,
            fahrenheit: false,
            status_register: 0,
            humidity: 0,
            temperature: 0,
        }
    }

    /// Releases the pins and delay provider.
    pub fn free(self) -> (Sda, Scl, D) {
        self.bus.free()
    }

    /// Reads fresh raw temperature and humidity codes from the device.
    pub fn update(&mut self) -> Result<(), Error<E>> {
        self.read_register(ReadCommand::Temperature)?;
        self.read_register(ReadCommand::Humidity)
    }

    /// The temperature from the cached raw code, in the configured scale.
    pub fn get_temperature(&self) -> f32 {
        convert_temperature(
            self.temperature,
            flag_get(self.status_register, FLAG_RESOLUTION),
            self.fahrenheit,
        )
    }

    /// The temperature-compensated relative humidity from the cached raw
    /// codes, in percent.
    pub fn get_humidity(&self) -> f32 {
        convert_humidity(
            self.humidity,
            self.temperature,
            flag_get(self.status_register, FLAG_RESOLUTION),
        )
    }

    /// Reads the status register and reports whether the supply voltage has
    /// dropped below the device's low-battery threshold.
    pub fn check_battery(&mut self) -> Result<bool, Error<E>> {
        self.read_register(ReadCommand::Status)?;
        Ok(flag_get(self.status_register, FLAG_BATTERY))
    }

    /// Enables or disables the on-chip heating element.
    ///
    /// The heater can raise the sensor 5 to 10 degrees above ambient.
    pub fn set_heater(&mut self, on: bool) -> Result<(), Error<E>> {
        self.status_register = flag_set(self.status_register, FLAG_HEATER, on);
        self.write_register()
    }

    /// Selects low (`true`) or high (`false`) measurement resolution.
    pub fn set_resolution(&mut self, low: bool) -> Result<(), Error<E>> {
        self.status_register = flag_set(self.status_register, FLAG_RESOLUTION, low);
        self.write_register()
    }

    /// Enables or disables reloading calibration data before each
    /// measurement.
    ///
    /// Disabling shaves roughly 10ms off each measurement. The device flag
    /// suppresses the reload, hence the inversion.
    pub fn set_otp_reload(&mut self, enabled: bool) -> Result<(), Error<E>> {
        self.status_register = flag_set(self.status_register, FLAG_OTP_RELOAD, !enabled);
        self.write_register()
    }

    /// Selects Fahrenheit (`true`) or Celsius (`false`) output.
    pub fn set_scale(&mut self, fahrenheit: bool) {
        self.fahrenheit = fahrenheit;
    }

    /// Soft-resets the device, clearing the cached register and readings,
    /// then waits out the power-up time.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.acquire();
        let result = self.reset_locked();
        self.ready = true;
        if !result? {
            return Err(Error::NoAck);
        }
        self.status_register = 0;
        self.humidity = 0;
        self.temperature = 0;
        self.bus.delay_mut().delay_ms(POWER_UP_DELAY_MS);
        Ok(())
    }

    /// Recovers the serial interface after communication with the device is
    /// lost, without touching device state.
    pub fn connection_reset(&mut self) -> Result<(), Error<E>> {
        Ok(self.bus.reset()?)
    }

    fn reset_locked(&mut self) -> Result<bool, Error<E>> {
        self.bus.start()?;
        let acked = self.bus.write(SOFT_RESET)?;
        self.bus.stop()?;
        Ok(acked)
    }

    fn read_register(&mut self, command: ReadCommand) -> Result<(), Error<E>> {
        self.acquire();
        let result = self.read_register_locked(command);
        self.ready = true;
        result
    }

    fn read_register_locked(&mut self, command: ReadCommand) -> Result<(), Error<E>> {
        self.bus.start()?;
        if !self.bus.write(command as u8)? {
            self.bus.stop()?;
            return Err(Error::NoAck);
        }
        match command {
            ReadCommand::Temperature => {
                self.temperature = self.read_measurement()?;
            }
            ReadCommand::Humidity => {
                self.humidity = self.read_measurement()?;
            }
            // The status register is available immediately; no wait step.
            ReadCommand::Status => {
                self.status_register = self.bus.read(false)?;
            }
        }
        self.bus.stop()?;
        Ok(())
    }

    // Measurements are ready only once the device pulls the data line low;
    // the wait is bounded at 500 1ms polls.
    fn read_measurement(&mut self) -> Result<u16, Error<E>> {
        if !self.bus.wait()? {
            self.bus.stop()?;
            return Err(Error::MeasurementTimeout);
        }
        let mut value = (self.bus.read(true)? as u16) << 8;
        value |= self.bus.read(false)? as u16;
        Ok(value)
    }

    fn write_register(&mut self) -> Result<(), Error<E>> {
        self.acquire();
        let result = self.write_register_locked();
        self.ready = true;
        result
    }

    fn write_register_locked(&mut self) -> Result<(), Error<E>> {
        self.bus.start()?;
        if self.bus.write(WRITE_STATUS)? {
            // A missing acknowledge on the data byte is not treated as a
            // failure; the register write is fire-and-forget.
            self.bus.write(self.status_register)?;
        }
        self.bus.stop()?;
        Ok(())
    }

    fn acquire(&mut self) {
        while !self.ready {
            core::hint::spin_loop();
        }
        self.ready = false;
    }
}

fn flag_get(register: u8, flag: u8) -> bool {
    register & flag != 0
}

fn flag_set(register: u8, flag: u8, value: bool) -> u8 {
    if value {
        register | flag
    } else {
        register & !flag
    }
}

fn convert_temperature(raw: u16, low_res: bool, fahrenheit: bool) -> f32 {
    let d1 = COEFFICIENTS.dv[fahrenheit as usize];
    let d2 = if fahrenheit {
        COEFFICIENTS.df[low_res as usize]
    } else {
        COEFFICIENTS.dc[low_res as usize]
    };
    d1 + d2 * raw as f32
}

fn convert_humidity(raw_humidity: u16, raw_temperature: u16, low_res: bool) -> f32 {
    let res = low_res as usize;
    let sohr = raw_humidity as f32;
    // Quadratic conversion of the raw code to relative humidity.
    let linear_humidity =
        COEFFICIENTS.c1[res] + COEFFICIENTS.c2[res] * sohr + COEFFICIENTS.c3[res] * sohr * sohr;
    // Compensation is relative to 25 degrees Celsius regardless of the
    // configured output scale.
    let temperature = convert_temperature(raw_temperature, low_res, false);
    (temperature - 25.0) + (COEFFICIENTS.t1[res] + COEFFICIENTS.t2[res] * sohr + linear_humidity)
}
