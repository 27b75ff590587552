#![no_std]

//! Software-timed drivers for environmental sensors that speak over raw GPIO
//! lines, with no hardware bus controller involved. Each driver exclusively
//! owns its pin(s) and an [`embedded_hal::delay::DelayNs`] provider, and
//! blocks the caller for the duration of every transaction.

/// Driver for DHT22 pulse-width-encoded temperature/humidity sensors.
pub mod dht22;
/// Driver for the DS18B20 Dallas 1-wire digital thermometer.
pub mod ds18b20;
/// Driver for the Sensirion SHT1x temperature/humidity sensor, built on
/// [`soft_i2c`].
pub mod sht1x;
/// Bit-banged two-wire (clock + data) bus primitives.
pub mod soft_i2c;
