//! Blocking INA219 current monitor driver.
//!
//! The sensor sits on the charger's output rail. It is calibrated for the
//! 32 V / 2 A range, which makes one current-register LSB worth 100 µA. A
//! sharp load change can reset the part, so the calibration register is
//! rewritten before every current read.

use charger_core::filter::CurrentSensor;
use embedded_hal::i2c::I2c;

/// Default 7-bit bus address (A0/A1 open).
pub const INA219_ADDRESS: u8 = 0x40;

const REG_CONFIG: u8 = 0x00;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;

/// Calibration value for the 32 V / 2 A range.
pub const CALIBRATION_32V_2A: u16 = 4096;

const CONFIG_BUS_RANGE_32V: u16 = 0x2000;
const CONFIG_GAIN_8_320MV: u16 = 0x1800;
const CONFIG_BUS_ADC_12BIT: u16 = 0x0180;
const CONFIG_SHUNT_ADC_12BIT_8S: u16 = 0x0058;
const CONFIG_MODE_CONTINUOUS: u16 = 0x0007;

/// Configuration word written at start-up.
pub const CONFIG_WORD: u16 = CONFIG_BUS_RANGE_32V
    | CONFIG_GAIN_8_320MV
    | CONFIG_BUS_ADC_12BIT
    | CONFIG_SHUNT_ADC_12BIT_8S
    | CONFIG_MODE_CONTINUOUS;

/// Current-register counts per milliamp.
const COUNTS_PER_MA: i16 = 10;

pub struct Ina219<B> {
    bus: B,
    address: u8,
}

impl<B> Ina219<B>
where
    B: I2c,
{
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            address: INA219_ADDRESS,
        }
    }

    /// Writes calibration and configuration; call once after power-up.
    pub fn init(&mut self) -> Result<(), B::Error> {
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)?;
        self.write_register(REG_CONFIG, CONFIG_WORD)
    }

    /// Reads the output current in milliamps; reverse current reads as zero.
    pub fn read_current_ma(&mut self) -> Result<u16, B::Error> {
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)?;

        let mut raw = [0u8; 2];
        self.bus
            .write_read(self.address, &[REG_CURRENT], &mut raw)?;
        let counts = i16::from_be_bytes(raw);
        Ok(u16::try_from(counts / COUNTS_PER_MA).unwrap_or(0))
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), B::Error> {
        let [high, low] = value.to_be_bytes();
        self.bus.write(self.address, &[register, high, low])
    }

    pub fn release(self) -> B {
        self.bus
    }
}

impl<B> CurrentSensor for Ina219<B>
where
    B: I2c,
{
    fn read_raw_current_ma(&mut self) -> u16 {
        match self.read_current_ma() {
            Ok(current) => current,
            Err(_) => {
                log_read_error();
                0
            }
        }
    }
}

#[cfg(target_os = "none")]
fn log_read_error() {
    defmt::warn!("ina219: current read failed");
}

#[cfg(not(target_os = "none"))]
fn log_read_error() {
    println!("WARN ina219: current read failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        current_register: [u8; 2],
        fail: bool,
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buffer) => buffer.copy_from_slice(&self.current_register),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_writes_calibration_then_config() {
        let mut sensor = Ina219::new(FakeBus::default());
        sensor.init().unwrap();

        let bus = sensor.release();
        assert_eq!(
            bus.writes,
            vec![
                (INA219_ADDRESS, vec![REG_CALIBRATION, 0x10, 0x00]),
                (INA219_ADDRESS, vec![REG_CONFIG, 0x39, 0xDF]),
            ]
        );
    }

    #[test]
    fn current_register_scales_to_milliamps() {
        let bus = FakeBus {
            current_register: 5_160i16.to_be_bytes(),
            ..FakeBus::default()
        };
        let mut sensor = Ina219::new(bus);
        assert_eq!(sensor.read_raw_current_ma(), 516);

        let bus = sensor.release();
        assert_eq!(bus.writes[0].1, vec![REG_CALIBRATION, 0x10, 0x00]);
        assert_eq!(bus.writes[1].1, vec![REG_CURRENT]);
    }

    #[test]
    fn reverse_current_and_bus_errors_read_zero() {
        let bus = FakeBus {
            current_register: (-250i16).to_be_bytes(),
            ..FakeBus::default()
        };
        let mut sensor = Ina219::new(bus);
        assert_eq!(sensor.read_raw_current_ma(), 0);

        let mut failing = Ina219::new(FakeBus {
            fail: true,
            ..FakeBus::default()
        });
        assert_eq!(failing.read_raw_current_ma(), 0);
    }
}
