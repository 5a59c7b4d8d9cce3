use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use static_cell::StaticCell;

use crate::hw::ina219::Ina219;
use crate::hw::link::{LINK_BAUD, LINK_RX_BUFFER_SIZE, LINK_TX_BUFFER_SIZE, PhoneLink};
use crate::hw::power::PowerSwitch;
use crate::telemetry::LogSink;

mod charge_task;
mod indicator_task;

pub(crate) use indicator_task::HEARTBEAT_PULSE;

/// Blocking I2C bus the current monitor lives on.
pub type SensorBus = I2c<'static, Blocking>;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

static LINK_TX_BUFFER: StaticCell<[u8; LINK_TX_BUFFER_SIZE]> = StaticCell::new();
static LINK_RX_BUFFER: StaticCell<[u8; LINK_RX_BUFFER_SIZE]> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA4,
        PA5,
        PA6,
        PA8,
        PB0,
        PB1,
        PB8,
        PB9,
        USART5,
        I2C1,
        ..
    } = hal::init(config);

    // Charging is enabled from the first instruction; the phone decides when to stop.
    let power = PowerSwitch::new(Output::new(PA4, Level::High, Speed::Low));
    let connected_led = Output::new(PA5, Level::Low, Speed::Low);
    let heartbeat_led = Output::new(PA6, Level::Low, Speed::Low);
    let link_state = Input::new(PA8, Pull::Down);

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = LINK_BAUD;
    uart_config.data_bits = DataBits::DataBits8;
    uart_config.stop_bits = StopBits::STOP1;
    uart_config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        USART5,
        PB1,
        PB0,
        LINK_TX_BUFFER.init([0; LINK_TX_BUFFER_SIZE]),
        LINK_RX_BUFFER.init([0; LINK_RX_BUFFER_SIZE]),
        UartIrqs,
        uart_config,
    )
    .expect("failed to initialize link UART");
    let link = PhoneLink::new(uart, link_state);

    let bus = I2c::new_blocking(I2C1, PB8, PB9, i2c::Config::default());
    let mut sensor = Ina219::new(bus);
    if sensor.init().is_err() {
        defmt::warn!("ina219: no acknowledge during setup");
    } else {
        defmt::info!("ina219: calibrated");
    }

    spawner
        .spawn(charge_task::run(link, power, sensor, LogSink::new()))
        .expect("failed to spawn charge task");

    spawner
        .spawn(indicator_task::run(connected_led, heartbeat_led))
        .expect("failed to spawn indicator task");

    defmt::info!("charger: set up complete");
    core::future::pending::<()>().await;
}
