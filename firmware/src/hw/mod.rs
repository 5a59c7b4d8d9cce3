//! Board wiring for the charger controller.
//!
//! | Signal | Pin | Notes |
//! |---|---|---|
//! | HC-05 TX -> MCU RX | PB1 (USART5) | 9600 8N1 |
//! | MCU TX -> HC-05 RX | PB0 (USART5) | via divider |
//! | HC-05 STATE | PA8 | high while paired |
//! | Power MOSFET + LED | PA4 | high enables charging |
//! | Connected LED | PA5 | |
//! | Heartbeat LED | PA6 | |
//! | INA219 SCL / SDA | PB8 / PB9 (I2C1) | address 0x40 |

pub mod ina219;

#[cfg(target_os = "none")]
pub mod link;
#[cfg(target_os = "none")]
pub mod power;
