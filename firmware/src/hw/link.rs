//! HC-05 Bluetooth link: buffered UART plus the module's STATE pin.

use charger_core::frame::FRAME_LEN;
use embassy_stm32::gpio::Input;
use embassy_stm32::usart::BufferedUart;
use embassy_time::{Duration, Instant, with_deadline, with_timeout};
use embedded_io_async::Read;

/// HC-05 factory baud rate.
pub const LINK_BAUD: u32 = 9_600;
/// Receive buffer; a few frames of slack.
pub const LINK_RX_BUFFER_SIZE: usize = FRAME_LEN * 4;
/// Transmit buffer; nothing is sent to the phone.
pub const LINK_TX_BUFFER_SIZE: usize = 16;

/// How long to wait for a first byte before treating the link as quiet.
const PENDING_PROBE: Duration = Duration::from_millis(2);
/// Gap that ends a drain; one byte takes about 1 ms at 9600 baud.
const DRAIN_GAP: Duration = Duration::from_millis(5);

pub struct PhoneLink<'d> {
    uart: BufferedUart<'d>,
    state: Input<'d>,
}

impl<'d> PhoneLink<'d> {
    pub fn new(uart: BufferedUart<'d>, state: Input<'d>) -> Self {
        Self { uart, state }
    }

    /// Samples the STATE pin.
    pub fn is_link_up(&self) -> bool {
        self.state.is_high()
    }

    /// Reads one frame when bytes are pending.
    ///
    /// Returns `None` when no byte shows up within the probe window, otherwise
    /// the number of bytes collected before the frame filled or `timeout`
    /// expired.
    pub async fn read_frame(
        &mut self,
        buf: &mut [u8; FRAME_LEN],
        timeout: Duration,
    ) -> Option<usize> {
        match with_timeout(PENDING_PROBE, self.uart.read(&mut buf[..1])).await {
            Ok(Ok(count)) if count > 0 => {}
            Ok(Ok(_)) | Err(_) => return None,
            Ok(Err(err)) => {
                defmt::warn!("link: UART read error {}", defmt::Debug2Format(&err));
                return None;
            }
        }

        let deadline = Instant::now() + timeout;
        let mut received = 1;
        while received < FRAME_LEN {
            match with_deadline(deadline, self.uart.read(&mut buf[received..])).await {
                Ok(Ok(count)) if count > 0 => received += count,
                Ok(Ok(_)) | Err(_) => break,
                Ok(Err(err)) => {
                    defmt::warn!("link: UART read error {}", defmt::Debug2Format(&err));
                    break;
                }
            }
        }

        Some(received)
    }

    /// Discards bytes until the line goes quiet; returns how many were dropped.
    pub async fn drain(&mut self) -> usize {
        let mut scratch = [0u8; FRAME_LEN];
        let mut drained = 0;
        loop {
            match with_timeout(DRAIN_GAP, self.uart.read(&mut scratch)).await {
                Ok(Ok(count)) if count > 0 => drained += count,
                Ok(Ok(_)) | Err(_) => return drained,
                Ok(Err(err)) => {
                    defmt::warn!("link: UART read error {}", defmt::Debug2Format(&err));
                    return drained;
                }
            }
        }
    }
}
