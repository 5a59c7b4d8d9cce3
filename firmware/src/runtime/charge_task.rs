use charger_core::config::ChargerConfig;
use charger_core::context::{ControllerContext, FrameDisposition, report_drained};
use charger_core::frame::FRAME_LEN;
use charger_core::link::LinkState;
use embassy_time::Timer;

use super::{HEARTBEAT_PULSE, SensorBus};
use crate::hw::ina219::Ina219;
use crate::hw::link::PhoneLink;
use crate::hw::power::PowerSwitch;
use crate::instant::{FirmwareInstant, to_embassy};
use crate::telemetry::LogSink;

#[embassy_executor::task]
pub async fn run(
    mut link: PhoneLink<'static>,
    mut power: PowerSwitch<'static>,
    mut sensor: Ina219<SensorBus>,
    mut sink: LogSink,
) -> ! {
    let mut context: ControllerContext<FirmwareInstant> =
        ControllerContext::new(ChargerConfig::new());
    let poll_interval = to_embassy(context.config().poll_interval);
    let read_timeout = to_embassy(context.config().read_timeout);

    loop {
        let state = context.on_link_signal(link.is_link_up(), FirmwareInstant::now(), &mut sink);

        if state == LinkState::Connected {
            let mut buf = [0u8; FRAME_LEN];
            match link.read_frame(&mut buf, read_timeout).await {
                Some(received) => {
                    let disposition = context.on_frame(
                        &buf[..received],
                        FirmwareInstant::now(),
                        &mut power,
                        &mut sensor,
                        &mut sink,
                    );
                    if !matches!(disposition, FrameDisposition::Discarded { .. }) {
                        HEARTBEAT_PULSE.signal(());
                    }

                    let drained = link.drain().await;
                    report_drained(drained, FirmwareInstant::now(), &mut sink);
                }
                None => context.on_idle(FirmwareInstant::now(), &mut sensor, &mut sink),
            }
        }

        Timer::after(poll_interval).await;
    }
}
