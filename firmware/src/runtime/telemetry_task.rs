use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};
use portable_atomic::Ordering;

use super::{TELEMETRY_DROPPED, TelemetryReceiver};
use crate::instant::FirmwareInstant;
use crate::{status, telemetry};

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn run(receiver: TelemetryReceiver<'static>) -> ! {
    let mut heartbeat = Ticker::every(HEARTBEAT_PERIOD);

    loop {
        match select(receiver.receive(), heartbeat.next()).await {
            Either::First(record) => telemetry::log_record(&record),
            Either::Second(()) => {
                let dropped = TELEMETRY_DROPPED.swap(0, Ordering::Relaxed);
                if dropped > 0 {
                    telemetry::log_dropped(dropped);
                }
                telemetry::log_heartbeat(&status::snapshot(FirmwareInstant::now()));
            }
        }
    }
}
