use capsense_core::controller::{Controller, PassInput, PassRequest};
use portable_atomic::Ordering;

use super::{TELEMETRY_DROPPED, TelemetrySender};
use crate::hw::Board;
use crate::instant::FirmwareInstant;
use crate::status;

/// Runs the detector and keypad loop forever.
///
/// Each pass is driven request by request from the controller. Tones and the
/// unlock pulse are awaited in place so the pass timing matches the hardware's
/// serialized loop.
#[embassy_executor::task]
pub async fn run(
    mut controller: Controller<FirmwareInstant>,
    mut board: Board<'static>,
    sender: TelemetrySender<'static>,
) -> ! {
    loop {
        pass(&mut controller, &mut board).await;

        let now = FirmwareInstant::now();
        status::publish(now, &controller.status(now));
        forward_telemetry(&mut controller, &sender);
    }
}

async fn pass(controller: &mut Controller<FirmwareInstant>, board: &mut Board<'static>) {
    let (mut pass, mut request) = controller.begin_pass(FirmwareInstant::now());
    loop {
        let input = match request {
            PassRequest::ReadFrequency => PassInput::Frequency(board.pulses.read_frequency().await),
            PassRequest::SetTrigger(high) => {
                board.outputs.set_trigger(high);
                PassInput::Done
            }
            PassRequest::BeginScan => PassInput::Done,
            PassRequest::ReadKey { key, samples } => {
                PassInput::Reading(board.pads.read(key, samples))
            }
            PassRequest::PlayTone(tone) => {
                board.buzzer.play(tone).await;
                PassInput::Done
            }
            PassRequest::HoldUnlock(action) => {
                board.outputs.hold_unlock(action).await;
                PassInput::Done
            }
        };
        match controller.resume_pass(&mut pass, input, FirmwareInstant::now()) {
            Some(next) => request = next,
            None => return,
        }
    }
}

fn forward_telemetry(
    controller: &mut Controller<FirmwareInstant>,
    sender: &TelemetrySender<'static>,
) {
    for record in controller.telemetry_mut().take_unreported() {
        if sender.try_send(*record).is_err() {
            TELEMETRY_DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }
}
