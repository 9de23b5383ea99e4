use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use portable_atomic::AtomicU32;

use capsense_core::controller::Controller;
use capsense_core::detector::DEFAULT_DETECTOR_CONFIG;
use capsense_core::keypad::DEFAULT_KEYPAD_CONFIG;

use crate::hw::{Board, Buzzer, CapacitivePads, ControlOutputs, PulseTimer};
use crate::telemetry::FirmwareRecord;

mod control_task;
mod telemetry_task;

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

/// Depth of the control → log channel.
pub const TELEMETRY_QUEUE_DEPTH: usize = 16;

pub type TelemetryQueue = Channel<CriticalSectionRawMutex, FirmwareRecord, TELEMETRY_QUEUE_DEPTH>;
pub type TelemetrySender<'a> =
    Sender<'a, CriticalSectionRawMutex, FirmwareRecord, TELEMETRY_QUEUE_DEPTH>;
pub type TelemetryReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, FirmwareRecord, TELEMETRY_QUEUE_DEPTH>;

pub(super) static TELEMETRY_QUEUE: TelemetryQueue = Channel::new();
/// Records the control task could not queue.
pub(super) static TELEMETRY_DROPPED: AtomicU32 = AtomicU32::new(0);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB0,
        PB1,
        EXTI0,
        ..
    } = hal::init(config);

    let board = Board {
        pulses: PulseTimer::new(ExtiInput::new(PA0, EXTI0, Pull::None)),
        pads: CapacitivePads::new(
            Output::new(PA4, Level::Low, Speed::VeryHigh),
            [
                Input::new(PA5, Pull::None),
                Input::new(PA6, Pull::None),
                Input::new(PA7, Pull::None),
                Input::new(PB0, Pull::None),
            ],
        ),
        buzzer: Buzzer::new(Output::new(PB1, Level::Low, Speed::Low)),
        outputs: ControlOutputs::new(
            Output::new(PA1, Level::Low, Speed::Low),
            Output::new(PA8, Level::Low, Speed::Low),
        ),
    };

    let controller = Controller::try_new(DEFAULT_DETECTOR_CONFIG, DEFAULT_KEYPAD_CONFIG)
        .expect("controller tables");

    spawner
        .spawn(control_task::run(controller, board, TELEMETRY_QUEUE.sender()))
        .expect("failed to spawn control task");

    spawner
        .spawn(telemetry_task::run(TELEMETRY_QUEUE.receiver()))
        .expect("failed to spawn telemetry task");

    core::future::pending::<()>().await;
}
