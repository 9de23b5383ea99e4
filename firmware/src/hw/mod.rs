//! Board drivers: oscillator pulse timing, capacitive pads, buzzer and outputs.

use capsense_core::detector::FrequencySample;
use capsense_core::keypad::{CapacitiveReading, KEY_COUNT, KeyIndex, ToneAction, UnlockAction};
use capsense_core::timing::HoldAction;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output};
use embassy_time::{Duration, Instant, Timer, with_timeout};

use crate::instant::FirmwareInstant;

/// Longest wait for a single oscillator edge.
pub const PULSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Busy-loop iterations before a pad charge cycle gives up.
pub const CHARGE_TIMEOUT: u32 = 2_000;

/// Times the search-coil oscillator from its EXTI-capable input.
pub struct PulseTimer<'d> {
    input: ExtiInput<'d>,
}

impl<'d> PulseTimer<'d> {
    pub fn new(input: ExtiInput<'d>) -> Self {
        Self { input }
    }

    /// Measures one high and one low half-period. A timed-out half counts as zero.
    pub async fn read_frequency(&mut self) -> Option<FrequencySample> {
        let high_us = self.measure(Level::High).await.unwrap_or(0);
        let low_us = self.measure(Level::Low).await.unwrap_or(0);
        FrequencySample::from_pulse_widths(high_us, low_us)
    }

    async fn measure(&mut self, level: Level) -> Option<u32> {
        match level {
            Level::High => {
                with_timeout(PULSE_TIMEOUT, self.input.wait_for_rising_edge())
                    .await
                    .ok()?;
                let start = Instant::now();
                with_timeout(PULSE_TIMEOUT, self.input.wait_for_falling_edge())
                    .await
                    .ok()?;
                Some(elapsed_micros(start))
            }
            Level::Low => {
                with_timeout(PULSE_TIMEOUT, self.input.wait_for_falling_edge())
                    .await
                    .ok()?;
                let start = Instant::now();
                with_timeout(PULSE_TIMEOUT, self.input.wait_for_rising_edge())
                    .await
                    .ok()?;
                Some(elapsed_micros(start))
            }
        }
    }
}

fn elapsed_micros(start: Instant) -> u32 {
    u32::try_from(start.elapsed().as_micros()).unwrap_or(u32::MAX)
}

/// Software capacitive sensing: one shared send pin, one receive pin per pad.
pub struct CapacitivePads<'d> {
    send: Output<'d>,
    receive: [Input<'d>; KEY_COUNT],
}

impl<'d> CapacitivePads<'d> {
    pub fn new(send: Output<'d>, receive: [Input<'d>; KEY_COUNT]) -> Self {
        Self { send, receive }
    }

    /// Sums `samples` charge and discharge times for `key`.
    ///
    /// A timed-out cycle yields a zero reading so a floating pad never counts as a touch.
    pub fn read(&mut self, key: KeyIndex, samples: u8) -> CapacitiveReading {
        let Some(receive) = self.receive.get(key.as_index()) else {
            return CapacitiveReading::new(0);
        };

        let mut total = 0u32;
        for _ in 0..samples {
            match charge_cycle(&mut self.send, receive) {
                Some(count) => total = total.saturating_add(count),
                None => return CapacitiveReading::new(0),
            }
        }
        CapacitiveReading::new(total)
    }
}

fn charge_cycle(send: &mut Output<'_>, receive: &Input<'_>) -> Option<u32> {
    let mut count = 0u32;

    send.set_high();
    while receive.is_low() {
        count += 1;
        if count >= CHARGE_TIMEOUT {
            send.set_low();
            return None;
        }
    }

    send.set_low();
    while receive.is_high() {
        count += 1;
        if count >= CHARGE_TIMEOUT {
            return None;
        }
    }

    Some(count)
}

/// Piezo driven by toggling a push-pull pin.
pub struct Buzzer<'d> {
    pin: Output<'d>,
}

impl<'d> Buzzer<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }

    /// Plays the tone until its hold deadline passes.
    pub async fn play(&mut self, action: ToneAction) {
        let Some(deadline) = hold_deadline(&action) else {
            return;
        };

        let half_period = action.value.half_period_us();
        if half_period == 0 {
            Timer::at(deadline).await;
            return;
        }

        let half_period = Duration::from_micros(u64::from(half_period));
        while Instant::now() < deadline {
            self.pin.toggle();
            Timer::after(half_period).await;
        }
        self.pin.set_low();
    }
}

/// Trigger and unlock lines.
pub struct ControlOutputs<'d> {
    trigger: Output<'d>,
    unlock: Output<'d>,
}

impl<'d> ControlOutputs<'d> {
    pub fn new(trigger: Output<'d>, unlock: Output<'d>) -> Self {
        Self { trigger, unlock }
    }

    pub fn set_trigger(&mut self, high: bool) {
        self.trigger.set_level(Level::from(high));
    }

    /// Drives the unlock line for the hold, then releases it.
    pub async fn hold_unlock(&mut self, action: UnlockAction) {
        self.unlock.set_level(Level::from(action.value));
        if let Some(deadline) = hold_deadline(&action) {
            Timer::at(deadline).await;
        }
        self.unlock.set_low();
    }
}

fn hold_deadline<T>(action: &HoldAction<T>) -> Option<Instant> {
    action
        .deadline(FirmwareInstant::now())
        .map(FirmwareInstant::into_embassy)
}

/// Every driver the control task needs.
pub struct Board<'d> {
    pub pulses: PulseTimer<'d>,
    pub pads: CapacitivePads<'d>,
    pub buzzer: Buzzer<'d>,
    pub outputs: ControlOutputs<'d>,
}
