#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the capacitive keypad lock and metal detector.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing collaborator traits the other crates implement.

pub mod config;
pub mod console;
pub mod controller;
pub mod detector;
pub mod keypad;
pub mod telemetry;
pub mod timing;
