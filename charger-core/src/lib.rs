#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

// Shared logic for the smart charger controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Peripherals are reached only through the collaborator
// traits in `context`, `charge`, `filter`, and `telemetry`.

pub mod charge;
pub mod config;
pub mod context;
pub mod filter;
pub mod frame;
pub mod instant;
pub mod link;
pub mod telemetry;
