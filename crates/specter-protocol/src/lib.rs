//! Wire types for the Specter relay channel.
//!
//! This crate provides:
//! - `Command`, the inbound messages a control panel sends to the device
//! - `Event`, the outbound notifications the device emits for observers
//! - `DeviceDefinition` and friends, the configuration payload shapes
//!
//! Poses cross this boundary as plain `[f32; 3]` / `[f32; 4]` arrays; typed
//! math starts on the device side.

#![forbid(unsafe_code)]

pub mod command;
pub mod definition;
pub mod event;

pub use command::Command;
pub use definition::{
    ControllerDefinition, ControllerRole, DeviceDefinition, DeviceSize, Resolution, SessionMode,
};
pub use event::{Event, EventSink};

/// Headset position a freshly constructed device reports, in meters.
/// Roughly standing eye height, shared with the control panel defaults.
pub const DEFAULT_HEADSET_POSITION: [f32; 3] = [0.0, 1.6, 0.0];

/// Render-target resolution used for AR handheld devices when the
/// definition does not specify one.
pub const DEFAULT_AR_RESOLUTION: Resolution = Resolution {
    width: 1024,
    height: 2048,
};

/// Physical dimensions of the emulated AR handheld, in meters.
pub const DEFAULT_DEVICE_SIZE: DeviceSize = DeviceSize {
    width: 0.05,
    height: 0.1,
    depth: 0.005,
};
