//! Emulated WebXR device core.
//!
//! This crate provides:
//! - `EmulatedXrDevice`, the device-state and pose/projection engine behind a
//!   WebXR runtime without physical hardware
//! - Session registry, synthetic gamepads, and input-source adapters
//! - AR touch-panel interaction policy and standing hit-test sources
//!
//! The device is puppeted over [`specter_protocol::Command`] messages and
//! driven by the host runtime's per-frame hooks; everything is
//! single-threaded and synchronous.

#![forbid(unsafe_code)]

pub mod device;
pub mod gamepad;
pub mod hittest;
pub mod input;
pub mod math;
pub mod session;

pub use device::{
    EmulatedXrDevice, Eye, RenderState, RuntimeEvent, RuntimeSink, SceneFactory, Viewport,
};
pub use gamepad::{Gamepad, GamepadButton, GamepadPose, Hand};
pub use hittest::{HitTestSource, HitTestSourceId, Ray};
pub use input::{InputPoseType, InputSourceAdapter, InputSourceDescriptor, TargetRayMode};
pub use session::{Session, SessionId, SessionRegistry};

use specter_protocol::SessionMode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("session mode {} is not supported by this device", .0.as_str())]
    UnsupportedMode(SessionMode),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
