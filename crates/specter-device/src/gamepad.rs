//! Synthetic gamepad state for the emulated controllers.

use glam::{Quat, Vec3};
use specter_protocol::ControllerDefinition;

/// Gamepad mapping reported for every emulated controller.
pub const XR_STANDARD_MAPPING: &str = "xr-standard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Slot 0 is the right hand (pointer on AR devices); every other slot is
    /// treated as left.
    pub fn from_slot(index: usize) -> Self {
        if index == 0 {
            Self::Right
        } else {
            Self::Left
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadButton {
    pub pressed: bool,
    pub touched: bool,
    /// Analog value in `0.0..=1.0`; mirrors `pressed` for digital buttons.
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadPose {
    /// Whether the controller is position-tracked (6DoF). 3DoF controllers
    /// report orientation only and never produce grip poses.
    pub has_position: bool,
    pub position: Vec3,
    pub orientation: Quat,
}

/// One emulated controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Gamepad {
    pub id: String,
    pub hand: Hand,
    pub pose: GamepadPose,
    pub buttons: Vec<GamepadButton>,
    pub axes: [f32; 2],
    pub mapping: &'static str,
}

impl Gamepad {
    pub fn new(definition: &ControllerDefinition, hand: Hand) -> Self {
        Self {
            id: definition.id.clone(),
            hand,
            pose: GamepadPose {
                has_position: definition.has_position,
                position: Vec3::ZERO,
                orientation: Quat::IDENTITY,
            },
            buttons: vec![GamepadButton::default(); definition.button_count],
            axes: [0.0, 0.0],
            mapping: XR_STANDARD_MAPPING,
        }
    }

    pub fn button_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).is_some_and(|b| b.pressed)
    }
}
