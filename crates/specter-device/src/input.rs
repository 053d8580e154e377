//! Input-source adapters: the host-runtime-facing shape of a gamepad.

use specter_protocol::ControllerDefinition;

use crate::gamepad::{Gamepad, Hand};

/// How the input's target ray is produced, per the WebXR input model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRayMode {
    Gaze,
    TrackedPointer,
    /// Transient screen-space input; forced for the AR pointer.
    Screen,
}

impl TargetRayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gaze => "gaze",
            Self::TrackedPointer => "tracked-pointer",
            Self::Screen => "screen",
        }
    }
}

/// Which pose a host-runtime input query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPoseType {
    TargetRay,
    Grip,
}

/// Wraps one gamepad slot into the polymorphic input-source shape the host
/// runtime consumes, and carries the edge-detection state for the primary
/// and squeeze actions across frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSourceAdapter {
    /// Whether this input is currently exposed to the host runtime. Driven
    /// by touch state instead of a button on the AR pointer.
    pub active: bool,
    pub target_ray_mode: TargetRayMode,
    pub primary_button_index: Option<usize>,
    pub primary_squeeze_button_index: Option<usize>,
    /// Primary-button state as of the last completed frame. Committed at
    /// frame end, after any deferred select-start has gone out.
    pub primary_action_pressed: bool,
    /// Squeeze-button state as of the last edge-detection pass. Committed
    /// at frame start, in the same pass that fires squeeze events.
    pub primary_squeeze_action_pressed: bool,
}

impl InputSourceAdapter {
    pub fn new(definition: &ControllerDefinition) -> Self {
        Self {
            active: true,
            target_ray_mode: TargetRayMode::TrackedPointer,
            primary_button_index: definition.primary_button_index,
            primary_squeeze_button_index: definition.primary_squeeze_button_index,
            primary_action_pressed: false,
            primary_squeeze_action_pressed: false,
        }
    }

    /// Current primary-button state on the paired gamepad; `None` when the
    /// adapter has no primary action configured.
    pub fn primary_pressed(&self, gamepad: &Gamepad) -> Option<bool> {
        self.primary_button_index.map(|i| gamepad.button_pressed(i))
    }

    pub fn squeeze_pressed(&self, gamepad: &Gamepad) -> Option<bool> {
        self.primary_squeeze_button_index
            .map(|i| gamepad.button_pressed(i))
    }
}

/// Snapshot of an exposed input source, returned by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSourceDescriptor {
    /// Gamepad slot index; pass back to pose queries.
    pub index: usize,
    pub hand: Hand,
    pub target_ray_mode: TargetRayMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition(primary: Option<usize>, squeeze: Option<usize>) -> ControllerDefinition {
        ControllerDefinition {
            id: String::new(),
            has_position: false,
            button_count: 3,
            primary_button_index: primary,
            primary_squeeze_button_index: squeeze,
        }
    }

    #[test]
    fn adapter_starts_inactive_edges() {
        let adapter = InputSourceAdapter::new(&sample_definition(Some(0), Some(1)));
        assert!(!adapter.primary_action_pressed);
        assert!(!adapter.primary_squeeze_action_pressed);
        assert_eq!(adapter.target_ray_mode, TargetRayMode::TrackedPointer);
    }

    #[test]
    fn pressed_queries_track_the_gamepad() {
        let definition = sample_definition(Some(0), None);
        let adapter = InputSourceAdapter::new(&definition);
        let mut gamepad = Gamepad::new(&definition, Hand::Right);
        assert_eq!(adapter.primary_pressed(&gamepad), Some(false));
        gamepad.buttons[0].pressed = true;
        assert_eq!(adapter.primary_pressed(&gamepad), Some(true));
        assert_eq!(adapter.squeeze_pressed(&gamepad), None);
    }

    #[test]
    fn out_of_range_primary_index_reads_unpressed() {
        let definition = sample_definition(Some(9), None);
        let adapter = InputSourceAdapter::new(&definition);
        let gamepad = Gamepad::new(&definition, Hand::Right);
        assert_eq!(adapter.primary_pressed(&gamepad), Some(false));
    }
}
