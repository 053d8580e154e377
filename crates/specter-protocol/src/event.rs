use serde::{Deserialize, Serialize};

use crate::definition::ControllerRole;

/// Outbound notification for control-panel observers.
///
/// Fire-and-forget: the device never waits for acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    HeadsetPoseChanged {
        position: [f32; 3],
        orientation: [f32; 4],
    },
    ControllerPoseChanged {
        role: ControllerRole,
        position: [f32; 3],
        orientation: [f32; 4],
    },
    EnteredImmersive,
    LeftImmersive,
    /// The device needs the virtual-room asset for its AR scene. Answered
    /// with [`Command::DeliverVirtualRoomAsset`](crate::Command).
    VirtualRoomAssetRequested,
}

/// Observer for device events, injected at device construction.
///
/// The device core is single-threaded; implementations are called
/// synchronously from command handlers and frame hooks.
pub trait EventSink {
    fn emit(&self, event: Event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape() {
        let event = Event::ControllerPoseChanged {
            role: ControllerRole::Left,
            position: [0.1, 1.0, -0.2],
            orientation: [0.0, 0.0, 0.0, 1.0],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "controller-pose-changed");
        assert_eq!(json["role"], "left");
    }

    #[test]
    fn unit_events_carry_no_payload() {
        assert_eq!(
            serde_json::to_string(&Event::EnteredImmersive).unwrap(),
            r#"{"type":"entered-immersive"}"#
        );
    }
}
