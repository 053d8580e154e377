use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::definition::{ControllerRole, DeviceDefinition};

/// Inbound message from the control panel relay.
///
/// Every command is applied synchronously and is safe to replay: updates are
/// idempotent and button transitions are edge-triggered on the device side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Replace the whole device definition. Controller teardown is deferred
    /// by the device so in-flight release events can drain first.
    ReplaceDevice { definition: DeviceDefinition },
    /// Move the headset. Orientation is an `[x, y, z, w]` unit quaternion.
    UpdateHeadsetPose {
        position: [f32; 3],
        orientation: [f32; 4],
    },
    UpdateControllerPose {
        role: ControllerRole,
        position: [f32; 3],
        orientation: [f32; 4],
    },
    UpdateControllerButton {
        role: ControllerRole,
        button_index: usize,
        pressed: bool,
    },
    SetStereoEffect { enabled: bool },
    /// Raw bytes of the virtual-room asset the device asked for via
    /// [`Event::VirtualRoomAssetRequested`](crate::Event).
    DeliverVirtualRoomAsset { asset: Bytes },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_shape_is_tagged() {
        let cmd = Command::UpdateControllerButton {
            role: ControllerRole::Right,
            button_index: 1,
            pressed: true,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "update-controller-button");
        assert_eq!(json["role"], "right");
        assert_eq!(json["pressed"], true);
    }

    #[test]
    fn replace_device_roundtrip() {
        let json = r#"{
            "type": "replace-device",
            "definition": {
                "modes": ["immersive-ar"],
                "controllers": [
                    {"id": "pointer", "buttonCount": 1},
                    {"id": "tablet", "buttonCount": 1, "hasPosition": true}
                ]
            }
        }"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        match cmd {
            Command::ReplaceDevice { definition } => {
                assert!(definition.is_ar_device());
                assert_eq!(definition.controllers.len(), 2);
                assert!(definition.controllers[1].has_position);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn stereo_effect_roundtrip() {
        let cmd: Command =
            serde_json::from_str(r#"{"type": "set-stereo-effect", "enabled": false}"#).unwrap();
        assert!(matches!(cmd, Command::SetStereoEffect { enabled: false }));
    }
}
