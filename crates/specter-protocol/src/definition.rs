use serde::{Deserialize, Serialize};

/// WebXR session mode. The serialized form matches the mode strings a web
/// application passes to `navigator.xr.requestSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Inline,
    ImmersiveVr,
    ImmersiveAr,
}

impl SessionMode {
    pub fn is_immersive(self) -> bool {
        matches!(self, Self::ImmersiveVr | Self::ImmersiveAr)
    }

    pub fn is_vr(self) -> bool {
        self == Self::ImmersiveVr
    }

    pub fn is_ar(self) -> bool {
        self == Self::ImmersiveAr
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::ImmersiveVr => "immersive-vr",
            Self::ImmersiveAr => "immersive-ar",
        }
    }
}

/// Which controller slot a message addresses.
///
/// Slot 0 is always the right hand; on AR devices it doubles as the pointer.
/// Slot 1 is the left hand, which an AR device treats as the tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerRole {
    Right,
    Left,
}

impl ControllerRole {
    /// Gamepad slot index for this role.
    pub fn index(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Right),
            1 => Some(Self::Left),
            _ => None,
        }
    }
}

/// Render-target size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Physical size of the emulated handheld device, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSize {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl DeviceSize {
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// One controller slot in a device definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerDefinition {
    #[serde(default)]
    pub id: String,
    /// Whether the controller reports a tracked position (6DoF vs 3DoF).
    #[serde(default)]
    pub has_position: bool,
    #[serde(default)]
    pub button_count: usize,
    /// Button slot that drives the select action. Defaults to the first
    /// button; `None` disables select for this controller.
    #[serde(default = "default_primary_button_index")]
    pub primary_button_index: Option<usize>,
    /// Button slot that drives the squeeze action. Absent on most handhelds.
    #[serde(default)]
    pub primary_squeeze_button_index: Option<usize>,
}

fn default_primary_button_index() -> Option<usize> {
    Some(0)
}

/// Full device configuration, replacing whatever the device was before.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDefinition {
    #[serde(default = "default_modes")]
    pub modes: Vec<SessionMode>,
    /// Reference-space feature descriptors the device explicitly supports,
    /// kept as raw strings to stay permissive with evolving runtimes.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub size: Option<DeviceSize>,
    #[serde(default)]
    pub controllers: Vec<ControllerDefinition>,
}

fn default_modes() -> Vec<SessionMode> {
    vec![SessionMode::Inline]
}

impl Default for DeviceDefinition {
    fn default() -> Self {
        Self {
            modes: default_modes(),
            features: Vec::new(),
            resolution: None,
            size: None,
            controllers: Vec::new(),
        }
    }
}

impl DeviceDefinition {
    /// A device supports at most one of VR and AR; AR wins if both are listed.
    pub fn is_ar_device(&self) -> bool {
        self.modes.contains(&SessionMode::ImmersiveAr)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution.unwrap_or(crate::DEFAULT_AR_RESOLUTION)
    }

    pub fn size(&self) -> DeviceSize {
        self.size.unwrap_or(crate::DEFAULT_DEVICE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_mode_strings_match_webxr() {
        assert_eq!(
            serde_json::to_string(&SessionMode::ImmersiveAr).unwrap(),
            "\"immersive-ar\""
        );
        assert_eq!(SessionMode::ImmersiveVr.as_str(), "immersive-vr");
        assert!(SessionMode::ImmersiveVr.is_immersive());
        assert!(!SessionMode::Inline.is_immersive());
    }

    #[test]
    fn controller_role_index_roundtrip() {
        assert_eq!(ControllerRole::Right.index(), 0);
        assert_eq!(ControllerRole::Left.index(), 1);
        assert_eq!(ControllerRole::from_index(0), Some(ControllerRole::Right));
        assert_eq!(ControllerRole::from_index(2), None);
    }

    #[test]
    fn minimal_definition_fills_defaults() {
        let def: DeviceDefinition = serde_json::from_str("{}").unwrap();
        assert_eq!(def.modes, vec![SessionMode::Inline]);
        assert!(def.controllers.is_empty());
        assert_eq!(def.resolution().width, 1024);
        assert_eq!(def.size().depth, 0.005);
    }

    #[test]
    fn controller_definition_defaults() {
        let def: ControllerDefinition =
            serde_json::from_str(r#"{"id": "oculus-touch", "buttonCount": 7}"#).unwrap();
        assert_eq!(def.primary_button_index, Some(0));
        assert_eq!(def.primary_squeeze_button_index, None);
        assert!(!def.has_position);
    }
}
