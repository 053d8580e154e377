//! Session value objects and the registry that owns their identity.

use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_2;
use std::fmt;

use specter_protocol::SessionMode;
use specter_scene::RenderSurface;

/// Identity of a session. Ids are handed out by [`SessionRegistry`],
/// strictly increasing, and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One requested session and its runtime state.
pub struct Session {
    pub id: SessionId,
    pub mode: SessionMode,
    /// Reference-space descriptors granted at creation. Immutable afterwards.
    pub enabled_features: HashSet<String>,
    pub base_layer: Option<Box<dyn RenderSurface>>,
    /// Vertical field of view used for inline projection, radians.
    pub inline_vertical_fov: f32,
    pub ended: bool,
    /// Whether the device pulled this session's canvas into the
    /// presentation overlay (and therefore owes an exit on teardown).
    pub overlay_entered: bool,
}

impl Session {
    fn new(id: SessionId, mode: SessionMode, enabled_features: HashSet<String>) -> Self {
        Self {
            id,
            mode,
            enabled_features,
            base_layer: None,
            inline_vertical_fov: FRAC_PI_2,
            ended: false,
            overlay_entered: false,
        }
    }

    pub fn supports_reference_space(&self, descriptor: &str) -> bool {
        !self.ended && self.enabled_features.contains(descriptor)
    }
}

/// Owns all sessions ever created on a device and the id counter.
///
/// Ended sessions stay registered: the emulator trades memory for the
/// guarantee that an id observed once stays resolvable forever.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    last_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> SessionId {
        self.last_id += 1;
        SessionId(self.last_id)
    }

    pub fn create(
        &mut self,
        mode: SessionMode,
        enabled_features: impl IntoIterator<Item = impl Into<String>>,
    ) -> SessionId {
        let id = self.next_id();
        let features = enabled_features.into_iter().map(Into::into).collect();
        self.sessions.insert(id, Session::new(id, mode, features));
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }
}
