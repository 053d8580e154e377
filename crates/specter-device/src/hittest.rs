//! Standing hit-test sources for AR sessions.

use std::cell::Cell;
use std::fmt;

use glam::{Mat4, Vec3};

use crate::session::SessionId;

/// A ray in the coordinates of the source's reference space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }
}

impl Default for Ray {
    /// Forward along -Z from the space origin, the WebXR `XRRay` default.
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}

/// Internal identity of a hit-test source, used to key per-frame results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTestSourceId(pub(crate) u64);

impl fmt::Display for HitTestSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A standing request to intersect a ray against AR scene geometry on every
/// frame of its owning session.
///
/// The host runtime owns the source (via `Rc`); the device only keeps a
/// reference in its active list. Cancelling is a one-way flag: the device
/// drops the source from consideration permanently the next time it looks.
/// The owning reference space's base transform is pushed in by the host
/// runtime whenever the space resolves; frames skip sources whose space has
/// no transform yet.
pub struct HitTestSource {
    id: HitTestSourceId,
    session: SessionId,
    offset_ray: Ray,
    active: Cell<bool>,
    base_transform: Cell<Option<Mat4>>,
}

impl HitTestSource {
    pub(crate) fn new(id: HitTestSourceId, session: SessionId, offset_ray: Ray) -> Self {
        Self {
            id,
            session,
            offset_ray,
            active: Cell::new(true),
            base_transform: Cell::new(None),
        }
    }

    pub(crate) fn id(&self) -> HitTestSourceId {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn offset_ray(&self) -> Ray {
        self.offset_ray
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop producing results. Irreversible.
    pub fn cancel(&self) {
        self.active.set(false);
    }

    pub fn set_base_transform(&self, transform: Mat4) {
        self.base_transform.set(Some(transform));
    }

    pub fn clear_base_transform(&self) {
        self.base_transform.set(None);
    }

    pub fn base_transform(&self) -> Option<Mat4> {
        self.base_transform.get()
    }
}
