use bytes::Bytes;
use glam::{Quat, Vec3};

use crate::surface::SurfaceSize;
use crate::SceneResult;

/// Notification raised by the scene renderer for the device core.
///
/// The scene's UI layer (orbit controls, drag handles) moves the camera and
/// tablet and raises panel touches; the core owns what those mean for
/// controller poses and input events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneNotification {
    /// The virtual touch panel was touched at a world-space point.
    Touch { point: Vec3 },
    /// The touch was lifted.
    Release,
    CameraPose { position: Vec3, orientation: Quat },
    TabletPose { position: Vec3, orientation: Quat },
}

/// A single ray intersection against scene geometry.
///
/// Only the intersection point is reported; surface orientation is not
/// captured by the renderer contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub point: Vec3,
}

/// The AR virtual-room renderer.
///
/// The device core drives this synchronously from command handlers and frame
/// hooks; implementations must not assume any other calling context. One
/// scene instance lives for the whole device lifetime and is re-injected on
/// every AR session entry.
pub trait ArScene {
    /// Add the scene to the render graph.
    fn inject(&mut self);
    /// Remove the scene from the render graph, keeping loaded assets.
    fn eject(&mut self);

    /// Bind the session's canvas as the scene render target.
    fn attach_render_target(&mut self, size: SurfaceSize);
    fn detach_render_target(&mut self);

    /// Load the virtual-room asset delivered by the relay.
    fn load_virtual_room_asset(&mut self, asset: Bytes) -> SceneResult<()>;

    fn update_camera_transform(&mut self, position: Vec3, orientation: Quat);
    fn update_pointer_transform(&mut self, position: Vec3, orientation: Quat);
    fn update_tablet_transform(&mut self, position: Vec3, orientation: Quat);

    /// The core recognized a panel touch gesture this frame.
    fn touch_started(&mut self);
    fn touch_finished(&mut self);

    /// Intersect a world-space ray with the scene geometry, nearest first.
    fn ray_hit_test(&self, origin: Vec3, direction: Vec3) -> Vec<SceneHit>;
}
