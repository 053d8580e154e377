//! The emulated device: session contract, command handling, and the
//! per-frame pose/projection pipeline.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3, Vec4};
use tracing::{debug, warn};

use specter_protocol::{
    Command, ControllerDefinition, ControllerRole, DeviceDefinition, DeviceSize, Event, EventSink,
    Resolution, SessionMode, DEFAULT_HEADSET_POSITION,
};
use specter_scene::{ArScene, ClearMask, ClearState, RenderSurface, SceneNotification, SurfaceSize};

use crate::gamepad::{Gamepad, Hand};
use crate::hittest::{HitTestSource, HitTestSourceId, Ray};
use crate::input::{InputPoseType, InputSourceAdapter, InputSourceDescriptor, TargetRayMode};
use crate::math::{self, EYE_OFFSET_X};
use crate::session::{SessionId, SessionRegistry};
use crate::{DeviceError, DeviceResult};

/// Frame ticks between disarming buttons and rebuilding controllers on a
/// definition replace. The host runtime needs a full frame to observe the
/// forced release before the old input sources disappear; collapsing this
/// breaks select-end delivery.
const RECONFIG_DELAY_FRAMES: u8 = 2;

/// Depth band, in meters in front of the panel, inside which the pointer
/// counts as touching.
const TOUCH_DEPTH_MAX: f32 = 0.01;

/// Bezel width around the interactive area of the AR panel, meters.
const PANEL_FRAME_WIDTH: f32 = 0.005;

/// Near distance used when deriving the AR screen-space ray.
const SCREEN_RAY_NEAR: f32 = 0.1;

/// Which view of a stereo pair an accessor addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    None,
    Left,
    Right,
}

/// Render-target region for one eye, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-frame state the host runtime hands to `on_frame_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub depth_near: f32,
    pub depth_far: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_near: 0.1,
            depth_far: 1000.0,
        }
    }
}

/// Notification for the host runtime (the polyfill layer driving this
/// device), dispatched synchronously from session and frame handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    PresentationStarted { session: SessionId },
    PresentationEnded { session: SessionId },
    SelectStart { session: SessionId, controller: usize },
    SelectEnd { session: SessionId, controller: usize },
    SqueezeStart { session: SessionId, controller: usize },
    SqueezeEnd { session: SessionId, controller: usize },
}

/// Host-runtime observer, injected at device construction.
pub trait RuntimeSink {
    fn dispatch(&self, event: RuntimeEvent);
}

/// Builds the AR scene on first use. The renderer is an external
/// collaborator, so the embedding decides what actually gets constructed.
pub type SceneFactory = Box<dyn FnMut(DeviceSize) -> Box<dyn ArScene>>;

#[derive(Debug, Clone)]
struct PendingReconfig {
    frames_remaining: u8,
    controllers: Vec<ControllerDefinition>,
}

/// The emulated XR device.
///
/// Owns all synthetic hardware state and serves the host runtime's
/// per-frame queries. Single-threaded by design: every entry point mutates
/// synchronously and returns.
pub struct EmulatedXrDevice {
    modes: Vec<SessionMode>,
    features: Vec<String>,
    ar_device: bool,
    resolution: Resolution,
    device_size: DeviceSize,

    // Headset pose and the matrices derived from it each frame.
    position: Vec3,
    orientation: Quat,
    scale: Vec3,
    matrix: Mat4,
    view: Mat4,
    left_view: Mat4,
    right_view: Mat4,
    projection: Mat4,
    left_projection: Mat4,
    right_projection: Mat4,

    stereo_effect: bool,

    sessions: SessionRegistry,

    // Always index-aligned.
    gamepads: Vec<Gamepad>,
    input_sources: Vec<InputSourceAdapter>,

    // AR state. One scene per device lifetime, re-injected on AR re-entry.
    ar_scene: Option<Box<dyn ArScene>>,
    scene_factory: SceneFactory,
    touched: bool,
    pointer_on_panel: bool,
    raw_canvas_size: SurfaceSize,

    hit_test_sources: Vec<Rc<HitTestSource>>,
    hit_test_results: HashMap<HitTestSourceId, Vec<Mat4>>,
    next_hit_test_source_id: u64,

    pending_reconfig: Option<PendingReconfig>,

    event_sink: Rc<dyn EventSink>,
    runtime_sink: Rc<dyn RuntimeSink>,
}

impl EmulatedXrDevice {
    pub fn new(
        definition: DeviceDefinition,
        event_sink: Rc<dyn EventSink>,
        runtime_sink: Rc<dyn RuntimeSink>,
        scene_factory: SceneFactory,
    ) -> Self {
        let mut device = Self {
            modes: definition.modes.clone(),
            features: definition.features.clone(),
            ar_device: definition.is_ar_device(),
            resolution: definition.resolution(),
            device_size: definition.size(),
            position: Vec3::from_array(DEFAULT_HEADSET_POSITION),
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            matrix: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            left_view: Mat4::IDENTITY,
            right_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            left_projection: Mat4::IDENTITY,
            right_projection: Mat4::IDENTITY,
            stereo_effect: true,
            sessions: SessionRegistry::new(),
            gamepads: Vec::new(),
            input_sources: Vec::new(),
            ar_scene: None,
            scene_factory,
            touched: false,
            pointer_on_panel: false,
            raw_canvas_size: SurfaceSize::default(),
            hit_test_sources: Vec::new(),
            hit_test_results: HashMap::new(),
            next_hit_test_source_id: 0,
            pending_reconfig: None,
            event_sink,
            runtime_sink,
        };
        device.rebuild_controllers(&definition.controllers);
        device
    }

    // ---- Session & capability contract ----

    pub fn is_session_supported(&self, mode: SessionMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Explicitly configured descriptors win; otherwise the baseline spaces
    /// are supported and everything else, known or not, is not.
    pub fn is_feature_supported(&self, descriptor: &str) -> bool {
        if self.features.iter().any(|f| f == descriptor) {
            return true;
        }
        match descriptor {
            "viewer" | "local" | "local-floor" => true,
            "bounded-floor" | "unbounded" => false,
            other => {
                debug!(feature = other, "unrecognized feature descriptor");
                false
            }
        }
    }

    pub fn request_session(
        &mut self,
        mode: SessionMode,
        enabled_features: impl IntoIterator<Item = impl Into<String>>,
    ) -> DeviceResult<SessionId> {
        if !self.is_session_supported(mode) {
            return Err(DeviceError::UnsupportedMode(mode));
        }
        let id = self.sessions.create(mode, enabled_features);
        if mode.is_ar() {
            if self.ar_scene.is_none() {
                self.ar_scene = Some((self.scene_factory)(self.device_size));
                self.event_sink.emit(Event::VirtualRoomAssetRequested);
            }
            if let Some(scene) = self.ar_scene.as_mut() {
                scene.inject();
            }
        }
        if mode.is_immersive() {
            self.runtime_sink
                .dispatch(RuntimeEvent::PresentationStarted { session: id });
            self.event_sink.emit(Event::EnteredImmersive);
        }
        debug!(session = %id, mode = mode.as_str(), "session created");
        Ok(id)
    }

    pub fn end_session(&mut self, id: SessionId) {
        let raw_canvas_size = self.raw_canvas_size;
        let Some(session) = self.sessions.get_mut(id) else {
            warn!(session = %id, "end for unknown session");
            return;
        };
        if session.mode.is_immersive() {
            if session.overlay_entered {
                if let Some(layer) = session.base_layer.as_mut() {
                    layer.exit_overlay();
                }
                session.overlay_entered = false;
            }
            if session.mode.is_ar() {
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.eject();
                    scene.detach_render_target();
                }
                if let Some(layer) = session.base_layer.as_mut() {
                    layer.set_size(raw_canvas_size);
                }
            }
            self.runtime_sink
                .dispatch(RuntimeEvent::PresentationEnded { session: id });
            self.event_sink.emit(Event::LeftImmersive);
        }
        session.ended = true;
        debug!(session = %id, "session ended");
    }

    pub fn does_session_support_reference_space(&self, id: SessionId, descriptor: &str) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|session| session.supports_reference_space(descriptor))
    }

    /// Transform from the device-native frame into the named reference
    /// space. Viewer and local spaces sit at the default headset height;
    /// the floor-aligned spaces coincide with the native frame.
    pub fn reference_space_transform(&self, descriptor: &str) -> Mat4 {
        match descriptor {
            "viewer" | "local" => {
                Mat4::from_translation(Vec3::new(0.0, -DEFAULT_HEADSET_POSITION[1], 0.0))
            }
            _ => Mat4::IDENTITY,
        }
    }

    pub fn on_base_layer_set(&mut self, id: SessionId, mut surface: Box<dyn RenderSurface>) {
        let resolution = self.resolution;
        let Some(session) = self.sessions.get_mut(id) else {
            warn!(session = %id, "base layer for unknown session");
            return;
        };
        if session.mode.is_immersive() {
            if session.overlay_entered {
                if let Some(old) = session.base_layer.as_mut() {
                    old.exit_overlay();
                }
                session.overlay_entered = false;
            }
            session.overlay_entered = surface.enter_overlay();
        }
        if session.mode.is_ar() {
            self.raw_canvas_size = surface.size();
            let target = SurfaceSize::new(resolution.width, resolution.height);
            surface.set_size(target);
            if let Some(scene) = self.ar_scene.as_mut() {
                scene.attach_render_target(target);
            }
        }
        session.base_layer = Some(surface);
    }

    pub fn set_inline_vertical_fov(&mut self, id: SessionId, radians: f32) {
        match self.sessions.get_mut(id) {
            Some(session) => session.inline_vertical_fov = radians,
            None => warn!(session = %id, "inline FOV update for unknown session"),
        }
    }

    /// Interface completeness: viewports and projections read the canvas
    /// every frame, so a resize needs no recomputation here.
    pub fn on_window_resize(&mut self) {}

    // ---- Command & scene-notification channels ----

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::ReplaceDevice { definition } => self.replace_device(definition),
            Command::UpdateHeadsetPose {
                position,
                orientation,
            } => {
                let position = Vec3::from_array(position);
                let orientation = Quat::from_array(orientation);
                if self.ar_device {
                    // The headset is the AR scene camera; without a scene
                    // there is nothing to move yet.
                    if let Some(scene) = self.ar_scene.as_mut() {
                        self.position = position;
                        self.orientation = orientation;
                        scene.update_camera_transform(position, orientation);
                    }
                } else {
                    self.position = position;
                    self.orientation = orientation;
                }
            }
            Command::UpdateControllerPose {
                role,
                position,
                orientation,
            } => {
                let position = Vec3::from_array(position);
                let orientation = Quat::from_array(orientation);
                let Some(gamepad) = self.gamepads.get_mut(role.index()) else {
                    warn!(?role, "pose update for unconfigured controller");
                    return;
                };
                gamepad.pose.position = position;
                gamepad.pose.orientation = orientation;
                if self.ar_device {
                    if let Some(scene) = self.ar_scene.as_mut() {
                        match role {
                            ControllerRole::Right => {
                                scene.update_pointer_transform(position, orientation)
                            }
                            ControllerRole::Left => {
                                scene.update_tablet_transform(position, orientation)
                            }
                        }
                    }
                }
            }
            Command::UpdateControllerButton {
                role,
                button_index,
                pressed,
            } => {
                // AR devices synthesize the primary action from the touch
                // gesture; panel button messages do not apply.
                if self.ar_device {
                    debug!(?role, "button update ignored on AR device");
                    return;
                }
                self.set_button_pressed(role.index(), button_index, pressed);
            }
            Command::SetStereoEffect { enabled } => {
                self.stereo_effect = enabled;
            }
            Command::DeliverVirtualRoomAsset { asset } => match self.ar_scene.as_mut() {
                Some(scene) => {
                    if let Err(err) = scene.load_virtual_room_asset(asset) {
                        warn!(error = %err, "virtual room asset load failed");
                    }
                }
                None => warn!("virtual room asset delivered before any AR session"),
            },
        }
    }

    pub fn apply_scene_notification(&mut self, notification: SceneNotification) {
        match notification {
            SceneNotification::Touch { point } => {
                self.touched = true;
                let Some(gamepad) = self.gamepads.get_mut(0) else {
                    warn!("panel touch without a pointer controller");
                    return;
                };
                gamepad.pose.position = point;
                let pose = gamepad.pose;
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.update_pointer_transform(pose.position, pose.orientation);
                }
                self.emit_controller_pose(0);
            }
            SceneNotification::Release => {
                self.touched = false;
            }
            SceneNotification::CameraPose {
                position,
                orientation,
            } => {
                self.position = position;
                self.orientation = orientation;
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.update_camera_transform(position, orientation);
                }
                self.event_sink.emit(Event::HeadsetPoseChanged {
                    position: position.to_array(),
                    orientation: orientation.to_array(),
                });
            }
            SceneNotification::TabletPose {
                position,
                orientation,
            } => {
                let Some(gamepad) = self.gamepads.get_mut(1) else {
                    warn!("tablet pose without a tablet controller");
                    return;
                };
                gamepad.pose.position = position;
                gamepad.pose.orientation = orientation;
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.update_tablet_transform(position, orientation);
                }
                self.emit_controller_pose(1);
            }
        }
    }

    // ---- Frame pipeline ----

    pub fn on_frame_start(&mut self, session_id: SessionId, render_state: RenderState) {
        self.advance_pending_reconfig();

        let (mode, inline_fov, canvas_size) = {
            let Some(session) = self.sessions.get_mut(session_id) else {
                warn!(session = %session_id, "frame start for unknown session");
                return;
            };
            if session.mode.is_immersive() {
                if let Some(layer) = session.base_layer.as_mut() {
                    // Opaque framebuffer contract: immersive buffers begin
                    // every frame fully cleared, with the application's own
                    // clear parameters preserved around the forced clear.
                    let saved = layer.clear_state();
                    layer.set_clear_state(ClearState::default());
                    layer.clear(ClearMask::all());
                    layer.set_clear_state(saved);
                }
            }
            let size = session
                .base_layer
                .as_ref()
                .map(|layer| layer.size())
                .unwrap_or_default();
            (session.mode, session.inline_vertical_fov, size)
        };

        let near = render_state.depth_near;
        let far = render_state.depth_far;
        if mode.is_vr() {
            let half = if self.stereo_effect { 0.5 } else { 1.0 };
            let aspect = canvas_size.width as f32 * half / canvas_size.height as f32;
            let projection = Mat4::perspective_rh_gl(FRAC_PI_2, aspect, near, far);
            self.left_projection = projection;
            self.right_projection = projection;
        } else if mode.is_ar() {
            self.projection =
                Mat4::perspective_rh_gl(FRAC_PI_2, self.device_size.aspect(), near, far);
        } else {
            self.projection = Mat4::perspective_rh_gl(inline_fov, canvas_size.aspect(), near, far);
        }

        // AR renders through the tablet; everything else through the headset.
        self.matrix = if mode.is_ar() {
            match self.gamepads.get(ControllerRole::Left.index()) {
                Some(tablet) => {
                    math::model_matrix(tablet.pose.position, tablet.pose.orientation, self.scale)
                }
                None => {
                    warn!("AR frame without a tablet controller, using headset pose");
                    math::model_matrix(self.position, self.orientation, self.scale)
                }
            }
        } else {
            math::model_matrix(self.position, self.orientation, self.scale)
        };
        self.view = self.matrix.inverse();
        self.left_view = math::eye_view_matrix(self.matrix, -EYE_OFFSET_X);
        self.right_view = math::eye_view_matrix(self.matrix, EYE_OFFSET_X);

        if !mode.is_immersive() {
            return;
        }

        if self.ar_device {
            let touching = self.touched && self.pointer_within_panel();
            if touching && !self.pointer_on_panel {
                self.set_button_pressed(0, 0, true);
                self.pointer_on_panel = true;
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.touch_started();
                }
            } else if !touching && self.pointer_on_panel {
                self.set_button_pressed(0, 0, false);
                self.pointer_on_panel = false;
                if let Some(scene) = self.ar_scene.as_mut() {
                    scene.touch_finished();
                }
            }
        }

        for i in 0..self.input_sources.len() {
            if self.ar_device && i == 0 {
                // Transient screen input; the runtime has no way to learn
                // this from the gamepad itself.
                self.input_sources[i].target_ray_mode = TargetRayMode::Screen;
            }
            let primary = self
                .gamepads
                .get(i)
                .and_then(|g| self.input_sources[i].primary_pressed(g));
            if let Some(pressed) = primary {
                let was_pressed = self.input_sources[i].primary_action_pressed;
                if pressed && !was_pressed {
                    if self.ar_device {
                        // Becoming active must reach the runtime's
                        // input-sources-change pass before select-start, so
                        // the event itself waits until frame end.
                        self.input_sources[i].active = true;
                    } else {
                        self.runtime_sink.dispatch(RuntimeEvent::SelectStart {
                            session: session_id,
                            controller: i,
                        });
                    }
                } else if !pressed && was_pressed {
                    if self.ar_device {
                        self.input_sources[i].active = false;
                    }
                    self.runtime_sink.dispatch(RuntimeEvent::SelectEnd {
                        session: session_id,
                        controller: i,
                    });
                }
                // Primary edge state commits in on_frame_end.
            }
            let squeeze = self
                .gamepads
                .get(i)
                .and_then(|g| self.input_sources[i].squeeze_pressed(g));
            if let Some(pressed) = squeeze {
                let was_pressed = self.input_sources[i].primary_squeeze_action_pressed;
                if pressed && !was_pressed {
                    self.runtime_sink.dispatch(RuntimeEvent::SqueezeStart {
                        session: session_id,
                        controller: i,
                    });
                } else if !pressed && was_pressed {
                    self.runtime_sink.dispatch(RuntimeEvent::SqueezeEnd {
                        session: session_id,
                        controller: i,
                    });
                }
                self.input_sources[i].primary_squeeze_action_pressed = pressed;
            }
        }

        self.hit_test_sources.retain(|source| source.is_active());
        self.hit_test_results.clear();
        if let Some(scene) = self.ar_scene.as_ref() {
            for source in &self.hit_test_sources {
                if source.session() != session_id {
                    continue;
                }
                let Some(base) = source.base_transform() else {
                    continue;
                };
                let ray = source.offset_ray();
                let origin = base.transform_point3(ray.origin);
                let direction = math::rotate_direction(ray.direction, &base);
                let results = scene
                    .ray_hit_test(origin, direction)
                    .into_iter()
                    .map(|hit| Mat4::from_translation(hit.point))
                    .collect();
                self.hit_test_results.insert(source.id(), results);
            }
        }
    }

    pub fn on_frame_end(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.get(session_id) else {
            warn!(session = %session_id, "frame end for unknown session");
            return;
        };
        if !session.mode.is_immersive() {
            return;
        }
        for i in 0..self.input_sources.len() {
            let Some(pressed) = self
                .gamepads
                .get(i)
                .and_then(|g| self.input_sources[i].primary_pressed(g))
            else {
                continue;
            };
            if pressed && !self.input_sources[i].primary_action_pressed && self.ar_device {
                // Deferred from frame start; the input-sources-change pass
                // has run by now.
                self.runtime_sink.dispatch(RuntimeEvent::SelectStart {
                    session: session_id,
                    controller: i,
                });
            }
            self.input_sources[i].primary_action_pressed = pressed;
        }
    }

    // ---- Frame-state accessors ----

    pub fn projection_matrix(&self, eye: Eye) -> Mat4 {
        if self.ar_device || eye == Eye::None {
            self.projection
        } else if eye == Eye::Left {
            self.left_projection
        } else {
            self.right_projection
        }
    }

    pub fn base_pose_matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn base_view_matrix(&self, eye: Eye) -> Mat4 {
        if eye == Eye::None || self.ar_device || !self.stereo_effect {
            self.view
        } else if eye == Eye::Left {
            self.left_view
        } else {
            self.right_view
        }
    }

    pub fn viewport(&self, session_id: SessionId, eye: Eye) -> Option<Viewport> {
        let session = self.sessions.get(session_id)?;
        let size = session.base_layer.as_ref()?.size();
        if session.mode.is_ar() {
            // The runtime models every immersive session as two views; an
            // AR handheld draws both over the whole canvas.
            return Some(Viewport {
                x: 0,
                y: 0,
                width: size.width,
                height: size.height,
            });
        }
        let (x, width) = match eye {
            Eye::None => (0, size.width),
            Eye::Left if self.stereo_effect => (0, size.width / 2),
            Eye::Right if self.stereo_effect => (size.width / 2, size.width / 2),
            Eye::Left => (0, size.width),
            Eye::Right => (0, 0),
        };
        Some(Viewport {
            x,
            y: 0,
            width,
            height: size.height,
        })
    }

    /// Snapshot of the inputs currently exposed to the host runtime.
    pub fn input_sources(&self) -> Vec<InputSourceDescriptor> {
        self.input_sources
            .iter()
            .enumerate()
            .filter(|(_, adapter)| adapter.active)
            .map(|(index, adapter)| InputSourceDescriptor {
                index,
                hand: Hand::from_slot(index),
                target_ray_mode: adapter.target_ray_mode,
            })
            .collect()
    }

    /// Pose of one input in the given reference space. `space_transform`
    /// maps device-native coordinates into that space.
    pub fn input_pose(
        &self,
        index: usize,
        space_transform: Mat4,
        pose_type: InputPoseType,
    ) -> Option<Mat4> {
        let adapter = self.input_sources.get(index)?;
        let gamepad = self.gamepads.get(index)?;
        if pose_type == InputPoseType::Grip && !gamepad.pose.has_position {
            return None;
        }
        let native = math::pose_matrix(gamepad.pose.position, gamepad.pose.orientation);
        let pose_in_space = space_transform * native;
        if self.ar_device && index == 0 {
            if !adapter.active {
                return None;
            }
            return Some(self.ar_screen_ray_pose(space_transform, pose_in_space));
        }
        Some(pose_in_space)
    }

    pub fn gamepads(&self) -> &[Gamepad] {
        &self.gamepads
    }

    // ---- Hit testing ----

    pub fn register_hit_test_source(
        &mut self,
        session: SessionId,
        offset_ray: Ray,
    ) -> Rc<HitTestSource> {
        self.next_hit_test_source_id += 1;
        let source = Rc::new(HitTestSource::new(
            HitTestSourceId(self.next_hit_test_source_id),
            session,
            offset_ray,
        ));
        self.hit_test_sources.push(Rc::clone(&source));
        source
    }

    /// Results computed for this source on the current frame. The matrices
    /// carry translation only; hit orientation is not captured by the scene
    /// contract.
    pub fn hit_test_results(&self, source: &HitTestSource) -> &[Mat4] {
        self.hit_test_results
            .get(&source.id())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sources still under consideration, in registration order.
    pub fn active_hit_test_sources(&self) -> &[Rc<HitTestSource>] {
        &self.hit_test_sources
    }

    // ---- Internals ----

    fn replace_device(&mut self, definition: DeviceDefinition) {
        self.modes = definition.modes.clone();
        self.features = definition.features.clone();
        self.ar_device = definition.is_ar_device();
        self.resolution = definition.resolution();
        self.device_size = definition.size();

        // Disarm now so the release edges drain through the event pipeline
        // before the controllers they belong to are torn down.
        for i in 0..self.input_sources.len() {
            self.input_sources[i].active = !self.ar_device;
            let primary = self.input_sources[i].primary_button_index;
            let squeeze = self.input_sources[i].primary_squeeze_button_index;
            if let Some(gamepad) = self.gamepads.get_mut(i) {
                for index in [primary, squeeze].into_iter().flatten() {
                    if let Some(button) = gamepad.buttons.get_mut(index) {
                        button.pressed = false;
                    }
                }
            }
        }
        self.pending_reconfig = Some(PendingReconfig {
            frames_remaining: RECONFIG_DELAY_FRAMES,
            controllers: definition.controllers,
        });
        debug!(
            ar = self.ar_device,
            "device definition replaced, controller rebuild pending"
        );
    }

    fn advance_pending_reconfig(&mut self) {
        let Some(pending) = self.pending_reconfig.as_mut() else {
            return;
        };
        pending.frames_remaining -= 1;
        if pending.frames_remaining > 0 {
            return;
        }
        if let Some(pending) = self.pending_reconfig.take() {
            debug!(
                controllers = pending.controllers.len(),
                "rebuilding controllers"
            );
            self.rebuild_controllers(&pending.controllers);
        }
    }

    fn rebuild_controllers(&mut self, definitions: &[ControllerDefinition]) {
        self.gamepads.clear();
        self.input_sources.clear();
        for (index, definition) in definitions.iter().enumerate() {
            self.gamepads
                .push(Gamepad::new(definition, Hand::from_slot(index)));
            let mut adapter = InputSourceAdapter::new(definition);
            // AR inputs are transient: they surface only while touching.
            adapter.active = !self.ar_device;
            if self.ar_device && index == 0 {
                adapter.target_ray_mode = TargetRayMode::Screen;
            }
            self.input_sources.push(adapter);
        }
    }

    fn set_button_pressed(&mut self, controller_index: usize, button_index: usize, pressed: bool) {
        let Some(gamepad) = self.gamepads.get_mut(controller_index) else {
            warn!(controller_index, "button update for unconfigured controller");
            return;
        };
        let Some(button) = gamepad.buttons.get_mut(button_index) else {
            warn!(controller_index, button_index, "button index out of range");
            return;
        };
        button.pressed = pressed;
        button.value = if pressed { 1.0 } else { 0.0 };
    }

    /// Is the pointer within the panel's interactive bounds, in head-view
    /// space? dx/dy are normalized against the panel half-extents; dz is an
    /// absolute depth band in front of the panel. All bounds inclusive.
    fn pointer_within_panel(&self) -> bool {
        let Some(pointer) = self.gamepads.first() else {
            return false;
        };
        let pose = math::pose_matrix(pointer.pose.position, pointer.pose.orientation);
        let in_view = self.view * pose;
        let dx = in_view.w_axis.x / (self.device_size.width * 0.5);
        let dy = in_view.w_axis.y / (self.device_size.height * 0.5);
        let dz = in_view.w_axis.z;
        (-1.0..=1.0).contains(&dx)
            && (-1.0..=1.0).contains(&dy)
            && (0.0..=TOUCH_DEPTH_MAX).contains(&dz)
    }

    /// Re-derive the AR pointer pose as a screen-space ray: the pointer's
    /// offset across the panel becomes a rotation away from the view axis,
    /// anchored just in front of the head.
    fn ar_screen_ray_pose(&self, space_transform: Mat4, pose_in_space: Mat4) -> Mat4 {
        let head_in_space = space_transform * self.view.inverse();
        let pose_in_view = head_in_space.inverse() * pose_in_space;
        let aspect = self.device_size.aspect();
        let dx = pose_in_view.w_axis.x / ((self.device_size.width - PANEL_FRAME_WIDTH) * 0.5)
            * aspect;
        let dy = pose_in_view.w_axis.y / ((self.device_size.height - PANEL_FRAME_WIDTH) * 0.5);
        let rotation = Quat::from_rotation_y(-dx * FRAC_PI_4) * Quat::from_rotation_x(dy * FRAC_PI_4);
        let mut ray = Mat4::from_quat(rotation);
        ray.w_axis = Vec4::new(dx * SCREEN_RAY_NEAR, dy * SCREEN_RAY_NEAR, -SCREEN_RAY_NEAR, 1.0);
        head_in_space * ray
    }

    fn emit_controller_pose(&self, index: usize) {
        let Some(role) = ControllerRole::from_index(index) else {
            return;
        };
        let Some(gamepad) = self.gamepads.get(index) else {
            return;
        };
        self.event_sink.emit(Event::ControllerPoseChanged {
            role,
            position: gamepad.pose.position.to_array(),
            orientation: gamepad.pose.orientation.to_array(),
        });
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use specter_scene::{SceneHit, SceneResult};

    use super::*;

    struct NullEvents;

    impl EventSink for NullEvents {
        fn emit(&self, _event: Event) {}
    }

    struct NullRuntime;

    impl RuntimeSink for NullRuntime {
        fn dispatch(&self, _event: RuntimeEvent) {}
    }

    struct NullScene;

    impl ArScene for NullScene {
        fn inject(&mut self) {}
        fn eject(&mut self) {}
        fn attach_render_target(&mut self, _size: SurfaceSize) {}
        fn detach_render_target(&mut self) {}
        fn load_virtual_room_asset(&mut self, _asset: Bytes) -> SceneResult<()> {
            Ok(())
        }
        fn update_camera_transform(&mut self, _position: Vec3, _orientation: Quat) {}
        fn update_pointer_transform(&mut self, _position: Vec3, _orientation: Quat) {}
        fn update_tablet_transform(&mut self, _position: Vec3, _orientation: Quat) {}
        fn touch_started(&mut self) {}
        fn touch_finished(&mut self) {}
        fn ray_hit_test(&self, _origin: Vec3, _direction: Vec3) -> Vec<SceneHit> {
            Vec::new()
        }
    }

    struct FakeSurface {
        size: SurfaceSize,
        clear_state: ClearState,
    }

    impl FakeSurface {
        fn boxed(width: u32, height: u32) -> Box<dyn RenderSurface> {
            Box::new(Self {
                size: SurfaceSize::new(width, height),
                clear_state: ClearState::default(),
            })
        }
    }

    impl RenderSurface for FakeSurface {
        fn size(&self) -> SurfaceSize {
            self.size
        }
        fn set_size(&mut self, size: SurfaceSize) {
            self.size = size;
        }
        fn clear_state(&self) -> ClearState {
            self.clear_state
        }
        fn set_clear_state(&mut self, state: ClearState) {
            self.clear_state = state;
        }
        fn clear(&mut self, _mask: ClearMask) {}
        fn enter_overlay(&mut self) -> bool {
            true
        }
        fn exit_overlay(&mut self) {}
    }

    fn controller(button_count: usize) -> ControllerDefinition {
        ControllerDefinition {
            id: String::new(),
            has_position: true,
            button_count,
            primary_button_index: Some(0),
            primary_squeeze_button_index: None,
        }
    }

    fn vr_definition() -> DeviceDefinition {
        DeviceDefinition {
            modes: vec![SessionMode::Inline, SessionMode::ImmersiveVr],
            features: Vec::new(),
            resolution: None,
            size: None,
            controllers: vec![controller(2), controller(2)],
        }
    }

    fn ar_definition() -> DeviceDefinition {
        DeviceDefinition {
            modes: vec![SessionMode::ImmersiveAr],
            features: Vec::new(),
            resolution: None,
            size: None,
            controllers: vec![controller(1), controller(1)],
        }
    }

    fn new_device(definition: DeviceDefinition) -> EmulatedXrDevice {
        EmulatedXrDevice::new(
            definition,
            Rc::new(NullEvents),
            Rc::new(NullRuntime),
            Box::new(|_| Box::new(NullScene)),
        )
    }

    fn no_features() -> Vec<String> {
        Vec::new()
    }

    fn assert_mat4_near(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let mut device = new_device(vr_definition());
        assert_eq!(
            device.request_session(SessionMode::ImmersiveAr, no_features()),
            Err(DeviceError::UnsupportedMode(SessionMode::ImmersiveAr))
        );
    }

    #[test]
    fn session_ids_are_fresh_and_increasing() {
        let mut device = new_device(vr_definition());
        let a = device
            .request_session(SessionMode::Inline, no_features())
            .unwrap();
        let b = device
            .request_session(SessionMode::ImmersiveVr, no_features())
            .unwrap();
        let c = device
            .request_session(SessionMode::Inline, no_features())
            .unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn ended_session_supports_no_reference_space() {
        let mut device = new_device(vr_definition());
        let id = device
            .request_session(SessionMode::ImmersiveVr, ["local", "viewer"])
            .unwrap();
        assert!(device.does_session_support_reference_space(id, "local"));
        device.end_session(id);
        assert!(!device.does_session_support_reference_space(id, "local"));
        assert!(!device.does_session_support_reference_space(id, "viewer"));
    }

    #[test]
    fn feature_support_falls_back_to_baseline_spaces() {
        let mut definition = vr_definition();
        definition.features = vec!["hand-tracking".to_string()];
        let device = new_device(definition);
        assert!(device.is_feature_supported("hand-tracking"));
        assert!(device.is_feature_supported("viewer"));
        assert!(device.is_feature_supported("local"));
        assert!(device.is_feature_supported("local-floor"));
        assert!(!device.is_feature_supported("bounded-floor"));
        assert!(!device.is_feature_supported("unbounded"));
        assert!(!device.is_feature_supported("made-up-descriptor"));
    }

    #[test]
    fn stereo_viewports_split_the_canvas() {
        let mut device = new_device(vr_definition());
        let id = device
            .request_session(SessionMode::ImmersiveVr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(800, 600));

        assert_eq!(
            device.viewport(id, Eye::Left).unwrap(),
            Viewport { x: 0, y: 0, width: 400, height: 600 }
        );
        assert_eq!(
            device.viewport(id, Eye::Right).unwrap(),
            Viewport { x: 400, y: 0, width: 400, height: 600 }
        );
        assert_eq!(
            device.viewport(id, Eye::None).unwrap(),
            Viewport { x: 0, y: 0, width: 800, height: 600 }
        );

        device.apply(Command::SetStereoEffect { enabled: false });
        assert_eq!(device.viewport(id, Eye::Left).unwrap().width, 800);
        assert_eq!(device.viewport(id, Eye::Right).unwrap().width, 0);
    }

    #[test]
    fn ar_viewport_is_always_the_full_canvas() {
        let mut device = new_device(ar_definition());
        let id = device
            .request_session(SessionMode::ImmersiveAr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(640, 480));
        // The AR base layer is resized to the device render resolution.
        let expected = Viewport { x: 0, y: 0, width: 1024, height: 2048 };
        assert_eq!(device.viewport(id, Eye::Left).unwrap(), expected);
        assert_eq!(device.viewport(id, Eye::Right).unwrap(), expected);
        assert_eq!(device.viewport(id, Eye::None).unwrap(), expected);
    }

    #[test]
    fn view_matrix_is_the_model_inverse() {
        let mut device = new_device(vr_definition());
        let id = device
            .request_session(SessionMode::ImmersiveVr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(800, 600));

        let orientation = Quat::from_rotation_y(0.8) * Quat::from_rotation_x(-0.3);
        device.apply(Command::UpdateHeadsetPose {
            position: [0.3, 1.5, -0.2],
            orientation: orientation.to_array(),
        });
        device.on_frame_start(id, RenderState::default());

        let model = math::model_matrix(Vec3::new(0.3, 1.5, -0.2), orientation, Vec3::ONE);
        assert_mat4_near(device.base_pose_matrix(), model);
        assert_mat4_near(device.base_view_matrix(Eye::None).inverse(), model);
        assert_mat4_near(device.base_view_matrix(Eye::None) * model, Mat4::IDENTITY);
    }

    #[test]
    fn eye_views_collapse_to_mono_without_stereo() {
        let mut device = new_device(vr_definition());
        let id = device
            .request_session(SessionMode::ImmersiveVr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(800, 600));
        device.apply(Command::UpdateHeadsetPose {
            position: [0.0, 1.6, 1.0],
            orientation: Quat::from_rotation_y(0.4).to_array(),
        });

        device.on_frame_start(id, RenderState::default());
        let mono = device.base_view_matrix(Eye::None);
        assert_ne!(device.base_view_matrix(Eye::Left), mono);

        device.apply(Command::SetStereoEffect { enabled: false });
        assert_eq!(device.base_view_matrix(Eye::Left), mono);
        assert_eq!(device.base_view_matrix(Eye::Right), mono);
    }

    #[test]
    fn touch_at_the_panel_corner_counts() {
        let mut device = new_device(ar_definition());
        let id = device
            .request_session(SessionMode::ImmersiveAr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(640, 480));

        // Tablet at the origin: view space equals world space. The default
        // panel is 0.05 x 0.1 m, so its interactive corner sits at
        // (0.025, 0.05) and dx = dy = 1.0 exactly.
        device.apply_scene_notification(SceneNotification::Touch {
            point: Vec3::new(0.025, 0.05, 0.0),
        });
        device.on_frame_start(id, RenderState::default());
        assert!(device.gamepads()[0].buttons[0].pressed);
    }

    #[test]
    fn touch_beyond_the_depth_band_does_not_count() {
        let mut device = new_device(ar_definition());
        let id = device
            .request_session(SessionMode::ImmersiveAr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(640, 480));

        device.apply_scene_notification(SceneNotification::Touch {
            point: Vec3::new(0.0, 0.0, 0.011),
        });
        device.on_frame_start(id, RenderState::default());
        assert!(!device.gamepads()[0].buttons[0].pressed);
    }

    #[test]
    fn controller_rebuild_waits_two_frames() {
        let mut device = new_device(vr_definition());
        let id = device
            .request_session(SessionMode::ImmersiveVr, no_features())
            .unwrap();
        device.on_base_layer_set(id, FakeSurface::boxed(800, 600));

        let mut definition = vr_definition();
        definition.controllers = vec![controller(3)];
        device.apply(Command::ReplaceDevice { definition });
        assert_eq!(device.gamepads().len(), 2);

        device.on_frame_start(id, RenderState::default());
        device.on_frame_end(id);
        assert_eq!(device.gamepads().len(), 2);

        device.on_frame_start(id, RenderState::default());
        device.on_frame_end(id);
        assert_eq!(device.gamepads().len(), 1);
        assert_eq!(device.gamepads()[0].buttons.len(), 3);
    }

    #[test]
    fn local_space_sits_below_the_default_headset() {
        let device = new_device(vr_definition());
        let local = device.reference_space_transform("local");
        assert_eq!(local.w_axis.y, -1.6);
        assert_mat4_near(
            device.reference_space_transform("local-floor"),
            Mat4::IDENTITY,
        );
    }

    #[test]
    fn pose_updates_for_missing_controllers_are_ignored() {
        let mut definition = vr_definition();
        definition.controllers = vec![controller(2)];
        let mut device = new_device(definition);
        // Left slot is not configured; this must be a no-op, not a panic.
        device.apply(Command::UpdateControllerPose {
            role: ControllerRole::Left,
            position: [1.0, 2.0, 3.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        });
        device.apply(Command::UpdateControllerButton {
            role: ControllerRole::Right,
            button_index: 9,
            pressed: true,
        });
        assert_eq!(device.gamepads().len(), 1);
    }
}
