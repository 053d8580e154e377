//! Collaborator seams for the Specter device core.
//!
//! The device core never talks to WebGL or a 3D renderer directly. It drives
//! two traits instead:
//! - [`ArScene`], the virtual-room renderer an AR session runs inside
//! - [`RenderSurface`], the canvas-backed surface behind a session base layer
//!
//! Implementations live with the embedding (browser glue, test doubles).

#![forbid(unsafe_code)]

pub mod scene;
pub mod surface;

pub use scene::{ArScene, SceneHit, SceneNotification};
pub use surface::{ClearMask, ClearState, RenderSurface, SurfaceSize};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("virtual room asset rejected: {0}")]
    InvalidAsset(String),
    #[error("scene renderer unavailable: {0}")]
    Unavailable(String),
}

pub type SceneResult<T> = Result<T, SceneError>;
