use bitflags::bitflags;

bitflags! {
    /// Which framebuffer attachments a [`RenderSurface::clear`] call touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u8 {
        const COLOR = 1;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// The clear parameters an application may have set on the drawing context.
///
/// The device snapshots and restores these around its forced opaque-buffer
/// clear so application state is never disturbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearState {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: i32,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 0.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Canvas size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// The canvas-backed surface behind a session base layer.
///
/// Wraps both the drawing-context clear primitives and the document placement
/// of the canvas; the policy of when to clear or reparent stays in the device
/// core.
pub trait RenderSurface {
    fn size(&self) -> SurfaceSize;
    fn set_size(&mut self, size: SurfaceSize);

    fn clear_state(&self) -> ClearState;
    fn set_clear_state(&mut self, state: ClearState);
    fn clear(&mut self, mask: ClearMask);

    /// Pull the surface into the page-filling presentation overlay.
    /// Returns false when the application already placed the canvas itself,
    /// in which case the device leaves it alone.
    fn enter_overlay(&mut self) -> bool;
    /// Undo [`enter_overlay`](Self::enter_overlay). Only called when the
    /// earlier call returned true.
    fn exit_overlay(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clear_state_matches_gl_defaults() {
        let state = ClearState::default();
        assert_eq!(state.color, [0.0; 4]);
        assert_eq!(state.depth, 1.0);
        assert_eq!(state.stencil, 0);
    }

    #[test]
    fn clear_mask_bits_are_disjoint() {
        let all = ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL;
        assert_eq!(all.bits(), 0b111);
        assert!(all.contains(ClearMask::DEPTH));
    }

    #[test]
    fn aspect_is_width_over_height() {
        assert_eq!(SurfaceSize::new(800, 600).aspect(), 800.0 / 600.0);
    }
}
