//! Interactive move and resize
//!
//! A grab is started by the client holding pointer focus and lasts until the
//! next button release. The target is held by `ViewId`, so a grab that
//! outlives its view is detected on the next motion instead of dangling.

use log::{debug, trace};
use wayland_protocols::xdg::shell::server::xdg_toplevel::ResizeEdge;

use crate::backend::Backend;
use crate::compositor::{CompositorState, Rect, SurfaceId, ViewId};

bitflags::bitflags! {
    /// Edges being dragged, matching the xdg_toplevel resize_edge bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResizeEdges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

impl From<ResizeEdge> for ResizeEdges {
    fn from(edge: ResizeEdge) -> Self {
        ResizeEdges::from_bits_truncate(u32::from(edge))
    }
}

/// Public view of the grab state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    None,
    Move,
    Resize(ResizeEdges),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    Move,
    /// `geobox` is the window geometry in desktop coordinates at grab start
    Resize { edges: ResizeEdges, geobox: Rect },
}

/// An active grab
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grab {
    pub target: ViewId,
    pub kind: GrabKind,
    /// Cursor offset from the anchor at grab start
    pub grab_x: f64,
    pub grab_y: f64,
}

#[derive(Debug, Default)]
pub struct GrabState {
    active: Option<Grab>,
}

impl GrabState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> GrabMode {
        match self.active.map(|grab| grab.kind) {
            None => GrabMode::None,
            Some(GrabKind::Move) => GrabMode::Move,
            Some(GrabKind::Resize { edges, .. }) => GrabMode::Resize(edges),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<ViewId> {
        self.active.map(|grab| grab.target)
    }

    pub fn active(&self) -> Option<&Grab> {
        self.active.as_ref()
    }

    /// Start a grab; refused while another one is running
    pub fn begin(&mut self, grab: Grab) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(grab);
        true
    }

    pub fn cancel(&mut self) -> Option<Grab> {
        self.active.take()
    }
}

impl<B: Backend> CompositorState<B> {
    /// A client asked to move its toplevel
    pub fn handle_move_request(&mut self, surface: SurfaceId) {
        let Some(id) = self.grab_candidate(surface) else {
            return;
        };
        let Some(view) = self.views.get(id) else {
            return;
        };

        let (x, y) = self.cursor.position();
        self.grab.begin(Grab {
            target: id,
            kind: GrabKind::Move,
            grab_x: x - f64::from(view.x),
            grab_y: y - f64::from(view.y),
        });
        debug!("Move grab on {:?}", surface);
    }

    /// A client asked to resize its toplevel from `edges`
    pub fn handle_resize_request(&mut self, surface: SurfaceId, edges: ResizeEdges) {
        let Some(id) = self.grab_candidate(surface) else {
            return;
        };
        let Some(view) = self.views.get(id) else {
            return;
        };

        let geobox = self
            .backend
            .surface_geometry(surface)
            .translated(view.x, view.y);
        let border_x = geobox.x
            + if edges.contains(ResizeEdges::RIGHT) {
                geobox.width
            } else {
                0
            };
        let border_y = geobox.y
            + if edges.contains(ResizeEdges::BOTTOM) {
                geobox.height
            } else {
                0
            };

        let (x, y) = self.cursor.position();
        self.grab.begin(Grab {
            target: id,
            kind: GrabKind::Resize { edges, geobox },
            grab_x: x - f64::from(border_x),
            grab_y: y - f64::from(border_y),
        });
        debug!("Resize grab on {:?} ({:?})", surface, edges);
    }

    /// Validate a grab request
    fn grab_candidate(&self, surface: SurfaceId) -> Option<ViewId> {
        if self.grab.is_active() {
            debug!("Ignoring grab request from {:?}: grab in progress", surface);
            return None;
        }
        let Some(id) = self.views.find_by_surface(surface) else {
            debug!("Ignoring grab request from {:?}: no view", surface);
            return None;
        };
        if !self.views.get(id).is_some_and(|view| view.mapped) {
            debug!("Ignoring grab request from {:?}: not mapped", surface);
            return None;
        }
        let focused = self.seat.pointer_focus().map(|focus| focus.surface);
        if focused != Some(surface) {
            debug!("Ignoring grab request from {:?}: no pointer focus", surface);
            return None;
        }
        Some(id)
    }

    /// Apply the grab to the current cursor position.
    ///
    /// Returns `true` if a grab consumed the motion.
    pub(crate) fn update_grab(&mut self) -> bool {
        let Some(grab) = self.grab.active().copied() else {
            return false;
        };
        let Some(view) = self.views.get_mut(grab.target).filter(|view| view.mapped) else {
            debug!("Grab target gone, ending grab");
            self.grab.cancel();
            return false;
        };

        let (x, y) = self.cursor.position();
        match grab.kind {
            GrabKind::Move => {
                view.set_position(
                    (x - grab.grab_x).round() as i32,
                    (y - grab.grab_y).round() as i32,
                );
                trace!("Moved {:?} to ({}, {})", grab.target, view.x, view.y);
            }
            GrabKind::Resize { edges, geobox } => {
                let border_x = (x - grab.grab_x).round() as i32;
                let border_y = (y - grab.grab_y).round() as i32;

                let mut new_left = geobox.x;
                let mut new_right = geobox.x + geobox.width;
                let mut new_top = geobox.y;
                let mut new_bottom = geobox.y + geobox.height;

                if edges.contains(ResizeEdges::TOP) {
                    new_top = border_y.min(new_bottom - 1);
                } else if edges.contains(ResizeEdges::BOTTOM) {
                    new_bottom = border_y.max(new_top + 1);
                }
                if edges.contains(ResizeEdges::LEFT) {
                    new_left = border_x.min(new_right - 1);
                } else if edges.contains(ResizeEdges::RIGHT) {
                    new_right = border_x.max(new_left + 1);
                }

                let surface = view.surface;
                let geo = self.backend.surface_geometry(surface);
                view.set_position(new_left - geo.x, new_top - geo.y);
                self.backend
                    .set_size(surface, new_right - new_left, new_bottom - new_top);
            }
        }
        true
    }

    /// Drop the grab, if any
    pub(crate) fn end_grab(&mut self) {
        if let Some(grab) = self.grab.cancel() {
            debug!("Grab on {:?} ended", grab.target);
        }
    }
}
