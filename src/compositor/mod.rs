//! Compositor core module
//!
//! This module contains the window-management logic:
//! - Global compositor state and event routing
//! - The view stack and hit-testing
//! - Keyboard focus and interactive grabs
//! - Output layout and frame composition

pub mod focus;
pub mod grab;
pub mod output;
pub mod render;
pub mod state;
pub mod surface;
pub mod view;

pub use grab::{Grab, GrabKind, GrabMode, GrabState, ResizeEdges};
pub use output::{Output, OutputId, OutputMode, OutputRegistry};
pub use state::CompositorState;
pub use surface::{ClientId, DataSourceId, Rect, SubSurface, SurfaceId, SurfaceRole, Transform};
pub use view::{View, ViewHit, ViewId, ViewRegistry};
