//! Driftwm - a floating window-management core for Wayland compositors
//!
//! Driftwm decides which window sits where and in what stacking order, which
//! surface receives keyboard and pointer input, how interactive move and
//! resize gestures behave, and in which order surfaces are composited.
//! Everything else (protocol objects, devices, the renderer) belongs to a
//! display collaborator that implements the [`backend::Backend`] traits.
//!
//! # Architecture
//!
//! - **Backend**: Collaborator traits, the event enum and calloop integration
//! - **Compositor Core**: View stack, focus, grabs, outputs and frame composition
//! - **Input**: Keyboards, the cursor and the seat
//!
//! # Example
//!
//! ```no_run
//! use driftwm::backend::{EventLoop, HeadlessBackend};
//! use driftwm::compositor::CompositorState;
//! use driftwm::config::Config;
//!
//! let mut state = CompositorState::new(Config::default(), HeadlessBackend::new());
//! let mut event_loop = EventLoop::new().unwrap();
//! event_loop.run(&mut state).unwrap();
//! ```

pub mod backend;
pub mod compositor;
pub mod config;
pub mod input;
