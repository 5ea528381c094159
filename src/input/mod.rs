//! Input handling module
//!
//! This module provides keyboard, pointer, and seat management, along with
//! the handlers that route device events to clients.

pub mod keyboard;
pub mod pointer;
pub mod seat;

pub use keyboard::{Keyboard, Keymap, KeymapNames, ModifierState, Modifiers};
pub use pointer::{Cursor, CursorImage};
pub use seat::{DeviceId, DeviceKind, PointerFocus, Seat};
