//! Output/display management
//!
//! Outputs are kept in connection order and placed side by side, left to
//! right, in the shared desktop coordinate space.

use std::time::Duration;

use log::{debug, info, warn};

use crate::backend::Backend;
use crate::compositor::{CompositorState, Rect, Transform};

/// Opaque handle to a collaborator-owned output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

/// An output mode (resolution + refresh rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Refresh rate in mHz (e.g., 60000 for 60Hz)
    pub refresh: u32,
    /// Is this the preferred mode?
    pub preferred: bool,
}

impl OutputMode {
    /// Time between two frames; 60Hz when the refresh is unknown
    pub fn frame_interval(&self) -> Duration {
        let refresh = if self.refresh == 0 { 60_000 } else { self.refresh };
        Duration::from_nanos(1_000_000_000_000 / u64::from(refresh))
    }
}

/// A display output (monitor)
#[derive(Debug, Clone)]
pub struct Output {
    pub id: OutputId,
    /// Output name (e.g., "eDP-1")
    pub name: String,
    /// Available modes
    pub modes: Vec<OutputMode>,
    /// Current mode index
    pub current_mode: Option<usize>,
    /// Position in global coordinate space
    pub x: i32,
    pub y: i32,
    /// Scale factor
    pub scale: f64,
    /// Transform applied to output
    pub transform: Transform,
    pub enabled: bool,
}

impl Output {
    pub fn new(id: OutputId, name: String) -> Self {
        Self {
            id,
            name,
            modes: Vec::new(),
            current_mode: None,
            x: 0,
            y: 0,
            scale: 1.0,
            transform: Transform::Normal,
            enabled: false,
        }
    }

    /// Index of the preferred mode, falling back to the first one
    pub fn preferred_mode_index(&self) -> Option<usize> {
        if self.modes.is_empty() {
            return None;
        }
        Some(self.modes.iter().position(|m| m.preferred).unwrap_or(0))
    }

    /// Get the current mode
    pub fn current_mode(&self) -> Option<&OutputMode> {
        self.current_mode.and_then(|i| self.modes.get(i))
    }

    /// Size in layout units: the mode rotated by the transform and divided
    /// by the scale
    pub fn effective_resolution(&self) -> (i32, i32) {
        let Some(mode) = self.current_mode() else {
            return (0, 0);
        };
        let (width, height) = if self.transform.swaps_axes() {
            (mode.height, mode.width)
        } else {
            (mode.width, mode.height)
        };
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        (
            (f64::from(width) / scale).round() as i32,
            (f64::from(height) / scale).round() as i32,
        )
    }

    /// Area covered in the layout
    pub fn geometry(&self) -> Rect {
        let (width, height) = self.effective_resolution();
        Rect::new(self.x, self.y, width, height)
    }
}

/// Manager for all outputs
#[derive(Debug, Default)]
pub struct OutputRegistry {
    /// Connection order
    outputs: Vec<Output>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output to the right of the existing ones
    pub fn add(&mut self, output: Output) {
        self.outputs.push(output);
        self.arrange();
    }

    /// Remove an output, closing the gap it leaves
    pub fn remove(&mut self, id: OutputId) -> Option<Output> {
        let idx = self.outputs.iter().position(|o| o.id == id)?;
        let output = self.outputs.remove(idx);
        self.arrange();
        Some(output)
    }

    /// Get an output by ID
    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: OutputId) -> bool {
        self.get(id).is_some()
    }

    /// Get all outputs
    pub fn iter(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn arrange(&mut self) {
        let mut x = 0;
        for output in &mut self.outputs {
            output.x = x;
            output.y = 0;
            x += output.effective_resolution().0;
        }
    }

    /// Bounding box of the whole layout
    pub fn layout_box(&self) -> Option<Rect> {
        let mut iter = self.outputs.iter().map(Output::geometry);
        let first = iter.next()?;
        let (mut x1, mut y1) = (first.x, first.y);
        let (mut x2, mut y2) = (first.x + first.width, first.y + first.height);
        for geo in iter {
            x1 = x1.min(geo.x);
            y1 = y1.min(geo.y);
            x2 = x2.max(geo.x + geo.width);
            y2 = y2.max(geo.y + geo.height);
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// The point inside the layout nearest to `(x, y)`.
    ///
    /// With no outputs the point is returned as is.
    pub fn closest_point(&self, x: f64, y: f64) -> (f64, f64) {
        let mut best: Option<(f64, f64, f64)> = None;
        for geo in self.outputs.iter().map(Output::geometry) {
            if geo.is_empty() {
                continue;
            }
            // Right and bottom edges are exclusive
            let max_x = f64::from(geo.x + geo.width) - 1.0 / 65536.0;
            let max_y = f64::from(geo.y + geo.height) - 1.0 / 65536.0;
            let cx = x.clamp(f64::from(geo.x), max_x);
            let cy = y.clamp(f64::from(geo.y), max_y);
            let dist = (cx - x).powi(2) + (cy - y).powi(2);
            if best.map_or(true, |(_, _, d)| dist < d) {
                best = Some((cx, cy, dist));
            }
        }
        best.map_or((x, y), |(cx, cy, _)| (cx, cy))
    }

    /// Map a normalized `[0, 1]` position onto the layout bounding box
    pub fn absolute_to_layout(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let layout = self.layout_box()?;
        Some((
            f64::from(layout.x) + x * f64::from(layout.width),
            f64::from(layout.y) + y * f64::from(layout.height),
        ))
    }
}

impl<B: Backend> CompositorState<B> {
    /// An output was plugged in
    pub fn handle_output_connected(
        &mut self,
        id: OutputId,
        name: String,
        modes: Vec<OutputMode>,
        scale: f64,
        transform: Transform,
    ) {
        if self.outputs.contains(id) {
            debug!("Output {:?} already connected", id);
            return;
        }

        let mut output = Output::new(id, name);
        output.modes = modes;
        output.scale = scale;
        output.transform = transform;
        output.current_mode = output.preferred_mode_index();

        if let Some(mode) = output.current_mode().copied() {
            self.backend.set_mode(id, &mode);
        }
        self.backend.enable(id, true);
        if let Err(err) = self.backend.commit(id) {
            warn!("Dropping output {}: {}", output.name, err);
            return;
        }
        output.enabled = true;

        let (width, height) = output.effective_resolution();
        info!("Output {} connected ({}x{})", output.name, width, height);
        self.outputs.add(output);
    }

    /// An output was unplugged
    pub fn handle_output_disconnected(&mut self, id: OutputId) {
        let Some(output) = self.outputs.remove(id) else {
            debug!("Disconnect of unknown output {:?}", id);
            return;
        };
        info!("Output {} disconnected", output.name);

        // Keep the cursor inside whatever is left
        let (x, y) = self.cursor.position();
        let (x, y) = self.outputs.closest_point(x, y);
        self.cursor.warp(x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: i32, height: i32, preferred: bool) -> OutputMode {
        OutputMode {
            width,
            height,
            refresh: 60000,
            preferred,
        }
    }

    fn output(id: u64, width: i32, height: i32) -> Output {
        let mut output = Output::new(OutputId(id), format!("OUT-{}", id));
        output.modes.push(mode(width, height, true));
        output.current_mode = Some(0);
        output
    }

    #[test]
    fn test_preferred_mode() {
        let mut output = Output::new(OutputId(1), "test".to_string());
        assert_eq!(output.preferred_mode_index(), None);

        output.modes.push(mode(1280, 720, false));
        assert_eq!(output.preferred_mode_index(), Some(0));

        output.modes.push(mode(1920, 1080, true));
        assert_eq!(output.preferred_mode_index(), Some(1));
    }

    #[test]
    fn test_effective_resolution() {
        let mut output = output(1, 1920, 1080);
        assert_eq!(output.effective_resolution(), (1920, 1080));

        output.transform = Transform::Rotate90;
        assert_eq!(output.effective_resolution(), (1080, 1920));

        output.transform = Transform::Normal;
        output.scale = 2.0;
        assert_eq!(output.effective_resolution(), (960, 540));
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(
            mode(1, 1, true).frame_interval(),
            Duration::from_nanos(16_666_666)
        );
        let unknown = OutputMode {
            refresh: 0,
            ..mode(1, 1, true)
        };
        assert_eq!(unknown.frame_interval(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn test_side_by_side_arrangement() {
        let mut registry = OutputRegistry::new();
        registry.add(output(1, 1920, 1080));
        registry.add(output(2, 1280, 1024));

        assert_eq!(registry.get(OutputId(2)).unwrap().x, 1920);
        assert_eq!(registry.layout_box(), Some(Rect::new(0, 0, 3200, 1080)));

        // Removing the left output shifts the right one over
        registry.remove(OutputId(1));
        assert_eq!(registry.get(OutputId(2)).unwrap().x, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closest_point() {
        let mut registry = OutputRegistry::new();
        assert_eq!(registry.closest_point(-5.0, 9000.0), (-5.0, 9000.0));

        registry.add(output(1, 1920, 1080));
        registry.add(output(2, 1280, 1024));

        assert_eq!(registry.closest_point(50.0, 60.0), (50.0, 60.0));
        assert_eq!(registry.closest_point(-10.0, -10.0), (0.0, 0.0));

        // Below the shorter right output
        let (x, y) = registry.closest_point(2000.0, 1070.0);
        assert_eq!(x, 2000.0);
        assert!(y < 1024.0 && y > 1023.0);
    }

    #[test]
    fn test_absolute_to_layout() {
        let mut registry = OutputRegistry::new();
        assert!(registry.absolute_to_layout(0.5, 0.5).is_none());

        registry.add(output(1, 1920, 1080));
        assert_eq!(registry.absolute_to_layout(0.5, 0.5), Some((960.0, 540.0)));
    }
}
