//! Frame composition
//!
//! On each frame signal the whole view stack is painted onto the output,
//! bottom-most view first, and every drawn surface is told it may draw again.

use log::{trace, warn};

use crate::backend::Backend;
use crate::compositor::{CompositorState, OutputId, Rect, SubSurface};

/// Destination of a sub-surface in output pixels
pub fn surface_destination(
    view_x: i32,
    view_y: i32,
    sub: &SubSurface,
    output_x: i32,
    output_y: i32,
    scale: f64,
) -> Rect {
    let x = f64::from(view_x + sub.sx - output_x) * scale;
    let y = f64::from(view_y + sub.sy - output_y) * scale;
    Rect::new(
        x.round() as i32,
        y.round() as i32,
        (f64::from(sub.width) * scale).round() as i32,
        (f64::from(sub.height) * scale).round() as i32,
    )
}

impl<B: Backend> CompositorState<B> {
    /// Paint one frame on `id` and commit it
    pub fn render_output(&mut self, id: OutputId) {
        let Some(output) = self.outputs.get(id) else {
            trace!("Frame for unknown output {:?}", id);
            return;
        };
        let (width, height) = output.effective_resolution();
        let (output_x, output_y, scale) = (output.x, output.y, output.scale);

        if let Err(err) = self.backend.begin_render(id, width, height) {
            trace!("Skipping frame: {}", err);
            return;
        }
        self.backend.clear(self.config.background);

        let when = self.now();
        for (_, view) in self.views.iter_back_to_front() {
            for sub in self.backend.surface_tree(view.surface) {
                if !sub.has_texture {
                    continue;
                }
                let dest = surface_destination(view.x, view.y, &sub, output_x, output_y, scale);
                self.backend
                    .render_surface(sub.surface, dest, sub.transform.invert());
                self.backend.send_frame_done(sub.surface, when);
            }
        }

        self.backend.render_cursor(id);
        self.backend.end_render();

        if let Err(err) = self.backend.commit(id) {
            warn!("Failed to commit frame: {}", err);
        }
    }
}
