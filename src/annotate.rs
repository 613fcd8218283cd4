//! Bounding-box overlays for the processed stream.
//!
//! Drawing happens on a private copy of the captured frame, never on the one
//! in the raw cell, so evidence uploads keep the unannotated image.

use crate::detect::{Detection, Verdict};
use crate::frame::Frame;

const VIOLATION_COLOR: [u8; 3] = [220, 40, 40];
const SAFE_COLOR: [u8; 3] = [40, 200, 80];
const UNKNOWN_COLOR: [u8; 3] = [160, 160, 160];

/// Draw every detection onto `frame`, with distinct treatment per verdict:
/// thick red for violations, green for safe gear, thin gray otherwise.
pub fn annotate_frame(frame: &mut Frame, detections: &[Detection]) {
    for detection in detections {
        let (color, thickness) = match detection.verdict {
            Verdict::Violation => (VIOLATION_COLOR, 3),
            Verdict::Safe => (SAFE_COLOR, 2),
            Verdict::Unknown => (UNKNOWN_COLOR, 1),
        };
        draw_rect(
            frame,
            detection.bbox.x1,
            detection.bbox.y1,
            detection.bbox.x2,
            detection.bbox.y2,
            color,
            thickness,
        );
    }
}

/// Draw a rectangle outline, clamped to the frame bounds.
fn draw_rect(frame: &mut Frame, x1: f32, y1: f32, x2: f32, y2: f32, color: [u8; 3], thickness: u32) {
    if frame.width == 0 || frame.height == 0 {
        return;
    }
    let max_x = frame.width - 1;
    let max_y = frame.height - 1;
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(max_x);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(max_y);

    let (left, right) = (clamp_x(x1.min(x2)), clamp_x(x1.max(x2)));
    let (top, bottom) = (clamp_y(y1.min(y2)), clamp_y(y1.max(y2)));

    for t in 0..thickness {
        // Horizontal edges, moving inward with each thickness step.
        if top + t <= bottom {
            draw_hline(frame, left, right, top + t, color);
        }
        if bottom >= t && bottom - t >= top {
            draw_hline(frame, left, right, bottom - t, color);
        }
        // Vertical edges.
        if left + t <= right {
            draw_vline(frame, top, bottom, left + t, color);
        }
        if right >= t && right - t >= left {
            draw_vline(frame, top, bottom, right - t, color);
        }
    }
}

fn draw_hline(frame: &mut Frame, x1: u32, x2: u32, y: u32, color: [u8; 3]) {
    let row = frame.row_bytes();
    for x in x1..=x2 {
        let idx = (y as usize) * row + (x as usize) * 3;
        frame.pixels[idx..idx + 3].copy_from_slice(&color);
    }
}

fn draw_vline(frame: &mut Frame, y1: u32, y2: u32, x: u32, color: [u8; 3]) {
    let row = frame.row_bytes();
    for y in y1..=y2 {
        let idx = (y as usize) * row + (x as usize) * 3;
        frame.pixels[idx..idx + 3].copy_from_slice(&color);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(verdict: Verdict, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            bbox: BoundingBox { x1, y1, x2, y2 },
            label: "test".to_string(),
            confidence: 0.9,
            verdict,
        }
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize) * frame.row_bytes() + (x as usize) * 3;
        [
            frame.pixels[idx],
            frame.pixels[idx + 1],
            frame.pixels[idx + 2],
        ]
    }

    #[test]
    fn violation_box_is_drawn_in_red() {
        let mut frame = Frame::blank(32, 32);
        annotate_frame(
            &mut frame,
            &[detection(Verdict::Violation, 4.0, 4.0, 20.0, 20.0)],
        );
        assert_eq!(pixel(&frame, 4, 4), VIOLATION_COLOR);
        assert_eq!(pixel(&frame, 20, 4), VIOLATION_COLOR);
        // Interior stays untouched.
        assert_eq!(pixel(&frame, 12, 12), [0, 0, 0]);
    }

    #[test]
    fn safe_and_violation_use_distinct_colors() {
        let mut frame = Frame::blank(32, 32);
        annotate_frame(
            &mut frame,
            &[
                detection(Verdict::Violation, 1.0, 1.0, 8.0, 8.0),
                detection(Verdict::Safe, 16.0, 16.0, 30.0, 30.0),
            ],
        );
        assert_ne!(pixel(&frame, 1, 1), pixel(&frame, 16, 16));
    }

    #[test]
    fn out_of_bounds_boxes_are_clamped() {
        let mut frame = Frame::blank(16, 16);
        // Must not panic or write out of bounds.
        annotate_frame(
            &mut frame,
            &[detection(Verdict::Violation, -10.0, -10.0, 100.0, 100.0)],
        );
        assert_eq!(pixel(&frame, 0, 0), VIOLATION_COLOR);
        assert_eq!(pixel(&frame, 15, 15), VIOLATION_COLOR);
    }

    #[test]
    fn degenerate_box_draws_single_pixel() {
        let mut frame = Frame::blank(8, 8);
        annotate_frame(&mut frame, &[detection(Verdict::Safe, 3.0, 3.0, 3.0, 3.0)]);
        assert_eq!(pixel(&frame, 3, 3), SAFE_COLOR);
    }
}
