//! Slot overlays for display.
//!
//! Rendering works on a copy of the frame and never touches occupancy records
//! or the registry. Labels use a built-in 3x5 bitmap font (digits and `/`).

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::frame::Frame;
use crate::geometry::{Point, SlotPolygon};
use crate::occupancy::Occupancy;
use crate::registry::SlotRegistry;

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;
const LABEL_BG: Rgb<u8> = Rgb([20, 20, 20]);
const LABEL_FG: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub free_color: [u8; 3],
    pub occupied_color: [u8; 3],
    pub line_thickness: u32,
    /// Translucent fill inside each slot; 0 draws outlines only.
    pub fill_alpha: f32,
    pub show_ids: bool,
    /// Draw `occupied/total` in the top-left corner.
    pub show_summary: bool,
    /// Bitmap font pixel size.
    pub label_scale: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            free_color: [0, 200, 0],
            occupied_color: [220, 0, 0],
            line_thickness: 2,
            fill_alpha: 0.0,
            show_ids: true,
            show_summary: true,
            label_scale: 2,
        }
    }
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn color_for(&self, state: Occupancy) -> Rgb<u8> {
        match state {
            Occupancy::Free => Rgb(self.config.free_color),
            Occupancy::Occupied => Rgb(self.config.occupied_color),
        }
    }

    /// Draw every slot colored by `states` (id order) onto a copy of `frame`.
    pub fn render(
        &self,
        frame: &Frame,
        registry: &SlotRegistry,
        states: &[Occupancy],
    ) -> RgbImage {
        let mut canvas = frame.image().clone();
        for (id, polygon) in registry.iter() {
            let state = states.get(id).copied().unwrap_or_default();
            let color = self.color_for(state);
            if self.config.fill_alpha > 0.0 {
                fill_polygon(&mut canvas, polygon, color, self.config.fill_alpha);
            }
            draw_slot_outline(&mut canvas, polygon, color, self.config.line_thickness);
            if self.config.show_ids {
                draw_label(
                    &mut canvas,
                    &id.to_string(),
                    polygon.centroid(),
                    self.config.label_scale,
                );
            }
        }
        if self.config.show_summary && !registry.is_empty() {
            let occupied = states.iter().filter(|s| s.is_occupied()).count();
            let text = format!("{}/{}", occupied, registry.len());
            draw_summary(&mut canvas, &text, self.config.label_scale);
        }
        canvas
    }
}

/// Closed four-edge outline.
pub fn draw_slot_outline(
    canvas: &mut RgbImage,
    polygon: &SlotPolygon,
    color: Rgb<u8>,
    thickness: u32,
) {
    let corners = polygon.corners();
    for i in 0..corners.len() {
        draw_edge(canvas, corners[i], corners[(i + 1) % corners.len()], color, thickness);
    }
}

/// Straight edge; thickness grows the line by whole pixels around its axis.
pub fn draw_edge(canvas: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>, thickness: u32) {
    let t = thickness.max(1) as i32;
    let lo = -(t - 1) / 2;
    let hi = t / 2;
    for dy in lo..=hi {
        for dx in lo..=hi {
            draw_line_segment_mut(
                canvas,
                ((a.x + dx) as f32, (a.y + dy) as f32),
                ((b.x + dx) as f32, (b.y + dy) as f32),
                color,
            );
        }
    }
}

/// Click marker.
pub fn draw_marker(canvas: &mut RgbImage, p: Point, color: Rgb<u8>) {
    draw_filled_circle_mut(canvas, (p.x, p.y), 3, color);
}

/// Text centered on `center`, on a dark box.
pub fn draw_label(canvas: &mut RgbImage, text: &str, center: Point, scale: u32) {
    let scale = scale.max(1);
    let (w, h) = text_size(text, scale);
    let x = center.x - (w / 2) as i32;
    let y = center.y - (h / 2) as i32;
    draw_text_box(canvas, text, x, y, scale);
}

fn draw_summary(canvas: &mut RgbImage, text: &str, scale: u32) {
    let pad = scale.max(1) as i32 * 2;
    draw_text_box(canvas, text, pad, pad, scale.max(1));
}

fn draw_text_box(canvas: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32) {
    let (w, h) = text_size(text, scale);
    let pad = scale;
    draw_filled_rect_mut(
        canvas,
        Rect::at(x - pad as i32, y - pad as i32).of_size(w + 2 * pad, h + 2 * pad),
        LABEL_BG,
    );
    let mut cursor = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (0b100 >> col) != 0 {
                        draw_filled_rect_mut(
                            canvas,
                            Rect::at(
                                cursor + (col * scale) as i32,
                                y + (row as u32 * scale) as i32,
                            )
                            .of_size(scale, scale),
                            LABEL_FG,
                        );
                    }
                }
            }
        }
        cursor += ((GLYPH_W + 1) * scale) as i32;
    }
}

fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let n = text.chars().count() as u32;
    let w = if n == 0 {
        scale
    } else {
        (n * (GLYPH_W + 1) - 1) * scale
    };
    (w, GLYPH_H * scale)
}

fn glyph(ch: char) -> Option<[u8; GLYPH_H as usize]> {
    Some(match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        _ => return None,
    })
}

fn fill_polygon(canvas: &mut RgbImage, polygon: &SlotPolygon, color: Rgb<u8>, alpha: f32) {
    let Some(rect) = polygon
        .bounding_rect()
        .clamp_to(canvas.width(), canvas.height())
    else {
        return;
    };
    let a = alpha.clamp(0.0, 1.0);
    for y in rect.y..rect.y + rect.height as i32 {
        for x in rect.x..rect.x + rect.width as i32 {
            if !polygon.contains(Point::new(x, y)) {
                continue;
            }
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let blended = (1.0 - a) * px.0[c] as f32 + a * color.0[c] as f32;
                px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot() -> (SlotRegistry, Frame) {
        let mut reg = SlotRegistry::new();
        reg.add_slot([
            Point::new(10, 10),
            Point::new(40, 10),
            Point::new(40, 40),
            Point::new(10, 40),
        ])
        .unwrap();
        reg.add_slot([
            Point::new(50, 10),
            Point::new(80, 10),
            Point::new(80, 40),
            Point::new(50, 40),
        ])
        .unwrap();
        let frame = Frame::new(1, RgbImage::from_pixel(100, 60, Rgb([90, 90, 90])));
        (reg, frame)
    }

    #[test]
    fn outlines_use_state_colors() {
        let (reg, frame) = lot();
        let renderer = Renderer::new(RenderConfig {
            show_summary: false,
            ..RenderConfig::default()
        });
        let out = renderer.render(&frame, &reg, &[Occupancy::Free, Occupancy::Occupied]);
        assert_eq!(out.get_pixel(25, 10).0, [0, 200, 0]);
        assert_eq!(out.get_pixel(65, 10).0, [220, 0, 0]);
        // The source frame is not modified.
        assert_eq!(frame.image().get_pixel(25, 10).0, [90, 90, 90]);
    }

    #[test]
    fn fill_blends_inside_polygon_only() {
        let (reg, frame) = lot();
        let renderer = Renderer::new(RenderConfig {
            fill_alpha: 0.5,
            show_ids: false,
            show_summary: false,
            ..RenderConfig::default()
        });
        let out = renderer.render(&frame, &reg, &[Occupancy::Occupied, Occupancy::Free]);
        assert_eq!(out.get_pixel(20, 20).0, [155, 45, 45]);
        assert_eq!(out.get_pixel(45, 50).0, [90, 90, 90]);
    }

    #[test]
    fn summary_panel_is_drawn_top_left() {
        let (reg, frame) = lot();
        let renderer = Renderer::new(RenderConfig::default());
        let out = renderer.render(&frame, &reg, &[Occupancy::Occupied, Occupancy::Free]);
        // Panel background sits just outside the first glyph.
        assert_eq!(out.get_pixel(2, 2).0, LABEL_BG.0);
        // Top row of "1" has its middle pixel lit.
        assert_eq!(out.get_pixel(4 + 2, 4).0, LABEL_FG.0);
    }

    #[test]
    fn text_size_accounts_for_spacing() {
        assert_eq!(text_size("7", 2), (6, 10));
        assert_eq!(text_size("12", 1), (7, 5));
    }
}
