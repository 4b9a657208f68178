use falcon_types::Detection;
use image::{Rgb, RgbImage};
use rusttype::{point, Font, Scale};

#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error("font data could not be parsed")]
    InvalidFont,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub box_color: Rgb<u8>,
    pub label_bg_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub box_thickness: u32,
    pub font_scale: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        OverlayStyle {
            box_color: Rgb([0, 220, 0]),
            label_bg_color: Rgb([0, 220, 0]),
            text_color: Rgb([0, 0, 0]),
            box_thickness: 2,
            font_scale: 16.0,
        }
    }
}

/// Draws bounding boxes and labels onto an owned RGB frame. Renders by
/// direct pixel manipulation (alpha-blended glyph blitting plus manual
/// rectangle fills), the same approach as the font-stamping helper this is
/// grounded on, rather than producing shape metadata for client-side
/// rendering.
pub struct OverlayRenderer {
    font_bytes: Vec<u8>,
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(font_bytes: Vec<u8>, style: OverlayStyle) -> Result<Self, OverlayError> {
        if Font::try_from_bytes(&font_bytes).is_none() {
            return Err(OverlayError::InvalidFont);
        }
        Ok(OverlayRenderer { font_bytes, style })
    }

    fn font(&self) -> Font<'_> {
        Font::try_from_bytes(&self.font_bytes).expect("validated in OverlayRenderer::new")
    }

    /// Draws every detection's box, then its filled label background, then
    /// its label text, in that order — matching the box-then-label-then-text
    /// sequence of the detection-processor this is grounded on.
    pub fn render(&self, img: &mut RgbImage, detections: &[Detection]) {
        let font = self.font();
        for d in detections {
            draw_box(img, d, self.style.box_color, self.style.box_thickness);
            let label = format_label(d);
            draw_label(img, &font, &label, d, &self.style);
        }
    }
}

fn format_label(d: &Detection) -> String {
    match d.rescue_level {
        Some(level) => format!("{:?} {:.0}% L{}", d.class, d.confidence * 100.0, level),
        None => format!("{:?} {:.0}%", d.class, d.confidence * 100.0),
    }
}

fn put_pixel_blend(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let base = *img.get_pixel(x, y);
    let blended = Rgb([
        blend_channel(base[0], color[0], coverage),
        blend_channel(base[1], color[1], coverage),
        blend_channel(base[2], color[2], coverage),
    ]);
    img.put_pixel(x, y, blended);
}

fn blend_channel(base: u8, fg: u8, coverage: f32) -> u8 {
    (base as f32 * (1.0 - coverage) + fg as f32 * coverage).round() as u8
}

fn draw_box(img: &mut RgbImage, d: &Detection, color: Rgb<u8>, thickness: u32) {
    let x0 = d.bbox.x0.round() as i32;
    let y0 = d.bbox.y0.round() as i32;
    let x1 = d.bbox.x1.round() as i32;
    let y1 = d.bbox.y1.round() as i32;
    let t = thickness as i32;

    for dt in 0..t {
        for x in x0..=x1 {
            put_pixel_blend(img, x, y0 + dt, color, 1.0);
            put_pixel_blend(img, x, y1 - dt, color, 1.0);
        }
        for y in y0..=y1 {
            put_pixel_blend(img, x0 + dt, y, color, 1.0);
            put_pixel_blend(img, x1 - dt, y, color, 1.0);
        }
    }
}

fn draw_label(img: &mut RgbImage, font: &Font, text: &str, d: &Detection, style: &OverlayStyle) {
    let scale = Scale::uniform(style.font_scale);
    let v_metrics = font.v_metrics(scale);
    let label_h = (v_metrics.ascent - v_metrics.descent).ceil() as i32 + 4;
    let label_w = (text.len() as f32 * style.font_scale * 0.6) as i32 + 6;

    let box_x0 = d.bbox.x0.round() as i32;
    let box_y0 = d.bbox.y0.round() as i32;
    let label_y0 = box_y0 - label_h;
    let (label_y0, label_y1) = if label_y0 < 0 {
        (box_y0, box_y0 + label_h)
    } else {
        (label_y0, box_y0)
    };

    for y in label_y0..label_y1 {
        for x in box_x0..(box_x0 + label_w) {
            put_pixel_blend(img, x, y, style.label_bg_color, 1.0);
        }
    }

    let glyphs: Vec<_> = font
        .layout(text, scale, point((box_x0 + 3) as f32, (label_y0 + v_metrics.ascent.ceil()) as f32))
        .collect();
    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32;
                let y = bb.min.y + gy as i32;
                put_pixel_blend(img, x, y, style.text_color, coverage);
            });
        }
    }
}
