//! Overlay renderer
//!
//! Pure transform of a frame and a detection snapshot into an annotated
//! frame. Every shape is clipped to the frame, so boxes reaching past an edge
//! are safe to draw.

use camera_capture::VideoFrame;
use emotion::{DetectionSnapshot, EmotionLabel, FaceBox};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::font::{draw_text, text_height, text_width};
use crate::PipelineConfig;

pub const FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const NO_FACE_TAG_COLOR: Rgb<u8> = Rgb([160, 160, 160]);
const NO_FACE_PANEL_COLOR: Rgb<u8> = Rgb([255, 100, 100]);
const PANEL_COLOR: Rgb<u8> = Rgb([30, 30, 30]);
const BAR_BACKGROUND: Rgb<u8> = Rgb([50, 50, 50]);
const SEPARATOR_COLOR: Rgb<u8> = Rgb([100, 100, 100]);

const BOX_THICKNESS: i32 = 3;
const LABEL_SCALE: u32 = 2;
const LABEL_OFFSET: i64 = 35;
const LABEL_HEIGHT: i64 = 30;
const LABEL_PADDING: i64 = 10;

const PANEL_WIDTH: i64 = 250;
const PANEL_HEIGHT: i64 = 300;
const PANEL_MARGIN: i64 = 20;
const PANEL_OPACITY_TENTHS: u16 = 7;
const ROW_START: i64 = 50;
const ROW_HEIGHT: i64 = 35;
const BAR_WIDTH: i64 = 180;
const BAR_HEIGHT: i64 = 10;

/// What to draw besides the face annotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Ranked score panel in the top-right corner
    pub score_panel: bool,
    /// Hint at the bottom-left corner
    pub footer: Option<String>,
}

impl RenderOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            score_panel: config.score_panel,
            footer: config.footer.clone(),
        }
    }
}

/// Box and bar color of a label
pub fn color_for(label: Option<EmotionLabel>) -> Rgb<u8> {
    match label {
        Some(EmotionLabel::Happy) => Rgb([255, 255, 0]),
        Some(EmotionLabel::Sad) => Rgb([0, 165, 255]),
        Some(EmotionLabel::Angry) => Rgb([255, 0, 0]),
        Some(EmotionLabel::Surprise) => Rgb([255, 0, 255]),
        Some(EmotionLabel::Fear) => Rgb([128, 0, 128]),
        Some(EmotionLabel::Disgust) => Rgb([0, 200, 0]),
        Some(EmotionLabel::Neutral) => Rgb([200, 200, 200]),
        None => FALLBACK_COLOR,
    }
}

/// Rectangle in frame pixels, right and bottom exclusive.
///
/// Only constructed through `clip`, so it always lies inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    /// Intersect a signed rectangle with a `width` x `height` frame
    pub fn clip(left: i64, top: i64, right: i64, bottom: i64, width: u32, height: u32) -> Option<Self> {
        let left = left.clamp(0, i64::from(width));
        let right = right.clamp(0, i64::from(width));
        let top = top.clamp(0, i64::from(height));
        let bottom = bottom.clamp(0, i64::from(height));
        (left < right && top < bottom).then(|| Self {
            left: left as u32,
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    fn fill(&self, image: &mut RgbImage, color: Rgb<u8>) {
        for y in self.top..self.bottom {
            for x in self.left..self.right {
                image.put_pixel(x, y, color);
            }
        }
    }

    fn blend(&self, image: &mut RgbImage, color: Rgb<u8>, opacity_tenths: u16) {
        for y in self.top..self.bottom {
            for x in self.left..self.right {
                let pixel = image.get_pixel_mut(x, y);
                for c in 0..3 {
                    let mixed = u16::from(color[c]) * opacity_tenths
                        + u16::from(pixel[c]) * (10 - opacity_tenths);
                    pixel[c] = ((mixed + 5) / 10) as u8;
                }
            }
        }
    }
}

/// Background band of a face label.
///
/// Sits from 35 to 5 px above the box. Near the top edge it is pushed down
/// to row 0 and keeps its height.
pub fn label_band(bbox: &FaceBox, text_width: u32, width: u32, height: u32) -> Option<PixelRect> {
    let mut top = i64::from(bbox.y) - LABEL_OFFSET;
    if top < 0 {
        top = 0;
    }
    let left = i64::from(bbox.x);
    PixelRect::clip(
        left,
        top,
        left + i64::from(text_width) + LABEL_PADDING,
        top + LABEL_HEIGHT,
        width,
        height,
    )
}

/// Label text of the primary face
pub fn face_label(snapshot: &DetectionSnapshot) -> String {
    match snapshot.dominant {
        Some(label) => format!("{} {}%", label.as_str().to_uppercase(), percent(snapshot.confidence)),
        None => "FACE".to_string(),
    }
}

fn percent(score: f32) -> u32 {
    (score.clamp(0.0, 1.0) * 100.0).floor() as u32
}

/// Annotate `frame` in place
pub fn render(frame: &mut VideoFrame, snapshot: &DetectionSnapshot, options: &RenderOptions) {
    let image = &mut frame.image;

    match snapshot.bbox {
        Some(bbox) => draw_face(image, &bbox, snapshot),
        None if !options.score_panel => {
            draw_text(image, 10, 10, "NO FACE", NO_FACE_TAG_COLOR, LABEL_SCALE);
        }
        None => {}
    }

    if options.score_panel {
        draw_panel(image, snapshot);
    }

    if let Some(footer) = &options.footer {
        let y = image.height() as i32 - 10 - text_height(LABEL_SCALE) as i32;
        draw_text(image, 10, y, footer, FALLBACK_COLOR, LABEL_SCALE);
    }
}

fn draw_face(image: &mut RgbImage, bbox: &FaceBox, snapshot: &DetectionSnapshot) {
    let color = color_for(snapshot.dominant);

    for inset in 0..BOX_THICKNESS {
        let w = bbox.width - 2 * inset;
        let h = bbox.height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x.saturating_add(inset), bbox.y.saturating_add(inset))
            .of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, color);
    }

    let text = face_label(snapshot);
    let text_w = text_width(&text, LABEL_SCALE);
    if let Some(band) = label_band(bbox, text_w, image.width(), image.height()) {
        band.fill(image, color);
        let text_y = band.top as i32 + (LABEL_HEIGHT as i32 - text_height(LABEL_SCALE) as i32) / 2;
        draw_text(image, bbox.x.saturating_add(5), text_y, &text, TEXT_COLOR, LABEL_SCALE);
    }
}

fn draw_panel(image: &mut RgbImage, snapshot: &DetectionSnapshot) {
    let (width, height) = image.dimensions();
    let x0 = (i64::from(width) - PANEL_WIDTH - PANEL_MARGIN).max(0);
    let y0 = PANEL_MARGIN;

    if let Some(panel) = PixelRect::clip(x0, y0, x0 + PANEL_WIDTH, y0 + PANEL_HEIGHT, width, height) {
        panel.blend(image, PANEL_COLOR, PANEL_OPACITY_TENTHS);
    }

    let (px, py) = (x0 as i32, y0 as i32);
    draw_text(image, px + 10, py + 10, "EMOTION DETECTOR", FALLBACK_COLOR, LABEL_SCALE);
    draw_line_segment_mut(
        image,
        ((px + 10) as f32, (py + 35) as f32),
        ((px + PANEL_WIDTH as i32 - 10) as f32, (py + 35) as f32),
        SEPARATOR_COLOR,
    );

    if !snapshot.face_detected() {
        draw_text(image, px + 10, py + 60, "NO FACE DETECTED", NO_FACE_PANEL_COLOR, LABEL_SCALE);
        return;
    }

    for (row, (label, score)) in snapshot.ranked().into_iter().enumerate() {
        let color = color_for(Some(label));
        let row_y = y0 + ROW_START + row as i64 * ROW_HEIGHT;
        let bar_y = row_y + 12;

        draw_text(
            image,
            px + 10,
            row_y as i32,
            &format!("{} {}", label.as_str().to_uppercase(), label.emoticon()),
            color,
            1,
        );

        if let Some(bar) = PixelRect::clip(x0 + 10, bar_y, x0 + 10 + BAR_WIDTH, bar_y + BAR_HEIGHT, width, height) {
            bar.fill(image, BAR_BACKGROUND);
        }
        let filled = (BAR_WIDTH as f32 * score.clamp(0.0, 1.0)).floor() as i64;
        if let Some(fill) = PixelRect::clip(x0 + 10, bar_y, x0 + 10 + filled, bar_y + BAR_HEIGHT, width, height) {
            fill.fill(image, color);
        }

        draw_text(
            image,
            px + 10 + BAR_WIDTH as i32 + 5,
            bar_y as i32 + 2,
            &format!("{}%", percent(score)),
            FALLBACK_COLOR,
            1,
        );
    }
}
