//! Debug drawing of anchors and HUD text onto an [`Image`].

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{self, Text, TextStyleBuilder},
};
use itertools::Itertools;
use nalgebra::{Point2, Vector2};

use crate::anchor::{AnchorSet, Ellipse};
use crate::coord::CoordMap;
use crate::image::{Color, Image};

/// Guard returned by [`draw_marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*. A size of 1 will
    /// result in a single pixel getting drawn.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = ((self.size - 1) / 2) as i32;
        let mut target = Target(&mut *self.image);
        for off in -offset..=offset {
            for (x, y) in [(self.x + off, self.y + off), (self.x + off, self.y - off)] {
                match Pixel(Point { x, y }, self.color).draw(&mut target) {
                    Ok(_) => {}
                    Err(infallible) => match infallible {},
                }
            }
        }
    }
}

/// Guard returned by [`draw_line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        match Line::new(
            Point::new(self.start_x, self.start_y),
            Point::new(self.end_x, self.end_y),
        )
        .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`draw_ellipse`]; draws the outline when dropped.
pub struct DrawEllipse<'a> {
    image: &'a mut Image,
    map: &'a CoordMap,
    ellipse: Ellipse,
    color: Color,
}

impl DrawEllipse<'_> {
    /// Sets the outline color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawEllipse<'_> {
    fn drop(&mut self) {
        const SEGMENTS: u32 = 24;
        let e = &self.ellipse;
        let center = self.map.metric(e.center);
        let perp = Vector2::new(-e.axis.y, e.axis.x);
        let mut prev = None;
        for i in 0..=SEGMENTS {
            let t = i as f32 / SEGMENTS as f32 * std::f32::consts::TAU;
            let offset = e.axis * (e.radii.x * t.cos()) + perp * (e.radii.y * t.sin());
            let p = self.map.to_px(self.map.from_metric(center + offset));
            let p = (p.x.round() as i32, p.y.round() as i32);
            if let Some((px, py)) = prev {
                draw_line(&mut *self.image, px, py, p.0, p.1).color(self.color);
            }
            prev = Some(p);
        }
    }
}

/// Guard returned by [`draw_text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    alignment: text::Alignment,
    baseline: text::Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = text::Baseline::Top;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = text::Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        // FIXME: do this in a better way, e-g's fonts lack some common glyphs
        let character_style = MonoTextStyle::new(&FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(
            self.text,
            Point::new(self.x, self.y),
            character_style,
            text_style,
        )
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize anchor points or points of interest.
pub fn draw_marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::RED,
        size: 5,
    }
}

/// Draws a line onto an image.
pub fn draw_line(image: &mut Image, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> DrawLine<'_> {
    DrawLine {
        image,
        start_x,
        start_y,
        end_x,
        end_y,
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws the outline of an exclusion ellipse onto an image.
pub fn draw_ellipse<'a>(image: &'a mut Image, ellipse: Ellipse, map: &'a CoordMap) -> DrawEllipse<'a> {
    DrawEllipse {
        image,
        map,
        ellipse,
        color: Color::CYAN,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn draw_text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::RED,
        alignment: text::Alignment::Center,
        baseline: text::Baseline::Middle,
    }
}

/// Draws the full anchor geometry over a frame.
pub fn draw_anchors(image: &mut Image, anchors: &AnchorSet, map: &CoordMap) {
    draw_polyline(image, &anchors.cheek_left, map, Color::YELLOW);
    draw_polyline(image, &anchors.cheek_right, map, Color::YELLOW);
    draw_polyline(image, &anchors.jaw, map, Color::GREEN);
    draw_polyline(image, &anchors.nose_left, map, Color::MAGENTA);
    draw_polyline(image, &anchors.nose_right, map, Color::MAGENTA);
    draw_polyline(image, &anchors.forehead, map, Color::YELLOW);

    // Clip ring, closed.
    draw_polyline(image, &anchors.clip, map, Color::BLUE);
    let a = map.to_px(anchors.clip[anchors.clip.len() - 1]);
    let b = map.to_px(anchors.clip[0]);
    draw_line(
        image,
        a.x.round() as i32,
        a.y.round() as i32,
        b.x.round() as i32,
        b.y.round() as i32,
    )
    .color(Color::BLUE);

    for ellipse in [
        anchors.eye_left,
        anchors.eye_right,
        anchors.brow_left,
        anchors.brow_right,
        anchors.lips,
        anchors.nostril_left,
        anchors.nostril_right,
    ] {
        draw_ellipse(image, ellipse, map);
    }

    let tip = map.to_px(anchors.nose_tip);
    draw_marker(image, tip.x.round() as i32, tip.y.round() as i32);
}

fn draw_polyline(image: &mut Image, points: &[Point2<f32>], map: &CoordMap, color: Color) {
    for (&a, &b) in points.iter().tuple_windows() {
        let (a, b) = (map.to_px(a), map.to_px(b));
        draw_line(
            image,
            a.x.round() as i32,
            a.y.round() as i32,
            b.x.round() as i32,
            b.y.round() as i32,
        )
        .color(color);
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            if pixel.0.x >= 0
                && (pixel.0.x as u32) < self.0.width()
                && pixel.0.y >= 0
                && (pixel.0.y as u32) < self.0.height()
            {
                self.0.set(pixel.0.x as _, pixel.0.y as _, pixel.1);
            }
        }

        Ok(())
    }
}
