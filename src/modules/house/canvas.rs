//! RGBA raster that `embedded-graphics` can draw text onto.

use core::convert::Infallible;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X12, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::{Baseline, Text},
};
use image::{Rgba, RgbaImage};

pub const CHAR_WIDTH: i32 = 6;
pub const CHAR_HEIGHT: i32 = 12;

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(image: RgbaImage) -> Self {
        Canvas { image }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Sets a pixel, silently ignoring coordinates off the canvas.
    #[inline]
    pub fn put(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height()
        {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba<u8>) {
        let x_start = x.max(0);
        let y_start = y.max(0);
        let x_end = (x + w).min(self.image.width() as i32);
        let y_end = (y + h).min(self.image.height() as i32);

        for py in y_start..y_end {
            for px in x_start..x_end {
                self.image.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    /// Draws one line of black text with its top-left corner at `(x, y)`,
    /// clipped to `clip_w` pixels of width and a single text row.
    pub fn label(&mut self, text: &str, x: i32, y: i32, clip_w: i32) {
        let style = MonoTextStyle::new(&FONT_6X12, Rgb888::BLACK);
        let clip = Rectangle::new(
            Point::new(x, y),
            Size::new(clip_w.max(0) as u32, CHAR_HEIGHT as u32),
        );

        let mut clipped = self.clipped(&clip);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut clipped)
            .ok();
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.put(
                coord.x,
                coord.y,
                Rgba([color.r(), color.g(), color.b(), 255]),
            );
        }
        Ok(())
    }
}
