//! OLED text surface tests on an in-memory 128x32 framebuffer

use std::convert::Infallible;
use std::ops::Range;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

use lora_rx_node::hal::oled::{Framebuffer, CHAR_HEIGHT, CHAR_WIDTH};
use lora_rx_node::hal::OledText;
use lora_rx_node::sink::DisplayError;
use lora_rx_node::{DisplayDriver, DisplaySink, ReceivedPacket, StatusRenderer};

const WIDTH: usize = 128;
const HEIGHT: usize = 32;

struct Grid {
    pixels: [[bool; WIDTH]; HEIGHT],
    flushes: u32,
}

impl Grid {
    fn new() -> Self {
        Self {
            pixels: [[false; WIDTH]; HEIGHT],
            flushes: 0,
        }
    }

    fn lit(&self, xs: Range<usize>, ys: Range<usize>) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| self.pixels[y][x])
            .count()
    }

    /// Lit pixels in a character cell.
    fn lit_cell(&self, col: usize, row: usize) -> usize {
        let w = CHAR_WIDTH as usize;
        let h = CHAR_HEIGHT as usize;
        self.lit(col * w..(col + 1) * w, row * h..(row + 1) * h)
    }

    fn lit_row(&self, row: usize) -> usize {
        let h = CHAR_HEIGHT as usize;
        self.lit(0..WIDTH, row * h..(row + 1) * h)
    }

    fn total(&self) -> usize {
        self.lit(0..WIDTH, 0..HEIGHT)
    }
}

impl OriginDimensions for Grid {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Grid {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if (0..WIDTH as i32).contains(&point.x) && (0..HEIGHT as i32).contains(&point.y) {
                self.pixels[point.y as usize][point.x as usize] = color.is_on();
            }
        }
        Ok(())
    }
}

impl Framebuffer for Grid {
    fn flush_frame(&mut self) -> Result<(), DisplayError> {
        self.flushes += 1;
        Ok(())
    }
}

fn text_surface() -> OledText<Grid> {
    OledText::new(Grid::new(), 21, 4)
}

#[test]
fn test_characters_land_in_cells() {
    let mut oled = text_surface();
    oled.write_text("AB").unwrap();

    let fb = oled.framebuffer();
    assert!(fb.lit_cell(0, 0) > 0);
    assert!(fb.lit_cell(1, 0) > 0);
    assert_eq!(fb.lit_cell(0, 0) + fb.lit_cell(1, 0), fb.total());
}

#[test]
fn test_space_draws_nothing() {
    let mut oled = text_surface();
    oled.write_text("   ").unwrap();

    assert_eq!(oled.framebuffer().total(), 0);
    assert_eq!(oled.cursor().col, 3);
}

#[test]
fn test_wraps_at_column_21() {
    let mut oled = text_surface();
    oled.write_text(&"A".repeat(22)).unwrap();

    let fb = oled.framebuffer();
    assert!(fb.lit_cell(20, 0) > 0);
    assert!(fb.lit_cell(0, 1) > 0);
    assert_eq!(fb.lit_cell(1, 1), 0);
}

#[test]
fn test_newline_moves_to_next_row() {
    let mut oled = text_surface();
    oled.write_text("A\nB").unwrap();

    let fb = oled.framebuffer();
    assert!(fb.lit_cell(0, 0) > 0);
    assert!(fb.lit_cell(0, 1) > 0);
    assert_eq!(fb.lit_cell(1, 0), 0);
}

#[test]
fn test_clips_past_last_row() {
    let mut oled = text_surface();
    oled.write_text("1\n2\n3\n4\n").unwrap();
    let before = oled.framebuffer().pixels;

    oled.write_text("overflow").unwrap();
    assert_eq!(oled.framebuffer().pixels, before);
}

#[test]
fn test_clear_and_cursor() {
    let mut oled = text_surface();
    oled.write_text("XYZ").unwrap();
    oled.clear().unwrap();
    assert_eq!(oled.framebuffer().total(), 0);

    assert_eq!(oled.set_cursor(21, 0), Err(DisplayError::OutOfBounds));
    oled.set_cursor(5, 2).unwrap();
    oled.write_text("Q").unwrap();
    assert!(oled.framebuffer().lit_cell(5, 2) > 0);
    assert_eq!(oled.framebuffer().total(), oled.framebuffer().lit_cell(5, 2));
}

#[test]
fn test_flush_reaches_panel() {
    let mut oled = text_surface();
    oled.flush().unwrap();
    oled.flush().unwrap();
    assert_eq!(oled.framebuffer().flushes, 2);
}

#[test]
fn test_status_frame_layout() {
    let mut renderer = StatusRenderer::new(DisplaySink::new(text_surface()));
    let packet = ReceivedPacket::new(b"PING", -42.5, 9.25, -120.0);

    renderer.render_packet(&packet);

    let sink = renderer.sink();
    let fb = sink.display().framebuffer();
    assert_eq!(sink.errors(), 0);
    assert_eq!(fb.flushes, 1);

    // "RX:PING" on row 0, telemetry (38 chars) wraps over rows 1-2
    assert!(fb.lit_cell(6, 0) > 0);
    assert_eq!(fb.lit_cell(7, 0), 0);
    assert!(fb.lit_row(1) > 0);
    assert!(fb.lit_cell(16, 2) > 0);
    assert_eq!(fb.lit_cell(17, 2), 0);
    assert_eq!(fb.lit_row(3), 0);
}

#[test]
fn test_new_packet_replaces_old() {
    let mut renderer = StatusRenderer::new(DisplaySink::new(text_surface()));

    renderer.render_packet(&ReceivedPacket::new(b"A LONGER MESSAGE", 1.0, 2.0, 3.0));
    renderer.render_packet(&ReceivedPacket::new(b"HI", 1.0, 2.0, 3.0));
    let after_two = renderer.sink().display().framebuffer().pixels;

    let mut fresh = StatusRenderer::new(DisplaySink::new(text_surface()));
    fresh.render_packet(&ReceivedPacket::new(b"HI", 1.0, 2.0, 3.0));

    assert_eq!(after_two, fresh.sink().display().framebuffer().pixels);
}
