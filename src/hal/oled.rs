//! SSD1306 OLED as a text terminal.
//!
//! 6x8 font on a 128x32 panel gives a 21x4 character grid. Text wraps at
//! the right edge; anything past the last row is clipped.

use embedded_graphics::mono_font::ascii::FONT_6X8;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::mode::DisplayConfig as _;
use ssd1306::prelude::{DisplayRotation, DisplaySize, DisplaySize128x32, WriteOnlyDataCommand};
use ssd1306::{I2CDisplayInterface, Ssd1306};

use crate::config::DisplayConfig;
use crate::sink::{DisplayDriver, DisplayError};

/// Glyph cell width in pixels.
pub const CHAR_WIDTH: i32 = 6;
/// Glyph cell height in pixels.
pub const CHAR_HEIGHT: i32 = 8;

/// Buffered monochrome panel.
pub trait Framebuffer: DrawTarget<Color = BinaryColor> {
    /// Send the buffer to the panel.
    fn flush_frame(&mut self) -> Result<(), DisplayError>;
}

impl<DI, SIZE> Framebuffer for Ssd1306<DI, SIZE, BufferedGraphicsMode<SIZE>>
where
    DI: WriteOnlyDataCommand,
    SIZE: DisplaySize,
{
    fn flush_frame(&mut self) -> Result<(), DisplayError> {
        self.flush().map_err(|_| DisplayError::Bus)
    }
}

/// Concrete panel type on the board.
pub type Oled128x32<I2C> = Ssd1306<
    ssd1306::prelude::I2CInterface<I2C>,
    DisplaySize128x32,
    BufferedGraphicsMode<DisplaySize128x32>,
>;

/// Bring up a 128x32 SSD1306 on `i2c` and wrap it as a text surface.
pub fn init_i2c<I2C>(i2c: I2C, config: &DisplayConfig) -> Result<OledText<Oled128x32<I2C>>, DisplayError>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new_custom_address(i2c, config.i2c_address);
    let rotation = if config.rotate_180 {
        DisplayRotation::Rotate180
    } else {
        DisplayRotation::Rotate0
    };

    let mut display = Ssd1306::new(interface, DisplaySize128x32, rotation).into_buffered_graphics_mode();
    display.init().map_err(|_| DisplayError::Bus)?;

    Ok(OledText::new(display, config.columns, config.rows))
}

/// Character-cell cursor over a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCursor {
    pub col: u8,
    pub row: u8,
    cols: u8,
    rows: u8,
}

impl TextCursor {
    pub const fn new(cols: u8, rows: u8) -> Self {
        Self { col: 0, row: 0, cols, rows }
    }

    /// Move to a cell. Fails outside the grid.
    pub fn set(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col >= self.cols || row >= self.rows {
            return Err(DisplayError::OutOfBounds);
        }
        self.col = col;
        self.row = row;
        Ok(())
    }

    /// Place `ch`: returns the cell to draw it in, or `None` for newlines
    /// and clipped characters. Advances the cursor either way.
    pub fn advance(&mut self, ch: char) -> Option<(u8, u8)> {
        if ch == '\n' {
            self.col = 0;
            self.row = self.row.saturating_add(1);
            return None;
        }

        if self.col >= self.cols {
            self.col = 0;
            self.row = self.row.saturating_add(1);
        }

        let cell = (self.col, self.row);
        self.col = self.col.saturating_add(1);

        if cell.1 < self.rows {
            Some(cell)
        } else {
            None
        }
    }
}

/// Text surface over any [`Framebuffer`].
pub struct OledText<F> {
    fb: F,
    cursor: TextCursor,
}

impl<F: Framebuffer> OledText<F> {
    pub fn new(fb: F, cols: u8, rows: u8) -> Self {
        Self {
            fb,
            cursor: TextCursor::new(cols, rows),
        }
    }

    #[inline]
    pub fn cursor(&self) -> TextCursor {
        self.cursor
    }

    #[inline]
    pub fn framebuffer(&self) -> &F {
        &self.fb
    }
}

impl<F: Framebuffer> DisplayDriver for OledText<F> {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.fb.clear(BinaryColor::Off).map_err(|_| DisplayError::Bus)
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.cursor.set(col, row)
    }

    fn write_text(&mut self, text: &str) -> Result<(), DisplayError> {
        let style = MonoTextStyle::new(&FONT_6X8, BinaryColor::On);
        let mut utf8 = [0u8; 4];

        for ch in text.chars() {
            let Some((col, row)) = self.cursor.advance(ch) else {
                continue;
            };

            let origin = Point::new(col as i32 * CHAR_WIDTH, row as i32 * CHAR_HEIGHT);
            Text::with_baseline(ch.encode_utf8(&mut utf8), origin, style, Baseline::Top)
                .draw(&mut self.fb)
                .map_err(|_| DisplayError::Bus)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.fb.flush_frame()
    }
}
