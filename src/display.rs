// Display module - render contracts and color banding
//
// The pipeline hands one RenderFrame per block to a DisplaySink and moves
// on; sinks are fire-and-forget and assumed non-blocking relative to the
// block rate. Driving actual LED hardware is a collaborator concern and
// lives behind the trait.
//
// Color banding is a rendering policy, not spectral math: it is a pure
// function of a row's height fraction, kept separate from the mapper so
// both are independently testable.

use std::io::Write;

use serde::Serialize;

use crate::analysis::BarSet;

/// Bar colors, bottom band to top band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl BarColor {
    /// RGB values matching the original LED panel palette
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            BarColor::Green => (0, 200, 0),
            BarColor::Yellow => (150, 150, 0),
            BarColor::Orange => (250, 100, 0),
            BarColor::Red => (200, 0, 0),
        }
    }
}

/// Color of the pixel row `y` rows above the display floor
///
/// Green below 4/12 of the display height, yellow below 8/12, orange below
/// 10/12, red above. Integer division on purpose: thresholds snap to whole
/// rows exactly as the panel renders them.
pub fn color_for_row(y: usize, display_height: usize) -> BarColor {
    if y < display_height * 4 / 12 {
        BarColor::Green
    } else if y < display_height * 8 / 12 {
        BarColor::Yellow
    } else if y < display_height * 10 / 12 {
        BarColor::Orange
    } else {
        BarColor::Red
    }
}

/// One block's render instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RenderFrame {
    /// Spectrum bar heights
    Bars { bars: BarSet },
    /// Strobe on/off for this block
    Strobe { beat: bool },
    /// Both outputs from the same spectrum
    Both { bars: BarSet, beat: bool },
}

/// Fire-and-forget render target
pub trait DisplaySink {
    fn render(&mut self, frame: &RenderFrame);
}

/// Writes one JSON object per frame to any writer
///
/// Serialization failures are logged and dropped rather than propagated:
/// the pipeline's timing budget does not wait on a sink.
pub struct JsonLineSink<W: Write> {
    writer: W,
    frames: u64,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, frames: 0 }
    }

    /// Number of frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<W: Write> DisplaySink for JsonLineSink<W> {
    fn render(&mut self, frame: &RenderFrame) {
        match serde_json::to_string(frame) {
            Ok(json) => {
                if let Err(err) = writeln!(self.writer, "{}", json) {
                    log::warn!("[Display] Dropped frame: {}", err);
                } else {
                    self.frames += 1;
                }
            }
            Err(err) => log::warn!("[Display] Failed to serialize frame: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_bands_at_height_32() {
        // 32 * 4/12 = 10, 32 * 8/12 = 21, 32 * 10/12 = 26
        assert_eq!(color_for_row(0, 32), BarColor::Green);
        assert_eq!(color_for_row(9, 32), BarColor::Green);
        assert_eq!(color_for_row(10, 32), BarColor::Yellow);
        assert_eq!(color_for_row(20, 32), BarColor::Yellow);
        assert_eq!(color_for_row(21, 32), BarColor::Orange);
        assert_eq!(color_for_row(25, 32), BarColor::Orange);
        assert_eq!(color_for_row(26, 32), BarColor::Red);
        assert_eq!(color_for_row(31, 32), BarColor::Red);
    }

    #[test]
    fn test_color_bands_cover_every_row() {
        for height in [12, 16, 24, 32, 64] {
            let mut last = color_for_row(0, height);
            assert_eq!(last, BarColor::Green);
            for y in 1..height {
                let color = color_for_row(y, height);
                // Bands only step upward through the palette
                assert!(color as u8 >= last as u8);
                last = color;
            }
            assert_eq!(color_for_row(height - 1, height), BarColor::Red);
        }
    }

    #[test]
    fn test_palette_rgb() {
        assert_eq!(BarColor::Green.rgb(), (0, 200, 0));
        assert_eq!(BarColor::Red.rgb(), (200, 0, 0));
    }

    #[test]
    fn test_json_sink_writes_one_line_per_frame() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.render(&RenderFrame::Strobe { beat: true });
        sink.render(&RenderFrame::Strobe { beat: false });

        assert_eq!(sink.frames(), 2);
        let out = String::from_utf8(sink.writer).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"beat\":true"));
    }
}
