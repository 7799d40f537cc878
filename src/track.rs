use std::io::Write;

use anyhow::{Context, Result};
use rand::Rng;

use crate::schema::Config;

/// Style name for one run. The random 16-bit suffix keeps styles from
/// colliding when several generated tracks are concatenated; the random
/// source is injected so tests can seed it.
pub fn random_style_id(rng: &mut impl Rng) -> String {
    format!("DSC_{:04x}", rng.gen_range(0..=0xFFFFu32))
}

/// Streaming ASS track writer: UTF-8 BOM up front, CRLF line endings, header
/// first, then one event line per accepted comment in production order.
pub struct TrackWriter<W: Write> {
    out: W,
}

impl<W: Write> TrackWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_header(&mut self, config: &Config, style_id: &str) -> Result<()> {
        self.out
            .write_all("\u{FEFF}".as_bytes())
            .context("failed to write output")?;

        let alpha = 255 - (config.text_opacity * 255.0).round() as i64;
        let outline = (config.font_size / 25.0).max(1.0);

        self.write_line("[Script Info]")?;
        self.write_line("; Script generated by DSC")?;
        self.write_line("ScriptType: v4.00+")?;
        self.write_line(&format!("PlayResX: {}", config.stage_width))?;
        self.write_line(&format!("PlayResY: {}", config.stage_height))?;
        self.write_line(&format!(
            "Aspect Ratio: {}:{}",
            config.stage_width, config.stage_height
        ))?;
        self.write_line("Collisions: Normal")?;
        self.write_line("WrapStyle: 2")?;
        self.write_line("ScaledBorderAndShadow: yes")?;
        self.write_line("YCbCr Matrix: TV.601")?;
        self.write_line("")?;
        self.write_line("[V4+ Styles]")?;
        self.write_line(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
             BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
             BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding",
        )?;
        self.write_line(&format!(
            "Style: {style_id}, {face}, {size:.0}, &H{alpha:02X}FFFFFF, &H{alpha:02X}FFFFFF, \
             &H{alpha:02X}000000, &H{alpha:02X}000000, 0, 0, 0, 0, 100, 100, 0.00, 0.00, 1, \
             {outline:.0}, 0, 7, 0, 0, 0, 0",
            face = config.font_face,
            size = config.font_size,
        ))?;
        self.write_line("")?;
        self.write_line("[Events]")?;
        self.write_line(
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text",
        )?;
        Ok(())
    }

    pub fn write_event(&mut self, line: &str) -> Result<()> {
        self.write_line(line)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush output")
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.write_all(b"\r\n"))
            .context("failed to write output")
    }
}
