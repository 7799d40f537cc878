use anyhow::{bail, Result};

/// Display mode of a regular (lane-allocated) comment. Each mode owns an
/// independent lane space in the per-run grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentMode {
    /// Right-to-left marquee across the stage.
    Scroll,
    /// Pinned to the top of the stage, centered.
    Top,
    /// Pinned to the bottom of the stage, centered.
    Bottom,
    /// Left-to-right marquee across the stage.
    ScrollReverse,
}

pub const LANE_SPACES: usize = 4;

impl CommentMode {
    pub fn lane_space(self) -> usize {
        match self {
            Self::Scroll => 0,
            Self::Top => 1,
            Self::Bottom => 2,
            Self::ScrollReverse => 3,
        }
    }

    pub fn is_static(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }
}

/// One normalized bullet comment, immutable once read.
#[derive(Debug, Clone)]
pub struct Comment {
    /// Seconds from track start when the comment becomes visible; sort key.
    pub appearance_time: f64,
    /// Originating timestamp; sort tie-break only.
    pub submission_time: i64,
    /// Strictly increasing per input order; final sort tie-break.
    pub sequence: usize,
    pub body: CommentBody,
}

/// Style variant of a comment, decided at normalization time so downstream
/// stages never re-inspect raw payloads.
#[derive(Debug, Clone)]
pub enum CommentBody {
    Regular(RegularComment),
    Positioned(PositionedComment),
}

#[derive(Debug, Clone)]
pub struct RegularComment {
    pub mode: CommentMode,
    pub text: String,
    /// 24-bit RGB.
    pub color: u32,
    pub font_size: f64,
    /// Estimated pixel height: line count times font size.
    pub height: f64,
    /// Estimated pixel width: longest line's char count times font size.
    pub width: f64,
}

#[derive(Debug, Clone)]
pub struct PositionedComment {
    pub color: u32,
    /// Raw per-comment size; unlike regular comments this is not scaled by
    /// the configured base size.
    pub font_size: f64,
    pub payload: PositionedPayload,
}

/// Fixed-shape payload of a positioned comment, validated once at read time.
#[derive(Debug, Clone)]
pub struct PositionedPayload {
    pub text: String,
    pub from_x: Coordinate,
    pub from_y: Coordinate,
    pub to_x: Coordinate,
    pub to_y: Coordinate,
    /// ASS alpha bytes: 0 is opaque, 255 fully transparent.
    pub from_alpha: u8,
    pub to_alpha: u8,
    /// Degrees, Flash convention.
    pub rotate_y: f64,
    pub rotate_z: f64,
    /// Seconds the comment stays on screen.
    pub lifetime: f64,
    pub duration_ms: i64,
    pub delay_ms: i64,
    pub font_face: Option<String>,
    pub border: bool,
}

/// A payload coordinate: absolute pixels in the reference player viewport, or
/// a fraction of that viewport's width/height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Absolute(f64),
    Fraction(f64),
}

/// Sort into processing order: (appearance_time, submission_time, sequence).
/// This ordering is the sole contract lane allocation depends on.
pub fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        a.appearance_time
            .total_cmp(&b.appearance_time)
            .then_with(|| a.submission_time.cmp(&b.submission_time))
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// Longest-line character count; the width approximation stands in for real
/// font metrics.
pub fn text_length(text: &str) -> usize {
    text.split('\n')
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
}

/// Global rendering parameters for one conversion run.
#[derive(Debug, Clone)]
pub struct Config {
    pub stage_width: u32,
    pub stage_height: u32,
    /// Blank pixels reserved at the bottom of the stage.
    pub bottom_reserved: u32,
    pub font_face: String,
    pub font_size: f64,
    /// 1.0 is fully opaque.
    pub text_opacity: f64,
    /// Seconds a scrolling comment takes to cross the stage.
    pub duration_scroll: f64,
    /// Seconds a static comment stays on screen.
    pub duration_static: f64,
    /// Drop comments instead of force-placing them when the stage is full.
    pub reduced: bool,
}

impl Config {
    pub fn new(stage_width: u32, stage_height: u32) -> Self {
        Self {
            stage_width,
            stage_height,
            bottom_reserved: 0,
            font_face: "sans-serif".to_owned(),
            font_size: 25.0,
            text_opacity: 1.0,
            duration_scroll: 5.0,
            duration_static: 5.0,
            reduced: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stage_width == 0 || self.stage_height == 0 {
            bail!(
                "stage size must be positive, got {}x{}",
                self.stage_width,
                self.stage_height
            );
        }

        if self.bottom_reserved >= self.stage_height {
            bail!(
                "reserved bottom margin {} leaves no usable stage height",
                self.bottom_reserved
            );
        }

        if self.font_size <= 0.0 {
            bail!("font size must be > 0");
        }

        if !(0.0..=1.0).contains(&self.text_opacity) {
            bail!("text opacity must be within [0, 1]");
        }

        if self.duration_scroll <= 0.0 || self.duration_static <= 0.0 {
            bail!("display durations must be > 0");
        }

        Ok(())
    }

    pub fn usable_height(&self) -> u32 {
        self.stage_height - self.bottom_reserved
    }
}
