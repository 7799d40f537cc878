use std::fmt::Write as _;

use crate::geometry::{self, ZoomFactor};
use crate::schema::{Comment, CommentMode, Config, Coordinate, PositionedComment, RegularComment};

/// Reference player viewport positioned comments are authored against.
pub const PLAYER_SIZE: (f64, f64) = (672.0, 438.0);

/// Escape text for an ASS event: backslash and both braces are escaped,
/// newlines become explicit line breaks, and runs of leading/trailing spaces
/// on each line are replaced with figure spaces so the player cannot collapse
/// them. ASS forbids empty text segments, so an empty line becomes a space.
pub fn ass_escape(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}");
    escaped
        .split('\n')
        .map(pad_line)
        .collect::<Vec<_>>()
        .join("\\N")
}

fn pad_line(line: &str) -> String {
    let stripped = line.trim_matches(' ');
    if stripped.len() == line.len() {
        if line.is_empty() {
            " ".to_owned()
        } else {
            line.to_owned()
        }
    } else {
        let leading = line.len() - line.trim_start_matches(' ').len();
        let trailing = line.len() - line.trim_end_matches(' ').len();
        let mut padded = String::with_capacity(line.len() + (leading + trailing) * 2);
        padded.extend(std::iter::repeat('\u{2007}').take(leading));
        padded.push_str(stripped);
        padded.extend(std::iter::repeat('\u{2007}').take(trailing));
        padded
    }
}

/// Format seconds as the `H:MM:SS.CC` ASS timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let centiseconds = (seconds * 100.0).round() as i64;
    let (hours, rest) = (centiseconds / 360_000, centiseconds % 360_000);
    let (minutes, rest) = (rest / 6000, rest % 6000);
    let (seconds, centiseconds) = (rest / 100, rest % 100);
    format!("{hours}:{minutes:02}:{seconds:02}.{centiseconds:02}")
}

fn append_color_styles(styles: &mut String, color: u32, config: &Config) {
    if color != 0xFFFFFF {
        let converted = geometry::convert_color(color, config.stage_width, config.stage_height);
        let _ = write!(styles, "\\c&H{converted}&");
        if color == 0x000000 {
            // Black text needs a white outline to stay visible.
            styles.push_str("\\3c&HFFFFFF&");
        }
    }
}

/// Render one lane-allocated comment into a complete `Dialogue:` line.
pub fn render_regular(
    comment: &Comment,
    style: &RegularComment,
    row: u32,
    config: &Config,
    style_id: &str,
) -> String {
    let text = ass_escape(&style.text);
    let half_width = config.stage_width / 2;
    let mut styles = String::new();

    let duration = match style.mode {
        CommentMode::Top => {
            let _ = write!(styles, "\\an8\\pos({half_width}, {row})");
            config.duration_static
        }
        CommentMode::Bottom => {
            let mirrored = config.stage_height - config.bottom_reserved - row;
            let _ = write!(styles, "\\an2\\pos({half_width}, {mirrored})");
            config.duration_static
        }
        CommentMode::ScrollReverse => {
            let tail = -(style.width.ceil() as i64);
            let _ = write!(
                styles,
                "\\move({tail}, {row}, {width}, {row})",
                width = config.stage_width
            );
            config.duration_scroll
        }
        CommentMode::Scroll => {
            let tail = -(style.width.ceil() as i64);
            let _ = write!(
                styles,
                "\\move({width}, {row}, {tail}, {row})",
                width = config.stage_width
            );
            config.duration_scroll
        }
    };

    // Skip the override when the size is within a pixel of the track default.
    let size_delta = style.font_size - config.font_size;
    if !(-1.0 < size_delta && size_delta < 1.0) {
        let _ = write!(styles, "\\fs{:.0}", style.font_size);
    }
    append_color_styles(&mut styles, style.color, config);

    format!(
        "Dialogue: 2,{start},{end},{style_id},,0000,0000,0000,,{{{styles}}}{text}",
        start = format_timestamp(comment.appearance_time),
        end = format_timestamp(comment.appearance_time + duration),
    )
}

fn resolve_position(coordinate: Coordinate, vertical: bool, zoom: ZoomFactor) -> f64 {
    let offset = if vertical { zoom.dy } else { zoom.dx };
    match coordinate {
        Coordinate::Absolute(value) => zoom.scale * value + offset,
        Coordinate::Fraction(value) => {
            let extent = if vertical { PLAYER_SIZE.1 } else { PLAYER_SIZE.0 };
            extent * zoom.scale * value + offset
        }
    }
}

/// Render a positioned comment: anchor points go through the zoom transform
/// and the Flash rotation projection, alpha picks one of four fade forms, and
/// the transform block animates only when the start and end anchors differ.
pub fn render_positioned(
    comment: &Comment,
    positioned: &PositionedComment,
    config: &Config,
    zoom: ZoomFactor,
    style_id: &str,
) -> String {
    let payload = &positioned.payload;
    let stage_width = f64::from(config.stage_width);
    let stage_height = f64::from(config.stage_height);

    let from_x = resolve_position(payload.from_x, false, zoom);
    let from_y = resolve_position(payload.from_y, true, zoom);
    let to_x = resolve_position(payload.to_x, false, zoom);
    let to_y = resolve_position(payload.to_y, true, zoom);

    let from = geometry::convert_flash_rotation(
        payload.rotate_y,
        payload.rotate_z,
        from_x,
        from_y,
        stage_width,
        stage_height,
    );
    let to = geometry::convert_flash_rotation(
        payload.rotate_y,
        payload.rotate_z,
        to_x,
        to_y,
        stage_width,
        stage_height,
    );

    let mut styles = String::new();
    let _ = write!(
        styles,
        "\\org({}, {})",
        config.stage_width / 2,
        config.stage_height / 2
    );
    if from.x == to.x && from.y == to.y {
        let _ = write!(styles, "\\pos({:.0}, {:.0})", from.x, from.y);
    } else {
        let _ = write!(
            styles,
            "\\move({:.0}, {:.0}, {:.0}, {:.0}, {}, {})",
            from.x,
            from.y,
            to.x,
            to.y,
            payload.delay_ms,
            payload.delay_ms + payload.duration_ms
        );
    }
    let _ = write!(
        styles,
        "\\frx{:.0}\\fry{:.0}\\frz{:.0}\\fscx{:.0}\\fscy{:.0}",
        from.rot_x, from.rot_y, from.rot_z, from.scale, from.scale
    );
    if (from_x, from_y) != (to_x, to_y) {
        let _ = write!(
            styles,
            "\\t({}, {}, ",
            payload.delay_ms,
            payload.delay_ms + payload.duration_ms
        );
        let _ = write!(
            styles,
            "\\frx{:.0}\\fry{:.0}\\frz{:.0}\\fscx{:.0}\\fscy{:.0}",
            to.rot_x, to.rot_y, to.rot_z, to.scale, to.scale
        );
        styles.push(')');
    }
    if let Some(face) = &payload.font_face {
        let _ = write!(styles, "\\fn{}", ass_escape(face));
    }
    let _ = write!(styles, "\\fs{:.0}", positioned.font_size * zoom.scale);
    append_color_styles(&mut styles, positioned.color, config);

    let lifetime_ms = payload.lifetime * 1000.0;
    if payload.from_alpha == payload.to_alpha {
        let _ = write!(styles, "\\alpha&H{:02X}", payload.from_alpha);
    } else if (payload.from_alpha, payload.to_alpha) == (255, 0) {
        let _ = write!(styles, "\\fad({lifetime_ms:.0},0)");
    } else if (payload.from_alpha, payload.to_alpha) == (0, 255) {
        let _ = write!(styles, "\\fad(0, {lifetime_ms:.0})");
    } else {
        let _ = write!(
            styles,
            "\\fade({from}, {to}, {to}, 0, {end:.0}, {end:.0}, {end:.0})",
            from = payload.from_alpha,
            to = payload.to_alpha,
            end = lifetime_ms
        );
    }
    if !payload.border {
        styles.push_str("\\bord0");
    }

    format!(
        "Dialogue: -1,{start},{end},{style_id},,0,0,0,,{{{styles}}}{text}",
        start = format_timestamp(comment.appearance_time),
        end = format_timestamp(comment.appearance_time + payload.lifetime),
        text = ass_escape(&payload.text),
    )
}
