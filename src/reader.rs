use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::schema::{
    self, Comment, CommentBody, CommentMode, Coordinate, PositionedComment, PositionedPayload,
    RegularComment,
};

/// Replace the C0 control characters XML 1.0 forbids with U+FFFD so one bad
/// byte cannot sink the whole document.
pub fn sanitize_text(raw: &str) -> String {
    raw.chars()
        .map(|character| match character {
            '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' => '\u{FFFD}',
            other => other,
        })
        .collect()
}

/// Read every comment file, decode leniently, and return the records in
/// processing order. Undecodable bytes are replaced; a file that is not an
/// XML document at all is fatal.
pub fn read_comment_files(paths: &[PathBuf], base_font_size: f64) -> Result<Vec<Comment>> {
    let mut comments = Vec::new();
    let mut sequence = 0usize;
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let batch = read_bilibili(&text, base_font_size, &mut sequence)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        comments.extend(batch);
    }
    schema::sort_comments(&mut comments);
    Ok(comments)
}

/// Parse one Bilibili comment document. Malformed `<d>` elements are skipped
/// with a warning; `sequence` keeps increasing across documents so records
/// stay totally ordered.
pub fn read_bilibili(xml: &str, base_font_size: f64, sequence: &mut usize) -> Result<Vec<Comment>> {
    let sanitized = sanitize_text(xml);
    let document = roxmltree::Document::parse(&sanitized)
        .context("input is not a well-formed XML document")?;

    let mut comments = Vec::new();
    for node in document.descendants().filter(|node| node.has_tag_name("d")) {
        let current = *sequence;
        *sequence += 1;
        match parse_element(&node, base_font_size, current) {
            Ok(Some(comment)) => comments.push(comment),
            Ok(None) => {}
            Err(error) => {
                eprintln!(
                    "[dsc] skipping invalid comment (p=\"{}\"): {error:#}",
                    node.attribute("p").unwrap_or("")
                );
            }
        }
    }
    Ok(comments)
}

fn parse_element(
    node: &roxmltree::Node<'_, '_>,
    base_font_size: f64,
    sequence: usize,
) -> Result<Option<Comment>> {
    let attribute = node.attribute("p").context("missing p attribute")?;
    let fields: Vec<&str> = attribute.split(',').collect();
    if fields.len() < 5 {
        bail!("expected at least 5 fields, got {}", fields.len());
    }

    let appearance_time: f64 = fields[0].parse().context("malformed appearance time")?;
    let submission_time: i64 = fields[4].parse().context("malformed submission timestamp")?;

    // An element with no body carries nothing to show.
    let Some(text) = node.text() else {
        return Ok(None);
    };

    let body = match fields[1] {
        "1" | "4" | "5" | "6" => {
            let mode = match fields[1] {
                "1" => CommentMode::Scroll,
                "4" => CommentMode::Bottom,
                "5" => CommentMode::Top,
                _ => CommentMode::ScrollReverse,
            };
            let scale: i64 = fields[2].parse().context("malformed font size")?;
            let color: u32 = fields[3].parse().context("malformed color")?;
            let font_size = scale as f64 * base_font_size / 25.0;
            let text = text.replace("/n", "\n");
            let height = (text.matches('\n').count() + 1) as f64 * font_size;
            let width = schema::text_length(&text) as f64 * font_size;
            CommentBody::Regular(RegularComment {
                mode,
                text,
                color,
                font_size,
                height,
                width,
            })
        }
        "7" => {
            let font_size: i64 = fields[2].parse().context("malformed font size")?;
            let color: u32 = fields[3].parse().context("malformed color")?;
            CommentBody::Positioned(PositionedComment {
                color,
                font_size: font_size as f64,
                payload: parse_positioned_payload(text)?,
            })
        }
        // Scripted comments carry code, not text; ignore them.
        "8" => return Ok(None),
        other => bail!("unrecognized comment mode {other}"),
    };

    Ok(Some(Comment {
        appearance_time,
        submission_time,
        sequence,
        body,
    }))
}

/// Validate the JSON payload of a positioned comment into its fixed shape.
/// A missing required field or non-numeric value drops the whole comment.
fn parse_positioned_payload(raw: &str) -> Result<PositionedPayload> {
    let arguments: Vec<Value> = serde_json::from_str(raw).context("payload is not a JSON array")?;

    let text = arguments
        .get(4)
        .map(value_to_string)
        .context("payload is missing its text field")?
        .replace("/n", "\n");

    let from_x = parse_coordinate(arguments.get(0), Coordinate::Absolute(0.0))?;
    let from_y = parse_coordinate(arguments.get(1), Coordinate::Absolute(0.0))?;
    let to_x = parse_coordinate(arguments.get(7), from_x)?;
    let to_y = parse_coordinate(arguments.get(8), from_y)?;

    let alpha_raw = arguments
        .get(2)
        .map(value_to_string)
        .unwrap_or_else(|| "1".to_owned());
    let alpha_parts: Vec<&str> = alpha_raw.split('-').collect();
    let from_opacity: f64 = alpha_parts[0]
        .parse()
        .with_context(|| format!("malformed alpha value '{alpha_raw}'"))?;
    let to_opacity: f64 = match alpha_parts.get(1) {
        Some(part) => part
            .parse()
            .with_context(|| format!("malformed alpha value '{alpha_raw}'"))?,
        None => from_opacity,
    };
    let from_alpha = (255.0 - (from_opacity * 255.0).round()).clamp(0.0, 255.0) as u8;
    let to_alpha = (255.0 - (to_opacity * 255.0).round()).clamp(0.0, 255.0) as u8;

    let rotate_z = value_to_integer(arguments.get(5), 0).context("malformed z rotation")?;
    let rotate_y = value_to_integer(arguments.get(6), 0).context("malformed y rotation")?;

    let lifetime = value_to_float(arguments.get(3), 4500.0).context("malformed lifetime")?;
    let duration_ms = value_to_integer(arguments.get(9), (lifetime * 1000.0) as i64)
        .context("malformed duration")?;
    let delay_ms = value_to_integer(arguments.get(10), 0).context("malformed delay")?;

    let font_face = match arguments.get(12) {
        Some(Value::String(face)) if !face.is_empty() => Some(face.clone()),
        _ => None,
    };
    let border = !matches!(arguments.get(11), Some(Value::String(flag)) if flag == "false");

    Ok(PositionedPayload {
        text,
        from_x,
        from_y,
        to_x,
        to_y,
        from_alpha,
        to_alpha,
        rotate_y: rotate_y as f64,
        rotate_z: rotate_z as f64,
        lifetime,
        duration_ms,
        delay_ms,
        font_face,
        border,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Integer JSON numbers and integer strings are absolute pixel positions;
/// floats at most 1 are fractions of the reference viewport, larger floats
/// absolute again.
fn parse_coordinate(value: Option<&Value>, default: Coordinate) -> Result<Coordinate> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(Coordinate::Absolute(integer as f64))
            } else {
                let float = number.as_f64().context("coordinate is not numeric")?;
                Ok(classify_float(float))
            }
        }
        Value::String(text) => {
            if let Ok(integer) = text.parse::<i64>() {
                Ok(Coordinate::Absolute(integer as f64))
            } else {
                let float: f64 = text.parse().context("coordinate is not numeric")?;
                Ok(classify_float(float))
            }
        }
        _ => bail!("coordinate is not numeric"),
    }
}

fn classify_float(value: f64) -> Coordinate {
    if value > 1.0 {
        Coordinate::Absolute(value)
    } else {
        Coordinate::Fraction(value)
    }
}

fn value_to_integer(value: Option<&Value>, default: i64) -> Result<i64> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(integer)
            } else {
                // Truncate like an int() cast of a float.
                Ok(number.as_f64().context("value is not numeric")? as i64)
            }
        }
        Value::String(text) => text.parse().context("value is not an integer"),
        _ => bail!("value is not numeric"),
    }
}

fn value_to_float(value: Option<&Value>, default: f64) -> Result<f64> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value {
        Value::Number(number) => number.as_f64().context("value is not numeric"),
        Value::String(text) => text.parse().context("value is not numeric"),
        _ => bail!("value is not numeric"),
    }
}
