use std::io::Write;

use anyhow::Result;
use rand::Rng;

use crate::filter::CommentFilter;
use crate::geometry::ZoomFactor;
use crate::layout::LaneGrid;
use crate::renderer;
use crate::schema::{Comment, CommentBody, Config};
use crate::track::{self, TrackWriter};

/// How often the progress callback fires, in records.
const PROGRESS_INTERVAL: usize = 1000;

/// Lay out and render `comments` (already in processing order) into `out` as
/// one complete ASS track.
///
/// The run is fully sequential: the lane grid state after comment `i` is what
/// makes comment `i + 1` land correctly, so there is nothing to parallelize.
/// The progress callback, when given, is invoked synchronously every
/// [`PROGRESS_INTERVAL`] records and once at completion.
pub fn write_track<W: Write>(
    comments: &[Comment],
    config: &Config,
    filter: &CommentFilter,
    out: W,
    rng: &mut impl Rng,
    mut progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<()> {
    config.validate()?;

    let style_id = track::random_style_id(rng);
    let mut writer = TrackWriter::new(out);
    writer.write_header(config, &style_id)?;

    // One zoom transform per run: reference player viewport onto the stage.
    let zoom = ZoomFactor::fit(
        renderer::PLAYER_SIZE,
        (f64::from(config.stage_width), f64::from(config.stage_height)),
    );
    let mut grid = LaneGrid::new(config);

    for (index, comment) in comments.iter().enumerate() {
        if index % PROGRESS_INTERVAL == 0 {
            if let Some(callback) = progress.as_mut() {
                callback(index, comments.len());
            }
        }

        match &comment.body {
            CommentBody::Regular(style) => {
                if filter.matches(&style.text) {
                    continue;
                }
                let row = match grid.allocate(comment, style) {
                    Some(row) => row,
                    None if config.reduced => continue,
                    None => grid.force_allocate(comment, style),
                };
                writer.write_event(&renderer::render_regular(
                    comment, style, row, config, &style_id,
                ))?;
            }
            CommentBody::Positioned(positioned) => {
                writer.write_event(&renderer::render_positioned(
                    comment, positioned, config, zoom, &style_id,
                ))?;
            }
        }
    }

    if let Some(callback) = progress.as_mut() {
        callback(comments.len(), comments.len());
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommentMode, RegularComment};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn comment(appearance_time: f64, sequence: usize, text: &str) -> Comment {
        Comment {
            appearance_time,
            submission_time: 0,
            sequence,
            body: CommentBody::Regular(RegularComment {
                mode: CommentMode::Scroll,
                text: text.to_owned(),
                color: 0xFFFFFF,
                font_size: 25.0,
                height: 25.0,
                width: 25.0 * text.chars().count() as f64,
            }),
        }
    }

    fn render(comments: &[Comment], config: &Config) -> String {
        let filter = CommentFilter::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = Vec::new();
        write_track(comments, config, &filter, &mut buffer, &mut rng, None).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn emits_one_event_per_comment_after_the_header() {
        let comments = vec![comment(0.0, 0, "first"), comment(1.0, 1, "second")];
        let output = render(&comments, &Config::new(800, 600));
        assert_eq!(output.matches("Dialogue: ").count(), 2);
        let header_end = output.find("[Events]").unwrap();
        assert!(output[header_end..].contains("first"));
    }

    #[test]
    fn filtered_comments_produce_no_events() {
        let comments = vec![comment(0.0, 0, "keep me"), comment(1.0, 1, "spam spam")];
        let filter = CommentFilter::compile(Some("spam"), None).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = Vec::new();
        write_track(
            &comments,
            &Config::new(800, 600),
            &filter,
            &mut buffer,
            &mut rng,
            None,
        )
        .unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output.matches("Dialogue: ").count(), 1);
        assert!(output.contains("keep me"));
        assert!(!output.contains("spam"));
    }

    #[test]
    fn invalid_config_fails_before_any_output() {
        let mut buffer = Vec::new();
        let mut rng = StdRng::seed_from_u64(0);
        let result = write_track(
            &[],
            &Config::new(0, 600),
            &CommentFilter::default(),
            &mut buffer,
            &mut rng,
            None,
        );
        assert!(result.is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn progress_reports_start_and_completion() {
        let comments = vec![comment(0.0, 0, "a"), comment(1.0, 1, "b")];
        let mut calls = Vec::new();
        let mut callback = |done: usize, total: usize| calls.push((done, total));
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = Vec::new();
        write_track(
            &comments,
            &Config::new(800, 600),
            &CommentFilter::default(),
            &mut buffer,
            &mut rng,
            Some(&mut callback),
        )
        .unwrap();
        assert_eq!(calls, vec![(0, 2), (2, 2)]);
    }
}
