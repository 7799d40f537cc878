use crate::schema::{Comment, Config, RegularComment, LANE_SPACES};

/// Cached occupancy of one grid cell: which comment holds the row plus the
/// two fields collision checks read. A back-reference only; comments live in
/// the run's comment list and are never owned by the grid.
#[derive(Debug, Clone, Copy)]
struct Occupant {
    sequence: usize,
    appearance_time: f64,
    width: f64,
}

/// Per-run lane occupancy index: one pixel-row array per regular comment
/// mode. Created once per run, mutated only while comments are placed in
/// sorted order, then discarded.
pub struct LaneGrid {
    rows: [Vec<Option<Occupant>>; LANE_SPACES],
    stage_width: f64,
    duration_scroll: f64,
    duration_static: f64,
}

impl LaneGrid {
    pub fn new(config: &Config) -> Self {
        let usable = config.usable_height() as usize;
        Self {
            rows: std::array::from_fn(|_| vec![None; usable]),
            stage_width: f64::from(config.stage_width),
            duration_scroll: config.duration_scroll,
            duration_static: config.duration_static,
        }
    }

    fn usable_height(&self) -> usize {
        self.rows[0].len()
    }

    /// Scan downward for the first row whose free run fits the comment's
    /// height. On success the run is marked occupied and the row returned;
    /// `None` means collision-exhausted (no row satisfies the non-overlap
    /// rule above the bottom of the usable area).
    pub fn allocate(&mut self, comment: &Comment, style: &RegularComment) -> Option<u32> {
        let row_max = self.usable_height() as f64 - style.height;
        let mut row: u32 = 0;
        while f64::from(row) <= row_max {
            let free = self.free_run(comment, style, row);
            if f64::from(free) >= style.height {
                self.mark(comment, style, row);
                return Some(row);
            }
            // A zero-length run still has to make progress.
            row += free.max(1);
        }
        None
    }

    /// Collision-exhausted fallback: the first completely empty row wins,
    /// otherwise the row whose occupant appeared earliest (the one most
    /// likely finished or closest to finishing). The previous occupant is
    /// superseded in the index, not deleted.
    pub fn force_allocate(&mut self, comment: &Comment, style: &RegularComment) -> u32 {
        let rows = &self.rows[style.mode.lane_space()];
        let limit = (self.usable_height() as i64 - style.height.ceil() as i64).max(0) as usize;

        let mut chosen = None;
        let mut earliest = 0usize;
        for row in 0..limit {
            match rows[row] {
                None => {
                    chosen = Some(row);
                    break;
                }
                Some(occupant) => {
                    // rows[earliest] is occupied whenever we get here: an
                    // empty row would have ended the scan already.
                    if let Some(best) = rows[earliest] {
                        if occupant.appearance_time < best.appearance_time {
                            earliest = row;
                        }
                    }
                }
            }
        }

        let row = chosen.unwrap_or(earliest) as u32;
        self.mark(comment, style, row);
        row
    }

    /// Count consecutive rows from `start` that the comment could occupy
    /// before hitting a blocking occupant. Consecutive cells held by the same
    /// comment are checked once.
    fn free_run(&self, comment: &Comment, style: &RegularComment, start: u32) -> u32 {
        let rows = &self.rows[style.mode.lane_space()];
        let mut run: u32 = 0;
        let mut row = start as usize;
        let mut last: Option<Occupant> = None;

        if style.mode.is_static() {
            while row < rows.len() && f64::from(run) < style.height {
                let cell = rows[row];
                if cell_changed(cell, last) {
                    last = cell;
                    if let Some(occupant) = cell {
                        // Blocking while the occupant's fixed display window
                        // is still open.
                        if occupant.appearance_time + self.duration_static > comment.appearance_time
                        {
                            break;
                        }
                    }
                }
                row += 1;
                run += 1;
            }
        } else {
            // A row is safe once the occupant has both cleared the candidate's
            // entry point (threshold below) and will leave the stage before
            // the candidate catches up. Degenerate widths make the rules
            // inapplicable, never an error.
            let entry_denominator = style.width + self.stage_width;
            let threshold = if entry_denominator == 0.0 {
                comment.appearance_time - self.duration_scroll
            } else {
                comment.appearance_time
                    - self.duration_scroll * (1.0 - self.stage_width / entry_denominator)
            };

            while row < rows.len() && f64::from(run) < style.height {
                let cell = rows[row];
                if cell_changed(cell, last) {
                    last = cell;
                    if let Some(occupant) = cell {
                        if occupant.appearance_time > threshold {
                            break;
                        }
                        let clear_denominator = occupant.width + self.stage_width;
                        if clear_denominator != 0.0
                            && occupant.appearance_time
                                + occupant.width * self.duration_scroll / clear_denominator
                                > comment.appearance_time
                        {
                            break;
                        }
                    }
                }
                row += 1;
                run += 1;
            }
        }

        run
    }

    /// Mark `ceil(height)` cells starting at `row` as held by the comment.
    /// Marks past the end of the grid are silently truncated.
    fn mark(&mut self, comment: &Comment, style: &RegularComment, row: u32) {
        let rows = &mut self.rows[style.mode.lane_space()];
        let start = (row as usize).min(rows.len());
        let end = (start + style.height.ceil().max(0.0) as usize).min(rows.len());
        let occupant = Occupant {
            sequence: comment.sequence,
            appearance_time: comment.appearance_time,
            width: style.width,
        };
        for cell in &mut rows[start..end] {
            *cell = Some(occupant);
        }
    }
}

fn cell_changed(cell: Option<Occupant>, last: Option<Occupant>) -> bool {
    match (cell, last) {
        (Some(current), Some(previous)) => current.sequence != previous.sequence,
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommentBody, CommentMode};

    fn config() -> Config {
        let mut config = Config::new(800, 600);
        config.duration_scroll = 5.0;
        config.duration_static = 5.0;
        config
    }

    fn comment(mode: CommentMode, appearance_time: f64, sequence: usize, width: f64) -> Comment {
        Comment {
            appearance_time,
            submission_time: 0,
            sequence,
            body: CommentBody::Regular(RegularComment {
                mode,
                text: String::new(),
                color: 0xFFFFFF,
                font_size: 25.0,
                height: 25.0,
                width,
            }),
        }
    }

    fn style(comment: &Comment) -> &RegularComment {
        match &comment.body {
            CommentBody::Regular(style) => style,
            CommentBody::Positioned(_) => unreachable!(),
        }
    }

    #[test]
    fn empty_grid_places_in_row_zero() {
        let mut grid = LaneGrid::new(&config());
        let first = comment(CommentMode::Scroll, 0.0, 0, 100.0);
        assert_eq!(grid.allocate(&first, style(&first)), Some(0));
    }

    #[test]
    fn concurrent_static_comments_stack_in_distinct_lanes() {
        let mut grid = LaneGrid::new(&config());
        let first = comment(CommentMode::Top, 0.0, 0, 100.0);
        let second = comment(CommentMode::Top, 0.0, 1, 100.0);
        let row_a = grid.allocate(&first, style(&first)).unwrap();
        let row_b = grid.allocate(&second, style(&second)).unwrap();
        assert_eq!(row_a, 0);
        assert_eq!(row_b, 25);
    }

    #[test]
    fn static_lane_frees_after_display_window() {
        let mut grid = LaneGrid::new(&config());
        let first = comment(CommentMode::Top, 0.0, 0, 100.0);
        grid.allocate(&first, style(&first)).unwrap();

        // Same lane is blocking at 4.9s, free again at 5.0s.
        let blocked = comment(CommentMode::Top, 4.9, 1, 100.0);
        assert_ne!(grid.allocate(&blocked, style(&blocked)), Some(0));
        let free = comment(CommentMode::Top, 5.0, 2, 100.0);
        assert_eq!(grid.allocate(&free, style(&free)), Some(0));
    }

    #[test]
    fn lane_spaces_are_independent_per_mode() {
        let mut grid = LaneGrid::new(&config());
        let top = comment(CommentMode::Top, 0.0, 0, 100.0);
        let bottom = comment(CommentMode::Bottom, 0.0, 1, 100.0);
        assert_eq!(grid.allocate(&top, style(&top)), Some(0));
        assert_eq!(grid.allocate(&bottom, style(&bottom)), Some(0));
    }

    #[test]
    fn scroll_lane_blocks_until_occupant_clears() {
        let mut grid = LaneGrid::new(&config());
        let slow = comment(CommentMode::Scroll, 0.0, 0, 800.0);
        grid.allocate(&slow, style(&slow)).unwrap();

        // The occupant's clearing time is 800*5/(800+800) = 2.5s; right after
        // appearing it also still covers the entry edge.
        let early = comment(CommentMode::Scroll, 1.0, 1, 100.0);
        assert_ne!(grid.allocate(&early, style(&early)), Some(0));

        let late = comment(CommentMode::Scroll, 4.0, 2, 100.0);
        assert_eq!(grid.allocate(&late, style(&late)), Some(0));
    }

    #[test]
    fn oversized_comment_never_fits() {
        let mut grid = LaneGrid::new(&config());
        let mut big = comment(CommentMode::Top, 0.0, 0, 100.0);
        if let CommentBody::Regular(ref mut style) = big.body {
            style.height = 700.0;
        }
        assert_eq!(grid.allocate(&big, style(&big)), None);
        // Force placement still works, marking truncated at the grid end.
        assert_eq!(grid.force_allocate(&big, style(&big)), 0);
    }

    #[test]
    fn exhausted_grid_evicts_earliest_occupant() {
        let mut config = config();
        config.stage_height = 75;
        let mut grid = LaneGrid::new(&config);

        // Three 25px comments fill the 75px of static lanes.
        let first = comment(CommentMode::Top, 1.0, 0, 100.0);
        let second = comment(CommentMode::Top, 2.0, 1, 100.0);
        let third = comment(CommentMode::Top, 3.0, 2, 100.0);
        assert_eq!(grid.allocate(&first, style(&first)), Some(0));
        assert_eq!(grid.allocate(&second, style(&second)), Some(25));
        assert_eq!(grid.allocate(&third, style(&third)), Some(50));

        let fourth = comment(CommentMode::Top, 3.5, 3, 100.0);
        assert_eq!(grid.allocate(&fourth, style(&fourth)), None);
        // The row whose occupant appeared earliest is superseded.
        assert_eq!(grid.force_allocate(&fourth, style(&fourth)), 0);

        // The grid index now sees the new occupant in row 0, so the next
        // eviction picks the second-oldest row instead.
        let fifth = comment(CommentMode::Top, 3.6, 4, 100.0);
        assert_eq!(grid.allocate(&fifth, style(&fifth)), None);
        assert_eq!(grid.force_allocate(&fifth, style(&fifth)), 25);
    }

    #[test]
    fn zero_width_stage_does_not_divide_by_zero() {
        let mut config = Config::new(1, 600);
        config.stage_width = 0;
        // Bypasses validate(); the allocator itself must stay total.
        let mut grid = LaneGrid::new(&config);
        let mut zero = comment(CommentMode::Scroll, 0.0, 0, 0.0);
        if let CommentBody::Regular(ref mut style) = zero.body {
            style.width = 0.0;
        }
        grid.allocate(&zero, style(&zero));
        let next = comment(CommentMode::Scroll, 0.1, 1, 0.0);
        grid.allocate(&next, style(&next));
    }
}
