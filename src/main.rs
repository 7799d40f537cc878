use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use dsc::filter::CommentFilter;
use dsc::pipeline;
use dsc::reader;
use dsc::schema::Config;

#[derive(Debug, Parser)]
#[command(name = "dsc")]
#[command(about = "Danmaku Subtitle Compiler")]
#[command(version)]
struct Cli {
    /// Stage size in pixels, e.g. 1920x1080
    #[arg(short = 's', long = "size")]
    size: String,

    /// Output file; stdout when omitted
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Font face used by the track style
    #[arg(long = "font", default_value = "sans-serif")]
    font: String,

    /// Default font size in pixels
    #[arg(long = "fontsize", default_value_t = 25.0)]
    fontsize: f64,

    /// Text opacity, 1.0 fully opaque
    #[arg(short = 'a', long = "alpha", default_value_t = 1.0)]
    alpha: f64,

    /// Seconds a scrolling comment takes to cross the stage
    #[arg(long = "duration-marquee", default_value_t = 5.0)]
    duration_marquee: f64,

    /// Seconds a still comment stays on screen
    #[arg(long = "duration-still", default_value_t = 5.0)]
    duration_still: f64,

    /// Drop comments matching this regular expression
    #[arg(long = "filter")]
    filter: Option<String>,

    /// File of additional filter expressions, one per line
    #[arg(long = "filter-file")]
    filter_file: Option<PathBuf>,

    /// Reserve blank pixels at the bottom of the stage
    #[arg(short = 'p', long = "protect", default_value_t = 0)]
    protect: u32,

    /// Drop comments instead of force-placing them when the stage is full
    #[arg(short = 'r', long = "reduce")]
    reduce: bool,

    /// Comment files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (stage_width, stage_height) = parse_stage_size(&cli.size)?;
    let mut config = Config::new(stage_width, stage_height);
    config.bottom_reserved = cli.protect;
    config.font_face = cli.font;
    config.font_size = cli.fontsize;
    config.text_opacity = cli.alpha;
    config.duration_scroll = cli.duration_marquee;
    config.duration_static = cli.duration_still;
    config.reduced = cli.reduce;
    config.validate()?;

    let filter = CommentFilter::compile(cli.filter.as_deref(), cli.filter_file.as_deref())?;
    let comments = reader::read_comment_files(&cli.files, config.font_size)?;

    let mut progress = |done: usize, total: usize| {
        eprintln!("laid out {done}/{total} comments");
    };
    let mut rng = rand::thread_rng();

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            pipeline::write_track(
                &comments,
                &config,
                &filter,
                BufWriter::new(file),
                &mut rng,
                Some(&mut progress),
            )?;
        }
        None => {
            let stdout = io::stdout();
            pipeline::write_track(
                &comments,
                &config,
                &filter,
                stdout.lock(),
                &mut rng,
                Some(&mut progress),
            )?;
        }
    }
    Ok(())
}

fn parse_stage_size(raw: &str) -> Result<(u32, u32)> {
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| anyhow!("invalid stage size '{raw}', expected WIDTHxHEIGHT"))?;
    let width = width
        .parse()
        .with_context(|| format!("invalid stage size '{raw}'"))?;
    let height = height
        .parse()
        .with_context(|| format!("invalid stage size '{raw}'"))?;
    Ok((width, height))
}
