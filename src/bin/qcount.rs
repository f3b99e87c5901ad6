use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

use qcount::{dump::DumpReader, Checkpoint, Counting, CounterConfig, Frame, LineCounter};

#[derive(Parser, Debug)]
#[command(name = "qcount", about = "Count objects crossing a horizontal line")]
struct Args {
    /// Detections dump, one `<frame>:<json rects>` line per frame
    dump: PathBuf,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    /// JSON counter config, flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Y position of the counting line (px)
    #[arg(long)]
    count_line_position: Option<u32>,
    #[arg(long = "count_line_postion", hide = true)]
    count_line_postion: Option<u32>,
    /// Minimum bounding box width to consider
    #[arg(long)]
    min_width_react: Option<u32>,
    /// Minimum bounding box height to consider
    #[arg(long)]
    min_height_react: Option<u32>,
    #[arg(long)]
    min_contour_area: Option<u64>,
    /// Apply the min width/height to detections
    #[arg(long)]
    filter_by_size: bool,
    /// Write every crossing event as a JSON array
    #[arg(long, value_name = "FILE")]
    events_json: Option<PathBuf>,
    /// Resume from a checkpoint and write the final state back to it
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,
}

impl Args {
    fn counter_config(&self) -> Result<CounterConfig> {
        let mut config = match &self.config {
            Some(path) => CounterConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => CounterConfig::default(),
        };

        // the misspelled alias wins when both are given
        if let Some(pos) = self.count_line_postion.or(self.count_line_position) {
            config.reference_line_position = Some(pos);
        }
        if let Some(w) = self.min_width_react {
            config.min_width = w;
        }
        if let Some(h) = self.min_height_react {
            config.min_height = h;
        }
        if let Some(area) = self.min_contour_area {
            config.min_contour_area = area;
        }
        if self.filter_by_size {
            config.filter_by_size = true;
        }

        Ok(config)
    }

    /// Config flags given on the command line
    fn config_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();

        if self.config.is_some() {
            flags.push("--config");
        }
        if self.count_line_position.is_some() || self.count_line_postion.is_some() {
            flags.push("--count-line-position");
        }
        if self.min_width_react.is_some() {
            flags.push("--min-width-react");
        }
        if self.min_height_react.is_some() {
            flags.push("--min-height-react");
        }
        if self.min_contour_area.is_some() {
            flags.push("--min-contour-area");
        }
        if self.filter_by_size {
            flags.push("--filter-by-size");
        }

        flags
    }
}

fn load_counter(args: &Args) -> Result<LineCounter> {
    if let Some(path) = &args.checkpoint {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("opening checkpoint {}", path.display()))?;
            let checkpoint: Checkpoint = serde_json::from_reader(std::io::BufReader::new(file))
                .context("parsing checkpoint")?;
            tracing::info!("resuming after {} frames", checkpoint.frames);

            let flags = args.config_flags();
            if !flags.is_empty() {
                tracing::warn!("resuming from checkpoint, ignoring {}", flags.join(", "));
            }

            let counter = LineCounter::restore(checkpoint)?;
            if let Some((w, h)) = counter.dims() {
                if (w, h) != (args.width, args.height) {
                    tracing::warn!(
                        "checkpoint frames were {}x{}, counting line stays at row {:?}",
                        w,
                        h,
                        counter.line()
                    );
                }
            }

            return Ok(counter);
        }
    }

    Ok(LineCounter::new(args.counter_config()?)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut counter = load_counter(&args)?;

    let mut reader = DumpReader::open(&args.dump)
        .with_context(|| format!("opening dump {}", args.dump.display()))?;

    let resume_from = counter.frames();
    let mut events = Vec::new();

    for (n, item) in reader.by_ref().enumerate() {
        let (index, detections) = item?;

        if (n as u64) < resume_from {
            continue;
        }

        let frame = Frame::new(index, (args.width, args.height), detections);
        let report = counter.update(&frame)?;

        for ev in &report.events {
            println!("{} {} {}", ev.frame, ev.id, ev.direction);
        }
        events.extend(report.events);
    }

    if reader.skipped() > 0 {
        tracing::warn!("{} malformed lines skipped", reader.skipped());
    }

    let counts = counter.counts();
    println!("Up: {}", counts.up);
    println!("Down: {}", counts.down);
    println!("Total: {}", counts.total());

    if let Some(path) = &args.events_json {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &events)?;
        out.flush()?;
    }

    if let Some(path) = &args.checkpoint {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut out, &counter.checkpoint())?;
        out.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["qcount", "dets.txt", "--width", "640", "--height", "360"];
        argv.extend_from_slice(extra);

        Args::parse_from(argv)
    }

    #[test]
    fn defaults_without_flags() {
        let a = args(&[]);

        assert_eq!(a.counter_config().unwrap(), CounterConfig::default());
        assert!(a.config_flags().is_empty());
    }

    #[test]
    fn flags_override_defaults() {
        let a = args(&[
            "--count-line-position",
            "200",
            "--min-width-react",
            "40",
            "--min-height-react",
            "50",
            "--min-contour-area",
            "900",
            "--filter-by-size",
        ]);
        let config = a.counter_config().unwrap();

        assert_eq!(config.reference_line_position, Some(200));
        assert_eq!(config.min_width, 40);
        assert_eq!(config.min_height, 50);
        assert_eq!(config.min_contour_area, 900);
        assert!(config.filter_by_size);
        assert_eq!(a.config_flags().len(), 5);
    }

    #[test]
    fn misspelled_line_alias_wins() {
        let a = args(&["--count-line-position", "200", "--count_line_postion", "150"]);
        assert_eq!(a.counter_config().unwrap().reference_line_position, Some(150));

        let a = args(&["--count_line_postion", "120"]);
        assert_eq!(a.counter_config().unwrap().reference_line_position, Some(120));
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("qcount-cli-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"referenceLinePosition": 100, "minContourArea": 300}"#).unwrap();

        let a = args(&["--config", path.to_str().unwrap(), "--count-line-position", "250"]);
        let config = a.counter_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.reference_line_position, Some(250));
        assert_eq!(config.min_contour_area, 300);
        assert_eq!(a.config_flags(), vec!["--config", "--count-line-position"]);
    }

    #[test]
    fn resume_keeps_checkpoint_config() {
        let path = std::env::temp_dir().join(format!("qcount-ckpt-{}.json", std::process::id()));
        let saved = LineCounter::new(CounterConfig {
            min_contour_area: 700,
            ..Default::default()
        })
        .unwrap();
        std::fs::write(&path, serde_json::to_string(&saved.checkpoint()).unwrap()).unwrap();

        let a = args(&[
            "--checkpoint",
            path.to_str().unwrap(),
            "--min-contour-area",
            "10",
        ]);
        let counter = load_counter(&a).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(counter.config().min_contour_area, 700);
    }
}
