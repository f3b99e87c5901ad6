//! Recorded detections, one frame per line: `<frame>:<json array of rects>`

use std::io::BufRead;

use crate::detection::Detection;
use crate::error::Error;

/// Parses one dump line, `Ok(None)` for blank lines
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<(u64, Vec<Detection>)>, Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let idx = line.find(':').ok_or_else(|| Error::Parse {
        line: line_no,
        reason: "expected `:`".into(),
    })?;
    let (index, vector) = line.split_at(idx);

    let index = index.trim().parse::<u64>().map_err(|err| Error::Parse {
        line: line_no,
        reason: format!("parse frame index failed: {}", err),
    })?;

    let detections = serde_json::from_str(&vector[1..]).map_err(|err| Error::Parse {
        line: line_no,
        reason: format!("parse json failed: {}", err),
    })?;

    Ok(Some((index, detections)))
}

/// Iterates frames of a dump, skipping (and logging) lines it cannot parse
pub struct DumpReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl DumpReader<std::io::BufReader<std::fs::File>> {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;

        Ok(Self::new(std::io::BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<(u64, Vec<Detection>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;

            match parse_line(self.line_no, &line) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!("wrong file format: {}", err);
                    self.skipped += 1;
                }
            }
        }
    }
}
