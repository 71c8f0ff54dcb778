//! Recorded landmark stream input
//!
//! One JSON value per line: `null` for a frame the camera failed to deliver,
//! otherwise a landmark frame object. Blank lines are ignored. A line that
//! does not decode is treated like a failed capture.

use anyhow::{Context, Result};
use signcaption_core::{FrameRead, FrameSource, LandmarkFrame};
use std::io::BufRead;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Decode one non-blank input line
pub fn parse_frame_line(line: &str, line_no: usize) -> FrameRead<LandmarkFrame> {
    match serde_json::from_str::<Option<LandmarkFrame>>(line) {
        Ok(Some(frame)) => FrameRead::Frame(frame),
        Ok(None) => FrameRead::Skipped(format!("line {}: no frame captured", line_no)),
        Err(e) => FrameRead::Skipped(format!("line {}: undecodable frame: {}", line_no, e)),
    }
}

/// Blocking reader over a JSONL landmark recording
pub struct JsonlFrameSource<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonlFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> FrameSource for JsonlFrameSource<R> {
    type Frame = LandmarkFrame;

    fn next_frame(&mut self) -> FrameRead<LandmarkFrame> {
        loop {
            self.line_no += 1;
            match self.lines.next() {
                None => return FrameRead::End,
                Some(Err(e)) => {
                    tracing::error!("Input read failed at line {}: {}", self.line_no, e);
                    return FrameRead::End;
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => return parse_frame_line(&line, self.line_no),
            }
        }
    }
}

/// Open the input for the blocking loop (`-` = stdin)
pub fn open_blocking(path: &str) -> Result<Box<dyn BufRead + Send>> {
    if path == "-" {
        return Ok(Box::new(std::io::BufReader::new(std::io::stdin())));
    }
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open input {}", path))?;
    Ok(Box::new(std::io::BufReader::new(file)))
}

/// Open the input for the async loop (`-` = stdin)
pub async fn open_async(path: &str) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    if path == "-" {
        return Ok(Box::new(tokio::io::BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open input {}", path))?;
    Ok(Box::new(tokio::io::BufReader::new(file)))
}

/// Read the next frame from an async reader; `End` at EOF
pub async fn next_frame_async<R>(
    lines: &mut tokio::io::Lines<R>,
    line_no: &mut usize,
) -> Result<FrameRead<LandmarkFrame>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        *line_no += 1;
        let line = lines
            .next_line()
            .await
            .with_context(|| format!("Failed to read input line {}", line_no))?;
        match line {
            None => return Ok(FrameRead::End),
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => return Ok(parse_frame_line(&line, *line_no)),
        }
    }
}

/// Lines of an async reader
pub fn async_lines<R: AsyncBufRead + Unpin>(reader: R) -> tokio::io::Lines<R> {
    reader.lines()
}
