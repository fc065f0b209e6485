// ABOUTME: Report sink writing to the console and an optional timestamped log file
// ABOUTME: Every report line goes to both destinations so the file mirrors the console

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Log file name for a prefix and invocation time: `<prefix>_<YYYYmmdd_HHMMSS>.log`
pub fn log_file_name(prefix: &str, at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}_{}.log", prefix, at.format("%Y%m%d_%H%M%S")))
}

pub struct ReportWriter<W: Write = io::Stdout> {
    console: W,
    log: Option<(PathBuf, BufWriter<File>)>,
}

impl ReportWriter<io::Stdout> {
    /// Console-only writer
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(console: W) -> Self {
        Self { console, log: None }
    }

    /// Also append every line to `path`, creating it if needed
    pub fn with_log_file(mut self, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        self.log = Some((path.to_path_buf(), BufWriter::new(file)));
        Ok(self)
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.console, "{}", line).context("Failed to write report to console")?;
        if let Some((path, file)) = self.log.as_mut() {
            writeln!(file, "{}", line)
                .with_context(|| format!("Failed to write log file {}", path.display()))?;
        }
        Ok(())
    }

    pub fn lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line.as_ref())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.console.flush().context("Failed to flush console")?;
        if let Some((path, file)) = self.log.as_mut() {
            file.flush()
                .with_context(|| format!("Failed to flush log file {}", path.display()))?;
        }
        Ok(())
    }

    pub fn into_console(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.console)
    }
}
