// PCES-SWEEP: Parameter Sweeps over External Network Simulations with Box-Plot Summaries
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Progress reporting towards the front-end, which polls a small text file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Message written once the whole sweep is finished.
pub const DONE: &str = "Done";

/// Message written after the `k`-th of `n` variants.
pub fn progress_message(k: usize, n: usize) -> String {
    format!("running experiment {k} of {n} ...")
}

/// Receives human-readable progress messages. Each message replaces the previous one.
pub trait ProgressSink {
    fn report(&mut self, message: &str) -> io::Result<()>;
}

/// Overwrites a file with the latest message, terminated by a newline.
#[derive(Clone, Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressSink for FileSink {
    fn report(&mut self, message: &str) -> io::Result<()> {
        fs::write(&self.path, format!("{message}\n"))
    }
}

/// Keeps every message in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub messages: Vec<String>,
}

impl MemorySink {
    pub fn last(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

impl ProgressSink for MemorySink {
    fn report(&mut self, message: &str) -> io::Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }
}

/// Discards all messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ProgressSink> ProgressSink for Option<S> {
    fn report(&mut self, message: &str) -> io::Result<()> {
        match self {
            Some(sink) => sink.report(message),
            None => Ok(()),
        }
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn report(&mut self, message: &str) -> io::Result<()> {
        (**self).report(message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_format() {
        assert_eq!(progress_message(3, 12), "running experiment 3 of 12 ...");
    }

    #[test]
    fn file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("expCounter"));
        sink.report(&progress_message(1, 2)).unwrap();
        assert_eq!(
            fs::read_to_string(sink.path()).unwrap(),
            "running experiment 1 of 2 ...\n"
        );
        sink.report(DONE).unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "Done\n");
    }

    #[test]
    fn file_sink_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("missing").join("expCounter"));
        assert!(sink.report(DONE).is_err());
    }

    #[test]
    fn optional_sink() {
        let mut sink: Option<MemorySink> = None;
        sink.report(DONE).unwrap();
        let mut sink = Some(MemorySink::default());
        sink.report(DONE).unwrap();
        assert_eq!(sink.unwrap().last(), Some(DONE));
    }
}
