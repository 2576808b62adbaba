use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;

pub fn strip_ansi_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        match (in_escape, c) {
            (_, '\x1b') => in_escape = true,
            (true, c) if c.is_ascii_alphabetic() => in_escape = false,
            (true, _) => {}
            (false, c) => result.push(c),
        }
    }
    result
}

/// Append-only log file that keeps roughly the newest `max_lines` lines.
///
/// Trimming rewrites the file once a tenth of the budget (at least 100
/// lines) has been appended since the last trim.
#[derive(Clone)]
pub struct CappedFileWriter {
    inner: Arc<Mutex<CappedFile>>,
}

struct CappedFile {
    path: PathBuf,
    max_lines: usize,
    appended: usize,
}

impl CappedFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CappedFile {
                path: path.into(),
                max_lines: max_lines.max(1),
                appended: 0,
            })),
        }
    }
}

impl CappedFile {
    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)?;

        self.appended += buf.iter().filter(|&&b| b == b'\n').count();
        if self.appended >= (self.max_lines / 10).max(100) {
            self.appended = 0;
            self.trim()?;
        }
        Ok(())
    }

    fn trim(&self) -> io::Result<()> {
        let lines: Vec<String> = BufReader::new(File::open(&self.path)?)
            .lines()
            .collect::<Result<_, _>>()?;
        if lines.len() <= self.max_lines {
            return Ok(());
        }

        let mut file = File::create(&self.path)?;
        for line in &lines[lines.len() - self.max_lines..] {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

impl io::Write for CappedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CappedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
