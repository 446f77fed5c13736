use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only log of human-readable game events for one session.
///
/// Entries are kept in memory and optionally mirrored to a writer and stdout.
/// Writer failures do not interrupt the game; the first one is returned from
/// [`Narrative::close`].
pub struct Narrative {
    inner: Mutex<NarrativeInner>,
    echo: bool,
}

struct NarrativeInner {
    entries: Vec<String>,
    writer: Option<Box<dyn Write + Send>>,
    failure: Option<io::Error>,
    closed: bool,
}

impl Narrative {
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self::build(Some(Box::new(writer)))
    }

    /// Truncates or creates `path` and mirrors every entry into it.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_writer(BufWriter::new(file)))
    }

    pub fn echo_to_stdout(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn build(writer: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            inner: Mutex::new(NarrativeInner {
                entries: Vec::new(),
                writer,
                failure: None,
                closed: false,
            }),
            echo: false,
        }
    }

    pub fn announce(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        if self.echo {
            println!("{message}");
        }
        let write_result = match inner.writer.as_mut() {
            Some(writer) => writeln!(writer, "{message}"),
            None => Ok(()),
        };
        if let Err(err) = write_result {
            inner.failure.get_or_insert(err);
        }
        inner.entries.push(message);
    }

    pub fn entries(&self) -> Vec<String> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.inner
            .lock()
            .entries
            .iter()
            .any(|entry| entry.contains(needle))
    }

    /// Flushes the writer and stops accepting entries. Later calls are no-ops.
    pub fn close(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        if let Some(writer) = inner.writer.as_mut() {
            let flushed = writer.flush();
            if let Err(err) = flushed {
                inner.failure.get_or_insert(err);
            }
        }
        match inner.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Narrative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrative")
            .field("entries", &self.len())
            .field("echo", &self.echo)
            .finish()
    }
}
