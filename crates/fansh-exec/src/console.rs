//! Line-atomic console output shared by every host execution
//!
//! A [`Console`] owns the two destination streams behind a single lock, so a
//! line written to the normal stream can never tear a line written to the
//! error stream and vice versa. [`ConsoleSink`] is a cheap handle bound to
//! one stream class and one label color.
//!
//! Writes are best effort: I/O errors are dropped and never reach a worker.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub use crossterm::style::Color;
use crossterm::style::{Stylize, style};

use crate::error::ExecError;

/// Which destination stream a sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClass {
    Normal,
    Error,
}

struct Writers {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

struct ConsoleInner {
    writers: Mutex<Writers>,
    colors: bool,
}

/// Serialized pair of output streams for one run
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("colors", &self.inner.colors)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Console over arbitrary writers
    pub fn new(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
        colors: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ConsoleInner {
                writers: Mutex::new(Writers {
                    out: Box::new(out),
                    err: Box::new(err),
                }),
                colors,
            }),
        }
    }

    /// Console over the process stdout and stderr
    pub fn stdio(colors: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), colors)
    }

    /// Whether label coloring is enabled
    #[must_use]
    pub fn colors_enabled(&self) -> bool {
        self.inner.colors
    }

    /// Handle writing to `class`, painting labels with `color`
    #[must_use]
    pub fn sink(&self, class: StreamClass, color: Option<Color>) -> ConsoleSink {
        ConsoleSink {
            console: self.clone(),
            class,
            color,
        }
    }

    fn write_line(&self, class: StreamClass, line: &str) {
        let mut writers = self
            .inner
            .writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let w = match class {
            StreamClass::Normal => &mut writers.out,
            StreamClass::Error => &mut writers.err,
        };
        let _ = w.write_all(line.as_bytes()).and_then(|()| w.flush());
    }
}

/// One stream class of a [`Console`] with its label color
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    console: Console,
    class: StreamClass,
    color: Option<Color>,
}

impl ConsoleSink {
    /// Write `line` prefixed with `"<label>: "`
    pub fn emit(&self, label: &str, line: &str) {
        let text = format!("{}: {line}\n", self.paint(label));
        self.console.write_line(self.class, &text);
    }

    /// Write `line` without a label
    pub fn emit_plain(&self, line: &str) {
        self.console.write_line(self.class, &format!("{line}\n"));
    }

    /// Wrap `text` in this sink's color when coloring is enabled
    #[must_use]
    pub fn paint(&self, text: &str) -> String {
        match self.color {
            Some(color) if self.console.colors_enabled() => {
                style(text).with(color).to_string()
            }
            _ => text.to_string(),
        }
    }

    #[must_use]
    pub fn class(&self) -> StreamClass {
        self.class
    }
}

/// Parse a color specification
///
/// Accepts `#RRGGBB`, an ANSI 256 index, or a terminal color name such as
/// `red` or `dark_green`. An empty string means no color.
///
/// # Errors
/// Returns `ExecError::ConfigError` if the specification is not recognised
pub fn parse_color(spec: &str) -> Result<Option<Color>, ExecError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(None);
    }

    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExecError::ConfigError(format!("invalid hex color: {spec}")));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        return match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Some(Color::Rgb { r, g, b })),
            _ => Err(ExecError::ConfigError(format!("invalid hex color: {spec}"))),
        };
    }

    if let Ok(index) = spec.parse::<u8>() {
        return Ok(Some(Color::AnsiValue(index)));
    }

    Color::try_from(spec)
        .map(Some)
        .map_err(|()| ExecError::ConfigError(format!("unknown color: {spec}")))
}

/// In-memory console destination
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    #[must_use]
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
