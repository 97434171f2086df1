//! Indentation-aware text accumulator used to render node trees as
//! pseudo-source.
//!
//! The writer knows nothing about instructions; output is purely a function
//! of what nodes write into it.

use core::fmt;

use crate::String;

/// Configuration options for pseudo-source rendering.
///
/// # Example
///
/// ```
/// use stackgen_core::writer::{CodeWriter, WriterOptions};
///
/// let writer = CodeWriter::with_options(WriterOptions { indent_width: 2 });
/// assert!(writer.as_str().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Spaces per nesting level.
    ///
    /// Default: 4
    pub indent_width: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

#[derive(Debug)]
pub struct CodeWriter {
    options: WriterOptions,
    out: String,
    depth: usize,
    at_line_start: bool,
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            options,
            out: String::new(),
            depth: 0,
            at_line_start: true,
        }
    }

    /// Append `text` in the current scope. Embedded newlines start new lines
    /// at the current indentation.
    pub fn write(&mut self, text: &str) {
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            self.write_fragment(first);
        }
        for line in lines {
            self.new_line();
            self.write_fragment(line);
        }
    }

    pub fn write_line(&mut self, text: &str) {
        self.write(text);
        self.new_line();
    }

    pub fn new_line(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn unindent(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced unindent");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Write `opener`, then start an indented scope on the next line.
    pub fn open_scope(&mut self, opener: &str) {
        self.write_line(opener);
        self.indent();
    }

    /// End the current scope and write `closer` at the outer indentation.
    pub fn close_scope(&mut self, closer: &str) {
        if !self.at_line_start {
            self.new_line();
        }
        self.unindent();
        self.write(closer);
    }

    /// Run `f` inside a scope delimited by `opener` and `closer`.
    pub fn scope<R>(&mut self, opener: &str, closer: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.open_scope(opener);
        let result = f(self);
        self.close_scope(closer);
        result
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn write_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.depth * self.options.indent_width {
                self.out.push(' ');
            }
            self.at_line_start = false;
        }
        self.out.push_str(fragment);
    }
}

impl fmt::Write for CodeWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}
