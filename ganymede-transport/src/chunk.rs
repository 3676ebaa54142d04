// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escaped-chunk text encoding.
//!
//! Transport buffers are flat strings made of chunks. Every chunk is terminated by an unescaped
//! `|`, literal `|` and `\` characters inside a chunk are escaped with a backslash. Tabular
//! formats additionally use `\n` to terminate header and data lines.
//!
//! [`ChunkWriter`] produces such buffers and [`ChunkReader`] tokenizes them again. The reader is
//! an explicit cursor, grammars built on top of it pass it down by mutable reference while they
//! recursively consume chunks.
use thiserror::Error;

/// Terminates every chunk.
pub const DELIMITER: char = '|';

/// Takes the following character literally.
pub const ESCAPE: char = '\\';

/// Terminates lines in tabular buffers.
pub const LINE_END: char = '\n';

/// Appends `value` to `out`, escaping delimiters and backslashes.
pub fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Appends `value` to `out`, escaping delimiters, backslashes and line ends.
pub fn escape_line_into(value: &str, out: &mut String) {
    for c in value.chars() {
        if c == DELIMITER || c == ESCAPE || c == LINE_END {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Builds an escaped-chunk buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkWriter {
    buffer: String,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues writing at the end of an existing buffer.
    pub fn from_buffer(buffer: String) -> Self {
        Self { buffer }
    }

    /// Appends an escaped chunk followed by its delimiter.
    pub fn add_chunk(&mut self, chunk: &str) -> &mut Self {
        escape_into(chunk, &mut self.buffer);
        self.buffer.push(DELIMITER);
        self
    }

    /// Appends an absent value, a bare delimiter.
    ///
    /// On the wire this is indistinguishable from an empty chunk.
    pub fn add_null(&mut self) -> &mut Self {
        self.buffer.push(DELIMITER);
        self
    }

    /// Appends a chunk if there is one, otherwise an absent value.
    pub fn add_optional(&mut self, chunk: Option<&str>) -> &mut Self {
        match chunk {
            Some(chunk) => self.add_chunk(chunk),
            None => self.add_null(),
        }
    }

    /// Appends a chunk without escaping it.
    ///
    /// Only for values which can't contain delimiters, backslashes or line ends, like numbers.
    pub fn add_raw_chunk(&mut self, chunk: &str) -> &mut Self {
        self.buffer.push_str(chunk);
        self.buffer.push(DELIMITER);
        self
    }

    /// Appends a chunk of a line-oriented buffer, escaping line ends as well.
    pub fn add_line_chunk(&mut self, chunk: &str) -> &mut Self {
        escape_line_into(chunk, &mut self.buffer);
        self.buffer.push(DELIMITER);
        self
    }

    /// Appends an escaped value which runs up to the end of the line and terminates the line.
    pub fn add_line_tail(&mut self, value: &str) -> &mut Self {
        escape_line_into(value, &mut self.buffer);
        self.end_line()
    }

    /// Appends text as it is, without a delimiter.
    pub fn push_raw(&mut self, text: &str) -> &mut Self {
        self.buffer.push_str(text);
        self
    }

    /// Terminates the current line.
    pub fn end_line(&mut self) -> &mut Self {
        self.buffer.push(LINE_END);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Cursor over an escaped-chunk buffer.
///
/// Every read advances the cursor past the consumed chunk and its delimiter. Positions are byte
/// offsets into the source buffer.
#[derive(Clone, Debug)]
pub struct ChunkReader<'a> {
    src: &'a str,
    position: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Honour escapes, line ends are data.
    Chunk,

    /// Honour escapes, an unescaped line end is an error.
    LineChunk,

    /// No escapes, an unescaped line end is an error.
    RawLineChunk,

    /// Honour escapes, stop at the line end instead of a delimiter.
    RestOfLine,
}

impl<'a> ChunkReader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, position: 0 }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns true if the whole buffer was consumed.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.src.len()
    }

    /// Reads the next chunk with escapes resolved.
    pub fn next_chunk(&mut self) -> Result<String, ChunkError> {
        self.scan(Scan::Chunk)
    }

    /// Reads the next chunk without moving the cursor.
    pub fn peek(&self) -> Result<String, ChunkError> {
        self.clone().next_chunk()
    }

    /// Reads the next chunk, an empty chunk is an absent value.
    pub fn next_optional(&mut self) -> Result<Option<String>, ChunkError> {
        let chunk = self.next_chunk()?;
        Ok((!chunk.is_empty()).then_some(chunk))
    }

    /// Consumes the next chunk, failing if it is not `token`.
    pub fn expect(&mut self, token: &str) -> Result<(), ChunkError> {
        let found = self.next_chunk()?;
        if found != token {
            return Err(ChunkError::UnexpectedToken {
                expected: token.to_string(),
                found,
            });
        }
        Ok(())
    }

    /// Reads the next chunk and parses it as a number. Surrounding whitespace is not accepted.
    pub fn next_i16(&mut self) -> Result<i16, ChunkError> {
        let chunk = self.next_chunk()?;
        chunk.parse().map_err(|_| ChunkError::InvalidNumber(chunk))
    }

    /// Reads the next chunk as `true` or `false`, ignoring case.
    ///
    /// Any other text is an error, it is not read as `false`.
    pub fn next_bool(&mut self) -> Result<bool, ChunkError> {
        let chunk = self.next_chunk()?;
        if chunk.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if chunk.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ChunkError::InvalidBool(chunk))
        }
    }

    /// Reads the next chunk of the current line.
    pub fn next_line_chunk(&mut self) -> Result<String, ChunkError> {
        self.scan(Scan::LineChunk)
    }

    /// Reads the next chunk of the current line without resolving escapes.
    pub fn next_raw_line_chunk(&mut self) -> Result<String, ChunkError> {
        self.scan(Scan::RawLineChunk)
    }

    /// Reads everything up to the end of the current line with escapes resolved and consumes the
    /// line end. An escaped line end is part of the value.
    pub fn rest_of_line(&mut self) -> Result<String, ChunkError> {
        self.scan(Scan::RestOfLine)
    }

    /// Returns true if the cursor sits on a line end.
    pub fn at_line_end(&self) -> bool {
        self.src[self.position..].starts_with(LINE_END)
    }

    /// Consumes a line end.
    pub fn end_line(&mut self) -> Result<(), ChunkError> {
        if self.at_line_end() {
            self.position += LINE_END.len_utf8();
            return Ok(());
        }

        match self.src[self.position..].chars().next() {
            Some(c) => Err(ChunkError::UnexpectedToken {
                expected: "line end".into(),
                found: c.to_string(),
            }),
            None => Err(ChunkError::UnexpectedEnd {
                position: self.position,
                partial: String::new(),
            }),
        }
    }

    fn scan(&mut self, mode: Scan) -> Result<String, ChunkError> {
        let terminator = match mode {
            Scan::RestOfLine => LINE_END,
            _ => DELIMITER,
        };

        let mut chunk = String::new();
        let mut chars = self.src[self.position..].char_indices();

        while let Some((offset, c)) = chars.next() {
            if c == terminator {
                self.position += offset + c.len_utf8();
                return Ok(chunk);
            }

            if c == LINE_END && matches!(mode, Scan::LineChunk | Scan::RawLineChunk) {
                return Err(ChunkError::UnexpectedNewline {
                    position: self.position + offset,
                });
            }

            if c == ESCAPE && mode != Scan::RawLineChunk {
                match chars.next() {
                    Some((_, escaped)) => chunk.push(escaped),
                    None => break,
                }
            } else {
                chunk.push(c);
            }
        }

        Err(ChunkError::UnexpectedEnd {
            position: self.src.len(),
            partial: chunk,
        })
    }
}

/// Error types for decoding escaped-chunk buffers.
///
/// Any of these leaves the decoded structure unusable, nothing retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Buffer ended before the chunk's delimiter.
    #[error("ran out of chunk data at position {position}: '{partial}'")]
    UnexpectedEnd { position: usize, partial: String },

    /// Chunk at a structural position holds something else than the grammar allows.
    #[error("parse error, expected '{expected}' but found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    /// Chunk should be a number.
    #[error("couldn't parse number from chunk '{0}'")]
    InvalidNumber(String),

    /// Chunk should be `true` or `false`.
    #[error("couldn't parse boolean from chunk '{0}'")]
    InvalidBool(String),

    /// Chunk should be an Invid in `type:num` form.
    #[error("couldn't parse invid from chunk '{0}'")]
    InvalidInvid(String),

    /// Value does not match the type of its column.
    #[error("couldn't parse value '{value}' of field '{field}'")]
    InvalidFieldValue { field: String, value: String },

    /// Row holds more values than there are columns.
    #[error("row {row} holds more values than the header has columns")]
    TooManyValues { row: usize },

    /// Unescaped line end inside a chunk of a line-oriented buffer.
    #[error("parse error, unexpected line end at position {position}")]
    UnexpectedNewline { position: usize },

    /// Nested structures are deeper than the decoder allows.
    #[error("recursion limit exceeded while decoding nested chunks")]
    RecursionLimitExceeded,
}
