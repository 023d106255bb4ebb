//! Incremental parser for timestamped log streams.
//!
//! Each line of a followed stream starts with a timestamp token and a single
//! space. The parser remembers the last token as the resume cursor and
//! echoes the rest of the line, keeping the token only when asked to.
//! Feeding the same bytes in any fragmentation yields the same output.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Nothing of the current line seen yet.
    LineStart,
    /// Inside the timestamp token.
    Timestamp,
    /// Inside the payload.
    Payload,
}

#[derive(Debug)]
pub struct LogLineParser {
    display_timestamps: bool,
    position: Position,
    token: Vec<u8>,
    cursor: Option<String>,
}

impl LogLineParser {
    pub fn new(display_timestamps: bool) -> Self {
        Self {
            display_timestamps,
            position: Position::LineStart,
            token: Vec::new(),
            cursor: None,
        }
    }

    /// Timestamp of the most recent line, if any.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether the last fragment ended inside a line.
    pub fn is_mid_line(&self) -> bool {
        self.position != Position::LineStart
    }

    /// Parse `fragment`, appending printable output to `out`.
    pub fn push(&mut self, mut fragment: &[u8], out: &mut Vec<u8>) {
        while !fragment.is_empty() {
            match self.position {
                Position::LineStart | Position::Timestamp => {
                    match fragment.iter().position(|&b| b == b' ' || b == b'\n') {
                        Some(pos) if fragment[pos] == b' ' => {
                            self.token.extend_from_slice(&fragment[..pos]);
                            self.cursor = Some(String::from_utf8_lossy(&self.token).into_owned());
                            if self.display_timestamps {
                                out.extend_from_slice(&self.token);
                                out.push(b' ');
                            }
                            self.token.clear();
                            self.position = Position::Payload;
                            fragment = &fragment[pos + 1..];
                        }
                        Some(pos) => {
                            // A line with no timestamp: print it as is.
                            out.extend_from_slice(&self.token);
                            out.extend_from_slice(&fragment[..=pos]);
                            self.token.clear();
                            self.position = Position::LineStart;
                            fragment = &fragment[pos + 1..];
                        }
                        None => {
                            self.token.extend_from_slice(fragment);
                            self.position = Position::Timestamp;
                            fragment = &[];
                        }
                    }
                }
                Position::Payload => match fragment.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        out.extend_from_slice(&fragment[..=pos]);
                        self.position = Position::LineStart;
                        fragment = &fragment[pos + 1..];
                    }
                    None => {
                        out.extend_from_slice(fragment);
                        fragment = &[];
                    }
                },
            }
        }
    }

    /// The stream broke. Terminate a partly printed line so the re-delivered
    /// copy starts on its own line, and drop any partial timestamp.
    pub fn interrupt(&mut self, out: &mut Vec<u8>) {
        if self.position == Position::Payload {
            out.push(b'\n');
        }
        self.token.clear();
        self.position = Position::LineStart;
    }
}
