//! Wire-format scanners
//!
//! Incremental unit extraction for the two streaming families that are not
//! server-sent events: newline-delimited JSON (one object per line) and the
//! undelimited JSON stream, where top-level object boundaries have to be
//! found by tracking brace depth and string-literal state byte by byte.
//!
//! Both scanners accept raw transport buffers of arbitrary size and keep all
//! carry-over state in the struct, so a unit split across two reads - even
//! mid escape sequence - reassembles correctly.

/// Splits a byte stream into complete lines, buffering partial lines across
/// reads. Emitted lines are trimmed of the terminator and skipped when blank.
#[derive(Debug, Default)]
pub struct LineScanner {
    tail: Vec<u8>,
}

impl LineScanner {
    /// Feed one transport buffer; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.tail.iter().position(|&byte| byte == b'\n') {
            let mut line: Vec<u8> = self.tail.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(&line).into_owned());
            }
        }
        lines
    }

    /// Drain a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.tail.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.tail).trim().to_string();
        self.tail.clear();
        if line.is_empty() { None } else { Some(line) }
    }
}

/// Extracts complete top-level JSON objects from an undelimited byte stream.
///
/// The scan state is explicit and survives across `push` calls: brace depth,
/// whether the cursor is inside a string literal, whether the previous byte
/// opened an escape sequence, and the unconsumed buffer tail. Anything
/// outside a top-level object (array brackets, commas, whitespace) is passed
/// over, which is exactly what a streamed JSON array of objects requires.
///
/// Structural bytes (`{`, `}`, `"`, `\`) are ASCII, and UTF-8 continuation
/// bytes never collide with ASCII, so scanning bytes is safe for multi-byte
/// content inside strings.
#[derive(Debug, Default)]
pub struct JsonObjectScanner {
    tail: Vec<u8>,
    depth: u32,
    in_string: bool,
    escaped: bool,
    object_start: usize,
    scan_pos: usize,
}

impl JsonObjectScanner {
    /// Feed one transport buffer; returns every JSON object completed by it,
    /// as verbatim text slices ready for parsing.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.extend_from_slice(chunk);
        let mut objects = Vec::new();

        while self.scan_pos < self.tail.len() {
            let index = self.scan_pos;
            let byte = self.tail[index];
            self.scan_pos += 1;

            if self.escaped {
                self.escaped = false;
                continue;
            }
            if self.in_string {
                match byte {
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' => {
                    if self.depth == 0 {
                        self.object_start = index;
                    }
                    self.depth += 1;
                }
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let slice = &self.tail[self.object_start..=index];
                        objects.push(String::from_utf8_lossy(slice).into_owned());
                    }
                }
                _ => {}
            }
        }

        // Everything scanned; drop bytes that can no longer start or extend
        // an object so the buffer stays bounded by one object's size.
        if self.depth == 0 && !self.in_string {
            self.tail.clear();
            self.scan_pos = 0;
            self.object_start = 0;
        } else if self.object_start > 0 {
            self.tail.drain(..self.object_start);
            self.scan_pos -= self.object_start;
            self.object_start = 0;
        }

        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_scanner_buffers_partial_lines() {
        let mut scanner = LineScanner::default();
        assert!(scanner.push(b"{\"done\":fa").is_empty());
        let lines = scanner.push(b"lse}\n{\"done\":true}\n");
        assert_eq!(lines, vec!["{\"done\":false}", "{\"done\":true}"]);
    }

    #[test]
    fn line_scanner_strips_carriage_returns_and_blanks() {
        let mut scanner = LineScanner::default();
        let lines = scanner.push(b"a\r\n\r\nb\n");
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn line_scanner_finish_drains_unterminated_tail() {
        let mut scanner = LineScanner::default();
        assert!(scanner.push(b"{\"x\":1}").is_empty());
        assert_eq!(scanner.finish(), Some("{\"x\":1}".to_string()));
        assert_eq!(scanner.finish(), None);
    }

    #[test]
    fn object_scanner_extracts_adjacent_objects() {
        let mut scanner = JsonObjectScanner::default();
        let objects = scanner.push(br#"{"a":1}{"b":2}"#);
        assert_eq!(objects, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn object_scanner_handles_arbitrary_three_way_splits() {
        // Every three-way split of two adjacent objects must yield the same
        // two extractions, wherever the cut lands.
        let input = br#"{"a":1}{"b":2}"#;
        for first in 0..input.len() {
            for second in first..input.len() {
                let mut scanner = JsonObjectScanner::default();
                let mut objects = Vec::new();
                objects.extend(scanner.push(&input[..first]));
                objects.extend(scanner.push(&input[first..second]));
                objects.extend(scanner.push(&input[second..]));
                assert_eq!(
                    objects,
                    vec![r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()],
                    "split at {first}/{second}"
                );
            }
        }
    }

    #[test]
    fn object_scanner_survives_split_inside_escaped_quote() {
        // Cut lands immediately after the backslash of an escaped quote, so
        // the escape state must carry across the buffer boundary.
        let input = br#"{"a":"x\"y"}{"b":2}"#;
        let backslash = input.iter().position(|&b| b == b'\\').unwrap();
        let mut scanner = JsonObjectScanner::default();
        let mut objects = Vec::new();
        objects.extend(scanner.push(&input[..=backslash]));
        objects.extend(scanner.push(&input[backslash + 1..backslash + 3]));
        objects.extend(scanner.push(&input[backslash + 3..]));
        assert_eq!(
            objects,
            vec![r#"{"a":"x\"y"}"#.to_string(), r#"{"b":2}"#.to_string()]
        );
    }

    #[test]
    fn object_scanner_ignores_array_framing() {
        let mut scanner = JsonObjectScanner::default();
        let mut objects = Vec::new();
        objects.extend(scanner.push(b"[{\"a\":1},\n"));
        objects.extend(scanner.push(b"{\"b\":{\"nested\":[2,3]}}]"));
        assert_eq!(
            objects,
            vec![r#"{"a":1}"#.to_string(), r#"{"b":{"nested":[2,3]}}"#.to_string()]
        );
    }

    #[test]
    fn object_scanner_tracks_braces_inside_strings_as_text() {
        let mut scanner = JsonObjectScanner::default();
        let objects = scanner.push(br#"{"text":"closing } and opening { stay text"}"#);
        assert_eq!(objects.len(), 1);
        assert!(objects[0].contains("closing }"));
    }

    #[test]
    fn object_scanner_handles_multibyte_content_split_mid_character() {
        let input = "{\"text\":\"héllo wörld\"}".as_bytes();
        // Cut inside the two-byte 'é' sequence.
        let cut = input.iter().position(|&b| b > 0x7f).unwrap() + 1;
        let mut scanner = JsonObjectScanner::default();
        let mut objects = Vec::new();
        objects.extend(scanner.push(&input[..cut]));
        objects.extend(scanner.push(&input[cut..]));
        assert_eq!(objects, vec!["{\"text\":\"héllo wörld\"}".to_string()]);
    }
}
