//! Brace-balanced object extraction over the inbound text stream.

/// Characters kept in the inbound buffer before the oldest are discarded.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;

/// Locate the first balanced `{...}` span in `buffer`.
///
/// Returns the inclusive byte range of the span. `None` when there is no `{`
/// at all or when the object is still open at the end of the buffer; use
/// [`first_open_brace`] to tell the two apart.
pub fn find_next_object(buffer: &str) -> Option<(usize, usize)> {
    let start = first_open_brace(buffer)?;
    let mut depth = 0usize;
    for (i, b) in buffer.as_bytes()[start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i));
                }
            }
            _ => {}
        }
    }
    None
}

pub fn first_open_brace(buffer: &str) -> Option<usize> {
    buffer.find('{')
}

/// Append the valid UTF-8 runs of `bytes` to `out`, skipping invalid
/// sequences and a truncated trailing character.
fn push_valid_utf8(out: &mut String, mut bytes: &[u8]) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(n) => bytes = &rest[n..],
                    None => return,
                }
            }
        }
    }
}

/// Accumulates decoded text from the wire and hands out complete objects.
#[derive(Debug)]
pub struct InboundBuffer {
    text: String,
    capacity: usize,
}

impl Default for InboundBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl InboundBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append raw bytes. Invalid UTF-8 is dropped, then the buffer is cut
    /// back to its newest `capacity` characters.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        push_valid_utf8(&mut self.text, bytes);
        self.truncate_front();
    }

    fn truncate_front(&mut self) {
        let count = self.len_chars();
        if count <= self.capacity {
            return;
        }
        let excess = count - self.capacity;
        let cut = self
            .text
            .char_indices()
            .nth(excess)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
    }

    /// Remove and return the next complete object.
    ///
    /// Text before the object is discarded with it. With no `{` in the
    /// buffer everything is discarded; with an open object only its prefix is.
    pub fn next_object(&mut self) -> Option<String> {
        let Some(start) = first_open_brace(&self.text) else {
            self.text.clear();
            return None;
        };
        match find_next_object(&self.text) {
            Some((start, end)) => {
                let record = self.text[start..=end].to_string();
                self.text.drain(..=end);
                Some(record)
            }
            None => {
                self.text.drain(..start);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_not_found() {
        assert_eq!(find_next_object(""), None);
    }

    #[test]
    fn finds_span_among_noise() {
        let obj = r#"{"AS5047": {"rad": 1.2345, "distance": 0.0512}}"#;
        for (pre, post) in [("", ""), ("12:00:01 ", "\r\n"), ("junk]]", "tail")] {
            let text = format!("{pre}{obj}{post}");
            let (s, e) = find_next_object(&text).unwrap();
            assert_eq!(s, pre.len());
            assert_eq!(e, pre.len() + obj.len() - 1);
            assert_eq!(&text[s..=e], obj);
        }
    }

    #[test]
    fn returns_first_of_many() {
        let text = "{a}{b}";
        assert_eq!(find_next_object(text), Some((0, 2)));
    }

    #[test]
    fn unterminated_object_not_found() {
        assert_eq!(find_next_object(r#"xx{"AS5047": {"rad": 1.0}"#), None);
        assert_eq!(first_open_brace(r#"xx{"AS5047""#), Some(2));
    }

    #[test]
    fn buffer_keeps_partial_suffix() {
        let mut buf = InboundBuffer::default();
        buf.push_bytes(br#"noise {"AS5047": {"rad""#);
        assert_eq!(buf.next_object(), None);
        assert_eq!(buf.as_str(), r#"{"AS5047": {"rad""#);
        buf.push_bytes(br#": 0.5}}"#);
        assert_eq!(
            buf.next_object().as_deref(),
            Some(r#"{"AS5047": {"rad": 0.5}}"#)
        );
        assert_eq!(buf.next_object(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_drops_braceless_text() {
        let mut buf = InboundBuffer::default();
        buf.push_bytes(b"boot ok\r\n");
        assert_eq!(buf.next_object(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_yields_each_object_in_order() {
        let mut buf = InboundBuffer::default();
        buf.push_bytes(b"{\"n\":1}\n{\"n\":2}\n{\"n\"");
        assert_eq!(buf.next_object().as_deref(), Some("{\"n\":1}"));
        assert_eq!(buf.next_object().as_deref(), Some("{\"n\":2}"));
        assert_eq!(buf.next_object(), None);
        assert_eq!(buf.as_str(), "{\"n\"");
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let mut buf = InboundBuffer::default();
        buf.push_bytes(&[b'{', 0xFF, 0xFE, b'}']);
        assert_eq!(buf.as_str(), "{}");
    }

    #[test]
    fn genuine_replacement_character_is_kept() {
        let mut buf = InboundBuffer::default();
        let mut bytes = "a\u{FFFD}b".as_bytes().to_vec();
        bytes.insert(1, 0xC3); // lone lead byte
        bytes.extend_from_slice(&[0xE2, 0x9C]); // truncated trailing char
        buf.push_bytes(&bytes);
        assert_eq!(buf.as_str(), "a\u{FFFD}b");
    }

    #[test]
    fn capacity_bounds_unterminated_input() {
        let mut buf = InboundBuffer::with_capacity(5000);
        buf.push_bytes(b"{");
        for _ in 0..200 {
            buf.push_bytes(&[b'{'; 97]);
            assert_eq!(buf.next_object(), None);
            assert!(buf.len_chars() <= 5000);
        }
        assert_eq!(buf.len_chars(), 5000);
    }

    #[test]
    fn capacity_counts_characters() {
        let mut buf = InboundBuffer::with_capacity(3);
        buf.push_bytes("aé✓z".as_bytes());
        assert_eq!(buf.as_str(), "é✓z");
    }
}
