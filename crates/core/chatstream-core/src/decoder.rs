//! Line-oriented chunk decoder
//!
//! Turns raw transport chunks into complete text lines. UTF-8 sequences
//! split across chunk boundaries are held until the next chunk; invalid
//! bytes are replaced, never fatal. Line reassembly and the size bound
//! are delegated to [`ReassemblyBuffer`].

use crate::buffer::ReassemblyBuffer;

/// Stateful decoder from raw bytes to newline-terminated records
#[derive(Debug)]
pub struct LineDecoder {
    /// Undecoded tail of a multi-byte sequence from the previous chunk
    pending: Vec<u8>,
    buffer: ReassemblyBuffer,
}

impl LineDecoder {
    /// Create a decoder whose reassembly buffer is bounded by `max_buffer_size`
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            pending: Vec::new(),
            buffer: ReassemblyBuffer::new(max_buffer_size),
        }
    }

    /// Feed one raw chunk, returning every complete line now available in
    /// arrival order. Lines force-flushed by overflow recovery come first.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode(chunk);
        let mut lines = self.buffer.append(&text);
        lines.extend(self.buffer.extract_complete_lines());
        lines
    }

    /// Signal end of stream. Any held bytes are decoded lossily and the
    /// final partial line, if non-empty after trimming, is returned as the
    /// last line.
    pub fn finish(&mut self) -> Vec<String> {
        let tail = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&tail).into_owned();
        let mut lines = self.buffer.append(&text);
        lines.extend(self.buffer.extract_complete_lines());

        let last = self.buffer.content().trim();
        if !last.is_empty() {
            lines.push(last.to_string());
        }
        self.buffer.clear();
        lines
    }

    /// How many buffer overflow recoveries have run for this stream
    pub fn overflow_count(&self) -> u64 {
        self.buffer.overflow_count()
    }

    /// Decode `chunk` as UTF-8, carrying incomplete trailing sequences
    /// over to the next call and replacing invalid sequences.
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    // Validated prefix, so the lossy conversion is exact.
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + bad..];
                        }
                        None => {
                            // A multi-byte sequence runs past the chunk;
                            // hold it for the next feed.
                            self.pending = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_lines() {
        let mut decoder = LineDecoder::new(1024);
        let lines = decoder.feed(b"{\"a\":1}\n{\"b\":2}\npartial");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(decoder.finish(), vec!["partial"]);
    }

    #[test]
    fn test_line_integrity_under_arbitrary_fragmentation() {
        let record = b"{\"type\":\"item\",\"output\":\"Hello world\"}\n";
        let whole = {
            let mut decoder = LineDecoder::new(1024);
            decoder.feed(record)
        };

        // Every split point must yield the same single line.
        for split in 1..record.len() {
            let mut decoder = LineDecoder::new(1024);
            let mut lines = decoder.feed(&record[..split]);
            lines.extend(decoder.feed(&record[split..]));
            assert_eq!(lines, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut decoder = LineDecoder::new(1024);
        let text = "héllo wörld\n".as_bytes();
        // Split in the middle of the two-byte 'é'.
        let mut lines = decoder.feed(&text[..2]);
        assert!(lines.is_empty());
        lines.extend(decoder.feed(&text[2..]));
        assert_eq!(lines, vec!["héllo wörld"]);
    }

    #[test]
    fn test_invalid_bytes_are_replaced_not_fatal() {
        let mut decoder = LineDecoder::new(1024);
        let lines = decoder.feed(b"ok\n\xff\xfebad\nmore");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].ends_with("bad"));
        assert_eq!(decoder.finish(), vec!["more"]);
    }

    #[test]
    fn test_finish_with_dangling_multibyte_tail() {
        let mut decoder = LineDecoder::new(1024);
        // First two bytes of a three-byte sequence, never completed.
        assert!(decoder.feed(&[0xE4, 0xBD]).is_empty());
        let lines = decoder.finish();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], char::REPLACEMENT_CHARACTER.to_string());
    }

    #[test]
    fn test_finish_empty_trailing_line() {
        let mut decoder = LineDecoder::new(1024);
        decoder.feed(b"last\n   ");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_overflow_lines_precede_regular_lines() {
        let mut decoder = LineDecoder::new(16);
        let lines = decoder.feed(b"aaaa\nbbbb\ncccc\ndddd\n");
        // All four records survive, in order, despite the tiny bound.
        assert_eq!(lines, vec!["aaaa", "bbbb", "cccc", "dddd"]);
    }
}
