use std::io::Write as _;

/// One column of pending rows: newline-terminated decimal values plus a
/// read position.
///
/// `data[..pos]` has been consumed by the flush in progress, `data[pos..]`
/// is still pending. Appends only ever grow the tail, so the consumed prefix
/// stays stable until `compact()` or `rewind_to()` settles it.
#[derive(Debug, Default)]
pub struct LaneBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl LaneBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    pub fn append(&mut self, values: &[u16]) {
        for v in values {
            // Writing into a Vec cannot fail.
            let _ = writeln!(self.data, "{v}");
        }
    }

    /// Bytes not yet consumed.
    pub fn pending(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consumes the next token, without its line terminator.
    pub fn next_token(&mut self) -> Option<&str> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        let start = self.pos;
        self.pos += end + 1;
        // Only ASCII digits are ever appended.
        std::str::from_utf8(&self.data[start..start + end]).ok()
    }

    /// Puts the read position back, e.g. to un-read a token that belongs to
    /// an incomplete row.
    pub fn rewind_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    /// Drops `data[..consumed]` and shifts the remainder to the head.
    pub fn compact(&mut self, consumed: usize) {
        debug_assert!(consumed <= self.data.len());
        self.data.drain(..consumed);
        self.pos = self.pos.saturating_sub(consumed);
    }
}
