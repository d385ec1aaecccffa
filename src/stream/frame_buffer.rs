/// Reassembles whole frames from arbitrarily sized byte appends.
///
/// Between public calls the fill offset is always in `[0, frame_bytes)`;
/// offset 0 means no partial frame is in flight. Input that already spans a
/// whole frame is handed out as a borrowed view without copying.
#[derive(Default)]
pub(crate) struct FrameAssembler {
    buf: Vec<u8>,
    offset: usize,
}

impl FrameAssembler {
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            buf: vec![0u8; frame_bytes],
            offset: 0,
        }
    }

    /// Feed `data`, calling `emit` once per completed frame. The emitted
    /// slice is only valid for the duration of the call; `emit` returns
    /// false on a fatal writer error, which stops consumption early.
    ///
    /// Returns the number of bytes consumed.
    pub fn append(&mut self, data: &[u8], mut emit: impl FnMut(&[u8]) -> bool) -> usize {
        let frame_bytes = self.buf.len();
        let mut consumed = 0;

        while consumed < data.len() {
            let remaining = &data[consumed..];

            if self.offset > 0 {
                // top up the partial frame
                let n = (frame_bytes - self.offset).min(remaining.len());
                self.buf[self.offset..self.offset + n].copy_from_slice(&remaining[..n]);
                self.offset += n;
                consumed += n;

                if self.offset == frame_bytes {
                    self.offset = 0;
                    if !emit(&self.buf) {
                        break;
                    }
                }
            } else if remaining.len() >= frame_bytes {
                // whole frame available in the input, skip the copy
                if !emit(&remaining[..frame_bytes]) {
                    break;
                }
                consumed += frame_bytes;
            } else {
                // begin a partial frame with the tail
                self.buf[..remaining.len()].copy_from_slice(remaining);
                self.offset = remaining.len();
                consumed += remaining.len();
            }
        }

        consumed
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offset
    }
}
