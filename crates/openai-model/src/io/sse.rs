use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Multiple `data` lines in one event
/// are joined with a line feed; `event`, `id`, `retry` and comment lines
/// are ignored.
pub struct Sse {
    buf: String,
    pending: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before waiting for the network.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.push_bytes(&bytes)?,
                None => self.exhausted = true,
            }
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        // A chunk may end in the middle of a multi-byte character, keep the
        // incomplete tail around until the next chunk arrives.
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(Error::InvalidPayload);
            }
            Err(err) => err.valid_up_to(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let s = std::str::from_utf8(&self.pending)
            .map_err(|_| Error::InvalidPayload)?;
        self.buf.push_str(s);
        self.pending = rest;

        if self.buf.contains('\r') {
            self.buf = self.buf.replace("\r\n", "\n");
        }
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // For `end-of-line`, only line feeds are handled (`\r\n` is
            // normalized when buffering).
            //
            // event         = *( comment / field ) end-of-line
            // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
            let Some(eol_idx) = self.buf.find("\n\n") else {
                return Ok(None);
            };

            let mut data: Option<String> = None;
            for line in self.buf[..eol_idx].lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    self.buf.drain(..eol_idx + 2);
                    return Err(Error::InvalidPayload);
                };
                if name != "data" {
                    continue;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(..eol_idx + 2);

            if let Some(data) = data {
                return Ok(Some(data));
            }
            // Events without data (keep-alives) are skipped.
        }
    }
}
