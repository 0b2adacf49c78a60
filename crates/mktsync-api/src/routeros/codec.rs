// ── RouterOS sentence framing ──
//
// Each word is prefixed by its length in a 1-5 byte variable encoding; a
// zero-length word ends the sentence.
//
//   len < 0x80        1 byte   0xxxxxxx
//   len < 0x4000      2 bytes  10xxxxxx ...
//   len < 0x200000    3 bytes  110xxxxx ...
//   len < 0x10000000  4 bytes  1110xxxx ...
//   otherwise         5 bytes  0xF0 + u32

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// One API sentence: an ordered list of words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    words: Vec<String>,
}

impl Sentence {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }
}

impl From<Vec<String>> for Sentence {
    fn from(words: Vec<String>) -> Self {
        Self::new(words)
    }
}

#[derive(Debug, Default)]
pub struct SentenceCodec;

impl SentenceCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Decode a length prefix. Returns `(length, prefix_bytes)`, or `None` if
/// `buf` does not hold the whole prefix yet.
fn decode_length(buf: &[u8]) -> io::Result<Option<(usize, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    let (prefix, initial) = match first {
        b if b & 0x80 == 0x00 => (1, u32::from(b)),
        b if b & 0xC0 == 0x80 => (2, u32::from(b & 0x3F)),
        b if b & 0xE0 == 0xC0 => (3, u32::from(b & 0x1F)),
        b if b & 0xF0 == 0xE0 => (4, u32::from(b & 0x0F)),
        0xF0 => (5, 0),
        b => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("reserved control byte 0x{b:02X} in word length"),
            ));
        }
    };

    let Some(rest) = buf.get(1..prefix) else {
        return Ok(None);
    };
    let len = rest
        .iter()
        .fold(initial, |acc, &b| (acc << 8) | u32::from(b));

    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "word length overflow"))?;
    Ok(Some((len, prefix)))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn encode_length(len: usize, dst: &mut BytesMut) -> io::Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "word longer than 4 GiB"))?;

    if len < 0x80 {
        dst.put_u8(len as u8);
    } else if len < 0x4000 {
        dst.put_u16((len as u16) | 0x8000);
    } else if len < 0x20_0000 {
        let v = len | 0x00C0_0000;
        dst.put_u8((v >> 16) as u8);
        dst.put_u16(v as u16);
    } else if len < 0x1000_0000 {
        dst.put_u32(len | 0xE000_0000);
    } else {
        dst.put_u8(0xF0);
        dst.put_u32(len);
    }
    Ok(())
}

impl Decoder for SentenceCodec {
    type Item = Sentence;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let mut cursor = 0;
            let mut words = Vec::new();

            loop {
                let Some((len, prefix)) = decode_length(&src[cursor..])? else {
                    return Ok(None);
                };
                cursor += prefix;

                if len == 0 {
                    break;
                }

                let Some(word) = src.get(cursor..cursor + len) else {
                    return Ok(None);
                };
                words.push(String::from_utf8_lossy(word).into_owned());
                cursor += len;
            }

            src.advance(cursor);

            // A bare terminator carries nothing; keep reading.
            if !words.is_empty() {
                return Ok(Some(Sentence::new(words)));
            }
        }
    }
}

impl Encoder<Sentence> for SentenceCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Sentence, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size: usize = item.words.iter().map(|w| w.len() + 5).sum();
        dst.reserve(size + 1);

        for word in &item.words {
            encode_length(word.len(), dst)?;
            dst.put_slice(word.as_bytes());
        }
        dst.put_u8(0);
        Ok(())
    }
}
