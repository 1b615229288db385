//! IEEE 488.2 arbitrary block data, as returned by binary queries such as `CURVe?`.
//!
//! A definite length block is `#<d><len><payload>` where `<d>` is the number of ASCII
//! digits in `<len>`. The indefinite form `#0<payload>\n` runs up to the terminator.

use std::io::{BufRead, Error, ErrorKind, Result};

use bytes::{Buf, Bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteWidth {
    One,
    Two,
}

impl ByteWidth {
    pub fn bytes(self) -> usize {
        match self {
            ByteWidth::One => 1,
            ByteWidth::Two => 2,
        }
    }
}

impl TryFrom<u8> for ByteWidth {
    type Error = u8;
    fn try_from(n: u8) -> std::result::Result<Self, u8> {
        match n {
            1 => Ok(ByteWidth::One),
            2 => Ok(ByteWidth::Two),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Layout of signed integer samples inside a block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFormat {
    pub width: ByteWidth,
    pub endianness: Endianness,
}

impl BinaryFormat {
    pub fn new(width: ByteWidth, endianness: Endianness) -> Self {
        Self { width, endianness }
    }
}

fn invalid<S: Into<String>>(msg: S) -> Error {
    Error::new(ErrorKind::InvalidData, msg.into())
}

/// Reads one block from `reader`, skipping anything before the `#` (an echoed header),
/// and consumes the message terminator that follows a definite length block.
///
/// With `expected_len` a definite length header announcing any other size is rejected
/// before the payload is read.
pub fn read_block<R: BufRead>(
    reader: &mut R,
    terminator: u8,
    expected_len: Option<usize>,
) -> Result<Bytes> {
    let mut skipped = Vec::new();
    reader.read_until(b'#', &mut skipped)?;
    if skipped.last() != Some(&b'#') {
        return Err(invalid("missing '#' block header"));
    }
    let mut digit = [0u8; 1];
    reader.read_exact(&mut digit)?;
    let digits = match digit[0] {
        b'0' => {
            let mut payload = Vec::new();
            reader.read_until(terminator, &mut payload)?;
            if payload.last() == Some(&terminator) {
                payload.pop();
            }
            return Ok(Bytes::from(payload));
        }
        d @ b'1'..=b'9' => (d - b'0') as usize,
        other => {
            return Err(invalid(format!(
                "invalid block length digit '{}'",
                other as char
            )))
        }
    };
    let mut len_buf = vec![0u8; digits];
    reader.read_exact(&mut len_buf)?;
    let len: usize = std::str::from_utf8(&len_buf)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("invalid block length field"))?;
    if let Some(expected) = expected_len {
        if len != expected {
            return Err(invalid(format!(
                "block header announces {} bytes, expected {}",
                len, expected
            )));
        }
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    consume_terminator(reader, terminator)?;
    Ok(Bytes::from(payload))
}

fn consume_terminator<R: BufRead>(reader: &mut R, terminator: u8) -> Result<()> {
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            // the instrument sent no terminator after the block
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(())
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let n = match buf {
            [b'\r', t, ..] if *t == terminator => 2,
            [t, ..] if *t == terminator => 1,
            _ => 0,
        };
        reader.consume(n);
        return Ok(());
    }
}

/// Decodes a block payload into signed samples. When `expected` is given the payload
/// must hold exactly that many samples.
pub fn decode_samples(
    mut payload: Bytes,
    format: BinaryFormat,
    expected: Option<usize>,
) -> Result<Vec<i16>> {
    let width = format.width.bytes();
    if payload.len() % width != 0 {
        return Err(invalid(format!(
            "block of {} bytes is not a multiple of the {}-byte sample width",
            payload.len(),
            width
        )));
    }
    let count = payload.len() / width;
    if let Some(expected) = expected {
        if count != expected {
            return Err(invalid(format!(
                "expected {} samples, block holds {}",
                expected, count
            )));
        }
    }
    let mut samples = Vec::with_capacity(count);
    while payload.has_remaining() {
        let sample = match (format.width, format.endianness) {
            (ByteWidth::One, _) => payload.get_i8() as i16,
            (ByteWidth::Two, Endianness::Little) => payload.get_i16_le(),
            (ByteWidth::Two, Endianness::Big) => payload.get_i16(),
        };
        samples.push(sample);
    }
    Ok(samples)
}

/// Encodes samples as a definite length block followed by `terminator`.
pub fn encode_block(samples: &[i16], format: BinaryFormat, terminator: u8) -> Vec<u8> {
    let mut payload = Vec::with_capacity(samples.len() * format.width.bytes());
    for &s in samples {
        match (format.width, format.endianness) {
            (ByteWidth::One, _) => payload.push(s as i8 as u8),
            (ByteWidth::Two, Endianness::Little) => payload.extend_from_slice(&s.to_le_bytes()),
            (ByteWidth::Two, Endianness::Big) => payload.extend_from_slice(&s.to_be_bytes()),
        }
    }
    let len = payload.len().to_string();
    let mut block = format!("#{}{}", len.len(), len).into_bytes();
    block.extend_from_slice(&payload);
    block.push(terminator);
    block
}
