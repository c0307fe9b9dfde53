// Length-prefixed modified UTF-8 strings
//
// Strings travel as a big-endian u16 byte count followed by the encoded bytes.
// The encoding works on UTF-16 code units: U+0000 takes two bytes and
// supplementary characters are written as two three-byte surrogates.

use std::io::{self, Read, Write};

/// Largest encoded payload a u16 length prefix can describe
pub const MAX_ENCODED_LEN: usize = u16::MAX as usize;

pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

pub fn decode(bytes: &[u8]) -> io::Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        match b0 >> 4 {
            0x0..=0x7 => {
                units.push(b0);
                i += 1;
            }
            0xC | 0xD => {
                let b1 = continuation(bytes, i + 1)?;
                units.push(((b0 & 0x1F) << 6) | b1);
                i += 2;
            }
            0xE => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
                i += 3;
            }
            _ => return Err(malformed(i)),
        }
    }
    String::from_utf16(&units)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn continuation(bytes: &[u8], index: usize) -> io::Result<u16> {
    match bytes.get(index) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        Some(_) => Err(malformed(index)),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "partial character at end of input",
        )),
    }
}

fn malformed(index: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed input around byte {}", index),
    )
}

/// Write `text` with its u16 length prefix
pub fn write_utf<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    let encoded = encode(text);
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("encoded string too long: {} bytes", encoded.len()),
        ));
    }
    out.write_all(&(encoded.len() as u16).to_be_bytes())?;
    out.write_all(&encoded)
}

/// Read one length-prefixed string
pub fn read_utf<R: Read>(input: &mut R) -> io::Result<String> {
    let mut len = [0u8; 2];
    input.read_exact(&mut len)?;
    let mut bytes = vec![0u8; u16::from_be_bytes(len) as usize];
    input.read_exact(&mut bytes)?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_plain() {
        assert_eq!(encode("movie.mkv"), b"movie.mkv".to_vec());
    }

    #[test]
    fn test_nul_uses_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn test_supplementary_is_surrogate_pair() {
        // U+1F600 -> D83D DE00 -> two three-byte sequences
        let encoded = encode("😀");
        assert_eq!(encoded, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&encoded).unwrap(), "😀");
    }

    #[test]
    fn test_mixed_text_survives() {
        let text = "片名 – Ghosten ✓ 😀";
        assert_eq!(decode(&encode(text)).unwrap(), text);
    }

    #[test]
    fn test_prefixed_wire_form() {
        let mut buf = Vec::new();
        write_utf(&mut buf, "hi").unwrap();
        assert_eq!(buf, vec![0x00, 0x02, b'h', b'i']);
        assert_eq!(read_utf(&mut buf.as_slice()).unwrap(), "hi");
    }

    #[test]
    fn test_too_long_is_rejected() {
        let text = "é".repeat(40_000);
        let mut buf = Vec::new();
        let err = write_utf(&mut buf, &text).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_malformed_input() {
        assert!(decode(&[0xC3]).is_err());
        assert!(decode(&[0xFF]).is_err());
        assert!(decode(&[0xE0, 0x41, 0x80]).is_err());
    }
}
