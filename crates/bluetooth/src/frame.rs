// Tagged transfer frames
//
// Wire layout (all integers big-endian):
//   text: i32 tag = 0, utf(message)
//   file: i32 tag = 1, utf(filename), i64 length, <length raw bytes>
// Frames are strictly sequential on one stream.

use crate::mutf8;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Frame discriminator sent ahead of every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Text,
    File,
}

impl FrameTag {
    pub fn code(self) -> i32 {
        match self {
            FrameTag::Text => 0,
            FrameTag::File => 1,
        }
    }
}

impl TryFrom<i32> for FrameTag {
    type Error = io::Error;

    fn try_from(code: i32) -> io::Result<Self> {
        match code {
            0 => Ok(FrameTag::Text),
            1 => Ok(FrameTag::File),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame tag {}", other),
            )),
        }
    }
}

/// A frame fully received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    File { path: PathBuf, len: u64 },
}

pub fn write_text<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    out.write_all(&FrameTag::Text.code().to_be_bytes())?;
    mutf8::write_utf(out, text)?;
    out.flush()
}

/// Stream exactly `len` bytes of `content` as a file frame named `name`
pub fn write_file<W: Write, R: Read>(
    out: &mut W,
    name: &str,
    len: u64,
    content: &mut R,
    chunk_size: usize,
) -> io::Result<()> {
    let len_i64 = i64::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large"))?;
    out.write_all(&FrameTag::File.code().to_be_bytes())?;
    mutf8::write_utf(out, name)?;
    out.write_all(&len_i64.to_be_bytes())?;

    let copied = copy_exact(content, out, len, chunk_size)?;
    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ended after {} of {} bytes", copied, len),
        ));
    }
    out.flush()
}

/// Block until the next frame arrives. Received files are written to `cache_dir`.
///
/// A file frame cut short by the peer leaves no partial file behind; the
/// error is returned and the caller is expected to drop the connection.
pub fn read_frame<R: Read>(input: &mut R, cache_dir: &Path, chunk_size: usize) -> io::Result<Frame> {
    let mut tag = [0u8; 4];
    input.read_exact(&mut tag)?;
    match FrameTag::try_from(i32::from_be_bytes(tag))? {
        FrameTag::Text => Ok(Frame::Text(mutf8::read_utf(input)?)),
        FrameTag::File => {
            let name = mutf8::read_utf(input)?;
            let mut len = [0u8; 8];
            input.read_exact(&mut len)?;
            let len = u64::try_from(i64::from_be_bytes(len)).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "negative file length")
            })?;
            let path = cache_dir.join(safe_file_name(&name)?);
            receive_file(input, &path, len, chunk_size)?;
            Ok(Frame::File { path, len })
        }
    }
}

fn receive_file<R: Read>(input: &mut R, path: &Path, len: u64, chunk_size: usize) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    let result = copy_exact(input, &mut out, len, chunk_size).and_then(|copied| {
        if copied < len {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection ended after {} of {} bytes", copied, len),
            ))
        } else {
            out.flush()
        }
    });
    if let Err(e) = result {
        drop(out);
        if let Err(remove_err) = fs::remove_file(path) {
            log::warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Copy at most `len` bytes; returns the number copied (short only on EOF)
fn copy_exact<R: Read, W: Write>(
    input: &mut R,
    out: &mut W,
    len: u64,
    chunk_size: usize,
) -> io::Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(buffer.len() as u64) as usize;
        let read = match input.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buffer[..read])?;
        remaining -= read as u64;
    }
    Ok(len - remaining)
}

/// Strip any directory components a peer put into the file name
fn safe_file_name(name: &str) -> io::Result<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid file name {:?}", name),
        ));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_text_wire_layout() {
        let mut buf = Vec::new();
        write_text(&mut buf, "ok").unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0, 0, 2, b'o', b'k']);
    }

    #[test]
    fn test_text_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        write_text(&mut buf, "play episode 3").unwrap();
        let frame = read_frame(&mut Cursor::new(buf), dir.path(), 1024).unwrap();
        assert_eq!(frame, Frame::Text("play episode 3".into()));
    }

    #[test]
    fn test_file_read_back_and_stream_stays_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut buf = Vec::new();
        write_file(&mut buf, "clip.bin", payload.len() as u64, &mut payload.as_slice(), 333)
            .unwrap();
        write_text(&mut buf, "after").unwrap();

        let mut input = Cursor::new(buf);
        let frame = read_frame(&mut input, dir.path(), 1024).unwrap();
        let expected_path = dir.path().join("clip.bin");
        assert_eq!(
            frame,
            Frame::File {
                path: expected_path.clone(),
                len: payload.len() as u64
            }
        );
        assert_eq!(fs::read(&expected_path).unwrap(), payload);

        // The reader must not have consumed bytes past the file payload
        let next = read_frame(&mut input, dir.path(), 1024).unwrap();
        assert_eq!(next, Frame::Text("after".into()));
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        write_file(&mut buf, "empty.txt", 0, &mut io::empty(), 64).unwrap();
        let frame = read_frame(&mut Cursor::new(buf), dir.path(), 64).unwrap();
        assert_eq!(
            frame,
            Frame::File {
                path: dir.path().join("empty.txt"),
                len: 0
            }
        );
    }

    #[test]
    fn test_truncated_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![7u8; 100];
        let mut buf = Vec::new();
        write_file(&mut buf, "cut.bin", 100, &mut payload.as_slice(), 64).unwrap();
        buf.truncate(buf.len() - 40);

        let err = read_frame(&mut Cursor::new(buf), dir.path(), 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!dir.path().join("cut.bin").exists());
    }

    #[test]
    fn test_peer_paths_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        write_file(&mut buf, "../../etc/passwd", 2, &mut &b"xx"[..], 64).unwrap();
        let frame = read_frame(&mut Cursor::new(buf), dir.path(), 64).unwrap();
        assert_eq!(
            frame,
            Frame::File {
                path: dir.path().join("passwd"),
                len: 2
            }
        );
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let buf = 7i32.to_be_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(buf), dir.path(), 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_short_source_fails_write() {
        let mut buf = Vec::new();
        let err = write_file(&mut buf, "a", 10, &mut &b"abc"[..], 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
