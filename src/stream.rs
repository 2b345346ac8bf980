//! Bounded reads from untrusted streams

use crate::error::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Initial buffer size for length-declared reads (64KB)
///
/// Declared lengths come from the file, so the buffer only grows as bytes
/// actually arrive.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Read exactly `len` bytes, reporting a short stream as `TruncatedRead`
pub(crate) fn read_vec<R: Read>(source: &mut R, len: u64, offset: u64) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity((len as usize).min(INITIAL_CAPACITY));
    source.take(len).read_to_end(&mut buffer)?;
    if (buffer.len() as u64) < len {
        return Err(Error::TruncatedRead {
            offset,
            expected: len,
        });
    }
    Ok(buffer)
}

/// Fill `buf` completely, reporting a short stream as `TruncatedRead`
pub(crate) fn read_array<R: Read>(source: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    source.read_exact(buf).map_err(|e| truncated(e, offset, buf.len() as u64))
}

/// Map an unexpected EOF onto `TruncatedRead`, leaving other errors as I/O
pub(crate) fn truncated(err: io::Error, offset: u64, expected: u64) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedRead { offset, expected }
    } else {
        Error::Io(err)
    }
}

/// Seek to an absolute position
pub(crate) fn seek_to<S: Seek>(source: &mut S, position: u64) -> Result<()> {
    source.seek(SeekFrom::Start(position))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_vec_exact() {
        let mut source = Cursor::new(vec![1u8, 2, 3, 4]);
        assert_eq!(read_vec(&mut source, 3, 0).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_vec_short() {
        let mut source = Cursor::new(vec![1u8, 2]);
        match read_vec(&mut source, 100_000_000, 7) {
            Err(Error::TruncatedRead { offset, expected }) => {
                assert_eq!(offset, 7);
                assert_eq!(expected, 100_000_000);
            }
            other => panic!("expected TruncatedRead, got {other:?}"),
        }
    }

    #[test]
    fn test_read_array_short() {
        let mut source = Cursor::new(vec![1u8]);
        let mut buf = [0u8; 2];
        assert!(matches!(
            read_array(&mut source, &mut buf, 0),
            Err(Error::TruncatedRead { expected: 2, .. })
        ));
    }
}
