//! Binary key files: a sequence of `[uvarint length][key bytes]` records.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Stdin, Write},
    path::Path,
};

use crate::{Error, Result};

const MAX_VARINT_LEN: usize = 10;

pub struct KeyFileReader<R> {
    reader: R,
    offset: u64,
    failed: bool,
}

impl KeyFileReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl KeyFileReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> KeyFileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// `Ok(None)` on a clean end of file at a record boundary.
    fn read_len(&mut self) -> Result<Option<u64>> {
        let start = self.offset;
        let mut value = 0u64;
        let mut i = 0;
        while i < MAX_VARINT_LEN {
            let mut byte = [0u8; 1];
            match self.reader.read(&mut byte) {
                Ok(0) if i == 0 => return Ok(None),
                Ok(0) => {
                    return Err(Error::CorruptKeyFile {
                        offset: start,
                        reason: "truncated length",
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            self.offset += 1;
            let b = byte[0];
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                break;
            }
            value |= u64::from(b & 0x7f) << (7 * i);
            if b < 0x80 {
                return Ok(Some(value));
            }
            i += 1;
        }
        Err(Error::CorruptKeyFile {
            offset: start,
            reason: "length overflows 64 bits",
        })
    }

    fn read_key(&mut self) -> Result<Option<Vec<u8>>> {
        let start = self.offset;
        let Some(len) = self.read_len()? else {
            return Ok(None);
        };
        let mut key = Vec::new();
        let read = self.reader.by_ref().take(len).read_to_end(&mut key)?;
        self.offset += read as u64;
        if (read as u64) < len {
            return Err(Error::CorruptKeyFile {
                offset: start,
                reason: "truncated key data",
            });
        }
        Ok(Some(key))
    }
}

impl<R: BufRead> Iterator for KeyFileReader<R> {
    type Item = Result<Vec<u8>>;

    /// Yields at most one error, then stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_key() {
            Ok(key) => key.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

pub struct KeyFileWriter<W: Write> {
    writer: BufWriter<W>,
    written: u64,
}

impl KeyFileWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> KeyFileWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    pub fn write_key(&mut self, key: &[u8]) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let mut len = key.len() as u64;
        let mut n = 0;
        while len >= 0x80 {
            buf[n] = (len as u8) | 0x80;
            len >>= 7;
            n += 1;
        }
        buf[n] = len as u8;
        self.writer.write_all(&buf[..=n])?;
        self.writer.write_all(key)?;
        self.written += 1;
        Ok(())
    }

    /// Number of keys written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| Error::IO(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_length() -> Result<()> {
        let key = vec![7u8; 300];
        let mut writer = KeyFileWriter::new(Vec::new());
        writer.write_key(&key)?;
        let bytes = writer.finish()?;
        assert_eq!(&bytes[..2], &[0xac, 0x02]);

        let keys = KeyFileReader::new(&bytes[..]).collect::<Result<Vec<_>>>()?;
        assert_eq!(keys, vec![key]);
        Ok(())
    }

    #[test]
    fn test_overlong_varint() {
        let bytes = [0xffu8; 11];
        let mut reader = KeyFileReader::new(&bytes[..]);
        assert!(matches!(
            reader.next(),
            Some(Err(Error::CorruptKeyFile { offset: 0, .. }))
        ));
        assert!(reader.next().is_none());
    }

    /// Fails every other read with `Interrupted`.
    struct Interrupting<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Interrupting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_interrupted_reads_are_retried() -> Result<()> {
        let keys = vec![vec![1u8; 300], vec![2u8; 5], vec![3u8; 20_000]];
        let mut writer = KeyFileWriter::new(Vec::new());
        for key in &keys {
            writer.write_key(key)?;
        }
        let bytes = writer.finish()?;

        let reader = BufReader::with_capacity(
            1,
            Interrupting {
                data: &bytes,
                interrupt: false,
            },
        );
        let mut reader = KeyFileReader::new(reader);
        let read = reader.by_ref().collect::<Result<Vec<_>>>()?;
        assert_eq!(read, keys);
        assert_eq!(reader.offset(), bytes.len() as u64);
        Ok(())
    }
}
