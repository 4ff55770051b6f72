use crate::error::ExporterError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// A reader over workbook bytes, either streamed from disk or held in memory.
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local file for reading.
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<UnifiedReader, ExporterError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps bytes that are already in memory.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_local_file() {
        let result = UnifiedReader::open("Cargo.toml");
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = UnifiedReader::open("non_existent_file.xlsx");
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_memory_reader_seeks() {
        let mut reader = UnifiedReader::from_bytes(b"PK\x03\x04rest".to_vec());
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"PK\x03\x04");
        reader.seek(std::io::SeekFrom::Start(1)).unwrap();
        reader.read_exact(&mut magic[..1]).unwrap();
        assert_eq!(magic[0], b'K');
    }
}
