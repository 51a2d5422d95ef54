//! Reader for the `PCZ2` container header written by the compression tool.
//!
//! Layout, little endian: magic `PCZ2`, u16 name length, u64 original size,
//! name bytes, u32 block size, u64 block count, one u64 compressed size per
//! block. The harness only reads it to sanity check artifacts.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

pub const MAGIC: [u8; 4] = *b"PCZ2";
const MAX_BLOCKS: u64 = 1 << 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub filename: String,
    pub original_size: u64,
    pub block_size: u32,
    pub block_sizes: Vec<u64>,
}

impl ArtifactHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid magic"));
        }

        let name_len = reader.read_u16::<LittleEndian>()?;
        let original_size = reader.read_u64::<LittleEndian>()?;
        let mut name = vec![0u8; name_len as usize];
        reader.read_exact(&mut name)?;
        let block_size = reader.read_u32::<LittleEndian>()?;

        let num_blocks = reader.read_u64::<LittleEndian>()?;
        if num_blocks > MAX_BLOCKS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("implausible block count {}", num_blocks),
            ));
        }
        let block_sizes = (0..num_blocks)
            .map(|_| reader.read_u64::<LittleEndian>())
            .collect::<io::Result<Vec<u64>>>()?;

        Ok(ArtifactHeader {
            filename: String::from_utf8_lossy(&name).into_owned(),
            original_size,
            block_size,
            block_sizes,
        })
    }

    pub fn read_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    /// Sum of the per-block compressed sizes.
    pub fn payload_bytes(&self) -> u64 {
        self.block_sizes.iter().sum()
    }
}

/// Reads the artifact header and checks it against the input size.
///
/// A header that disagrees with the input is `InvalidData`.
pub fn check_artifact(path: &Path, expected_original: u64) -> io::Result<ArtifactHeader> {
    let header = ArtifactHeader::read_path(path)?;
    if header.original_size != expected_original {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "header records {} original bytes, input has {}",
                header.original_size, expected_original
            ),
        ));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn encode(name: &str, original: u64, blocks: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_all(&MAGIC).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u64::<LittleEndian>(original).unwrap();
        out.write_all(name.as_bytes()).unwrap();
        out.write_u32::<LittleEndian>(1 << 20).unwrap();
        out.write_u64::<LittleEndian>(blocks.len() as u64).unwrap();
        for &b in blocks {
            out.write_u64::<LittleEndian>(b).unwrap();
        }
        out
    }

    #[test]
    fn parses_header_written_by_the_tool() {
        let bytes = encode("fragmented.bin", 3 << 20, &[10, 20, 30]);
        let header = ArtifactHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.filename, "fragmented.bin");
        assert_eq!(header.original_size, 3 << 20);
        assert_eq!(header.block_size, 1 << 20);
        assert_eq!(header.payload_bytes(), 60);
    }

    #[test]
    fn rejects_wrong_magic_and_truncation() {
        let mut bytes = encode("x", 1, &[1]);
        bytes[0] = b'Q';
        let err = ArtifactHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let bytes = encode("x", 1, &[1, 2]);
        let truncated = &bytes[..bytes.len() - 4];
        assert!(ArtifactHeader::read_from(&mut Cursor::new(truncated)).is_err());
    }

    #[test]
    fn check_flags_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pcz");
        std::fs::write(&path, encode("a", 100, &[]).as_slice()).unwrap();
        assert_eq!(check_artifact(&path, 100).unwrap().original_size, 100);

        let err = check_artifact(&path, 101).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("100 original bytes"));

        let missing = check_artifact(&dir.path().join("none.pcz"), 100).unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }
}
