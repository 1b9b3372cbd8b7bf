// src/compression.rs

//! Package archive compression.
//!
//! The `.ppkg` filename does not encode its compression, so the write side
//! is driven by configuration and the read side detects the format from
//! magic bytes.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::warn;

/// Supported compression formats for package archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression (raw tar)
    None,
    /// Gzip compression
    Gzip,
    /// Bzip2 compression
    Bzip2,
    /// XZ/LZMA compression
    Xz,
    /// Zstandard compression
    #[default]
    Zstd,
}

impl Compression {
    /// Parse a configuration token. Unknown values degrade to `None` with a
    /// warning, at configuration time rather than at package time.
    pub fn from_config(token: &str) -> Self {
        match token {
            "none" | "" => Self::None,
            "gz" | "gzip" => Self::Gzip,
            "bz2" | "bzip2" => Self::Bzip2,
            "xz" => Self::Xz,
            "zst" | "zstd" => Self::Zstd,
            other => {
                warn!("unknown package compression {:?}, packages will be uncompressed", other);
                Self::None
            }
        }
    }

    /// Detect compression format from magic bytes.
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - Bzip2: `42 5a 68` ("BZh")
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            Self::Gzip
        } else if data.len() >= 3 && data[0] == 0x42 && data[1] == 0x5a && data[2] == 0x68 {
            Self::Bzip2
        } else if data.len() >= 6
            && data[0] == 0xfd
            && data[1] == 0x37
            && data[2] == 0x7a
            && data[3] == 0x58
            && data[4] == 0x5a
            && data[5] == 0x00
        {
            Self::Xz
        } else if data.len() >= 4
            && data[0] == 0x28
            && data[1] == 0xb5
            && data[2] == 0x2f
            && data[3] == 0xfd
        {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// Create a compressing writer over `file`.
    pub fn encoder(&self, file: File) -> io::Result<Compressor> {
        Ok(match self {
            Self::None => Compressor::None(file),
            Self::Gzip => Compressor::Gzip(flate2::write::GzEncoder::new(
                file,
                flate2::Compression::default(),
            )),
            Self::Bzip2 => Compressor::Bzip2(bzip2::write::BzEncoder::new(
                file,
                bzip2::Compression::default(),
            )),
            Self::Xz => Compressor::Xz(xz2::write::XzEncoder::new(file, 6)),
            Self::Zstd => Compressor::Zstd(zstd::Encoder::new(file, 0)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A compressing writer with an explicit finish step, so encoder trailer
/// errors surface instead of being swallowed on drop.
pub enum Compressor {
    None(File),
    Gzip(flate2::write::GzEncoder<File>),
    Bzip2(bzip2::write::BzEncoder<File>),
    Xz(xz2::write::XzEncoder<File>),
    Zstd(zstd::Encoder<'static, File>),
}

impl Compressor {
    /// Flush the stream trailer and the underlying file.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::None(mut f) => f.flush(),
            Self::Gzip(enc) => enc.finish().map(|_| ()),
            Self::Bzip2(enc) => enc.finish().map(|_| ()),
            Self::Xz(enc) => enc.finish().map(|_| ()),
            Self::Zstd(enc) => enc.finish().map(|_| ()),
        }
    }
}

impl Write for Compressor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::None(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Bzip2(w) => w.write(buf),
            Self::Xz(w) => w.write(buf),
            Self::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::None(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Bzip2(w) => w.flush(),
            Self::Xz(w) => w.flush(),
            Self::Zstd(w) => w.flush(),
        }
    }
}

/// Open a package archive for reading, auto-detecting its compression
/// from magic bytes and rewinding before the decoder is attached.
pub fn open_decoded(mut file: File) -> io::Result<Box<dyn Read>> {
    let mut magic = [0u8; 6];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    Ok(match Compression::from_magic_bytes(&magic[..n]) {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
        Compression::Zstd => Box::new(zstd::Decoder::new(file)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_from_config() {
        assert_eq!(Compression::from_config("zst"), Compression::Zstd);
        assert_eq!(Compression::from_config("zstd"), Compression::Zstd);
        assert_eq!(Compression::from_config("gz"), Compression::Gzip);
        assert_eq!(Compression::from_config("bzip2"), Compression::Bzip2);
        assert_eq!(Compression::from_config("xz"), Compression::Xz);
        assert_eq!(Compression::from_config("none"), Compression::None);
        // Unknown tokens degrade instead of failing late.
        assert_eq!(Compression::from_config("lzip"), Compression::None);
    }

    #[test]
    fn test_from_magic_bytes() {
        assert_eq!(
            Compression::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            Compression::Gzip
        );
        assert_eq!(
            Compression::from_magic_bytes(b"BZh91AY"),
            Compression::Bzip2
        );
        assert_eq!(
            Compression::from_magic_bytes(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            Compression::Xz
        );
        assert_eq!(
            Compression::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            Compression::Zstd
        );
        assert_eq!(
            Compression::from_magic_bytes(&[0x00, 0x00, 0x00, 0x00]),
            Compression::None
        );
        assert_eq!(Compression::from_magic_bytes(&[0x1f]), Compression::None);
    }

    #[test]
    fn test_roundtrip_each_format() {
        let payload = b"the quick brown fox jumps over the lazy dog";
        for comp in [
            Compression::None,
            Compression::Gzip,
            Compression::Bzip2,
            Compression::Xz,
            Compression::Zstd,
        ] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("data");

            let mut enc = comp.encoder(File::create(&path).unwrap()).unwrap();
            enc.write_all(payload).unwrap();
            enc.finish().unwrap();

            let mut dec = open_decoded(File::open(&path).unwrap()).unwrap();
            let mut out = Vec::new();
            dec.read_to_end(&mut out).unwrap();
            assert_eq!(out, payload, "round trip failed for {}", comp);
        }
    }
}
