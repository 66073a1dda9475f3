use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use reproducible_common::errors::*;
use std::io::Read;
use xz2::read::XzDecoder;

/// Compression formats a mirror may serve index files in.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    None,
}

impl Compression {
    pub fn detect(bytes: &[u8]) -> Compression {
        let mime = tree_magic_mini::from_u8(bytes);
        debug!("Detected mimetype for index file: {:?}", mime);

        match mime {
            "application/gzip" => Compression::Gzip,
            "application/x-bzip" | "application/x-bzip2" => Compression::Bzip2,
            "application/x-xz" => Compression::Xz,
            "application/zstd" => Compression::Zstd,
            _ => Compression::None,
        }
    }

    pub fn reader<'a>(self, bytes: &'a [u8]) -> Result<Box<dyn Read + 'a>> {
        match self {
            Compression::Gzip => Ok(Box::new(GzDecoder::new(bytes))),
            Compression::Bzip2 => Ok(Box::new(BzDecoder::new(bytes))),
            Compression::Xz => Ok(Box::new(XzDecoder::new(bytes))),
            Compression::Zstd => Ok(Box::new(zstd::Decoder::new(bytes)?)),
            Compression::None => Ok(Box::new(bytes)),
        }
    }
}

/// Decompress an index file into text, whatever it was compressed with.
pub fn to_string(bytes: &[u8]) -> Result<String> {
    let comp = Compression::detect(bytes);
    let mut text = String::new();
    comp.reader(bytes)?
        .read_to_string(&mut text)
        .with_context(|| anyhow!("Failed to decompress index file ({:?})", comp))?;
    Ok(text)
}
