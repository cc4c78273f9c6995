//! Decoding BGL and SDX dictionary files. Decoders implement the
//! [`DecodeEntry`] trait.
pub mod bgl;
pub mod sdx;

// Re-exports
pub use bgl::Decoder as BglDecoder;
pub use sdx::Decoder as SdxDecoder;

use std::{
    fs::File,
    io::{self, BufReader, Read},
    mem,
    path::Path,
};

use crate::{Entry, Metadata};

/// Trait for types that expose dictionary [`Metadata`].
pub trait DictMetadata {
    /// Returns a reference to the dictionary metadata.
    fn metadata(&self) -> &Metadata;
}

/// Trait for types that decode dictionary entries.
pub trait DecodeEntry {
    /// Tries to decode the next entry. Returns `Ok(None)` once the input is
    /// exhausted; a truncated trailing record also ends iteration, and
    /// everything yielded before it remains valid.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader fails with
    /// anything other than a short read.
    fn decode_entry(&mut self) -> crate::Result<Option<Entry>>;

    /// Eagerly decodes all remaining entries into a `Vec`.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader fails with
    /// anything other than a short read.
    fn decode_entries(mut self) -> crate::Result<Vec<Entry>>
    where
        Self: Sized,
    {
        let mut res = Vec::new();
        while let Some(entry) = self.decode_entry()? {
            res.push(entry);
        }
        Ok(res)
    }

    /// Converts the decoder into an iterator over its entries. This lazily
    /// decodes the data.
    fn entries(self) -> Entries<Self>
    where
        Self: Sized,
    {
        Entries { decoder: self }
    }
}

/// A lazy iterator over decoded entries, created by
/// [`DecodeEntry::entries()`].
pub struct Entries<D> {
    decoder: D,
}

impl<D: DecodeEntry> Iterator for Entries<D> {
    type Item = crate::Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.decode_entry().transpose()
    }
}

/// A decoder implementing [`DecodeEntry`] whose container format is
/// determined at runtime from the file's extension and signature.
pub struct DynDecoder(DynDecoderImpl);

enum DynDecoderImpl {
    Bgl(bgl::Decoder<BufReader<File>>),
    Sdx(sdx::Decoder),
}

impl DynDecoder {
    /// Creates a new [`DynDecoder`] from the file at `path`, inferring the
    /// container format: a path ending in `.ifo` opens as SDX, anything
    /// else is probed for the BGL signature.
    ///
    /// # Errors
    /// This function will return an error if the file doesn't exist, if it
    /// matches neither format, or if it fails to parse as the format it
    /// matched.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ifo"))
        {
            return Ok(Self(DynDecoderImpl::Sdx(sdx::Decoder::from_file(path)?)));
        }
        let mut file = File::open(path).map_err(|e| {
            crate::Error::io(
                e,
                format!("opening file to decode at path '{}'", path.display()),
            )
        })?;
        let mut prefix = [0u8; 4];
        file.read_exact(&mut prefix)
            .map_err(|e| crate::Error::io(e, "reading prefix to infer dictionary format"))?;
        if bgl::starts_with_prefix(&prefix) {
            Ok(Self(DynDecoderImpl::Bgl(bgl::Decoder::from_file(path)?)))
        } else {
            Err(crate::Error::decode("unable to determine dictionary format"))
        }
    }
}

impl DictMetadata for DynDecoder {
    fn metadata(&self) -> &Metadata {
        match &self.0 {
            DynDecoderImpl::Bgl(decoder) => decoder.metadata(),
            DynDecoderImpl::Sdx(decoder) => decoder.metadata(),
        }
    }
}

impl DecodeEntry for DynDecoder {
    fn decode_entry(&mut self) -> crate::Result<Option<Entry>> {
        match &mut self.0 {
            DynDecoderImpl::Bgl(decoder) => decoder.decode_entry(),
            DynDecoderImpl::Sdx(decoder) => decoder.decode_entry(),
        }
    }
}

pub(crate) trait FromBigEndianSlice {
    fn from_be_slice(slice: &[u8]) -> Self;
}

impl FromBigEndianSlice for u32 {
    /// NOTE: assumes the length of `slice` is at least 4 bytes
    fn from_be_slice(slice: &[u8]) -> Self {
        let (bytes, _) = slice.split_at(mem::size_of::<Self>());
        Self::from_be_bytes(bytes.try_into().unwrap())
    }
}

impl FromBigEndianSlice for u16 {
    /// NOTE: assumes the length of `slice` is at least 2 bytes
    fn from_be_slice(slice: &[u8]) -> Self {
        let (bytes, _) = slice.split_at(mem::size_of::<Self>());
        Self::from_be_bytes(bytes.try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write};

    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_dyn_decoder_rejects_unknown_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mystery.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"\x7fELF something else entirely").unwrap();
        drop(file);
        assert!(matches!(
            DynDecoder::from_file(&path),
            Err(crate::Error::Decode(_))
        ));
    }

    #[test]
    fn test_dyn_decoder_opens_sdx_by_extension() {
        let dir = TempDir::new().unwrap();
        let ifo_path = dir.path().join("dict.ifo");
        fs::write(
            &ifo_path,
            "bookname=Tiny\nwordcount=1\nidxfilesize=11\nsametypesequence=m\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("dict.idx"),
            b"hi\0\x00\x00\x00\x00\x00\x00\x00\x05",
        )
        .unwrap();
        fs::write(dir.path().join("dict.dict"), b"hello").unwrap();
        let mut target = DynDecoder::from_file(ifo_path).unwrap();
        assert_eq!(target.metadata().title, "Tiny");
        let entry = target.decode_entry().unwrap().unwrap();
        assert_eq!(entry.headword, "hi");
        assert_eq!(entry.definition, "hello");
    }

    #[test]
    fn test_dyn_decoder_opens_bgl_by_signature() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dict.bgl");
        // a single entry block followed by the end-of-stream sentinel
        let stream = [
            0x01, 0x0A, 0x02, b'h', b'i', 0x00, 0x05, b'h', b'e', b'l', b'l', b'o', 0x04,
        ];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&stream).unwrap();
        let mut file = vec![0x12, 0x34, 0x00, 0x01, 0x00, 0x06];
        file.extend_from_slice(&encoder.finish().unwrap());
        fs::write(&path, file).unwrap();
        let mut target = DynDecoder::from_file(path).unwrap();
        assert_eq!(target.metadata().num_entries, 1);
        let entry = target.decode_entry().unwrap().unwrap();
        assert_eq!(entry.headword, "hi");
        assert_eq!(entry.definition, "hello");
    }
}
