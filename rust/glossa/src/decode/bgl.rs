//! Decoding of BGL files, the proprietary compressed dictionary container.
//!
//! A BGL file is a six-byte header followed by a gzip-wrapped stream of
//! variable-length blocks. Decoding makes two passes over the stream: the
//! first harvests metadata and counts entries, the second yields the
//! entries themselves.
use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use log::{debug, warn};
use num_enum::TryFromPrimitive;

use crate::{
    charset::{charset_from_index, to_utf8},
    decode::{DecodeEntry, DictMetadata, FromBigEndianSlice},
    Entry, Metadata,
};

/// The language name table indexed by the source/target-language metadata
/// blocks. The index is the on-disk contract; the strings are reproduced
/// verbatim.
pub const LANGUAGES: [&str; 60] = [
    "English",
    "French",
    "Italian",
    "Spanish",
    "Dutch",
    "Portuguese",
    "German",
    "Russian",
    "Japanese",
    "Traditional Chinese",
    "Simplified Chinese",
    "Greek",
    "Korean",
    "Turkish",
    "Hebrew",
    "Arabic",
    "Thai",
    "Other",
    "Other Simplified Chinese dialects",
    "Other Traditional Chinese dialects",
    "Other Eastern-European languages",
    "Other Western-European languages",
    "Other Russian languages",
    "Other Japanese languages",
    "Other Baltic languages",
    "Other Greek languages",
    "Other Korean dialects",
    "Other Turkish dialects",
    "Other Thai dialects",
    "Polish",
    "Hungarian",
    "Czech",
    "Lithuanian",
    "Latvian",
    "Catalan",
    "Croatian",
    "Serbian",
    "Slovak",
    "Albanian",
    "Urdu",
    "Slovenian",
    "Estonian",
    "Bulgarian",
    "Danish",
    "Finnish",
    "Icelandic",
    "Norwegian",
    "Romanian",
    "Swedish",
    "Ukrainian",
    "Belarusian",
    "Farsi",
    "Basque",
    "Macedonian",
    "Afrikaans",
    "Faeroese",
    "Latin",
    "Esperanto",
    "Tamazight",
    "Armenian",
];

/// The part-of-speech labels selected by the `0x14 0x02 p` definition
/// escape, indexed by `p - 0x30`.
pub const PART_OF_SPEECH: [&str; 11] = [
    "n.", "adj.", "v.", "adv.", "interj.", "pron.", "prep.", "conj.", "suff.", "pref.", "art.",
];

const SIGNATURE: [u8; 3] = [0x12, 0x34, 0x00];
/// Payload length of the BGL header: signature plus the big-endian offset
/// of the compressed stream.
const HEADER_LEN: usize = 6;
/// Resource filenames the original reader special-cases; they are always
/// discarded.
const DISCARDED_RESOURCES: [&str; 2] = ["8EAF66FD.bmp", "C2EEF3F6.html"];

/// Returns `true` if `bytes` starts with a valid BGL signature.
pub fn starts_with_prefix(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..3] == SIGNATURE && (bytes[3] == 1 || bytes[3] == 2)
}

/// The semantic role of a block, taken from the low nibble of its lead
/// byte. Blocks of other kinds are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum BlockKind {
    /// A parameter record; sub-op 8 selects the default charset.
    Param = 0,
    /// A dictionary entry.
    Entry = 1,
    /// An embedded resource file.
    Resource = 2,
    /// Descriptive metadata.
    Info = 3,
    /// The end-of-stream sentinel. Carries no payload; nothing after it is
    /// ever read.
    Eos = 4,
    /// A dictionary entry (alternate kind used by newer files).
    EntryAlt = 10,
}

/// A raw, not-yet-interpreted block. The payload is owned by the reader
/// call that produced it and is dropped before the next block is read.
#[derive(Debug)]
struct Block {
    /// The low nibble of the lead byte.
    kind: u8,
    /// The payload, exactly `length` bytes.
    data: Vec<u8>,
}

/// Produces [`Block`]s from the decompressed BGL stream.
struct BlockReader<R> {
    reader: GzDecoder<R>,
}

impl<R: io::Read> BlockReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: GzDecoder::new(reader),
        }
    }

    fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Reads `count` bytes from the decompressed stream as a big-endian
    /// unsigned integer.
    fn read_num(&mut self, count: usize) -> io::Result<u32> {
        debug_assert!((1..=4).contains(&count));
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf[..count])?;
        Ok(buf[..count]
            .iter()
            .fold(0, |val, byte| (val << 8) | u32::from(*byte)))
    }

    /// Produces the next block.
    ///
    /// Returns `Ok(None)` at the end-of-stream sentinel, after which no
    /// further bytes are consumed, and on a short read (a truncated or
    /// corrupt stream ends iteration; whatever was yielded before remains
    /// valid). Underlying read errors are fatal.
    fn read_block(&mut self) -> crate::Result<Option<Block>> {
        let lead = match self.read_num(1) {
            Ok(lead) => lead,
            Err(e) if is_stream_end(&e) => return Ok(None),
            Err(e) => return Err(crate::Error::io(e, "reading block lead byte")),
        };
        let kind = (lead & 0xf) as u8;
        if kind == BlockKind::Eos as u8 {
            return Ok(None);
        }
        let code = lead >> 4;
        let length = if code < 4 {
            match self.read_num(code as usize + 1) {
                Ok(length) => length,
                Err(e) if is_stream_end(&e) => return Ok(None),
                Err(e) => return Err(crate::Error::io(e, "reading block length")),
            }
        } else {
            code - 4
        };
        let mut data = vec![0; length as usize];
        if let Err(e) = self.reader.read_exact(&mut data) {
            if is_stream_end(&e) {
                return Ok(None);
            }
            return Err(crate::Error::io(e, "reading block payload"));
        }
        Ok(Some(Block { kind, data }))
    }
}

/// Whether `error` marks the end of usable input: a short read, or a
/// corrupt deflate stream (which `flate2` reports as invalid data).
fn is_stream_end(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData
    )
}

/// Object for reading and parsing a BGL dictionary file.
///
/// Construction reads the compressed stream once to gather [`Metadata`]
/// and count entries, then rewinds; entries stream from
/// [`decode_entry`](DecodeEntry::decode_entry).
pub struct Decoder<R> {
    blocks: BlockReader<R>,
    metadata: Metadata,
    /// Effective charset of headwords and alternates.
    source_charset: String,
    /// Effective charset of definitions.
    target_charset: String,
    resource_dir: Option<PathBuf>,
}

impl Decoder<BufReader<File>> {
    /// Creates a new [`Decoder`] from the file at `path`.
    ///
    /// # Errors
    /// This function will return an error if `path` doesn't exist, if the
    /// signature is invalid, or if reading the metadata pass fails.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            crate::Error::io(
                e,
                format!("opening BGL file at path '{}'", path.as_ref().display()),
            )
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: io::Read + io::Seek> Decoder<R> {
    /// Creates a new [`Decoder`] from `reader`.
    ///
    /// # Errors
    /// This function will return an error if the signature is invalid, if
    /// the header's stream offset points into the header, or if reading
    /// the metadata pass fails.
    pub fn new(mut reader: R) -> crate::Result<Self> {
        let data_offset = read_header(&mut reader)?;
        reader
            .seek(SeekFrom::Start(data_offset))
            .map_err(|e| crate::Error::io(e, "seeking to the compressed stream"))?;
        let mut blocks = BlockReader::new(reader);
        let metadata = decode_metadata(&mut blocks)?;
        // rewind for the entry pass
        let mut reader = blocks.into_inner();
        reader
            .seek(SeekFrom::Start(data_offset))
            .map_err(|e| crate::Error::io(e, "rewinding to the compressed stream"))?;
        let source_charset = first_declared([
            &metadata.source_charset,
            &metadata.default_charset,
            &metadata.target_charset,
        ])
        .to_owned();
        let target_charset = first_declared([
            &metadata.target_charset,
            &metadata.default_charset,
            &metadata.source_charset,
        ])
        .to_owned();
        Ok(Self {
            blocks: BlockReader::new(reader),
            metadata,
            source_charset,
            target_charset,
            resource_dir: None,
        })
    }

    /// Enables extraction of embedded resource files: the contents of
    /// resource blocks encountered while decoding entries are written
    /// beneath `res/` under `dir`. Extraction is disabled by default.
    ///
    /// Filenames come from the file and are untrusted; names containing
    /// path separators, absolute names, and `..` are skipped with a
    /// warning.
    pub fn set_resource_dir(&mut self, dir: impl Into<PathBuf>) {
        self.resource_dir = Some(dir.into());
    }

    /// Decodes an entry block: headword, definition window, then any
    /// alternate forms filling the rest of the payload.
    fn decode_entry_block(&self, data: &[u8]) -> Entry {
        let mut pos = 0;
        let headword = match read_prefixed(data, &mut pos, 1) {
            Some(bytes) => to_utf8(bytes, &self.source_charset),
            None => String::new(),
        };
        let definition = match read_prefixed(data, &mut pos, 2) {
            Some(window) => to_utf8(&decode_definition(window), &self.target_charset),
            None => String::new(),
        };
        let mut alternates = Vec::new();
        while pos < data.len() {
            match read_prefixed(data, &mut pos, 1) {
                Some(bytes) => alternates.push(to_utf8(bytes, &self.source_charset)),
                None => break,
            }
        }
        Entry {
            headword,
            definition,
            alternates,
        }
    }

    /// Writes a resource block beneath `res/` under the configured
    /// directory, if any.
    fn extract_resource(&self, data: &[u8]) -> crate::Result<()> {
        let Some(dir) = &self.resource_dir else {
            return Ok(());
        };
        let mut pos = 0;
        let Some(name_bytes) = read_prefixed(data, &mut pos, 1) else {
            return Ok(());
        };
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        if DISCARDED_RESOURCES.contains(&name.as_str()) {
            return Ok(());
        }
        if !is_safe_resource_name(&name) {
            warn!("skipping resource with unsafe filename {name:?}");
            return Ok(());
        }
        let res_dir = dir.join("res");
        fs::create_dir_all(&res_dir).map_err(|e| {
            crate::Error::io(
                e,
                format!("creating resource directory '{}'", res_dir.display()),
            )
        })?;
        fs::write(res_dir.join(&name), &data[pos..])
            .map_err(|e| crate::Error::io(e, format!("writing resource '{name}'")))?;
        Ok(())
    }
}

impl<R: io::Read + io::Seek> DictMetadata for Decoder<R> {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<R: io::Read + io::Seek> DecodeEntry for Decoder<R> {
    fn decode_entry(&mut self) -> crate::Result<Option<Entry>> {
        while let Some(block) = self.blocks.read_block()? {
            match BlockKind::try_from(block.kind) {
                Ok(BlockKind::Entry | BlockKind::EntryAlt) => {
                    return Ok(Some(self.decode_entry_block(&block.data)));
                }
                Ok(BlockKind::Resource) => self.extract_resource(&block.data)?,
                // metadata was harvested in the first pass
                _ => {}
            }
        }
        Ok(None)
    }
}

/// Reads the six-byte BGL header and returns the offset of the compressed
/// stream.
fn read_header(reader: &mut impl io::Read) -> crate::Result<u64> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| crate::Error::io(e, "reading BGL header"))?;
    if !starts_with_prefix(&header) {
        return Err(crate::Error::decode("invalid BGL signature"));
    }
    let offset = u16::from_be_slice(&header[4..]);
    if usize::from(offset) < HEADER_LEN {
        return Err(crate::Error::decode(
            "BGL stream offset points into the header",
        ));
    }
    Ok(u64::from(offset))
}

/// First pass: walks every block, harvesting metadata from parameter and
/// info blocks and counting entry blocks.
fn decode_metadata<R: io::Read>(blocks: &mut BlockReader<R>) -> crate::Result<Metadata> {
    let mut metadata = Metadata::default();
    let mut raw = RawInfo::default();
    while let Some(block) = blocks.read_block()? {
        match BlockKind::try_from(block.kind) {
            Ok(BlockKind::Param) => {
                if block.data.len() >= 3 && block.data[0] == 8 {
                    if let Some(name) = charset_from_index(block.data[2]) {
                        metadata.default_charset = name.to_owned();
                    }
                }
            }
            Ok(BlockKind::Entry | BlockKind::EntryAlt) => metadata.num_entries += 1,
            Ok(BlockKind::Info) => decode_info_block(&block.data, &mut metadata, &mut raw),
            _ => {}
        }
    }
    debug!(
        "default charset: {:?}, source charset: {:?}, target charset: {:?}",
        metadata.default_charset, metadata.source_charset, metadata.target_charset
    );
    raw.convert_into(&mut metadata);
    Ok(metadata)
}

/// Textual metadata collected as raw bytes during the first pass; the
/// charsets aren't all known until the pass completes, so conversion is
/// deferred.
#[derive(Debug, Default)]
struct RawInfo {
    title: Vec<u8>,
    author: Vec<u8>,
    email: Vec<u8>,
    copyright: Vec<u8>,
    description: Vec<u8>,
}

impl RawInfo {
    /// Converts the collected bytes to UTF-8: the title with the source
    /// charset, the description with the target charset, everything else
    /// with the default, each falling back to the other declared charsets
    /// when its primary is empty.
    fn convert_into(self, metadata: &mut Metadata) {
        let source = first_declared([
            &metadata.source_charset,
            &metadata.default_charset,
            &metadata.target_charset,
        ])
        .to_owned();
        let target = first_declared([
            &metadata.target_charset,
            &metadata.default_charset,
            &metadata.source_charset,
        ])
        .to_owned();
        let default = first_declared([
            &metadata.default_charset,
            &metadata.source_charset,
            &metadata.target_charset,
        ])
        .to_owned();
        metadata.title = to_utf8(&self.title, &source);
        metadata.author = to_utf8(&self.author, &default);
        metadata.email = to_utf8(&self.email, &default);
        metadata.copyright = to_utf8(&self.copyright, &default);
        metadata.description = to_utf8(&self.description, &target);
    }
}

/// Interprets an info block. Byte 1 is the sub-op; the payload body
/// starts at byte 2.
fn decode_info_block(data: &[u8], metadata: &mut Metadata, raw: &mut RawInfo) {
    if data.len() < 2 {
        return;
    }
    let body = &data[2..];
    match data[1] {
        1 => raw.title = body.to_vec(),
        2 => raw.author = body.to_vec(),
        3 => raw.email = body.to_vec(),
        4 => raw.copyright = body.to_vec(),
        7 | 8 => {
            let Some(name) = data
                .get(5)
                .and_then(|idx| LANGUAGES.get(usize::from(*idx)))
            else {
                return;
            };
            if data[1] == 7 {
                metadata.source_lang = (*name).to_owned();
            } else {
                metadata.target_lang = (*name).to_owned();
            }
        }
        9 => {
            // CR dropped, LF rendered as <br>
            let mut text = Vec::with_capacity(body.len());
            for &byte in body {
                match byte {
                    b'\r' => {}
                    b'\n' => text.extend_from_slice(b"<br>"),
                    _ => text.push(byte),
                }
            }
            raw.description = text;
        }
        26 => {
            if metadata.source_charset.is_empty() {
                if let Some(name) = data.get(2).and_then(|idx| charset_from_index(*idx)) {
                    metadata.source_charset = name.to_owned();
                }
            }
        }
        27 => {
            if metadata.target_charset.is_empty() {
                if let Some(name) = data.get(2).and_then(|idx| charset_from_index(*idx)) {
                    metadata.target_charset = name.to_owned();
                }
            }
        }
        _ => {}
    }
}

/// Decodes one definition window: `0x0A` becomes `<br>`, the
/// `0x14 0x02 p` escape prepends a part-of-speech tag and skips the rest
/// of the window, a lone `0x14` is dropped, and every other byte (control
/// bytes included) passes through untouched.
fn decode_definition(window: &[u8]) -> Vec<u8> {
    let mut definition = Vec::with_capacity(window.len());
    let mut i = 0;
    while i < window.len() {
        let byte = window[i];
        if byte == 0x0a {
            definition.extend_from_slice(b"<br>");
            i += 1;
        } else if byte < 0x20 {
            if byte == 0x14
                && i + 2 < window.len()
                && window[i + 1] == 0x02
                && (0x30..=0x3a).contains(&window[i + 2])
            {
                let label = PART_OF_SPEECH[usize::from(window[i + 2] - 0x30)];
                let mut tagged = format!("<font color=\"blue\">{label}</font> ").into_bytes();
                tagged.extend_from_slice(&definition);
                definition = tagged;
                // the remainder of the window is skipped
                break;
            } else if byte == 0x14 {
                i += 1;
            } else {
                definition.push(byte);
                i += 1;
            }
        } else {
            definition.push(byte);
            i += 1;
        }
    }
    definition
}

/// Reads a `width`-byte big-endian length prefix at `*pos`, then returns
/// that many payload bytes, advancing `*pos` past both. Returns `None`
/// when the payload runs off the end of `data`.
fn read_prefixed<'a>(data: &'a [u8], pos: &mut usize, width: usize) -> Option<&'a [u8]> {
    if *pos + width > data.len() {
        return None;
    }
    let len = data[*pos..*pos + width]
        .iter()
        .fold(0usize, |val, byte| (val << 8) | usize::from(*byte));
    *pos += width;
    let end = pos.checked_add(len).filter(|end| *end <= data.len())?;
    let bytes = &data[*pos..end];
    *pos = end;
    Some(bytes)
}

/// The first non-empty charset name, or empty (pass bytes through) when
/// none is declared.
fn first_declared(charsets: [&str; 3]) -> &str {
    charsets
        .into_iter()
        .find(|name| !name.is_empty())
        .unwrap_or("")
}

fn is_safe_resource_name(name: &str) -> bool {
    !name.is_empty()
        && name != ".."
        && !name.contains(['/', '\\'])
        && !Path::new(name).is_absolute()
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::{write::GzEncoder, Compression};
    use rstest::*;
    use tempfile::TempDir;

    use super::*;

    /// Encodes a block with a one-byte explicit length prefix.
    fn block(kind: u8, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() < 256);
        let mut bytes = vec![kind, payload.len() as u8];
        bytes.extend_from_slice(payload);
        bytes
    }

    fn entry_block(headword: &[u8], definition: &[u8], alternates: &[&[u8]]) -> Vec<u8> {
        let mut payload = vec![headword.len() as u8];
        payload.extend_from_slice(headword);
        payload.extend_from_slice(&(definition.len() as u16).to_be_bytes());
        payload.extend_from_slice(definition);
        for alternate in alternates {
            payload.push(alternate.len() as u8);
            payload.extend_from_slice(alternate);
        }
        block(1, &payload)
    }

    /// Wraps a raw block stream into a complete BGL file image.
    fn bgl_file(stream: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(stream).unwrap();
        let body = encoder.finish().unwrap();
        let mut file = vec![0x12, 0x34, 0x00, 0x01, 0x00, 0x06];
        file.extend_from_slice(&body);
        file
    }

    fn decoder_for(stream: &[u8]) -> Decoder<Cursor<Vec<u8>>> {
        Decoder::new(Cursor::new(bgl_file(stream))).unwrap()
    }

    #[test]
    fn test_minimal_metadata() {
        let mut stream = block(3, &[0, 1, b'A', b'B', b'C']);
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().title, "ABC");
        assert_eq!(target.metadata().num_entries, 0);
    }

    #[test]
    fn test_part_of_speech_escape() {
        let mut stream = entry_block(
            b"run",
            &[0x14, 0x02, 0x32, b'r', b'u', b'n', b'n', b'i', b'n', b'g'],
            &[],
        );
        stream.push(4);
        let target = decoder_for(&stream);
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].headword, "run");
        // the escape prepends the tag and the rest of the window is skipped
        assert_eq!(entries[0].definition, "<font color=\"blue\">v.</font> ");
    }

    #[test]
    fn test_escape_after_text_keeps_accumulated_definition() {
        let mut stream = entry_block(b"w", &[b'x', 0x14, 0x02, 0x30, b'z'], &[]);
        stream.push(4);
        let entries = decoder_for(&stream).decode_entries().unwrap();
        assert_eq!(entries[0].definition, "<font color=\"blue\">n.</font> x");
    }

    #[rstest]
    #[case::last_label(0x3a, "<font color=\"blue\">art.</font> ")]
    // 0x3b - 0x30 is out of the table; the 0x14 is dropped and the rest
    // of the window decodes normally
    #[case::index_out_of_range(0x3b, "\u{2};abc")]
    fn test_part_of_speech_bounds(#[case] p: u8, #[case] exp: &str) {
        let mut stream = entry_block(b"w", &[0x14, 0x02, p, b'a', b'b', b'c'], &[]);
        stream.push(4);
        let entries = decoder_for(&stream).decode_entries().unwrap();
        assert_eq!(entries[0].definition, exp);
    }

    #[test]
    fn test_line_break() {
        let mut stream = entry_block(b"w", &[b'a', 0x0a, b'b'], &[]);
        stream.push(4);
        let entries = decoder_for(&stream).decode_entries().unwrap();
        assert_eq!(entries[0].definition, "a<br>b");
    }

    #[test]
    fn test_alternates_preserve_order_and_duplicates() {
        let mut stream = entry_block(b"colour", b"a hue", &[b"color", b"colour", b"color"]);
        stream.push(4);
        let entries = decoder_for(&stream).decode_entries().unwrap();
        assert_eq!(entries[0].alternates, ["color", "colour", "color"]);
    }

    #[test]
    fn test_eos_sentinel_stops_iteration() {
        let mut stream = entry_block(b"only", b"one", &[]);
        stream.push(4);
        // anything after the sentinel must never be consumed
        stream.extend_from_slice(&entry_block(b"ghost", b"entry", &[]));
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().num_entries, 1);
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].headword, "only");
    }

    #[test]
    fn test_embedded_length_nibble() {
        // high nibble 7 encodes a payload length of 7 - 4 = 3
        let mut stream = vec![0x73, 0, 1, b'T'];
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().title, "T");
    }

    #[test]
    fn test_two_byte_length_prefix() {
        // high nibble 1 encodes a two-byte big-endian length
        let mut stream = vec![0x13, 0x00, 0x05, 0, 1, b'a', b'b', b'c'];
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().title, "abc");
    }

    #[test]
    fn test_truncated_payload_ends_iteration() {
        let mut stream = entry_block(b"whole", b"def", &[]);
        // a block header promising more payload than the stream holds
        stream.extend_from_slice(&[0x01, 0x30, b'x']);
        let target = decoder_for(&stream);
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].headword, "whole");
    }

    #[test]
    fn test_default_charset_applies_to_headwords() {
        // parameter sub-op 8 selects CP1253 as the default charset; with no
        // source charset declared, headwords fall back to it
        let mut stream = block(0, &[8, 0, 8]);
        stream.extend_from_slice(&entry_block(&[0xE1], &[0xE2], &[]));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().default_charset, "CP1253");
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries[0].headword, "\u{03B1}");
        assert_eq!(entries[0].definition, "\u{03B2}");
    }

    #[test]
    fn test_declared_charsets_win_over_default() {
        let mut stream = block(0, &[8, 0, 0]); // default ISO-8859-1
        stream.extend_from_slice(&block(3, &[0, 26, 8])); // source CP1253
        stream.extend_from_slice(&block(3, &[0, 27, 13])); // target CP874
        stream.extend_from_slice(&entry_block(&[0xE1], &[0xA1], &[&[0xE2]]));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().source_charset, "CP1253");
        assert_eq!(target.metadata().target_charset, "CP874");
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries[0].headword, "\u{03B1}");
        assert_eq!(entries[0].definition, "\u{0E01}");
        assert_eq!(entries[0].alternates, ["\u{03B2}"]);
    }

    #[test]
    fn test_biased_charset_index() {
        // indices above 64 are biased by 65
        let mut stream = block(3, &[0, 26, 65 + 8]);
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().source_charset, "CP1253");
    }

    #[test]
    fn test_repeated_charset_declaration_keeps_first() {
        let mut stream = block(3, &[0, 26, 8]);
        stream.extend_from_slice(&block(3, &[0, 26, 13]));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().source_charset, "CP1253");
    }

    #[rstest]
    #[case::english(0, "English")]
    #[case::french(1, "French")]
    #[case::other(17, "Other")]
    #[case::armenian(59, "Armenian")]
    fn test_language_table(#[case] index: u8, #[case] exp: &str) {
        let mut stream = block(3, &[0, 7, 0, 0, 0, index]);
        stream.extend_from_slice(&block(3, &[0, 8, 0, 0, 0, index]));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().source_lang, exp);
        assert_eq!(target.metadata().target_lang, exp);
    }

    #[test]
    fn test_language_index_out_of_table_is_ignored() {
        let mut stream = block(3, &[0, 7, 0, 0, 0, 60]);
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().source_lang, "");
    }

    #[test]
    fn test_description_line_breaks() {
        let mut stream = block(3, &[0, 9, b'a', b'\r', b'\n', b'b']);
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().description, "a<br>b");
    }

    #[test]
    fn test_metadata_fields() {
        let mut stream = block(3, &[0, 1, b'T']);
        stream.extend_from_slice(&block(3, &[0, 2, b'A']));
        stream.extend_from_slice(&block(3, &[0, 3, b'E']));
        stream.extend_from_slice(&block(3, &[0, 4, b'C']));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().title, "T");
        assert_eq!(target.metadata().author, "A");
        assert_eq!(target.metadata().email, "E");
        assert_eq!(target.metadata().copyright, "C");
    }

    #[test]
    fn test_num_entries_matches_decoded_count() {
        let mut stream = entry_block(b"a", b"1", &[]);
        // kind 10 counts as an entry too
        let mut alt_kind = entry_block(b"b", b"2", &[]);
        alt_kind[0] = 10;
        stream.extend_from_slice(&alt_kind);
        stream.extend_from_slice(&entry_block(b"c", b"3", &[]));
        stream.push(4);
        let target = decoder_for(&stream);
        assert_eq!(target.metadata().num_entries, 3);
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].headword, "b");
    }

    #[test]
    fn test_stream_offset_beyond_header() {
        let mut stream = entry_block(b"a", b"1", &[]);
        stream.push(4);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&stream).unwrap();
        let body = encoder.finish().unwrap();
        // four bytes of junk between the header and the stream
        let mut file = vec![0x12, 0x34, 0x00, 0x02, 0x00, 0x0A, 0xDE, 0xAD, 0xBE, 0xEF];
        file.extend_from_slice(&body);
        let target = Decoder::new(Cursor::new(file)).unwrap();
        let entries = target.decode_entries().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[rstest]
    #[case::wrong_magic(&[0x13, 0x34, 0x00, 0x01, 0x00, 0x06])]
    #[case::version_zero(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x06])]
    #[case::version_three(&[0x12, 0x34, 0x00, 0x03, 0x00, 0x06])]
    #[case::offset_in_header(&[0x12, 0x34, 0x00, 0x01, 0x00, 0x05])]
    fn test_invalid_header(#[case] header: &[u8]) {
        let mut file = header.to_vec();
        file.extend_from_slice(&bgl_file(&[4])[6..]);
        assert!(Decoder::new(Cursor::new(file)).is_err());
    }

    #[test]
    fn test_resource_extraction() {
        let mut payload = vec![b"logo.png".len() as u8];
        payload.extend_from_slice(b"logo.png");
        payload.extend_from_slice(b"\x89PNG");
        let mut stream = block(2, &payload);
        stream.extend_from_slice(&entry_block(b"a", b"1", &[]));
        stream.push(4);
        let dir = TempDir::new().unwrap();
        let mut target = decoder_for(&stream);
        target.set_resource_dir(dir.path());
        target.decode_entries().unwrap();
        let written = fs::read(dir.path().join("res").join("logo.png")).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[rstest]
    #[case::traversal(&b"../evil"[..])]
    #[case::absolute(&b"/etc/passwd"[..])]
    #[case::backslash(&b"..\\evil"[..])]
    #[case::discarded_bitmap(&b"8EAF66FD.bmp"[..])]
    #[case::discarded_html(&b"C2EEF3F6.html"[..])]
    fn test_resources_skipped(#[case] name: &[u8]) {
        let mut payload = vec![name.len() as u8];
        payload.extend_from_slice(name);
        payload.extend_from_slice(b"contents");
        let mut stream = block(2, &payload);
        stream.push(4);
        let dir = TempDir::new().unwrap();
        let mut target = decoder_for(&stream);
        target.set_resource_dir(dir.path());
        target.decode_entries().unwrap();
        // nothing may be created for skipped resources
        assert!(!dir.path().join("res").exists());
    }

    #[test]
    fn test_resources_ignored_without_resource_dir() {
        let mut payload = vec![b"logo.png".len() as u8];
        payload.extend_from_slice(b"logo.png");
        payload.extend_from_slice(b"\x89PNG");
        let mut stream = block(2, &payload);
        stream.push(4);
        let target = decoder_for(&stream);
        assert!(target.decode_entries().unwrap().is_empty());
    }

    #[test]
    fn test_entries_iterator() {
        let mut stream = entry_block(b"a", b"1", &[]);
        stream.extend_from_slice(&entry_block(b"b", b"2", &[]));
        stream.push(4);
        let headwords: Vec<String> = decoder_for(&stream)
            .entries()
            .map(|entry| entry.unwrap().headword)
            .collect();
        assert_eq!(headwords, ["a", "b"]);
    }
}
