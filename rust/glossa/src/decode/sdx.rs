//! Decoding of SDX dictionaries: a plain-text `.ifo` info file, a sorted
//! `.idx` index (optionally gzipped), and a `.dict` definition blob
//! (optionally dictzip-compressed for random access).
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use flate2::{read::GzDecoder, Decompress, FlushDecompress, Status};
use log::debug;

use crate::{
    decode::{DecodeEntry, DictMetadata, FromBigEndianSlice},
    error::silence_eof_error,
    Entry, Metadata,
};

/// The only record typing this reader supports: every record is a plain
/// textual definition.
const SAME_TYPE_SEQUENCE: &str = "m";

/// A single record of the in-memory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// The headword.
    pub headword: String,
    /// Byte offset of the definition within the (decompressed) blob.
    pub position: u32,
    /// Byte length of the definition.
    pub size: u32,
}

/// Object for reading and searching an SDX dictionary.
///
/// The index is loaded into memory for the lifetime of the decoder; the
/// definition blob is reopened on each lookup.
pub struct Decoder {
    dict_path: PathBuf,
    metadata: Metadata,
    index: Vec<IndexRecord>,
    dictzip: Option<DictzipTable>,
    /// Cursor for sequential decoding through [`DecodeEntry`].
    next: usize,
}

impl Decoder {
    /// Creates a new [`Decoder`] from the info file at `path`; the index
    /// and definition files are located alongside it.
    ///
    /// # Errors
    /// This function will return an error if any of the three files is
    /// missing, if the info file lacks a required key or declares a record
    /// typing other than `m`, if the index size doesn't match the declared
    /// `idxfilesize`, or if the index or dictzip header is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let ifo_path = path.as_ref();
        let info = Info::read(ifo_path)?;
        let index = read_index(ifo_path, info.idxfilesize, info.wordcount)?;
        let (dict_path, dictzip) = open_blob(ifo_path)?;
        Ok(Self {
            dict_path,
            metadata: info.metadata,
            index,
            dictzip,
            next: 0,
        })
    }

    /// Returns the index records in on-disk order.
    pub fn index(&self) -> &[IndexRecord] {
        &self.index
    }

    /// Returns the original filename recorded in the dictzip header, if
    /// the blob is dictzip-compressed and carries one.
    pub fn dictzip_filename(&self) -> Option<&str> {
        self.dictzip.as_ref()?.filename.as_deref()
    }

    /// Returns the modification time recorded in the dictzip header, if
    /// the blob is dictzip-compressed.
    pub fn dictzip_mtime(&self) -> Option<u32> {
        self.dictzip.as_ref().map(|table| table.mtime)
    }

    /// Looks up `word` with a linear scan of the index; when several
    /// records share the headword, the last one wins. Returns an empty
    /// string when the word is absent or its definition can't be
    /// recovered from a damaged blob.
    ///
    /// # Errors
    /// This function returns an error if the definition file can't be
    /// opened or a read fails outright.
    pub fn search(&self, word: &str) -> crate::Result<String> {
        let Some(record) = self
            .index
            .iter()
            .rfind(|record| record.headword == word)
        else {
            return Ok(String::new());
        };
        match self.read_definition(record) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(crate::Error::Decode(reason)) => {
                debug!("definition of {word:?} unreadable: {reason}");
                Ok(String::new())
            }
            Err(error) => silence_eof_error::<()>(error).map(|_| String::new()),
        }
    }

    /// Returns every headword in on-disk index order.
    pub fn dump(&self) -> Vec<String> {
        self.index
            .iter()
            .map(|record| record.headword.clone())
            .collect()
    }

    /// Reads one definition, reopening the blob file for the call.
    fn read_definition(&self, record: &IndexRecord) -> crate::Result<Vec<u8>> {
        let mut file = File::open(&self.dict_path).map_err(|e| {
            crate::Error::io(
                e,
                format!(
                    "opening definition file at path '{}'",
                    self.dict_path.display()
                ),
            )
        })?;
        if let Some(table) = &self.dictzip {
            table.read_span(&mut file, record.position, record.size)
        } else {
            file.seek(SeekFrom::Start(u64::from(record.position)))
                .map_err(|e| crate::Error::io(e, "seeking to definition"))?;
            let mut buf = vec![0; record.size as usize];
            file.read_exact(&mut buf)
                .map_err(|e| crate::Error::io(e, "reading definition"))?;
            Ok(buf)
        }
    }
}

impl DictMetadata for Decoder {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl DecodeEntry for Decoder {
    fn decode_entry(&mut self) -> crate::Result<Option<Entry>> {
        let Some(record) = self.index.get(self.next).cloned() else {
            return Ok(None);
        };
        match self.read_definition(&record) {
            Ok(bytes) => {
                self.next += 1;
                Ok(Some(Entry::new(
                    record.headword,
                    String::from_utf8_lossy(&bytes).into_owned(),
                )))
            }
            // a damaged blob ends iteration; prior entries remain valid
            Err(crate::Error::Decode(reason)) => {
                debug!("stopping at unreadable definition: {reason}");
                Ok(None)
            }
            Err(error) => silence_eof_error(error),
        }
    }
}

/// The parsed contents of an info file.
struct Info {
    metadata: Metadata,
    idxfilesize: u64,
    wordcount: u64,
}

impl Info {
    /// Reads the `key=value` lines of the info file. Unknown keys are
    /// silently ignored.
    fn read(path: &Path) -> crate::Result<Self> {
        let file = File::open(path).map_err(|e| {
            crate::Error::io(
                e,
                format!("opening SDX info file at path '{}'", path.display()),
            )
        })?;
        let mut metadata = Metadata::default();
        let mut sametypesequence = None;
        let mut idxfilesize = None;
        let mut wordcount = None;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| crate::Error::io(e, "reading SDX info file"))?;
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "version" => metadata.version = value.to_owned(),
                "bookname" => metadata.title = value.to_owned(),
                "sametypesequence" => sametypesequence = Some(value.to_owned()),
                "idxfilesize" => idxfilesize = Some(parse_count(key, value)?),
                "wordcount" => wordcount = Some(parse_count(key, value)?),
                "author" => metadata.author = value.to_owned(),
                "email" => metadata.email = value.to_owned(),
                "website" => metadata.website = value.to_owned(),
                "description" => metadata.description = value.to_owned(),
                "date" => metadata.date = value.to_owned(),
                _ => {}
            }
        }
        if sametypesequence.as_deref() != Some(SAME_TYPE_SEQUENCE) {
            return Err(crate::Error::decode(format!(
                "only sametypesequence={SAME_TYPE_SEQUENCE} dictionaries are supported, found {sametypesequence:?}"
            )));
        }
        let idxfilesize =
            idxfilesize.ok_or_else(|| crate::Error::decode("info file is missing idxfilesize"))?;
        let wordcount =
            wordcount.ok_or_else(|| crate::Error::decode("info file is missing wordcount"))?;
        metadata.num_entries = wordcount;
        Ok(Self {
            metadata,
            idxfilesize,
            wordcount,
        })
    }
}

fn parse_count(key: &str, value: &str) -> crate::Result<u64> {
    value.parse().map_err(|_| {
        crate::Error::decode(format!(
            "info key {key} must be a non-negative integer, found '{value}'"
        ))
    })
}

/// Loads the index into memory, preferring `.idx` and falling back to
/// `.idx.gz`.
fn read_index(ifo_path: &Path, idxfilesize: u64, wordcount: u64) -> crate::Result<Vec<IndexRecord>> {
    let plain = ifo_path.with_extension("idx");
    let bytes = match File::open(&plain) {
        Ok(mut file) => {
            // the plain index reads up to the declared size; trailing bytes
            // beyond it are not part of the index
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .map_err(|e| crate::Error::io(e, "reading index file"))?;
            bytes.truncate(idxfilesize as usize);
            bytes
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let gz_path = ifo_path.with_extension("idx.gz");
            let file = File::open(&gz_path).map_err(|e| {
                crate::Error::io(
                    e,
                    format!(
                        "opening index file at path '{}' or its gzipped companion",
                        plain.display()
                    ),
                )
            })?;
            let mut bytes = Vec::with_capacity(idxfilesize as usize);
            // read one byte past the declared size so oversize input fails
            // the length check below instead of silently truncating
            GzDecoder::new(BufReader::new(file))
                .take(idxfilesize + 1)
                .read_to_end(&mut bytes)
                .map_err(|e| crate::Error::io(e, "decompressing gzipped index"))?;
            if bytes.len() as u64 != idxfilesize {
                return Err(crate::Error::decode(format!(
                    "index decompressed to {} bytes but the info file declares {idxfilesize}",
                    bytes.len()
                )));
            }
            bytes
        }
        Err(e) => return Err(crate::Error::io(e, "opening index file")),
    };
    parse_index(&bytes, wordcount)
}

/// Walks `wordcount` records: a NUL-terminated headword, then big-endian
/// position and size.
fn parse_index(bytes: &[u8], wordcount: u64) -> crate::Result<Vec<IndexRecord>> {
    let mut records = Vec::with_capacity(wordcount.min(u16::MAX.into()) as usize);
    let mut pos = 0;
    for _ in 0..wordcount {
        let nul = bytes[pos..]
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| crate::Error::decode("index record is missing its NUL terminator"))?;
        let headword = String::from_utf8_lossy(&bytes[pos..pos + nul]).into_owned();
        pos += nul + 1;
        if bytes.len() < pos + 8 {
            return Err(crate::Error::decode("index ends mid-record"));
        }
        let position = u32::from_be_slice(&bytes[pos..]);
        let size = u32::from_be_slice(&bytes[pos + 4..]);
        pos += 8;
        records.push(IndexRecord {
            headword,
            position,
            size,
        });
    }
    Ok(records)
}

/// Locates the definition blob, preferring plain `.dict` and falling back
/// to dictzip `.dict.dz` (whose header is parsed up front).
fn open_blob(ifo_path: &Path) -> crate::Result<(PathBuf, Option<DictzipTable>)> {
    let plain = ifo_path.with_extension("dict");
    match File::open(&plain) {
        Ok(_) => Ok((plain, None)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let dz_path = ifo_path.with_extension("dict.dz");
            let file = File::open(&dz_path).map_err(|e| {
                crate::Error::io(
                    e,
                    format!(
                        "opening definition file at path '{}' or its dictzip companion",
                        plain.display()
                    ),
                )
            })?;
            let table = DictzipTable::read(&mut BufReader::new(file))?;
            Ok((dz_path, Some(table)))
        }
        Err(e) => Err(crate::Error::io(e, "opening definition file")),
    }
}

// gzip header flag bits
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
/// SI1, SI2, LEN, VER, CHLEN, CHCNT before the chunk-length entries.
const SUBFIELD_HEADER_LEN: usize = 10;

/// The chunk table parsed from a dictzip gzip header. Chunks are a fixed
/// number of bytes (`chunk_len`) before compression, so any byte range of
/// the blob maps to a run of chunks that can be inflated on their own.
#[derive(Debug)]
struct DictzipTable {
    /// File offset where compressed data begins.
    offset: u64,
    /// Decompressed length of each chunk.
    chunk_len: u32,
    /// Compressed length of each chunk.
    chunk_sizes: Vec<u16>,
    /// Original filename from the gzip FNAME field.
    filename: Option<String>,
    /// Modification time from the gzip header.
    mtime: u32,
}

impl DictzipTable {
    fn read<R: io::BufRead>(reader: &mut R) -> crate::Result<Self> {
        let header_err = |e| crate::Error::io(e, "reading dictzip header");
        let mut header = [0u8; 10];
        reader.read_exact(&mut header).map_err(header_err)?;
        if header[..2] != [0x1f, 0x8b] {
            return Err(crate::Error::decode(
                "definition blob is missing the gzip magic",
            ));
        }
        let flags = header[3];
        let mtime = u32::from_le_bytes(header[4..8].try_into().unwrap());
        let mut offset = header.len() as u64;
        if flags & FEXTRA == 0 {
            return Err(crate::Error::decode(
                "definition blob is gzipped but has no dictzip chunk table",
            ));
        }
        let mut xlen_bytes = [0u8; 2];
        reader.read_exact(&mut xlen_bytes).map_err(header_err)?;
        let xlen = usize::from(u16::from_le_bytes(xlen_bytes));
        offset += 2 + xlen as u64;
        let mut extra = vec![0; xlen];
        reader.read_exact(&mut extra).map_err(header_err)?;
        let (chunk_len, chunk_sizes) = parse_chunk_table(&extra)?;
        let filename = if flags & FNAME != 0 {
            let name = read_cstr(reader, &mut offset)?;
            Some(String::from_utf8_lossy(&name).into_owned())
        } else {
            None
        };
        if flags & FCOMMENT != 0 {
            read_cstr(reader, &mut offset)?;
        }
        if flags & FHCRC != 0 {
            let mut crc = [0u8; 2];
            reader.read_exact(&mut crc).map_err(header_err)?;
            offset += 2;
        }
        debug!(
            "dictzip blob: chunk_len={chunk_len}, {} chunks, data at offset {offset}",
            chunk_sizes.len()
        );
        Ok(Self {
            offset,
            chunk_len,
            chunk_sizes,
            filename,
            mtime,
        })
    }

    /// Reads the `size` bytes of decompressed blob starting at `position`:
    /// the covered chunks are located through the chunk table, inflated,
    /// and sliced.
    fn read_span(&self, file: &mut File, position: u32, size: u32) -> crate::Result<Vec<u8>> {
        if self.chunk_len == 0 || self.chunk_sizes.is_empty() {
            return Err(crate::Error::decode("dictzip chunk table is empty"));
        }
        let start_chunk = (position / self.chunk_len) as usize;
        // an exact multiple of the chunk length lands one past the final
        // covered chunk
        let end_chunk = (((u64::from(position) + u64::from(size)) / u64::from(self.chunk_len))
            as usize)
            .min(self.chunk_sizes.len() - 1);
        let inner = (position % self.chunk_len) as usize;
        if start_chunk >= self.chunk_sizes.len() {
            return Err(crate::Error::decode(format!(
                "position {position} is beyond the {} chunks of the blob",
                self.chunk_sizes.len()
            )));
        }
        let skip: u64 = self.chunk_sizes[..start_chunk]
            .iter()
            .map(|size| u64::from(*size))
            .sum();
        let compressed_len: usize = self.chunk_sizes[start_chunk..=end_chunk]
            .iter()
            .map(|size| usize::from(*size))
            .sum();
        file.seek(SeekFrom::Start(self.offset + skip))
            .map_err(|e| crate::Error::io(e, "seeking to dictzip chunk"))?;
        let mut compressed = vec![0; compressed_len];
        file.read_exact(&mut compressed)
            .map_err(|e| crate::Error::io(e, "reading dictzip chunks"))?;
        let inflated = inflate_raw(&compressed)?;
        let end = inner + size as usize;
        if inflated.len() < end {
            return Err(crate::Error::decode(format!(
                "dictzip chunks inflated to {} bytes, expected at least {end}",
                inflated.len()
            )));
        }
        Ok(inflated[inner..end].to_vec())
    }
}

/// Parses the dictzip extra subfield: SI1, SI2, LEN, then VER, CHLEN, and
/// CHCNT, followed by exactly CHCNT little-endian u16 compressed chunk
/// lengths.
fn parse_chunk_table(extra: &[u8]) -> crate::Result<(u32, Vec<u16>)> {
    if extra.len() < SUBFIELD_HEADER_LEN {
        return Err(crate::Error::decode("dictzip extra subfield is too short"));
    }
    let chunk_len = u16::from_le_bytes(extra[6..8].try_into().unwrap());
    let chunk_count = usize::from(u16::from_le_bytes(extra[8..10].try_into().unwrap()));
    if extra.len() < SUBFIELD_HEADER_LEN + chunk_count * 2 {
        return Err(crate::Error::decode(format!(
            "dictzip chunk table declares {chunk_count} chunks but the subfield holds {}",
            (extra.len() - SUBFIELD_HEADER_LEN) / 2
        )));
    }
    let chunk_sizes = (0..chunk_count)
        .map(|i| {
            let at = SUBFIELD_HEADER_LEN + i * 2;
            u16::from_le_bytes(extra[at..at + 2].try_into().unwrap())
        })
        .collect();
    Ok((u32::from(chunk_len), chunk_sizes))
}

/// Reads a NUL-terminated field, advancing `offset` past it.
fn read_cstr<R: io::BufRead>(reader: &mut R, offset: &mut u64) -> crate::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .read_until(0, &mut bytes)
        .map_err(|e| crate::Error::io(e, "reading dictzip header field"))?;
    *offset += bytes.len() as u64;
    if bytes.pop() != Some(0) {
        return Err(crate::Error::decode("unterminated dictzip header field"));
    }
    Ok(bytes)
}

/// Inflates a raw deflate stream (no zlib wrapper), driving the output in
/// sync-flushed chunks the way dictzip readers do. Inflation stops at
/// stream end or once the input is exhausted.
fn inflate_raw(data: &[u8]) -> crate::Result<Vec<u8>> {
    const CHUNK: usize = 0xffff;
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3));
    let mut buf = vec![0u8; CHUNK];
    loop {
        let consumed = inflater.total_in() as usize;
        let before_out = inflater.total_out();
        let status = inflater
            .decompress(&data[consumed..], &mut buf, FlushDecompress::Sync)
            .map_err(|e| crate::Error::decode(format!("inflating dictzip chunks: {e}")))?;
        let produced = (inflater.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let stalled = produced == 0 && inflater.total_in() as usize == consumed;
        if matches!(status, Status::StreamEnd) || stalled {
            return Ok(out);
        }
    }
}
