//! Encoding SDX dictionaries: entries accumulate in memory and `finish`
//! writes the `.ifo`/`.idx`/`.dict` triple.
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::Metadata;

/// The format version stamped into every info file this encoder writes.
pub const SDX_VERSION: &str = "2.4.2";

/// Object for building an SDX dictionary on disk.
///
/// Entries accumulate in a map sorted by headword bytes; adding a
/// duplicate headword overwrites the earlier definition. Nothing touches
/// the filesystem until [`finish`](Self::finish).
pub struct Encoder {
    ifo_path: PathBuf,
    idx_path: PathBuf,
    dict_path: PathBuf,
    metadata: Metadata,
    entries: BTreeMap<String, String>,
}

impl Encoder {
    /// Creates a new [`Encoder`] that will write the dictionary named by
    /// the info-file path `path`; the index and definition files are
    /// derived from it by extension.
    pub fn new(path: impl AsRef<Path>, metadata: Metadata) -> Self {
        let ifo_path = path.as_ref().to_path_buf();
        Self {
            idx_path: ifo_path.with_extension("idx"),
            dict_path: ifo_path.with_extension("dict"),
            ifo_path,
            metadata,
            entries: BTreeMap::new(),
        }
    }

    /// Adds an entry. A repeated headword overwrites the earlier
    /// definition.
    ///
    /// `alternates` is accepted for interface parity with the readers but
    /// is currently discarded: this encoder does not produce a synonym
    /// (`.syn`) file.
    pub fn add_entry(
        &mut self,
        headword: impl Into<String>,
        definition: impl Into<String>,
        _alternates: &[String],
    ) {
        self.entries.insert(headword.into(), definition.into());
    }

    /// Returns the number of distinct headwords added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the info, index, and definition files and consumes the
    /// encoder.
    ///
    /// # Errors
    /// This function returns an error if writing any of the three files
    /// fails. There is no transactional guarantee: files already written
    /// are left on disk for the caller to delete.
    pub fn finish(self) -> crate::Result<()> {
        // lay out the definition blob in sorted order; each entry starts
        // where the previous one ended
        let mut blob = Vec::new();
        let mut index = Vec::with_capacity(self.entries.len());
        for (headword, definition) in &self.entries {
            let position = blob.len() as u32;
            blob.extend_from_slice(definition.as_bytes());
            index.push((headword.as_str(), position, definition.len() as u32));
        }

        let write_err = |e| crate::Error::io(e, "writing SDX index");
        let file = File::create(&self.idx_path).map_err(|e| {
            crate::Error::io(
                e,
                format!("creating index file at path '{}'", self.idx_path.display()),
            )
        })?;
        let mut writer = BufWriter::new(file);
        let mut idxfilesize = 0usize;
        for (headword, position, size) in &index {
            writer.write_all(headword.as_bytes()).map_err(write_err)?;
            writer.write_all(&[0]).map_err(write_err)?;
            writer.write_all(&position.to_be_bytes()).map_err(write_err)?;
            writer.write_all(&size.to_be_bytes()).map_err(write_err)?;
            idxfilesize += headword.len() + 9;
        }
        writer.flush().map_err(write_err)?;

        let mut info = format!(
            "StarDict's dict ifo file\nversion={SDX_VERSION}\nbookname={}\nwordcount={}\nidxfilesize={idxfilesize}\nsametypesequence=m\n",
            self.metadata.title,
            index.len(),
        );
        for (key, value) in [
            ("author", &self.metadata.author),
            ("email", &self.metadata.email),
            ("website", &self.metadata.website),
            ("description", &self.metadata.description),
        ] {
            if !value.is_empty() {
                info.push_str(&format!("{key}={value}\n"));
            }
        }
        fs::write(&self.ifo_path, info).map_err(|e| {
            crate::Error::io(
                e,
                format!("writing info file at path '{}'", self.ifo_path.display()),
            )
        })?;

        fs::write(&self.dict_path, blob).map_err(|e| {
            crate::Error::io(
                e,
                format!(
                    "writing definition file at path '{}'",
                    self.dict_path.display()
                ),
            )
        })?;
        Ok(())
    }
}
