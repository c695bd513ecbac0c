//! The ZIP container of a `.pptx` file, held in memory.
//!
//! Parts are written back in their original order. Parts without an
//! override are copied with [`zip::ZipWriter::raw_copy_file`] so their
//! compressed bytes are identical to the input; only overridden parts are
//! deflated again.

use super::DeckError;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// An in-memory OPC package.
pub struct Package {
    source: Vec<u8>,
    parts: HashMap<String, Vec<u8>>,
}

impl Package {
    /// Read every part of `bytes` into memory.
    pub fn read(bytes: Vec<u8>) -> Result<Self, DeckError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        let mut parts = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.insert(name, data);
        }

        drop(archive);
        Ok(Self {
            source: bytes,
            parts,
        })
    }

    /// Content of a part as read from the input.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Require a part, failing with [`DeckError::MissingPart`].
    pub fn require(&self, name: &str) -> Result<&[u8], DeckError> {
        self.part(name)
            .ok_or_else(|| DeckError::MissingPart(name.to_string()))
    }

    /// Serialise the package in archive order with `overrides` in place of
    /// the parts they name.
    pub fn write_with(&self, overrides: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, DeckError> {
        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            let name = file.name().to_string();
            match overrides.get(&name) {
                Some(data) => {
                    drop(file);
                    writer.start_file(name, options)?;
                    writer.write_all(data)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
