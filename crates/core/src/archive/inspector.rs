use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::charset::{detect_charset, scan_local_header_names};
use super::ArchiveError;
use crate::events::{CrawlEvent, EventHub};

/// Largest entry read into memory. Manifests, icons and plugin sources are
/// far below it.
pub const MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// Signature every zip local file header starts with.
pub const ZIP_LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Check that the file starts with a zip local file header.
pub fn has_zip_magic(path: &Path) -> Result<bool, ArchiveError> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 4];
    match file.read_exact(&mut head) {
        Ok(()) => Ok(head == ZIP_LOCAL_HEADER_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// An opened archive with its entry names decoded up front.
pub struct ArchiveHandle {
    archive: ZipArchive<File>,
    names: Vec<String>,
    encoding: Option<&'static Encoding>,
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("entries", &self.names.len())
            .field("encoding", &self.encoding.map(|e| e.name()))
            .finish()
    }
}

impl ArchiveHandle {
    fn open_with(path: &Path, encoding: Option<&'static Encoding>) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            let raw = entry.name_raw();
            let name = match encoding {
                None => std::str::from_utf8(raw)
                    .map_err(|_| ArchiveError::InvalidEntryName { index })?
                    .to_string(),
                Some(encoding) => encoding.decode_without_bom_handling(raw).0.into_owned(),
            };
            names.push(name);
        }

        Ok(Self {
            archive,
            names,
            encoding,
        })
    }

    /// Entry names in central-directory order, directories included.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Non-directory entry paths in archive order.
    pub fn file_paths(&self) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !name.ends_with('/'))
            .cloned()
            .collect()
    }

    /// The charset names were decoded with, when it was not UTF-8.
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Read a whole entry, refusing entries over [`MAX_ENTRY_SIZE`].
    pub fn read_bytes(&mut self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        self.read_bytes_limited(index, MAX_ENTRY_SIZE)
    }

    fn read_bytes_limited(&mut self, index: usize, limit: u64) -> Result<Vec<u8>, ArchiveError> {
        let entry = self.archive.by_index(index)?;
        let too_large = || ArchiveError::EntryTooLarge {
            name: self.names[index].clone(),
            limit,
        };
        // the declared size comes from the archive and cannot be trusted
        if entry.size() > limit {
            return Err(too_large());
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.take(limit + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > limit {
            return Err(too_large());
        }
        Ok(buf)
    }

    /// Read an entry as UTF-8 text, dropping a leading byte-order mark.
    pub fn read_text(&mut self, index: usize) -> Result<String, ArchiveError> {
        let bytes = self.read_bytes(index)?;
        let text = String::from_utf8(bytes).map_err(|_| ArchiveError::NotText {
            name: self.names[index].clone(),
        })?;
        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }
}

/// Open a zip archive, falling back to charset detection on non-UTF-8 names.
///
/// `source` identifies the archive in the emitted `NonUtf8Archive` event.
pub fn open_archive(
    path: &Path,
    source: &str,
    events: &EventHub,
) -> Result<ArchiveHandle, ArchiveError> {
    let err = match ArchiveHandle::open_with(path, None) {
        Err(err @ ArchiveError::InvalidEntryName { .. }) => err,
        other => return other,
    };

    debug!(source = %source, "Entry names are not UTF-8, scanning local headers");
    let bytes = std::fs::read(path)?;
    let raw_names = scan_local_header_names(&bytes);

    let Some(encoding) = detect_charset(&raw_names) else {
        warn!(source = %source, "No charset detected for archive entry names");
        return Err(err);
    };

    let handle = ArchiveHandle::open_with(path, Some(encoding))?;
    warn!(
        source = %source,
        encoding = encoding.name(),
        "Opened archive with non-UTF-8 entry names"
    );
    events.emit(CrawlEvent::NonUtf8Archive {
        source: source.to_string(),
        encoding: encoding.name().to_string(),
    });
    Ok(handle)
}
