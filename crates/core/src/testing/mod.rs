//! Testing utilities and mock implementations.
//!
//! In-memory implementations of every external seam (catalog, transport,
//! mirror store) plus archive fixtures, so whole crawl runs can be driven
//! without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use modmirror_core::testing::{fixtures, MockCatalog, MockTransport};
//!
//! let catalog = MockCatalog::new();
//! let transport = MockTransport::new();
//!
//! let archive = fixtures::build_zip(&[("everest.yaml", "- Name: Foo\n  Version: 1.0.0\n")]);
//! let item = fixtures::item("Mod", 1, 1000, vec![fixtures::file(11, &archive, 1000)]);
//! transport.add(&item.files[0].url, archive);
//! catalog.add_item(item);
//! ```

mod mock_catalog;
mod mock_mirror_store;
mod mock_transport;

pub use mock_catalog::MockCatalog;
pub use mock_mirror_store::{MirrorOp, MockMirrorStore};
pub use mock_transport::MockTransport;

use std::sync::{Mutex, MutexGuard};

/// Lock a mock's state, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::catalog::urls::canonical_url;
    use crate::catalog::{CatalogFile, ItemDetails, Screenshot};

    /// Build a deflated zip from `(path, text)` pairs.
    pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let binary: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, text)| (*name, text.as_bytes()))
            .collect();
        build_zip_bytes(&binary)
    }

    /// Build a deflated zip from `(path, bytes)` pairs.
    pub fn build_zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer
                .start_file(*name, options)
                .expect("in-memory zip entry");
            writer.write_all(content).expect("in-memory zip write");
        }
        writer.finish().expect("in-memory zip finish").into_inner()
    }

    /// Build a stored (uncompressed) zip whose entry names are written as
    /// raw bytes, without the UTF-8 flag.
    pub fn stored_zip_with_raw_names(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for (name, data) in entries {
            let offset = out.len() as u32;
            let crc = crc32fast::hash(data);
            let size = data.len() as u32;

            out.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]);
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&0u16.to_le_bytes()); // stored
            out.extend_from_slice(&0u16.to_le_bytes()); // mod time
            out.extend_from_slice(&0x21u16.to_le_bytes()); // mod date (1980-01-01)
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra length
            out.extend_from_slice(name);
            out.extend_from_slice(data);

            central.extend_from_slice(&[0x50, 0x4b, 0x01, 0x02]);
            central.extend_from_slice(&20u16.to_le_bytes()); // version made by
            central.extend_from_slice(&20u16.to_le_bytes()); // version needed
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0x21u16.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // extra length
            central.extend_from_slice(&0u16.to_le_bytes()); // comment length
            central.extend_from_slice(&0u16.to_le_bytes()); // disk number
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
            central.extend_from_slice(&0u32.to_le_bytes()); // external attributes
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name);
        }

        let central_offset = out.len() as u32;
        let count = entries.len() as u16;
        out.extend_from_slice(&central);
        out.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    /// Manifest text declaring one mod per `(name, version)` pair.
    pub fn manifest(mods: &[(&str, &str)]) -> String {
        mods.iter()
            .map(|(name, version)| format!("- Name: {}\n  Version: {}\n", name, version))
            .collect()
    }

    /// A catalog file for `content`, uploaded at `date_added`.
    pub fn file(id: u64, content: &[u8], date_added: i64) -> CatalogFile {
        CatalogFile {
            id,
            file_name: format!("file-{}.zip", id),
            url: canonical_url(id),
            size: content.len() as u64,
            date_added,
            description: String::new(),
            download_count: 0,
        }
    }

    /// A catalog item last modified at `date_modified`.
    pub fn item(item_type: &str, id: u64, date_modified: i64, files: Vec<CatalogFile>) -> ItemDetails {
        ItemDetails {
            item_type: item_type.to_string(),
            id,
            name: format!("{} {}", item_type, id),
            author: "tester".to_string(),
            description: String::new(),
            page_url: format!("https://gamebanana.com/{}s/{}", item_type.to_lowercase(), id),
            date_added: files.iter().map(|f| f.date_added).min().unwrap_or(date_modified),
            date_modified,
            category_id: None,
            category_name: None,
            files,
            screenshots: Vec::new(),
            likes: 0,
            views: 0,
            downloads: 0,
        }
    }

    pub fn screenshot(file: &str) -> Screenshot {
        Screenshot {
            base_url: "https://images.example.org/img/ss/mods".to_string(),
            file: file.to_string(),
        }
    }

    /// A small solid-color PNG.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 90, 255]));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("in-memory png");
        out.into_inner()
    }
}
