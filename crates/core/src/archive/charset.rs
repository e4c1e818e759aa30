//! Fallback charset detection for archives with non-UTF-8 entry names.
//!
//! The raw archive bytes are walked from local file header to local file
//! header using only the fields declared in each header, which works even
//! when the central directory cannot be decoded. The collected name bytes
//! are fed to a statistical detector.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use memchr::memmem;

use super::ZIP_LOCAL_HEADER_MAGIC;

const LOCAL_HEADER_LEN: usize = 30;
const COMPRESSED_SIZE_OFFSET: usize = 18;
const NAME_LEN_OFFSET: usize = 26;
const EXTRA_LEN_OFFSET: usize = 28;

fn read_u16(bytes: &[u8], at: usize) -> usize {
    u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize
}

fn read_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

/// Collect the raw file-name bytes of every local file header in `bytes`.
pub fn scan_local_header_names(bytes: &[u8]) -> Vec<Vec<u8>> {
    let finder = memmem::Finder::new(&ZIP_LOCAL_HEADER_MAGIC);
    let mut names = Vec::new();
    let mut pos = 0;

    while let Some(found) = finder.find(&bytes[pos..]) {
        let start = pos + found;
        if start + LOCAL_HEADER_LEN > bytes.len() {
            break;
        }

        let compressed_size = read_u32(bytes, start + COMPRESSED_SIZE_OFFSET);
        let name_len = read_u16(bytes, start + NAME_LEN_OFFSET);
        let extra_len = read_u16(bytes, start + EXTRA_LEN_OFFSET);

        let name_start = start + LOCAL_HEADER_LEN;
        let name_end = name_start + name_len;
        if name_end > bytes.len() {
            break;
        }
        names.push(bytes[name_start..name_end].to_vec());

        let data_start = name_end + extra_len;
        // entries written with a data descriptor declare 0 here; the next
        // search simply starts at the data
        pos = match data_start.checked_add(compressed_size) {
            Some(next) if next <= bytes.len() => next,
            _ => data_start.min(bytes.len()),
        };
    }

    names
}

/// Guess the charset of a set of raw names.
///
/// Returns `None` when the best guess cannot decode every name without
/// replacement characters.
pub fn detect_charset(names: &[Vec<u8>]) -> Option<&'static Encoding> {
    if names.is_empty() {
        return None;
    }

    let mut detector = EncodingDetector::new();
    for name in names {
        detector.feed(name, false);
        detector.feed(b" ", false);
    }
    detector.feed(&[], true);

    let guess = detector.guess(None, false);
    let decodes_cleanly = names.iter().all(|name| {
        guess
            .decode_without_bom_handling_and_without_replacement(name)
            .is_some()
    });

    decodes_cleanly.then_some(guess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::stored_zip_with_raw_names;

    #[test]
    fn test_scan_finds_every_entry_name() {
        let zip = stored_zip_with_raw_names(&[
            (b"a.txt".as_slice(), b"first".as_slice()),
            (b"dir/b.bin".as_slice(), b"second entry".as_slice()),
        ]);
        let names = scan_local_header_names(&zip);
        assert_eq!(names, vec![b"a.txt".to_vec(), b"dir/b.bin".to_vec()]);
    }

    #[test]
    fn test_scan_skips_magic_inside_stored_data() {
        // the payload contains a fake header signature; skipping by the
        // declared compressed size must step over it
        let mut payload = ZIP_LOCAL_HEADER_MAGIC.to_vec();
        payload.extend_from_slice(&[0u8; 40]);
        let zip = stored_zip_with_raw_names(&[(b"x".as_slice(), payload.as_slice())]);
        assert_eq!(scan_local_header_names(&zip), vec![b"x".to_vec()]);
    }

    #[test]
    fn test_scan_truncated_input() {
        assert!(scan_local_header_names(&ZIP_LOCAL_HEADER_MAGIC).is_empty());
        assert!(scan_local_header_names(b"").is_empty());
    }

    #[test]
    fn test_detect_shift_jis() {
        let names: Vec<Vec<u8>> = [
            "セレステのマップ/はじめてのステージ.bin",
            "セレステのマップ/ふたつめのステージ.bin",
            "説明書を読んでください.txt",
        ]
        .iter()
        .map(|s| encoding_rs::SHIFT_JIS.encode(s).0.into_owned())
        .collect();

        let detected = detect_charset(&names).expect("charset should be detected");
        assert_eq!(detected, encoding_rs::SHIFT_JIS);
    }

    #[test]
    fn test_detect_nothing_for_empty_input() {
        assert!(detect_charset(&[]).is_none());
    }
}
