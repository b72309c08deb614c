use std::io::Cursor;

use zip::ZipArchive;

use crate::error::Error;

/// Confirms `bytes` is a well-formed ZIP archive containing at least one
/// `.sumocfg` file, and returns that file's path within the archive.
///
/// Entries are scanned in the archive's own storage order, not sorted
/// alphabetically: a bundle that happens to list its `.sumocfg` first is
/// expected to have it picked first, same as directory iteration order on
/// the filesystem this was packed from.
pub fn find_sumocfg_entry(bytes: &[u8]) -> Result<String, Error> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::InvalidInput(format!("not a valid zip archive: {e}")))?;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| Error::InvalidInput(format!("corrupt zip entry: {e}")))?;
        if !entry.is_dir() && entry.name().ends_with(".sumocfg") {
            return Ok(entry.name().to_string());
        }
    }

    Err(Error::InvalidInput("no .sumocfg file found in uploaded bundle".to_string()))
}

/// Bounds-checks the raw upload size against the configured limit before
/// any parsing happens.
pub fn check_payload_size(bytes_len: usize, max_file_size_bytes: usize) -> Result<(), Error> {
    if bytes_len > max_file_size_bytes {
        return Err(Error::PayloadTooLarge);
    }
    if bytes_len == 0 {
        return Err(Error::InvalidInput("empty payload".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::{SimpleFileOptions, ZipWriter};

    use super::*;

    fn zip_with_entries(names: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            for name in names {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(b"content").unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn finds_sumocfg_in_storage_order_not_sorted() {
        let zip = zip_with_entries(&["zzz/run.sumocfg", "aaa/other.txt"]);
        assert_eq!(find_sumocfg_entry(&zip).unwrap(), "zzz/run.sumocfg");
    }

    #[test]
    fn rejects_bundle_without_sumocfg() {
        let zip = zip_with_entries(&["readme.txt"]);
        assert!(find_sumocfg_entry(&zip).is_err());
    }

    #[test]
    fn rejects_oversized_payload() {
        assert!(check_payload_size(10_000, 5_000).is_err());
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(check_payload_size(0, 5_000).is_err());
    }
}
