use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Check that a user-entered OS version looks like "17.0" or "16.7.2".
pub fn is_valid_version(version: &str) -> bool {
    match Regex::new(r"^\d+\.\d+(\.\d+)?$") {
        Ok(re) => re.is_match(version),
        Err(_) => false,
    }
}

/// Root directory for downloaded disk images. Overridable for tests and
/// portable installs via DEVDISK_SUPPORT_DIR.
pub fn support_directory() -> PathBuf {
    if let Ok(dir) = std::env::var("DEVDISK_SUPPORT_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".devdisk-downloader");
    }
    std::env::temp_dir().join("devdisk-downloader")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let ts = get_timestamp();
        assert!(ts > 1700000000); // Sanity check
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("Developer/DiskImage.dmg"),
            "Developer_DiskImage.dmg"
        );
        assert_eq!(
            sanitize_filename("DeveloperDiskImage.dmg.signature"),
            "DeveloperDiskImage.dmg.signature"
        );
    }

    #[test]
    fn test_is_valid_version() {
        assert!(is_valid_version("17.0"));
        assert!(is_valid_version("16.7.2"));
        assert!(!is_valid_version("17"));
        assert!(!is_valid_version("17.0-beta"));
        assert!(!is_valid_version(""));
    }
}
