//! Per-installation identity used to spread replan instants.

use std::path::Path;

use crate::constants::MACHINE_ID_PATH;

/// Salt for the replan jitter, derived from `/etc/machine-id`.
pub fn jitter_salt() -> u64 {
    jitter_salt_from(Path::new(MACHINE_ID_PATH))
}

/// The first 64 bits of a hex machine id, or 0 when unavailable.
pub fn jitter_salt_from(path: &Path) -> u64 {
    let salt = std::fs::read_to_string(path).ok().and_then(|content| {
        let id = content.trim();
        id.get(..16).and_then(|head| u64::from_str_radix(head, 16).ok())
    });
    match salt {
        Some(salt) => salt,
        None => {
            log_debug!("No usable machine id at {}, replan jitter is unsalted", path.display());
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_salt_from_machine_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("machine-id");
        std::fs::write(&path, "0123456789abcdef0123456789abcdef\n").unwrap();
        assert_eq!(jitter_salt_from(&path), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn test_missing_or_garbage_id_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(jitter_salt_from(&dir.path().join("missing")), 0);

        let path = dir.path().join("machine-id");
        std::fs::write(&path, "not-hex").unwrap();
        assert_eq!(jitter_salt_from(&path), 0);
    }
}
