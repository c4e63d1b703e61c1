//! rustls `KeyLog` hook that writes NSS key log lines to a key log file.

use crate::error::KeyLogError;
use crate::writer::DurableWriter;
use parking_lot::Mutex;
use rustls::KeyLog;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// rustls key log hook backed by one key log file.
///
/// Lines use the NSS format understood by Wireshark:
/// `<LABEL> <client_random hex> <secret hex>`.
pub struct FileKeyLog {
    path: PathBuf,
    writer: Mutex<DurableWriter>,
}

impl FileKeyLog {
    pub fn new(writer: DurableWriter) -> Self {
        Self {
            path: writer.path().to_path_buf(),
            writer: Mutex::new(writer),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl fmt::Debug for FileKeyLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKeyLog").field("path", &self.path).finish()
    }
}

impl KeyLog for FileKeyLog {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        let line = format_line(label, client_random, secret);
        let mut writer = self.writer.lock();
        if let Err((written, err)) = write_line(&mut writer, line.as_bytes()) {
            // The hook has no error channel. `written` bytes of the line
            // stay in the file, unsynced.
            warn!(
                target: "sslkeylog",
                label,
                written,
                len = line.len(),
                error = %err,
                "dropping key log line"
            );
        }
    }
}

/// Write all of `line`, resuming after short writes. On failure returns how
/// many bytes of the line reached the file.
fn write_line(writer: &mut DurableWriter, line: &[u8]) -> Result<(), (usize, KeyLogError)> {
    let mut remaining = line;
    while !remaining.is_empty() {
        match writer.write_durable(remaining) {
            Ok(n) => remaining = &remaining[n..],
            Err(err) if err.bytes_written() > 0 => {
                remaining = &remaining[err.bytes_written()..];
            }
            Err(err) => return Err((line.len() - remaining.len(), err)),
        }
    }
    Ok(())
}

fn format_line(label: &str, client_random: &[u8], secret: &[u8]) -> String {
    format!(
        "{} {} {}\n",
        label,
        hex::encode(client_random),
        hex::encode(secret)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::KeyLogAllocator;
    use crate::test_support::capture_logs;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn line_format() {
        assert_eq!(
            format_line("CLIENT_RANDOM", &[0x01, 0xab], &[0xff, 0x00]),
            "CLIENT_RANDOM 01ab ff00\n"
        );
    }

    #[test]
    fn each_line_lands_on_disk() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));
        let key_log = FileKeyLog::new(allocator.allocate_writer().unwrap());

        assert!(key_log.will_log("CLIENT_HANDSHAKE_TRAFFIC_SECRET"));
        key_log.log("CLIENT_HANDSHAKE_TRAFFIC_SECRET", &[0xaa; 4], &[0xbb; 2]);
        assert_eq!(
            fs::read_to_string(key_log.path()).unwrap(),
            "CLIENT_HANDSHAKE_TRAFFIC_SECRET aaaaaaaa bbbb\n"
        );

        key_log.log("SERVER_TRAFFIC_SECRET_0", &[0x01], &[0x02]);
        let contents = fs::read_to_string(key_log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with("SERVER_TRAFFIC_SECRET_0 01 02\n"));
    }

    #[test]
    fn debug_shows_path_only() {
        let dir = tempdir().unwrap();
        let allocator = KeyLogAllocator::new(dir.path().join("keys.log"));
        let key_log = FileKeyLog::new(allocator.allocate_writer().unwrap());
        let debug = format!("{key_log:?}");
        assert!(debug.contains("keys.log"), "{debug}");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unsynced_line_is_reported() {
        use std::fs::OpenOptions;

        let path = PathBuf::from("/dev/null");
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        let mut writer = DurableWriter::new(file, path.clone());

        let (written, err) = write_line(&mut writer, b"CLIENT_RANDOM 00 11\n").unwrap_err();
        assert_eq!(written, 0);
        assert!(matches!(err, KeyLogError::Durability { .. }), "{err:?}");

        let key_log = FileKeyLog::new(DurableWriter::new(
            OpenOptions::new().write(true).open(&path).unwrap(),
            path,
        ));
        let logs = capture_logs(|| key_log.log("CLIENT_RANDOM", &[0x00], &[0x11]));
        assert!(logs.contains("dropping key log line"), "{logs}");
        assert!(logs.contains("written=0"), "{logs}");
        assert!(logs.contains("len=20"), "{logs}");
    }
}
