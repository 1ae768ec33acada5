//! Parser for the kernel mount table (`/proc/self/mountinfo`).
//!
//! Each line looks like
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)   (10)         (11)
//! ```
//!
//! Only the first five fields are used.  The kernel escapes space, tab,
//! newline and backslash in the path fields as `\NNN` octal triplets; those
//! are decoded here so the mount point compares equal to the path a caller
//! would pass in.  Paths are arbitrary bytes, so lines are never decoded as
//! UTF-8.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::MountError;

/// Mount table of the calling process.
pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Minimum number of whitespace-separated fields in a usable line.
const MIN_FIELDS: usize = 5;

/// One row of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Unique id of the mount.
    pub mount_id: String,
    /// Id of the parent mount.
    pub parent_id: String,
    /// `major:minor` of the backing device.
    pub device: String,
    /// Directory within the filesystem that forms the root of this mount.
    pub root: PathBuf,
    /// Mount point relative to the process root.
    pub mount_point: PathBuf,
}

/// Parse a single mount-table line.
pub fn parse_line(line: &[u8]) -> Result<MountRecord, MountError> {
    let fields: Vec<&[u8]> = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty())
        .collect();
    if fields.len() < MIN_FIELDS {
        return Err(MountError::MalformedLine(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }

    Ok(MountRecord {
        mount_id: String::from_utf8_lossy(fields[0]).into_owned(),
        parent_id: String::from_utf8_lossy(fields[1]).into_owned(),
        device: String::from_utf8_lossy(fields[2]).into_owned(),
        root: path_field(fields[3]),
        mount_point: path_field(fields[4]),
    })
}

fn path_field(raw: &[u8]) -> PathBuf {
    PathBuf::from(OsString::from_vec(unescape_octal(raw)))
}

/// Replace every `\NNN` octal triplet with the byte it encodes.
///
/// Backslashes not followed by three octal digits, and triplets above
/// `\377`, are kept literally.
pub fn unescape_octal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(value) = bytes.get(i + 1..i + 4).and_then(octal_byte)
        {
            out.push(value);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let mut value: u32 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return None;
        }
        value = value * 8 + u32::from(d - b'0');
    }
    u8::try_from(value).ok()
}

/// Parse every line from `reader`, skipping lines that do not parse.
///
/// Only a failure to read from `reader` is returned as an error; a single
/// malformed row must not hide the rest of the table.
pub fn enumerate_mounts<R: BufRead>(reader: R) -> Result<Vec<MountRecord>, MountError> {
    let mut records = Vec::new();
    for line in reader.split(b'\n') {
        let line = line?;
        match parse_line(&line) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "skipping mount table line"),
        }
    }
    Ok(records)
}

/// Read and parse the mount table at `table`.
pub fn read_mount_table(table: &Path) -> Result<Vec<MountRecord>, MountError> {
    let file = File::open(table)?;
    enumerate_mounts(BufReader::new(file))
}

/// Whether `path` appears as a mount point in the table at `table`.
///
/// The comparison is on the exact bytes; no normalization is applied.
pub fn is_mount_point_in(table: &Path, path: &Path) -> Result<bool, MountError> {
    let wanted = path.as_os_str().as_bytes();
    let records = read_mount_table(table)?;
    Ok(records
        .iter()
        .any(|r| r.mount_point.as_os_str().as_bytes() == wanted))
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::io::Cursor;

    use super::*;

    const KUBELET_MOUNT: &str = "/var/lib/kubelet/pods/c3a32fc0-f186-4974-8579-429dea58ec6d/volumes/kubernetes.io~csi/spire-agent-socket/mount";

    fn fixture() -> String {
        [
            "22 28 0:20 / /sys rw,nosuid,nodev,noexec,relatime shared:7 - sysfs sysfs rw",
            "28 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw",
            "garbage",
            "",
            &format!(
                "1234 28 8:1 /run/spire/agent-sockets {KUBELET_MOUNT} rw,relatime shared:1 - ext4 /dev/sda1 rw"
            ),
            "1240 28 8:1 /data\\040dir /mnt/with\\040space rw,relatime - ext4 /dev/sda1 rw",
            "1 2",
        ]
        .join("\n")
    }

    /// Latin-1 mount point between two ordinary rows.
    fn latin1_fixture() -> Vec<u8> {
        let mut table = Vec::new();
        table.extend_from_slice(b"28 1 8:1 / / rw - ext4 /dev/sda1 rw\n");
        table.extend_from_slice(b"40 28 8:1 / /mnt/caf\xe9 rw - ext4 /dev/sda1 rw\n");
        table.extend_from_slice(b"41 28 8:1 / /target rw - ext4 /dev/sda1 rw\n");
        table
    }

    #[test]
    fn parse_line_extracts_first_five_fields() {
        let record = parse_line(
            b"36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue",
        )
        .unwrap();
        assert_eq!(
            record,
            MountRecord {
                mount_id: "36".into(),
                parent_id: "35".into(),
                device: "98:0".into(),
                root: "/mnt1".into(),
                mount_point: "/mnt2".into(),
            }
        );
    }

    #[test]
    fn parse_line_rejects_short_lines() {
        assert!(matches!(
            parse_line(b"36 35 98:0 /mnt1"),
            Err(MountError::MalformedLine(_))
        ));
        assert!(matches!(parse_line(b""), Err(MountError::MalformedLine(_))));
    }

    #[test]
    fn parse_line_unescapes_path_fields() {
        let record =
            parse_line(b"1240 28 8:1 /data\\040dir /mnt/with\\040space\\011tab rw - ext4 x rw")
                .unwrap();
        assert_eq!(record.root, Path::new("/data dir"));
        assert_eq!(record.mount_point, Path::new("/mnt/with space\ttab"));
    }

    #[test]
    fn parse_line_keeps_non_utf8_bytes() {
        let record = parse_line(b"40 28 8:1 / /mnt/caf\xe9 rw - ext4 x rw").unwrap();
        assert_eq!(record.mount_point.as_os_str().as_bytes(), b"/mnt/caf\xe9");

        // an escaped high byte decodes to the raw byte too
        let record = parse_line(b"40 28 8:1 / /mnt/caf\\351 rw - ext4 x rw").unwrap();
        assert_eq!(record.mount_point.as_os_str().as_bytes(), b"/mnt/caf\xe9");
    }

    #[test]
    fn unescape_octal_cases() {
        assert_eq!(unescape_octal(b"plain"), b"plain");
        assert_eq!(unescape_octal(b"a\\134b"), b"a\\b");
        assert_eq!(unescape_octal(b"a\\012b"), b"a\nb");
        assert_eq!(unescape_octal(b"\\377"), b"\xff");
        // Not an octal triplet: kept as is.
        assert_eq!(unescape_octal(b"a\\09b"), b"a\\09b");
        assert_eq!(unescape_octal(b"trailing\\04"), b"trailing\\04");
        assert_eq!(unescape_octal(b"big\\777"), b"big\\777");
    }

    #[test]
    fn enumerate_skips_malformed_lines() {
        let records = enumerate_mounts(Cursor::new(fixture())).unwrap();
        let points: Vec<&Path> = records.iter().map(|r| r.mount_point.as_path()).collect();
        assert_eq!(
            points,
            vec![
                Path::new("/sys"),
                Path::new("/"),
                Path::new(KUBELET_MOUNT),
                Path::new("/mnt/with space"),
            ]
        );
    }

    #[test]
    fn enumerate_reads_past_non_utf8_rows() {
        let records = enumerate_mounts(Cursor::new(latin1_fixture())).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].mount_point, Path::new("/target"));
    }

    #[test]
    fn is_mount_point_matches_exact_path() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mountinfo");
        std::fs::write(&table, fixture()).unwrap();

        assert!(is_mount_point_in(&table, Path::new(KUBELET_MOUNT)).unwrap());
        assert!(is_mount_point_in(&table, Path::new("/mnt/with space")).unwrap());
        assert!(!is_mount_point_in(&table, Path::new(&format!("{KUBELET_MOUNT}other"))).unwrap());
        // No normalization: a trailing slash is a different path.
        assert!(!is_mount_point_in(&table, Path::new("/sys/")).unwrap());
    }

    #[test]
    fn is_mount_point_with_non_utf8_rows_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mountinfo");
        std::fs::write(&table, latin1_fixture()).unwrap();

        assert!(is_mount_point_in(&table, Path::new("/target")).unwrap());
        let latin1 = Path::new(OsStr::from_bytes(b"/mnt/caf\xe9"));
        assert!(is_mount_point_in(&table, latin1).unwrap());
        // the UTF-8 spelling is a different byte string
        assert!(!is_mount_point_in(&table, Path::new("/mnt/café")).unwrap());
    }

    #[test]
    fn is_mount_point_fails_on_unreadable_table() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(matches!(
            is_mount_point_in(&missing, Path::new("/")),
            Err(MountError::Io(_))
        ));
    }
}
