use std::fs;
use std::path::Path;

use super::SourceError;

const DISKSTATS: &str = "/proc/diskstats";
const SYS_BLOCK: &str = "/sys/block";
const SECTOR_SIZE: u64 = 512;

/// RAM-backed and stacked devices. Their I/O is either not disk I/O at all
/// or already counted on the member disks.
const VIRTUAL_PREFIXES: [&str; 5] = ["loop", "ram", "zram", "dm-", "md"];

/// Total (bytes_read, bytes_written) over whole block devices, from
/// /proc/diskstats.
pub fn read_disk_bytes() -> Result<(u64, u64), SourceError> {
    let content = fs::read_to_string(DISKSTATS).map_err(|source| SourceError::Io {
        path: DISKSTATS,
        source,
    })?;
    Ok(parse_diskstats(&content, is_block_device))
}

/// Sum sectors read/written for every device accepted by `is_device`.
///
/// Fields (0-indexed):
///  2  name
///  5  sectors read
///  9  sectors written
pub fn parse_diskstats(content: &str, is_device: impl Fn(&str) -> bool) -> (u64, u64) {
    let mut read = 0u64;
    let mut written = 0u64;
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 || !is_device(parts[2]) {
            continue;
        }
        let (Ok(r), Ok(w)) = (parts[5].parse::<u64>(), parts[9].parse::<u64>()) else {
            continue;
        };
        read = read.saturating_add(r.saturating_mul(SECTOR_SIZE));
        written = written.saturating_add(w.saturating_mul(SECTOR_SIZE));
    }
    (read, written)
}

// ── block-device detection ──────────────────────────────────────────────

/// Return `true` if `name` is a whole physical disk: not a partition, not
/// RAM-backed, not a device-mapper/RAID volume stacked on other disks.
/// Uses /sys/block/<name> when available, otherwise falls back to
/// name-pattern heuristics.
pub fn is_block_device(name: &str) -> bool {
    is_physical_disk(Path::new(SYS_BLOCK), name)
}

fn is_physical_disk(sys_block: &Path, name: &str) -> bool {
    if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    let entry = sys_block.join(name);
    if !entry.exists() {
        return looks_like_whole_disk(name);
    }
    !has_slaves(&entry) && entry.join("device").exists()
}

fn has_slaves(entry: &Path) -> bool {
    fs::read_dir(entry.join("slaves"))
        .map(|mut members| members.next().is_some())
        .unwrap_or(false)
}

fn looks_like_whole_disk(name: &str) -> bool {
    let bytes = name.as_bytes();
    // sda, vda (not sda1)
    if (name.starts_with("sd") || name.starts_with("vd"))
        && name.len() == 3
        && bytes[2].is_ascii_alphabetic()
    {
        return true;
    }
    // xvda (not xvda1)
    if name.starts_with("xvd") && name.len() == 4 && bytes[3].is_ascii_alphabetic() {
        return true;
    }
    // nvme0n1 (not nvme0n1p1)
    if name.starts_with("nvme") && name.contains('n') && !name.contains('p') {
        return true;
    }
    // mmcblk0 (not mmcblk0p1)
    if name.starts_with("mmcblk") && !name.contains('p') {
        return true;
    }
    false
}
