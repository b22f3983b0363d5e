//! Resident-set probe
//!
//! Reads `/proc/self/statm` and converts resident pages to bytes. The
//! probe is informational only; on platforms without procfs the caller
//! downgrades the error to a warning.

use anyhow::{Context, Result};

/// Current resident set size in bytes
#[cfg(target_os = "linux")]
pub fn rss_bytes() -> Result<u64> {
    let statm =
        std::fs::read_to_string("/proc/self/statm").context("failed to read /proc/self/statm")?;
    let resident_pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .context("unexpected statm format")?
        .parse()
        .context("failed to parse resident page count")?;
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        anyhow::bail!("sysconf reported nonpositive page size");
    }
    Ok(resident_pages * page_size as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn rss_bytes() -> Result<u64> {
    anyhow::bail!("resident-set probe requires procfs")
}

/// Report current memory usage on stdout, tolerating probe failure
pub fn report_usage() {
    match rss_bytes() {
        Ok(bytes) => println!(
            "Current memory usage: {} bytes ({:.2} GiB)",
            bytes,
            bytes as f64 / 1024.0 / 1024.0 / 1024.0
        ),
        Err(err) => tracing::warn!(%err, "memory probe unavailable"),
    }
}
