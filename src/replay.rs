//! Capture replay
//!
//! Feeds every Ethernet frame of a classic (legacy) pcap capture through an
//! adapter. Capture timestamps are the clock, and every frame runs on
//! execution unit 0.

use pcap_parser::pcap::{self, LegacyPcapBlock, PcapHeader};
use pcap_parser::Linktype;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ReplayError;
use crate::hooks::HostHook;
use crate::report::TrafficReport;

/// Capture timestamp in nanoseconds
fn timestamp_ns(block: &LegacyPcapBlock, nanosecond: bool) -> u64 {
    let fraction = u64::from(block.ts_usec);
    let fraction_ns = if nanosecond { fraction } else { fraction * 1_000 };
    u64::from(block.ts_sec) * 1_000_000_000 + fraction_ns
}

fn read_header(data: &[u8]) -> Result<(&[u8], PcapHeader), ReplayError> {
    let (rest, header) =
        pcap::parse_pcap_header(data).map_err(|e| ReplayError::Header(format!("{:?}", e)))?;

    if header.network != Linktype::ETHERNET {
        return Err(ReplayError::LinkType(header.network.0));
    }

    Ok((rest, header))
}

/// Replay an in-memory capture
pub fn replay_bytes<H: HostHook>(hook: &H, data: &[u8]) -> Result<TrafficReport, ReplayError> {
    let (mut rest, header) = read_header(data)?;
    let nanosecond = header.is_nanosecond_precision();
    let big_endian = header.is_bigendian();
    debug!(
        "Capture header: version {}.{}, snaplen {}, big endian: {}, ns timestamps: {}",
        header.version_major, header.version_minor, header.snaplen, big_endian, nanosecond
    );

    let mut report = TrafficReport::new(H::NAME);
    let mut index = 0usize;

    while !rest.is_empty() {
        let parsed = if big_endian {
            pcap::parse_pcap_frame_be(rest)
        } else {
            pcap::parse_pcap_frame(rest)
        };
        let (next, block) = parsed.map_err(|e| ReplayError::Record {
            index,
            reason: format!("{:?}", e),
        })?;

        let now = timestamp_ns(&block, nanosecond);
        report.record::<H>(hook.process(block.data, 0, now));

        rest = next;
        index += 1;
    }

    report.finish(hook.core());
    Ok(report)
}

/// Replay a capture file from disk
pub fn replay_file<H: HostHook, P: AsRef<Path>>(
    hook: &H,
    path: P,
) -> Result<TrafficReport, ReplayError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let report = replay_bytes(hook, &data)?;
    info!(
        "Replayed {} frames from {} through {} ({} dropped)",
        report.frames,
        path.display(),
        H::NAME,
        report.dropped
    );
    Ok(report)
}
