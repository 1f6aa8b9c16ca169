// Capture replay
//
// Builds small pcap fixtures and replays them through both adapters.

use cerberus_filter::replay::{replay_bytes, replay_file};
use cerberus_filter::synth::FrameBuilder;
use cerberus_filter::{FallbackHook, FastPathHook, FilterConfig, FilterCore, ReplayError};
use pcap_parser::pcap::{LegacyPcapBlock, PcapHeader};
use pcap_parser::{Linktype, ToVec};
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;

const SRC: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 77);

fn header(network: Linktype) -> Vec<u8> {
    let mut hdr = PcapHeader {
        magic_number: 0xa1b2c3d4,
        version_major: 2,
        version_minor: 4,
        thiszone: 0,
        sigfigs: 0,
        snaplen: 1500,
        network,
    };
    hdr.to_vec().unwrap()
}

fn record(ts_sec: u32, ts_usec: u32, frame: &[u8]) -> Vec<u8> {
    let mut block = LegacyPcapBlock {
        ts_sec,
        ts_usec,
        caplen: frame.len() as u32,
        origlen: frame.len() as u32,
        data: frame,
    };
    block.to_vec().unwrap()
}

/// TCP flood of `count` packets from one source, 1ms apart
fn flood_capture(count: u32) -> Vec<u8> {
    let frame = FrameBuilder::tcp(SRC, 443).syn().build();
    let mut capture = header(Linktype::ETHERNET);
    for i in 0..count {
        capture.extend(record(1_700_000_000, i * 1_000, &frame));
    }
    capture
}

fn core(budget: u64) -> Arc<FilterCore> {
    let config = FilterConfig {
        rate_budget: budget,
        execution_units: Some(1),
        ..Default::default()
    };
    Arc::new(FilterCore::new(&config).unwrap())
}

#[test]
fn test_replay_flood_fast_path() {
    let hook = FastPathHook::new(core(10));
    let report = replay_bytes(&hook, &flood_capture(25)).unwrap();

    assert_eq!(report.path, "xdp");
    assert_eq!(report.frames, 25);
    assert_eq!(report.passed, 10);
    assert_eq!(report.decision_count("rate_limited"), 1);
    assert_eq!(report.decision_count("blocked"), 14);
    assert_eq!(report.codes.get("XDP_DROP"), Some(&15));
    assert_eq!(report.code_values.get("XDP_DROP"), Some(&1));
    assert_eq!(report.blocked_sources, 1);
    assert_eq!(report.metrics.dropped_block, 14);
}

#[test]
fn test_replay_mixed_capture_fallback() {
    let mut capture = header(Linktype::ETHERNET);
    let frames = [
        FrameBuilder::udp(SRC, 53).build(),
        FrameBuilder::icmp(SRC).build(),
        FrameBuilder::tcp(SRC, 22).truncate_transport(6).build(),
        FrameBuilder::udp(SRC, 51820).truncate_transport(2).build(),
        FrameBuilder::tcp(SRC, 80).ethertype(0x86DD).build(),
    ];
    for (i, frame) in frames.iter().enumerate() {
        capture.extend(record(10, i as u32, frame));
    }

    let hook = FallbackHook::new(core(100));
    let report = replay_bytes(&hook, &capture).unwrap();
    assert_eq!(report.frames, 5);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.decision_count("malformed_tcp"), 1);
    assert_eq!(report.decision_count("malformed_udp"), 1);
    assert_eq!(report.decision_count("unsupported"), 1);
    assert_eq!(report.codes.get("TC_ACT_SHOT"), Some(&1));
    assert_eq!(report.codes.get("TC_ACT_OK"), Some(&4));
}

#[test]
fn test_replay_uses_capture_clock() {
    // two bursts over budget, separated by more than the block duration
    let frame = FrameBuilder::tcp(SRC, 443).build();
    let mut capture = header(Linktype::ETHERNET);
    for i in 0..3 {
        capture.extend(record(100, i, &frame));
    }
    for i in 0..3 {
        capture.extend(record(200, i, &frame));
    }

    let hook = FastPathHook::new(core(2));
    let report = replay_bytes(&hook, &capture).unwrap();
    assert_eq!(report.decision_count("rate_limited"), 2);
    assert_eq!(report.decision_count("blocked"), 0);
    assert_eq!(report.passed, 4);
}

#[test]
fn test_replay_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&flood_capture(3)).unwrap();

    let hook = FastPathHook::new(core(10));
    let report = replay_file(&hook, file.path()).unwrap();
    assert_eq!(report.frames, 3);
    assert_eq!(report.dropped, 0);
}

#[test]
fn test_replay_rejects_non_ethernet() {
    let hook = FastPathHook::new(core(10));
    let capture = header(Linktype(113));
    assert!(matches!(
        replay_bytes(&hook, &capture),
        Err(ReplayError::LinkType(113))
    ));
}

#[test]
fn test_replay_rejects_garbage_header() {
    let hook = FastPathHook::new(core(10));
    assert!(matches!(
        replay_bytes(&hook, b"not a capture file at all"),
        Err(ReplayError::Header(_))
    ));
}

#[test]
fn test_replay_reports_corrupt_record() {
    let mut capture = flood_capture(2);
    capture.extend_from_slice(&[0x01, 0x02, 0x03]);

    let hook = FastPathHook::new(core(10));
    match replay_bytes(&hook, &capture) {
        Err(ReplayError::Record { index, .. }) => assert_eq!(index, 2),
        other => panic!("unexpected result: {:?}", other.map(|r| r.frames)),
    }
}

#[test]
fn test_replay_missing_file() {
    let hook = FastPathHook::new(core(10));
    assert!(matches!(
        replay_file(&hook, "/nonexistent/capture.pcap"),
        Err(ReplayError::Io { .. })
    ));
}
