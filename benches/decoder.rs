//! Benchmark suite for packet decoding and JSON serialization.
//!
//! Isolates the per-packet work from the radio and the async runtime.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use radio_bridge::{PACKET_SIZE, RadioMessage, RawPacket, decode_bytes, decode_packet};

const TIMESTAMP: u64 = 1_700_000_000;

fn packets() -> Vec<(&'static str, RawPacket)> {
    vec![
        ("temperature", RawPacket::temperature(1, 21, 50)),
        ("humidity", RawPacket::humidity(2, 45, 12)),
        ("invalid_humidity", RawPacket::humidity(2, 0, 45)),
        ("error_code", RawPacket::error(3, 0xFE)),
        (
            "unknown_type",
            RawPacket::from_bytes(&[4, 9, 0, 0, 0, 0, 0, 0, 0, 0]),
        ),
    ]
}

/// Benchmark decoding of each packet type
fn bench_decode_packet_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet_type");
    group.throughput(Throughput::Elements(1));

    for (name, packet) in packets() {
        group.bench_function(name, |b| {
            b.iter(|| black_box(decode_packet(black_box(&packet), TIMESTAMP)))
        });
    }

    group.finish();
}

/// Benchmark decoding straight from a receive buffer
fn bench_decode_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_bytes");
    group.throughput(Throughput::Bytes(PACKET_SIZE as u64));

    let mut buffer = [0u8; 64];
    buffer[..PACKET_SIZE].copy_from_slice(&RawPacket::temperature(7, -5, 25).to_bytes());

    group.bench_function("receive_buffer", |b| {
        b.iter(|| black_box(decode_bytes(black_box(&buffer), TIMESTAMP)))
    });

    group.finish();
}

/// Benchmark JSON serialization of decoded messages
fn bench_to_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_json");
    group.throughput(Throughput::Elements(1));

    let messages: Vec<(&str, RadioMessage)> = packets()
        .into_iter()
        .map(|(name, packet)| (name, decode_packet(&packet, TIMESTAMP)))
        .collect();

    for (name, message) in &messages {
        group.bench_function(*name, |b| b.iter(|| black_box(message.to_json())));
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_packet_types,
    bench_decode_bytes,
    bench_to_json
);
criterion_main!(benches);
