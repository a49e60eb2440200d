//! Frame encoding/verification benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scoutsync_protocol::frame::{self, Frame, FrameHeader, FRAME_HEADER_SIZE};
use scoutsync_protocol::Message;
use scoutsync_protocol::MessageKind;

fn create_test_payload(record_size: usize) -> Vec<u8> {
    let message = Message::new(
        MessageKind::Match,
        serde_json::json!({
            "match": 42,
            "team": 254,
            "notes": "x".repeat(record_size),
        }),
    );
    message.encode_payload().unwrap()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let payload = create_test_payload(size);

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(Frame::encode(payload).unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let payload = create_test_payload(size);
        let encoded = Frame::encode(&payload).unwrap();

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
                header_bytes.copy_from_slice(&encoded[..FRAME_HEADER_SIZE]);
                let header = FrameHeader::parse(&header_bytes).unwrap();
                black_box(frame::verify(&encoded[FRAME_HEADER_SIZE..], &header.digest))
            });
        });
    }

    group.finish();
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");

    for size in [100, 1000, 10000] {
        let payload = create_test_payload(size);

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(frame::digest(payload)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_encode, bench_frame_decode, bench_digest);
criterion_main!(benches);
