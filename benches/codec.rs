//! 체크섬 / 프레임 코덱 / 단편화 벤치마크

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use netcomm::{checksum, Fragmenter, Frame, DEFAULT_FRAGMENT_PAYLOAD};

fn text(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| b'a' + (i % 26) as u8).collect::<Vec<u8>>())
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    for size in [64, 511, 1451] {
        let data = text(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(checksum::digest(data)));
        });
    }

    group.finish();
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [16, 511, 1451] {
        let frame = Frame::data(1, text(size));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.to_wire().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [16, 511, 1451] {
        let encoded = Frame::data(1, text(size)).to_wire().unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let frame = Frame::from_bytes(encoded).unwrap();
                black_box(frame.verify_checksum())
            });
        });
    }

    group.finish();
}

fn bench_fragmenter(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmenter");

    for size in [100, 10_000, 99_999] {
        let message = text(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, message| {
            b.iter(|| {
                let fragmenter = Fragmenter::new(message.clone(), DEFAULT_FRAGMENT_PAYLOAD).unwrap();
                black_box(fragmenter.map(|f| f.payload.len()).sum::<usize>())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_checksum,
    bench_frame_encode,
    bench_frame_decode,
    bench_fragmenter
);
criterion_main!(benches);
