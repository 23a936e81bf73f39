use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use secure_datagram::core::frame;
use secure_datagram::protocol::{EchoProcessor, RequestHandler};
use secure_datagram::utils::crypto::{Crypto, SymmetricKey};
use std::net::SocketAddr;
use std::sync::Arc;

#[allow(clippy::unwrap_used)]
fn bench_seal_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal_open");
    let crypto = Crypto::new(&SymmetricKey::from_bytes([0x42; 32]));
    let payload_sizes = [64usize, 512, 1472, 8192, 65_479];

    for &size in &payload_sizes {
        let payload = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("seal_{size}b"), |b| {
            b.iter(|| crypto.seal_frame(&payload).unwrap())
        });

        let sealed = crypto.seal_frame(&payload).unwrap();
        group.bench_function(format!("open_{size}b"), |b| {
            b.iter(|| crypto.open_frame(&sealed).unwrap())
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_split(c: &mut Criterion) {
    let datagram = vec![0u8; 1500];
    c.bench_function("frame_split_1500b", |b| {
        b.iter(|| frame::split(&datagram).unwrap())
    });
}

#[allow(clippy::unwrap_used)]
fn bench_handler(c: &mut Criterion) {
    let mut group = c.benchmark_group("handler");
    let crypto = Arc::new(Crypto::new(&SymmetricKey::from_bytes([0x42; 32])));
    let handler = RequestHandler::new(crypto.clone(), EchoProcessor);
    let peer: SocketAddr = "127.0.0.1:5171".parse().unwrap();

    group.bench_function("echo_valid_64b", |b| {
        b.iter_batched(
            || crypto.seal_frame(&[7u8; 64]).unwrap(),
            |request| handler.handle(&request, peer),
            BatchSize::SmallInput,
        )
    });

    let mut forged = crypto.seal_frame(&[7u8; 64]).unwrap();
    forged[30] ^= 1;
    group.bench_function("reject_forged_64b", |b| {
        b.iter(|| handler.handle(&forged, peer))
    });

    group.bench_function("reject_short", |b| {
        b.iter(|| handler.handle(b"this should fail", peer))
    });
    group.finish();
}

criterion_group!(benches, bench_seal_open, bench_split, bench_handler);
criterion_main!(benches);
