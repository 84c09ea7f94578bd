//! Rendezvous channel benchmarks: flusso vs flume vs kanal
//!
//! Run with: cargo bench --bench channels
//!
//! All three channels are used at capacity zero, so every send has to meet
//! a receive; the benchmark measures the ping cost of the rendezvous
//! machinery itself with one producer task and one consumer task.

use criterion::{criterion_group, criterion_main, Criterion};
use flusso::RendezvousChannel;

const TOTAL_MESSAGES: usize = 1_000;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
        .expect("runtime")
}

fn rendezvous(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendezvous");

    let rt = runtime();
    group.bench_function("flusso", |b| {
        b.to_async(&rt).iter(|| async {
            let channel = RendezvousChannel::new();
            let producer = channel.clone();
            let sender = tokio::spawn(async move {
                for i in 0..TOTAL_MESSAGES {
                    producer.send(i).await;
                }
                producer.finish();
            });
            let mut received = 0;
            while channel.next().await.is_some() {
                received += 1;
            }
            sender.await.unwrap();
            assert_eq!(received, TOTAL_MESSAGES);
        });
    });

    let rt = runtime();
    group.bench_function("flume", |b| {
        b.to_async(&rt).iter(|| async {
            let (tx, rx) = flume::bounded::<usize>(0);
            let sender = tokio::spawn(async move {
                for i in 0..TOTAL_MESSAGES {
                    tx.send_async(i).await.unwrap();
                }
            });
            let mut received = 0;
            while rx.recv_async().await.is_ok() {
                received += 1;
            }
            sender.await.unwrap();
            assert_eq!(received, TOTAL_MESSAGES);
        });
    });

    let rt = runtime();
    group.bench_function("kanal", |b| {
        b.to_async(&rt).iter(|| async {
            let (tx, rx) = kanal::bounded_async::<usize>(0);
            let sender = tokio::spawn(async move {
                for i in 0..TOTAL_MESSAGES {
                    tx.send(i).await.unwrap();
                }
            });
            let mut received = 0;
            while rx.recv().await.is_ok() {
                received += 1;
            }
            sender.await.unwrap();
            assert_eq!(received, TOTAL_MESSAGES);
        });
    });

    group.finish();
}

criterion_group!(benches, rendezvous);
criterion_main!(benches);
