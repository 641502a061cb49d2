//! Benchmarks for the producer path of `HttpAppender::on_record`.

use std::net::TcpListener;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use relaylog::{AppenderConfigBuilder, HttpAppender, Level, LogRecord};

fn appender(capacity: usize) -> HttpAppender {
    // Unreachable endpoint: the worker fails fast and the queue stays busy.
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let url = format!("http://{}/hook", listener.local_addr().expect("addr"));
    drop(listener);
    let config = AppenderConfigBuilder::new()
        .with_url(url)
        .with_level("error")
        .with_capacity(capacity)
        .with_connect_timeout_ms(50)
        .build()
        .expect("config");
    let appender = HttpAppender::new(config);
    appender.start().expect("start");
    appender
}

fn enqueue_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("on_record");

    let filtered = appender(1024);
    group.bench_function("disabled_level", |b| {
        b.iter(|| filtered.on_record(black_box(LogRecord::new("bench", Level::Debug, "skip"))));
    });

    let bounded = appender(1024);
    group.bench_function("bounded_queue", |b| {
        b.iter(|| bounded.on_record(black_box(LogRecord::new("bench", Level::Error, "event"))));
    });

    let rendezvous = appender(0);
    group.bench_function("rendezvous_queue", |b| {
        b.iter(|| rendezvous.on_record(black_box(LogRecord::new("bench", Level::Error, "event"))));
    });

    group.finish();
}

criterion_group!(benches, enqueue_benchmarks);
criterion_main!(benches);
