use std::hint::black_box;
use std::io::{Cursor, Write};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::GzEncoder;
use lineproto_core::{IngestRequest, Ingestor, LineParser};

fn sample_body(lines: usize, escaped: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(lines * 96);
    for i in 0..lines {
        let host = if escaped {
            format!("web\\ {i}")
        } else {
            format!("web{i}")
        };
        body.extend_from_slice(
            format!(
                "cpu,host={host},region=eu-west,core={} usage_user={}.5,usage_system=1.25 {}\n",
                i % 16,
                i % 100,
                1_465_839_830_100_400_200_i64 + i as i64
            )
            .as_bytes(),
        );
    }
    body
}

fn bench_parse_line(c: &mut Criterion) {
    let parser = LineParser::default();
    let mut group = c.benchmark_group("parse_line");

    for (label, line) in [
        ("plain", &b"cpu,host=web1,region=eu-west usage_user=12.5 1465839830100400200"[..]),
        ("escaped", &b"cpu,host=web\\ 1,region=eu\\,west usage_user=12.5 1465839830100400200"[..]),
    ] {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), line, |b, line| {
            b.iter(|| black_box(parser.parse_line(black_box(line), "db", -1_000_000)));
        });
    }

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let ingestor = Ingestor::default();
    let mut group = c.benchmark_group("ingest");

    for escaped in [false, true] {
        let body = sample_body(10_000, escaped);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(
            BenchmarkId::new(if escaped { "escaped" } else { "plain" }, body.len()),
            &body,
            |b, body| {
                let request = IngestRequest::new("db").with_precision("ns");
                b.iter(|| {
                    let batch = ingestor.ingest(Cursor::new(body.clone()), &request);
                    black_box(batch.metrics.len());
                })
            },
        );
    }

    let body = sample_body(10_000, false);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&body).expect("compress body");
    let compressed = encoder.finish().expect("finish gzip stream");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_with_input(
        BenchmarkId::new("gzip", compressed.len()),
        &compressed,
        |b, compressed| {
            let request = IngestRequest::new("db")
                .with_precision("ns")
                .with_content_encoding("gzip");
            b.iter(|| {
                let batch = ingestor.ingest(Cursor::new(compressed.clone()), &request);
                black_box(batch.metrics.len());
            })
        },
    );

    group.finish();
}

fn run_benches(c: &mut Criterion) {
    bench_parse_line(c);
    bench_ingest(c);
}

criterion_group!(benches, run_benches);
criterion_main!(benches);
