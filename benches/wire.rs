//! Wire decoding and jitter buffer benchmarks
//!
//! Run with: cargo bench --bench wire

use bytes::{BufMut, Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stream_ingest::media::JitterBuffer;
use stream_ingest::protocol::{decode_text, parse_frame};

fn frame(timestamp: u32, frame_type: u8, payload_len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + payload_len);
    buf.put_u32(timestamp);
    buf.put_u8(frame_type);
    buf.put_bytes(0xAB, payload_len);
    buf.freeze()
}

/// Benchmark: binary frame header parsing across payload sizes
fn bench_parse_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_frame");
    for size in [160usize, 4_096, 65_536] {
        let data = frame(123_456, 1, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(parse_frame(data.clone())))
        });
    }
    group.finish();
}

/// Benchmark: decoder config control message
fn bench_decode_text(c: &mut Criterion) {
    let text = serde_json::json!({
        "type": "DecoderConfigs",
        "videoConfig": {
            "codec": "hev1.1.6.L93.B0",
            "codedWidth": 1920,
            "codedHeight": 1080,
            "frameRate": 60.0,
            "description": "AAECAw=="
        },
        "audioConfig": {
            "codec": "opus",
            "sampleRate": 48000,
            "numberOfChannels": 2,
            "description": "AAAD6AL8//4="
        }
    })
    .to_string();

    c.bench_function("decode_decoder_configs", |b| b.iter(|| black_box(decode_text(&text))));
}

/// Benchmark: steady-state push/pop on a full video buffer
fn bench_jitter_buffer(c: &mut Criterion) {
    let buffer = JitterBuffer::new(60);
    let record = parse_frame(frame(0, 1, 1_024)).unwrap();
    for _ in 0..60 {
        buffer.push(record.clone());
    }

    c.bench_function("jitter_buffer_push_pop", |b| {
        b.iter(|| {
            black_box(buffer.push(record.clone()));
            black_box(buffer.pop());
        })
    });
}

criterion_group!(benches, bench_parse_frame, bench_decode_text, bench_jitter_buffer);
criterion_main!(benches);
