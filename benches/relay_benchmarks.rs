//! Performance benchmarks for the relay hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use base64::prelude::*;
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tutor_relay::core::realtime::openai::translate_server_event;
use tutor_relay::core::realtime::{AudioParams, RealtimeEvent};
use tutor_relay::core::usage::UsageMeter;
use tutor_relay::handlers::realtime::messages::{RealtimeIncomingMessage, RealtimeOutgoingMessage};

/// Benchmark translation of upstream frames
fn bench_translate_server_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_server_event");
    group.measurement_time(Duration::from_secs(5));

    let transcript = r#"{"type":"response.audio_transcript.delta","event_id":"ev_1","response_id":"resp_1","delta":"Very good, let's try again."}"#.to_string();
    let ignored = r#"{"type":"rate_limits.updated","event_id":"ev_2","rate_limits":[{"name":"tokens","limit":1000,"remaining":900}]}"#.to_string();

    // 100ms and 1s of PCM16 at 24kHz
    let audio_frames: Vec<(usize, String)> = [4_800usize, 48_000]
        .into_iter()
        .map(|len| {
            let frame = format!(
                r#"{{"type":"response.audio.delta","event_id":"ev_3","delta":"{}"}}"#,
                BASE64_STANDARD.encode(vec![0u8; len])
            );
            (len, frame)
        })
        .collect();

    group.throughput(Throughput::Bytes(transcript.len() as u64));
    group.bench_function("transcript_delta", |b| {
        b.iter(|| translate_server_event(black_box(&transcript)));
    });

    group.throughput(Throughput::Bytes(ignored.len() as u64));
    group.bench_function("ignored_event", |b| {
        b.iter(|| translate_server_event(black_box(&ignored)));
    });

    for (len, frame) in &audio_frames {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("audio_delta", len), frame, |b, frame| {
            b.iter(|| translate_server_event(black_box(frame)));
        });
    }

    group.finish();
}

/// Benchmark quota accounting
fn bench_usage_meter(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage_meter");

    let meter = UsageMeter::new(u64::MAX);
    group.bench_function("try_consume_single_client", |b| {
        b.iter(|| meter.try_consume(black_box("learner"), black_box(20)));
    });

    let meter = UsageMeter::new(u64::MAX);
    let clients: Vec<String> = (0..1_000).map(|i| format!("client-{i}")).collect();
    let mut next = 0usize;
    group.bench_function("try_consume_many_clients", |b| {
        b.iter(|| {
            next = (next + 1) % clients.len();
            meter.try_consume(black_box(&clients[next]), black_box(20))
        });
    });

    let exhausted = UsageMeter::new(1_000);
    exhausted.try_consume("learner", 1_000);
    group.bench_function("is_exhausted", |b| {
        b.iter(|| exhausted.is_exhausted(black_box("learner")));
    });

    let rt = tokio::runtime::Runtime::new().unwrap();
    let shared = Arc::new(UsageMeter::new(u64::MAX));
    group.bench_function("try_consume_contended_8_tasks", |b| {
        b.to_async(&rt).iter(|| {
            let shared = Arc::clone(&shared);
            async move {
                let tasks: Vec<_> = (0..8)
                    .map(|_| {
                        let meter = Arc::clone(&shared);
                        tokio::spawn(async move {
                            for _ in 0..100 {
                                meter.try_consume("learner", 1);
                            }
                        })
                    })
                    .collect();
                for task in tasks {
                    let _ = task.await;
                }
            }
        });
    });

    group.finish();
}

/// Benchmark conversion of byte counts into milliseconds
fn bench_audio_duration(c: &mut Criterion) {
    let params = AudioParams::new(24_000, 2);
    c.bench_function("audio_duration_ms", |b| {
        b.iter(|| params.duration_ms(black_box(48_000)));
    });
}

/// Benchmark the browser-facing JSON protocol
fn bench_client_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_messages");

    let incoming = format!(
        r#"{{"type":"audio","audio":"{}"}}"#,
        BASE64_STANDARD.encode(vec![0u8; 3_200])
    );
    group.throughput(Throughput::Bytes(incoming.len() as u64));
    group.bench_function("parse_incoming_audio", |b| {
        b.iter(|| {
            let _: Result<RealtimeIncomingMessage, _> = serde_json::from_str(black_box(&incoming));
        });
    });

    let event = RealtimeEvent::Audio(Bytes::from(vec![0u8; 4_800]));
    group.bench_function("serialize_outgoing_audio", |b| {
        b.iter(|| {
            let message = RealtimeOutgoingMessage::from(black_box(event.clone()));
            serde_json::to_string(&message)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_translate_server_event,
    bench_usage_meter,
    bench_audio_duration,
    bench_client_messages,
);

criterion_main!(benches);
