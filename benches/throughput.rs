//! Throughput Benchmark
//!
//! Measures the hot paths of console input: tokenizing, resolving against
//! a command table, building commands for typed keys and executing batches.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fastonosql::commands::{CommandHandler, CommandTranslator};
use fastonosql::connection::MemoryConnection;
use fastonosql::db::{create_translator, redis, ConnectionType};
use fastonosql::protocol::{parse_commands, split_args};
use fastonosql::storage::StorageEngine;
use fastonosql::types::{NDbKValue, NKey, Value};
use std::sync::Arc;

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("split_plain", |b| {
        b.iter(|| split_args(black_box(b"SET user:1000 alex")));
    });

    group.bench_function("split_quoted", |b| {
        b.iter(|| split_args(black_box(br#"SET greeting "hello \"world\"\n" 'single quoted'"#)));
    });

    group.bench_function("split_json", |b| {
        b.iter(|| split_args(black_box(br#"SET doc {"name":"alex","tags":["a","b"]}"#)));
    });

    let batch = "SET a 1\r\nGET a\r\n".repeat(100);
    group.throughput(Throughput::Elements(200));
    group.bench_function("parse_commands_200", |b| {
        b.iter(|| parse_commands(black_box(batch.as_bytes())));
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let translator = create_translator(ConnectionType::Redis);
    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(1));

    let first: Vec<Bytes> = vec![Bytes::from("HELP")];
    let last: Vec<Bytes> = vec![Bytes::from("QUIT")];
    let multi: Vec<Bytes> = vec![Bytes::from("CONFIG"), Bytes::from("GET"), Bytes::from("databases")];

    group.bench_function("first_entry", |b| b.iter(|| translator.find_command(black_box(&first))));
    group.bench_function("last_entry", |b| b.iter(|| translator.find_command(black_box(&last))));
    group.bench_function("multi_word", |b| b.iter(|| translator.find_command(black_box(&multi))));
    group.bench_function("full_line", |b| {
        b.iter(|| translator.test_command_line(black_box(b"ZADD board 10 alex 20 bob")))
    });

    group.finish();
}

fn bench_translation(c: &mut Criterion) {
    let redis = create_translator(ConnectionType::Redis);
    let lmdb = create_translator(ConnectionType::Lmdb);
    let mut group = c.benchmark_group("translation");
    group.throughput(Throughput::Elements(1));

    let hash = NDbKValue::new(
        NKey::new("user:1"),
        Value::Hash((0..16).map(|i| (Bytes::from(format!("f{}", i)), Bytes::from("v"))).collect()),
    );
    let binary = NDbKValue::new(NKey::new(Bytes::from_static(b"\x00\x01key")), Value::string("x"));

    group.bench_function("redis_hash", |b| b.iter(|| redis.create_key_command(black_box(&hash))));
    group.bench_function("lmdb_hash", |b| b.iter(|| lmdb.create_key_command(black_box(&hash))));
    group.bench_function("binary_key", |b| b.iter(|| redis.create_key_command(black_box(&binary))));
    group.bench_function("to_wire", |b| {
        b.iter(|| redis::Translator.to_wire(black_box(b"SET \\x00key \"hello world\"")))
    });

    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let ty = ConnectionType::Redis;
    let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
    let mut conn = MemoryConnection::new(engine, ty).expect("connection");
    let handler = CommandHandler::new(ty);

    let mut group = c.benchmark_group("execute");
    let batch = (0..100)
        .map(|i| format!("SET key:{} {}\nGET key:{}", i, i, i))
        .collect::<Vec<_>>()
        .join("\n");
    group.throughput(Throughput::Elements(200));
    group.bench_function("batch_200", |b| {
        b.iter(|| handler.execute_batch(&mut conn, black_box(batch.as_bytes())))
    });

    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_lookup, bench_translation, bench_execute);
criterion_main!(benches);
