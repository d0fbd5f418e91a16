use base64::{engine::general_purpose, Engine as _};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use silver_portrait_studio::services::extractor::{decode_payload, ExtractionChain};

fn fake_image(size: usize) -> String {
    let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    general_purpose::STANDARD.encode(bytes)
}

fn inline_reply(data: &str) -> String {
    json!({
        "choices": [{"message": {"content": [
            {"type": "text", "text": "Here is your portrait"},
            {"inline_data": {"mime_type": "image/png", "data": data}}
        ]}}]
    })
    .to_string()
}

fn text_reply(data: &str) -> String {
    json!({
        "choices": [{"message": {
            "content": format!("Done! ![portrait](data:image/png;base64,{})", data)
        }}]
    })
    .to_string()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_response");
    let chain = ExtractionChain::default();

    for size in [64 * 1024, 512 * 1024, 2 * 1024 * 1024] {
        let data = fake_image(size);
        let inline = inline_reply(&data);
        let text = text_reply(&data);

        group.bench_with_input(BenchmarkId::new("inline_data", size), &inline, |b, body| {
            b.iter(|| chain.classify(black_box(body)))
        });
        group.bench_with_input(BenchmarkId::new("embedded_data_url", size), &text, |b, body| {
            b.iter(|| chain.classify(black_box(body)))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_payload");

    for size in [64 * 1024, 2 * 1024 * 1024] {
        let data = fake_image(size);
        group.bench_with_input(BenchmarkId::new("standard", size), &data, |b, data| {
            b.iter(|| decode_payload(black_box(data)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_decode);
criterion_main!(benches);
