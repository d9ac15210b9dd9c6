use std::rc::Rc;

use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use tsrepl::{
    EngineConfig, EvaluateRequest, FileSystem, MemoryFileSystem, NoopObserver, SessionRegistry, find_spans, transform,
};

const FRAGMENT: &str = "\
import { readFile } from './io';
interface Point { x: number; y: number }
export const origin: Point = { x: 0, y: 0 };
export function distance(a: Point, b: Point = origin): number {
    return Math.sqrt((a.x - b.x) ** 2 + (a.y - b.y) ** 2);
}
const points = [1, 2, 3].map((n) => ({ x: n, y: n * 2 }));
points.map((p) => distance(p)).reduce((a, b) => a + b, 0);
";

const LOOP: &str = "\
let total = 0;
for (let i = 0; i < 2000; i++) {
    total += i % 7;
}
total
";

fn registry() -> (SessionRegistry, String) {
    let fs: Rc<dyn FileSystem> =
        Rc::new(MemoryFileSystem::new().with_file("/bench/io.ts", "export function readFile() { return ''; }"));
    let mut registry = SessionRegistry::with_file_system(EngineConfig::default(), fs);
    let session = registry.create_session(Some("bench"), None);
    (registry, session)
}

fn run_evaluate(bench: &mut Bencher, code: &str, expected: &str) {
    let (mut registry, session) = registry();
    let request = EvaluateRequest::new(&session, "/bench", code).namespace("bench.ts");
    let output = registry.evaluate(&request, &mut NoopObserver);
    assert_eq!(output.text(), expected);

    bench.iter(|| {
        let output = registry.evaluate(&request, &mut NoopObserver);
        black_box(output);
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("transform", |b| b.iter(|| black_box(transform(black_box(FRAGMENT)))));
    c.bench_function("find_spans", |b| b.iter(|| black_box(find_spans(black_box(FRAGMENT), 250))));
    c.bench_function("evaluate_fragment", |b| {
        run_evaluate(b, FRAGMENT, "13.416407864998739");
    });
    c.bench_function("evaluate_loop", |b| run_evaluate(b, LOOP, "5995"));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
