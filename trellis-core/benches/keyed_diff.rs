//! Keyed reconciliation benchmarks
//!
//! Patches large keyed lists against the in-memory host.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trellis_core::render::HostNode;
use trellis_core::{MemoryHost, Renderer, Runtime, VNode};

fn list(keys: &[usize]) -> VNode {
    VNode::element("ul").children(
        keys.iter()
            .map(|k| VNode::element("li").key(*k).text_child(k.to_string())),
    )
}

fn mounted(keys: &[usize]) -> (Renderer<MemoryHost>, HostNode) {
    let renderer = Renderer::new(&Runtime::new(), MemoryHost::new());
    let root = renderer.host_mut().create_root();
    renderer.render(Some(list(keys)), root);
    (renderer, root)
}

fn benchmark_reorders(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_diff");

    for size in [100usize, 1_000] {
        let base: Vec<usize> = (0..size).collect();

        let mut rotated = base.clone();
        rotated.rotate_right(1);
        let mut reversed = base.clone();
        reversed.reverse();
        let mut swapped = base.clone();
        swapped.swap(1, size - 2);
        let shuffled: Vec<usize> = (0..size).map(|i| (i * 7919) % size).collect();

        let cases = [
            ("rotate", rotated),
            ("reverse", reversed),
            ("swap", swapped),
            ("shuffle", shuffled),
        ];
        for (name, target) in cases {
            group.bench_with_input(BenchmarkId::new(name, size), &target, |b, target| {
                let (renderer, root) = mounted(&base);
                let mut flip = false;
                b.iter(|| {
                    let next = if flip { &base } else { target };
                    flip = !flip;
                    renderer.render(Some(black_box(list(next))), root);
                });
            });
        }
    }

    group.finish();
}

fn benchmark_mount(c: &mut Criterion) {
    let keys: Vec<usize> = (0..1_000).collect();
    c.bench_function("mount_1000", |b| {
        b.iter(|| {
            let (renderer, root) = mounted(black_box(&keys));
            renderer.render(None, root);
        });
    });
}

criterion_group!(benches, benchmark_reorders, benchmark_mount);
criterion_main!(benches);
