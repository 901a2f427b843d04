use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sitekit_routing::HostResolver;

fn resolve_hosts(c: &mut Criterion) {
    let resolver = HostResolver::new("sitekit.app", "localhost");
    let hosts = [
        "sitekit.app",
        "www.sitekit.app:443",
        "joes-pizza.sitekit.app",
        "a.b.c.sitekit.app:8080",
        "www.joespizza.com",
        "https://evil.test/../x",
    ];

    c.bench_function("resolve_mixed_hosts", |b| {
        b.iter(|| {
            for host in hosts {
                black_box(resolver.resolve(black_box(host)));
            }
        })
    });
}

criterion_group!(benches, resolve_hosts);
criterion_main!(benches);
