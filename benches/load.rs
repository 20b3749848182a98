use criterion::{black_box, criterion_group, criterion_main, Criterion};
use yamlcore::{load, load_all};

const CONFIG: &str = r#"
service:
  name: gateway
  replicas: 3
  ports: [8080, 8443, 9090]
  env:
    RUST_LOG: info
    FEATURES: "a,b,c"
defaults: &defaults
  timeout: 2.5
  retries: 3
endpoints:
  - name: users
    <<: *defaults
    path: /v1/users
  - name: orders
    <<: *defaults
    path: /v1/orders
    retries: 5
notes: |
  multi-line
  description text
"#;

fn bench_load(c: &mut Criterion) {
    c.bench_function("load_config", |b| {
        b.iter(|| load(black_box(CONFIG)).unwrap())
    });

    let stream: String = (0..50)
        .map(|i| format!("---\nid: {i}\nname: item-{i}\nvalues: [1, 2, 3]\n"))
        .collect();
    c.bench_function("load_all_stream_50", |b| {
        b.iter(|| load_all(black_box(&stream)).unwrap())
    });

    let deep = format!(
        "{}leaf: 1\n",
        (0..24)
            .map(|depth| format!("{}n{}:\n", "  ".repeat(depth), depth))
            .collect::<String>()
    );
    c.bench_function("load_nested_24", |b| {
        b.iter(|| load(black_box(&deep)).unwrap())
    });
}

criterion_group!(benches, bench_load);
criterion_main!(benches);
