//! # Routing Benchmarks
//!
//! | Group | Measures |
//! |-------|----------|
//! | `rule-compile` | parsing rule text into a predicate |
//! | `matcher` | first-match selection over N deployment routes |
//! | `route-build` | templating and compiling a deployment's routes |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kf_01_rule_matcher::{compile, Matcher, Route};
use kf_02_route_store::build_routes;
use kf_tests::fixtures::{shop_deployment, shop_context};
use shared_types::{event_type, Category, Component, EnvData, Event};
use std::time::Duration;

const RULES: &[(&str, &str)] = &[
    ("simple", r#"Path("/cart")"#),
    ("captures", r#"Method("GET", "PUT") && Path("/shop/{store}/cart/{id}")"#),
    (
        "regex",
        r#"Host("{sub:[a-z]+}.example.com") && PathPrefix("/api/{version:v[0-9]+}") && Header("X-Tenant", "{[a-z0-9-]+}")"#,
    ),
    (
        "boolean",
        r#"(Method("POST") || Method("PATCH")) && !Query("dryRun", "true") && Type("http")"#,
    ),
];

fn request(path: &str) -> Event {
    let mut evt = Event::new(Category::Request, event_type::HTTP, Duration::from_secs(30));
    evt.set_method("GET");
    evt.set_path(path);
    evt
}

fn bench_rule_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule-compile");
    for (name, rule) in RULES {
        group.bench_with_input(BenchmarkId::from_parameter(name), rule, |b, rule| {
            b.iter(|| black_box(compile(rule).is_ok()))
        });
    }
    group.finish();
}

/// `n` routes, one per component, each owning `/svc-<i>/{id}`.
fn matcher_with(n: usize) -> Matcher {
    Matcher::new((0..n).map(|i| {
        let rule = format!(r#"Method("GET") && Path("/svc-{i}/{{id}}")"#);
        Route::new(0, rule.clone())
            .resolved(rule, None)
            .with_component(Component::new(format!("svc-{i}"), "0123456789abc"))
    }))
}

fn bench_matcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");
    for size in [10usize, 100, 1000] {
        let matcher = matcher_with(size);
        let last = format!("/svc-{}/42", size - 1);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("first_route", size), &matcher, |b, m| {
            b.iter(|| {
                let mut evt = request("/svc-0/42");
                black_box(m.match_event(&mut evt).is_some())
            })
        });
        group.bench_with_input(BenchmarkId::new("last_route", size), &matcher, |b, m| {
            b.iter(|| {
                let mut evt = request(&last);
                black_box(m.match_event(&mut evt).is_some())
            })
        });
        group.bench_with_input(BenchmarkId::new("no_match", size), &matcher, |b, m| {
            b.iter(|| {
                let mut evt = request("/elsewhere/42");
                black_box(m.match_event(&mut evt).is_none())
            })
        });
    }
    group.finish();
}

fn bench_route_build(c: &mut Criterion) {
    let dep = shop_deployment(1);
    let data = EnvData::default()
        .with_var("base", "cart")
        .with_var("region", "eu");
    let ctx = shop_context();

    c.bench_function("route-build/shop", |b| {
        b.iter(|| black_box(build_routes(&dep, &data, &ctx).len()))
    });
}

criterion_group!(benches, bench_rule_compile, bench_matcher, bench_route_build);
criterion_main!(benches);
