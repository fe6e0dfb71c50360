//! Performance benchmarks for the parse, merge and render stages

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use pingtest::{
    output::{render, sort_targets, ReportLayout},
    sources::{merge, normalize_region, parser::parse_net_export},
    Carrier, SourcePriority, Target, UnreachablePolicy,
};
use std::{net::Ipv4Addr, time::Duration};

const REGIONS: &[&str] = &[
    "北京", "上海", "天津", "重庆", "河北", "山西", "辽宁", "吉林", "江苏", "浙江", "安徽", "福建", "江西", "山东",
    "河南", "湖北", "湖南", "广东", "海南", "四川", "贵州", "云南", "陕西", "甘肃", "青海", "内蒙古", "广西", "西藏",
    "宁夏", "新疆",
];

/// Columnar export with `rows` data rows and one malformed row in ten
fn create_net_export(rows: usize) -> String {
    let mut payload = String::from("id,host,port,sponsor,ip,country_name,country_code,x\n");
    for i in 0..rows {
        if i % 10 == 9 {
            payload.push_str("broken,row\n");
            continue;
        }
        let region = REGIONS[i % REGIONS.len()];
        payload.push_str(&format!(
            "{},h{}.example,8080,{}省,10.{}.{}.1,China,CN,x\n",
            i,
            i,
            region,
            (i / 256) % 256,
            i % 256
        ));
    }
    payload
}

/// Targets spread over every carrier and region, with duplicate keys
fn create_targets(count: usize) -> Vec<Target> {
    let priorities = [SourcePriority::Generic, SourcePriority::Regional, SourcePriority::Dedicated];
    (0..count)
        .map(|i| {
            let carrier = Carrier::ALL[i % 3];
            let region = REGIONS[(i / 3) % REGIONS.len()];
            let mut target = Target::carrier_node(
                carrier,
                region,
                Ipv4Addr::new(10, (i / 256) as u8, (i % 256) as u8, 1),
                priorities[i % priorities.len()],
            );
            if i % 7 != 0 {
                target.measured_latency = Duration::from_millis(5 + (i as u64 * 13) % 300);
                target.tested = true;
            }
            target
        })
        .collect()
}

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_net_export");
    for rows in [100, 1_000, 10_000] {
        let payload = create_net_export(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &payload, |b, payload| {
            b.iter(|| parse_net_export(black_box(payload)))
        });
    }
    group.finish();

    c.bench_function("normalize_region", |b| {
        b.iter(|| normalize_region(black_box("电信新疆维吾尔自治区")))
    });
}

fn benchmark_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for count in [90, 900, 9_000] {
        let targets = create_targets(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &targets, |b, targets| {
            b.iter(|| merge(black_box(targets.clone())))
        });
    }
    group.finish();
}

fn benchmark_render(c: &mut Criterion) {
    let targets = merge(create_targets(900));

    c.bench_function("sort_and_render_isp", |b| {
        b.iter(|| {
            let sorted = sort_targets(black_box(targets.clone()), UnreachablePolicy::Show);
            render(&sorted, &ReportLayout::ISP)
        })
    });
}

criterion_group!(benches, benchmark_parsing, benchmark_merge, benchmark_render);
criterion_main!(benches);
