/// Detection stage throughput over a synthetic 30-day window.
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use order_dup_worker::pipeline::annotate::annotate;
use order_dup_worker::pipeline::patch::aggregate_patches;
use order_dup_worker::pipeline::primary::primary_candidates;
use order_dup_worker::pipeline::repartition::repartition;
use order_dup_worker::store::models::{OrderRecord, PatchInfo};

const CHANNEL: &str = "/sales/transfer-kits/";
const FAMILY: &str = "genesight";

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

/// `count` orders spread over 30 days; roughly one patient in ten orders twice.
fn synthetic_orders(count: i64) -> Vec<OrderRecord> {
    let end = Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap();
    (0..count)
        .map(|id| {
            let patient = if id % 10 == 0 { id / 10 } else { id };
            let created_at = end - Duration::minutes((id * 37) % (30 * 24 * 60));
            let slug = (id % 3 == 0).then_some(FAMILY);
            OrderRecord::new(id, format!("first{patient}"), format!("last{patient}"), id % 7, created_at)
                .with_product(format!("product-{}", id % 7), slug)
        })
        .collect()
}

fn synthetic_patches(orders: &[OrderRecord]) -> Vec<PatchInfo> {
    orders
        .iter()
        .flat_map(|order| {
            (0..2).map(move |n| {
                PatchInfo::new(order.id * 2 + n, order.id)
                    .with_endpoint(CHANNEL)
                    .with_payload(r#"{"order_product": {"sub_products": [{"test_offering_name": "Pgx"}]}}"#)
            })
        })
        .collect()
}

fn bench_primary_pass(c: &mut Criterion) {
    let orders = synthetic_orders(20_000);
    c.bench_function("annotate_and_primary_20k", |b| {
        b.iter(|| {
            let candidates = primary_candidates(annotate(&orders), 30, report_date());
            black_box(candidates.len());
        });
    });
}

fn bench_patch_and_repartition(c: &mut Criterion) {
    let orders = synthetic_orders(20_000);
    let candidates = primary_candidates(annotate(&orders), 30, report_date());
    let patches = synthetic_patches(&orders);

    c.bench_function("patch_and_repartition_20k", |b| {
        b.iter(|| {
            let aggregation = aggregate_patches(candidates.clone(), &patches, CHANNEL);
            let duplicates = repartition(aggregation.records, FAMILY, report_date());
            black_box(duplicates.len());
        });
    });
}

criterion_group!(benches, bench_primary_pass, bench_patch_and_repartition);
criterion_main!(benches);
