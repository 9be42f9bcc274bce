use common::{HolderRef, TierId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::Money;
use engine::{InMemoryNotificationService, InMemoryPaymentService, ReservationEngine};
use ledger::InMemoryLedger;

type BenchEngine =
    ReservationEngine<InMemoryLedger, InMemoryPaymentService, InMemoryNotificationService>;

async fn engine_with_tier(capacity: u32) -> (BenchEngine, TierId) {
    let engine = ReservationEngine::new(
        InMemoryLedger::new(),
        InMemoryPaymentService::new(),
        InMemoryNotificationService::new(),
    );
    let tier_id = TierId::new("bench");
    engine
        .create_event_tier(tier_id.clone(), capacity, Money::from_cents(4_200))
        .await
        .unwrap();
    (engine, tier_id)
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, tier_id) = rt.block_on(engine_with_tier(1_000));

    c.bench_function("engine/reserve_release_4", |b| {
        b.iter(|| {
            rt.block_on(async {
                let hold = engine
                    .reserve(&tier_id, 4, HolderRef::new("bench"), None)
                    .await
                    .unwrap();
                engine.release(hold.hold_id).await.unwrap();
            });
        });
    });
}

fn bench_reserve_purchase(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("engine/reserve_purchase_2", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (engine, tier_id) = engine_with_tier(2).await;
                let hold = engine
                    .reserve(&tier_id, 2, HolderRef::new("bench"), None)
                    .await
                    .unwrap();
                engine.purchase(hold.hold_id, "card").await.unwrap();
            });
        });
    });
}

fn bench_contended_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();

    c.bench_function("engine/contended_reserve_16x1", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (engine, tier_id) = engine_with_tier(16).await;
                let engine = std::sync::Arc::new(engine);
                let handles: Vec<_> = (0..16)
                    .map(|i| {
                        let engine = engine.clone();
                        let tier_id = tier_id.clone();
                        tokio::spawn(async move {
                            engine
                                .reserve(&tier_id, 1, HolderRef::new(format!("b{i}")), None)
                                .await
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_release,
    bench_reserve_purchase,
    bench_contended_reserve,
);
criterion_main!(benches);
