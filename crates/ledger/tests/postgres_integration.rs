//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and run
//! serially because each one truncates the tables.
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use domain::{Hold, HoldStatus, Money, Tier, TicketStatus, TransitionMetadata};
use ledger::{
    HoldId, HolderRef, InventoryLedger, InventoryLedgerExt, LedgerError, PostgresLedger, TierId,
    UnitQuery,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresLedger::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE holds, ticket_units, tiers")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

/// Postgres stores microseconds; keep test timestamps comparable.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

async fn ledger_with_tier(capacity: u32) -> (PostgresLedger, TierId) {
    let ledger = get_test_ledger().await;
    let tier_id = TierId::new("concert-ga");
    ledger
        .create_tier(Tier::new(
            tier_id.clone(),
            capacity,
            Money::from_cents(5_000),
            now(),
        ))
        .await
        .unwrap();
    (ledger, tier_id)
}

fn hold_meta(hold_id: HoldId, expires_at: DateTime<Utc>) -> TransitionMetadata {
    TransitionMetadata::at(now())
        .with_hold(hold_id)
        .with_holder(HolderRef::new("alice"), expires_at)
}

#[tokio::test]
#[serial]
async fn create_tier_and_read_back() {
    let (ledger, tier_id) = ledger_with_tier(50).await;

    let tier = ledger.get_tier(&tier_id).await.unwrap().unwrap();
    assert_eq!(tier.total_capacity, 50);
    assert_eq!(tier.price, Money::from_cents(5_000));
    assert!(!tier.halted);

    let duplicate = ledger
        .create_tier(Tier::new(tier_id.clone(), 10, Money::zero(), now()))
        .await;
    assert!(matches!(duplicate, Err(LedgerError::TierAlreadyExists(_))));
}

#[tokio::test]
#[serial]
async fn create_units_respects_capacity() {
    let (ledger, tier_id) = ledger_with_tier(5).await;

    let ids = ledger.create_units(&tier_id, 3, now()).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ledger.query_available_count(&tier_id).await.unwrap(), 3);

    let result = ledger.create_units(&tier_id, 3, now()).await;
    assert!(matches!(
        result,
        Err(LedgerError::Capacity {
            existing: 3,
            requested: 3,
            ..
        })
    ));

    let missing = ledger
        .create_units(&TierId::new("nope"), 1, now())
        .await;
    assert!(matches!(missing, Err(LedgerError::TierNotFound(_))));
}

#[tokio::test]
#[serial]
async fn transition_stamps_hold_fields() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 1, now()).await.unwrap();
    let hold_id = HoldId::new();
    let expires_at = now() + Duration::minutes(10);

    let won = ledger
        .try_transition(
            ids[0],
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(hold_id, expires_at),
        )
        .await
        .unwrap();
    assert!(won);

    let unit = ledger.get_unit(ids[0]).await.unwrap().unwrap();
    assert_eq!(unit.status, TicketStatus::Held);
    assert_eq!(unit.hold_id, Some(hold_id));
    assert_eq!(unit.holder_ref, Some(HolderRef::new("alice")));
    assert_eq!(unit.hold_expires_at, Some(expires_at));

    let sold = ledger
        .try_transition(
            ids[0],
            TicketStatus::Held,
            TicketStatus::Sold,
            &TransitionMetadata::at(now()).with_hold(hold_id),
        )
        .await
        .unwrap();
    assert!(sold);

    let unit = ledger.get_unit(ids[0]).await.unwrap().unwrap();
    assert_eq!(unit.status, TicketStatus::Sold);
    assert!(unit.sold_at.is_some());
    assert!(unit.hold_expires_at.is_none());
    assert_eq!(unit.holder_ref, Some(HolderRef::new("alice")));
}

#[tokio::test]
#[serial]
async fn stale_expected_status_loses() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 1, now()).await.unwrap();
    let expires_at = now() + Duration::minutes(10);

    assert!(
        ledger
            .try_transition(
                ids[0],
                TicketStatus::Available,
                TicketStatus::Held,
                &hold_meta(HoldId::new(), expires_at),
            )
            .await
            .unwrap()
    );

    let second = ledger
        .try_transition(
            ids[0],
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(HoldId::new(), expires_at),
        )
        .await
        .unwrap();
    assert!(!second);
}

#[tokio::test]
#[serial]
async fn held_transition_pinned_to_owning_hold() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 1, now()).await.unwrap();
    let owner = HoldId::new();
    let expires_at = now() + Duration::minutes(10);

    ledger
        .try_transition(
            ids[0],
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(owner, expires_at),
        )
        .await
        .unwrap();

    let intruder = ledger
        .try_transition(
            ids[0],
            TicketStatus::Held,
            TicketStatus::Released,
            &TransitionMetadata::at(now()).with_hold(HoldId::new()),
        )
        .await
        .unwrap();
    assert!(!intruder);

    let owned = ledger
        .try_transition(
            ids[0],
            TicketStatus::Held,
            TicketStatus::Released,
            &TransitionMetadata::at(now()).with_hold(owner),
        )
        .await
        .unwrap();
    assert!(owned);

    let unit = ledger.get_unit(ids[0]).await.unwrap().unwrap();
    assert_eq!(unit.status, TicketStatus::Released);
    assert!(unit.hold_id.is_none());
    assert!(unit.holder_ref.is_none());
}

#[tokio::test]
#[serial]
async fn transition_on_unknown_ticket_is_not_found() {
    let ledger = get_test_ledger().await;
    let result = ledger
        .try_transition(
            ledger::TicketId::new(),
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(HoldId::new(), now()),
        )
        .await;
    assert!(matches!(result, Err(LedgerError::TicketNotFound(_))));
}

#[tokio::test]
#[serial]
async fn concurrent_claims_have_one_winner() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 1, now()).await.unwrap();
    let target = ids[0];
    let expires_at = now() + Duration::minutes(10);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .try_transition(
                        target,
                        TicketStatus::Available,
                        TicketStatus::Held,
                        &hold_meta(HoldId::new(), expires_at),
                    )
                    .await
                    .unwrap()
            })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;
    let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(winners, 1);
}

#[tokio::test]
#[serial]
async fn find_units_filters_and_orders() {
    let (ledger, tier_id) = ledger_with_tier(10).await;
    let start = now();
    let first = ledger.create_units(&tier_id, 2, start).await.unwrap();
    let second = ledger
        .create_units(&tier_id, 2, start + Duration::seconds(1))
        .await
        .unwrap();

    let available = ledger
        .find_units(UnitQuery::in_tier(tier_id.clone(), TicketStatus::Available).limit(3))
        .await
        .unwrap();
    assert_eq!(available.len(), 3);
    assert_eq!(available[0].ticket_id, first[0]);
    assert_eq!(available[1].ticket_id, first[1]);
    assert_eq!(available[2].ticket_id, second[0]);

    let expires_at = start + Duration::minutes(1);
    ledger
        .try_transition(
            second[1],
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(HoldId::new(), expires_at),
        )
        .await
        .unwrap();

    let mine = ledger
        .find_units(UnitQuery::for_holder(HolderRef::new("alice")))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].ticket_id, second[1]);

    let lapsed = ledger
        .find_units(
            UnitQuery::in_tier(tier_id.clone(), TicketStatus::Held)
                .hold_expires_before(expires_at + Duration::seconds(1)),
        )
        .await
        .unwrap();
    assert_eq!(lapsed.len(), 1);

    let counts = ledger.status_counts(&tier_id).await.unwrap();
    assert_eq!(counts.available, 3);
    assert_eq!(counts.held, 1);
    assert_eq!(counts.total(), 4);
}

#[tokio::test]
#[serial]
async fn hold_records_round_trip_and_compare_and_set() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 2, now()).await.unwrap();
    let created_at = now();
    let hold = Hold {
        hold_id: HoldId::new(),
        tier_id: tier_id.clone(),
        ticket_ids: ids.clone(),
        holder_ref: HolderRef::new("alice"),
        created_at,
        expires_at: created_at + Duration::minutes(10),
        status: HoldStatus::Active,
    };
    ledger.insert_hold(hold.clone()).await.unwrap();

    let stored = ledger.get_hold(hold.hold_id).await.unwrap().unwrap();
    assert_eq!(stored, hold);

    let duplicate = ledger.insert_hold(hold.clone()).await;
    assert!(matches!(duplicate, Err(LedgerError::HoldAlreadyExists(_))));

    assert!(
        ledger
            .set_hold_status(hold.hold_id, HoldStatus::Active, HoldStatus::Released)
            .await
            .unwrap()
    );
    assert!(
        !ledger
            .set_hold_status(hold.hold_id, HoldStatus::Active, HoldStatus::Purchased)
            .await
            .unwrap()
    );

    let missing = ledger
        .set_hold_status(HoldId::new(), HoldStatus::Active, HoldStatus::Released)
        .await;
    assert!(matches!(missing, Err(LedgerError::HoldNotFound(_))));
}

#[tokio::test]
#[serial]
async fn extend_hold_moves_units_lease() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let ids = ledger.create_units(&tier_id, 1, now()).await.unwrap();
    let created_at = now();
    let expires_at = created_at + Duration::minutes(10);
    let hold_id = HoldId::new();

    ledger
        .try_transition(
            ids[0],
            TicketStatus::Available,
            TicketStatus::Held,
            &hold_meta(hold_id, expires_at),
        )
        .await
        .unwrap();
    ledger
        .insert_hold(Hold {
            hold_id,
            tier_id: tier_id.clone(),
            ticket_ids: ids.clone(),
            holder_ref: HolderRef::new("alice"),
            created_at,
            expires_at,
            status: HoldStatus::Active,
        })
        .await
        .unwrap();

    let extended = expires_at + Duration::minutes(5);
    assert!(ledger.extend_hold(hold_id, expires_at, extended).await.unwrap());

    let unit = ledger.get_unit(ids[0]).await.unwrap().unwrap();
    assert_eq!(unit.hold_expires_at, Some(extended));
    let hold = ledger.get_hold(hold_id).await.unwrap().unwrap();
    assert_eq!(hold.expires_at, extended);

    // Stale expiry loses the race
    let stale = ledger
        .extend_hold(hold_id, expires_at, extended + Duration::minutes(1))
        .await
        .unwrap();
    assert!(!stale);
}

#[tokio::test]
#[serial]
async fn expired_holds_lists_active_past_expiry() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    let created_at = now();

    for (offset, status) in [
        (-5, HoldStatus::Active),
        (-5, HoldStatus::Released),
        (5, HoldStatus::Active),
    ] {
        ledger
            .insert_hold(Hold {
                hold_id: HoldId::new(),
                tier_id: tier_id.clone(),
                ticket_ids: vec![],
                holder_ref: HolderRef::new("alice"),
                created_at,
                expires_at: created_at + Duration::minutes(offset),
                status,
            })
            .await
            .unwrap();
    }

    let expired = ledger.expired_holds(created_at, 10).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, HoldStatus::Active);
}

#[tokio::test]
#[serial]
async fn halted_tier_blocks_allocation() {
    let (ledger, tier_id) = ledger_with_tier(5).await;
    ledger.halt_tier(&tier_id).await.unwrap();

    let tier = ledger.get_tier(&tier_id).await.unwrap().unwrap();
    assert!(tier.halted);

    let result = ledger.create_units(&tier_id, 1, now()).await;
    assert!(matches!(result, Err(LedgerError::TierHalted(_))));
}

#[tokio::test]
#[serial]
async fn create_tier_with_units_commits_together() {
    let ledger = get_test_ledger().await;
    let tier = Tier::new(TierId::new("balcony"), 3, Money::from_cents(1_000), now());

    let ids = ledger.create_tier_with_units(tier.clone()).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ledger.query_available_count(&tier.tier_id).await.unwrap(), 3);
    let units = ledger.get_units(&ids).await.unwrap();
    assert!(units.iter().all(|u| u.created_at == tier.created_at));

    // The duplicate insert fails inside the transaction, so no units are added
    let duplicate = ledger.create_tier_with_units(tier.clone()).await;
    assert!(matches!(duplicate, Err(LedgerError::TierAlreadyExists(_))));
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_units")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(total, 3);
}

#[tokio::test]
#[serial]
async fn expired_holds_leave_out_halted_tiers() {
    let (ledger, halted) = ledger_with_tier(1).await;
    let healthy = TierId::new("balcony");
    ledger
        .create_tier(Tier::new(healthy.clone(), 1, Money::zero(), now()))
        .await
        .unwrap();
    let created_at = now();
    for (tier_id, minutes) in [(&halted, 10), (&healthy, 5)] {
        ledger
            .insert_hold(Hold {
                hold_id: HoldId::new(),
                tier_id: tier_id.clone(),
                ticket_ids: vec![],
                holder_ref: HolderRef::new("alice"),
                created_at,
                expires_at: created_at - Duration::minutes(minutes),
                status: HoldStatus::Active,
            })
            .await
            .unwrap();
    }
    ledger.halt_tier(&halted).await.unwrap();

    let page = ledger.expired_holds(created_at, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].tier_id, healthy);
}
