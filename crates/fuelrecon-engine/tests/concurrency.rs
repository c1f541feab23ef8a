//! Commit serialization: per-nozzle and per-tank exclusivity, bounded waits,
//! on the single-connection in-memory store and on a pooled database file.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use fuelrecon_core::{FuelType, Volume};
use fuelrecon_engine::locks::{nozzle_key, tank_key};
use fuelrecon_engine::{CommitOutcome, EngineConfig, ErrorKind, Rejection};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commits_on_one_tank_lose_no_updates() {
    let fx = Fixture::new().await;
    eight_nozzles_drain_one_tank(&fx).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_db_concurrent_commits_on_one_tank_lose_no_updates() {
    let fx = Fixture::on_file().await;
    eight_nozzles_drain_one_tank(&fx).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_db_commits_on_separate_tanks_all_succeed() {
    let fx = Fixture::on_file().await;

    let stations: Vec<String> = (0..16).map(|i| format!("S-{}", 100 + i)).collect();
    let mut nozzle_ids = Vec::new();
    for station in &stations {
        nozzle_ids.push(fx.add_station(station, 10_000).await);
    }

    for round in 1..=5_i64 {
        let mut handles = Vec::new();
        for id in &nozzle_ids {
            let engine = fx.engine.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let mut c = candidate(&id, round * 10, None);
                c.reading_at = at(9 + round as u32, 0);
                engine.commit(c).await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(
                matches!(result, Ok(CommitOutcome::Committed(_))),
                "round {round}: {result:?}"
            );
        }
    }

    // Five readings of 10 L each per station
    for station in &stations {
        assert_eq!(
            fx.tank_stock(&format!("{station}-T")).await,
            Volume::from_litres(9_950)
        );
    }
}

async fn eight_nozzles_drain_one_tank(fx: &Fixture) {
    let nozzle_ids: Vec<String> = (0..8).map(|i| format!("N-C{}", i)).collect();
    for (i, id) in nozzle_ids.iter().enumerate() {
        fx.db()
            .nozzles()
            .insert(&nozzle(id, 10 + i as i64, FuelType::Petrol, 2_000))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for (i, id) in nozzle_ids.iter().enumerate() {
        let engine = fx.engine.clone();
        let id = id.clone();
        // 10 L, 11 L, ... 17 L
        let litres = 2_010 + i as i64;
        handles.push(tokio::spawn(async move {
            engine.commit(candidate(&id, litres, None)).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(_)));
    }

    let dispensed: i64 = (10..18).sum();
    assert_eq!(
        fx.petrol_stock().await,
        Volume::from_litres(10_000 - dispensed)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_readings_on_one_nozzle_chain_deltas() {
    let fx = Fixture::new().await;

    for (i, litres) in [1_010, 1_025, 1_040, 1_100].into_iter().enumerate() {
        let mut c = candidate("N-1", litres, None);
        c.reading_at = at(10 + i as u32, 0);
        fx.engine.commit(c).await.unwrap();
    }

    assert_eq!(fx.meter("N-1").await, Volume::from_litres(1_100));
    assert_eq!(fx.petrol_stock().await, Volume::from_litres(9_900));

    let readings = fx
        .engine
        .list_readings(&fuelrecon_db::ReadingFilter {
            nozzle_id: Some("N-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let total_delta: i64 = readings.iter().map(|r| r.delta_ml).sum();
    assert_eq!(total_delta, Volume::from_litres(100).ml());
    for r in &readings {
        assert_eq!(r.delta_ml, r.cumulative_ml - r.previous_cumulative_ml);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicate_submissions_write_one_row() {
    let fx = Fixture::new().await;

    let a = {
        let engine = fx.engine.clone();
        tokio::spawn(async move { engine.commit(candidate("N-1", 1_050, None)).await })
    };
    let b = {
        let engine = fx.engine.clone();
        tokio::spawn(async move { engine.commit(candidate("N-1", 1_050, None)).await })
    };

    let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    let committed = outcomes
        .iter()
        .filter(|o| matches!(o, CommitOutcome::Committed(_)))
        .count();

    assert_eq!(committed, 1);
    assert_eq!(outcomes[0].reading_id(), outcomes[1].reading_id());
    assert_eq!(fx.reading_count("N-1").await, 1);
    assert_eq!(fx.petrol_stock().await, Volume::from_litres(9_950));
}

#[tokio::test]
async fn lock_timeout_is_retryable_and_writes_nothing() {
    let mut config = EngineConfig::default();
    config.locks.acquire_timeout_ms = 50;
    let fx = Fixture::with_config(config).await;

    let held = fx
        .locks
        .acquire(&[nozzle_key("N-1")], Duration::from_millis(50))
        .await
        .unwrap();

    let err = fx.engine.commit(candidate("N-1", 1_050, None)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockTimeout);
    assert!(err.is_retryable());
    assert!(Rejection::from(&err).retryable);
    assert_eq!(fx.reading_count("N-1").await, 0);
    assert_eq!(fx.petrol_stock().await, Volume::from_litres(10_000));

    // Caller backs off and retries once the lock is free
    drop(held);
    let outcome = fx.engine.commit(candidate("N-1", 1_050, None)).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed(_)));
}

#[tokio::test]
async fn other_tank_commits_are_not_blocked() {
    let mut config = EngineConfig::default();
    config.locks.acquire_timeout_ms = 50;
    let fx = Fixture::with_config(config).await;
    fx.db()
        .prices()
        .set_price(STATION, FuelType::Diesel, rupees(90), at(0, 0), "own-1")
        .await
        .unwrap();

    let _petrol = fx
        .locks
        .acquire(&[tank_key(STATION, FuelType::Petrol)], Duration::from_millis(50))
        .await
        .unwrap();

    let diesel = fx.engine.commit(candidate("N-3", 510, None)).await;
    assert!(diesel.is_ok());

    let petrol = fx.engine.commit(candidate("N-1", 1_010, None)).await.unwrap_err();
    assert_eq!(petrol.kind(), ErrorKind::LockTimeout);
}

#[tokio::test]
async fn refill_waits_for_the_tank_lock() {
    let mut config = EngineConfig::default();
    config.locks.acquire_timeout_ms = 50;
    let fx = Fixture::with_config(config).await;

    let held = fx
        .locks
        .acquire(&[tank_key(STATION, FuelType::Petrol)], Duration::from_millis(50))
        .await
        .unwrap();

    let err = fx
        .engine
        .refill_tank(PETROL_TANK, Volume::from_litres(1_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockTimeout);

    drop(held);
    let shared = Arc::clone(&fx.engine);
    let result = shared
        .refill_tank(PETROL_TANK, Volume::from_litres(1_000))
        .await
        .unwrap();
    assert_eq!(result.new_stock, Volume::from_litres(11_000));
}
