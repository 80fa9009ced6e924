//! Integration tests for the quick-calc history.

mod common;

use common::*;

#[tokio::test]
async fn test_record_quick_calc() -> anyhow::Result<()> {
    let db = create_test_db().await;

    let entry = db.record_quick_calc(5000.0, 4800.0).await?;
    assert_eq!(entry.deviation, -4.0);
    assert_eq!(entry.status, ComplianceStatus::Compliant);
    assert_eq!(entry.color, "#10B981");

    let entry = db.record_quick_calc(5000.0, 5750.0).await?;
    assert_eq!(entry.status, ComplianceStatus::Acceptable);
    assert_eq!(entry.color, "#F59E0B");

    let history = db.quick_calc_history();
    assert_eq!(history.len(), 2);
    // newest first
    assert_eq!(history[0].id, entry.id);
    assert_eq!(history[1].measured_flow, 4800.0);

    Ok(())
}

#[tokio::test]
async fn test_history_keeps_raw_deviation() -> anyhow::Result<()> {
    let db = create_test_db().await;

    let entry = db.record_quick_calc(3000.0, 3001.0).await?;
    assert!((entry.deviation - 100.0 / 3000.0).abs() < 1e-9);

    let entry = db.record_quick_calc(0.0, 1200.0).await?;
    assert_eq!(entry.deviation, 0.0);
    assert_eq!(entry.status, ComplianceStatus::NonCompliant);

    Ok(())
}

#[tokio::test]
async fn test_history_is_bounded() -> anyhow::Result<()> {
    let store = MemoryBlobStore::new();
    let db = CalcDb::with_store(store, StoreConfig::default().with_history_limit(3)).await?;

    for measured in [100.0, 200.0, 300.0, 400.0, 500.0] {
        db.record_quick_calc(1000.0, measured).await?;
    }

    let measured: Vec<f64> = db
        .quick_calc_history()
        .iter()
        .map(|entry| entry.measured_flow)
        .collect();
    assert_eq!(measured, vec![500.0, 400.0, 300.0]);

    Ok(())
}

#[tokio::test]
async fn test_delete_and_clear_history() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let first = db.record_quick_calc(1000.0, 950.0).await?;
    db.record_quick_calc(1000.0, 1300.0).await?;

    assert!(db.delete_history_entry(&first.id).await?);
    assert!(!db.delete_history_entry(&first.id).await?);
    assert_eq!(db.quick_calc_history().len(), 1);

    db.clear_quick_calc_history().await?;
    assert!(db.quick_calc_history().is_empty());

    Ok(())
}
