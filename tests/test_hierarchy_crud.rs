//! Integration tests for Project / Building / FunctionalZone / Shutter CRUD.
//!
//! Tests cover:
//! - Creating each level under an existing parent
//! - Creating under a missing parent
//! - Partial updates and timestamp refresh
//! - Shutter type staying fixed across updates

mod common;

use common::*;

#[tokio::test]
async fn test_create_full_hierarchy() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let h = seed_hierarchy(&db).await?;

    assert_eq!(h.building.project_id, h.project.id);
    assert_eq!(h.zone.building_id, h.building.id);
    assert_eq!(h.shutter.zone_id, h.zone.id);
    assert_eq!(h.shutter.shutter_type, ShutterType::High);
    assert_eq!(h.shutter.created_at, h.shutter.updated_at);

    let projects = db.projects();
    assert_eq!(projects.len(), 1);
    let zone = &projects[0].buildings[0].functional_zones[0];
    assert_eq!(zone.shutters, vec![h.shutter.clone()]);
    assert_eq!(projects[0].shutter_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_projects_keep_creation_order() -> anyhow::Result<()> {
    let db = create_test_db().await;
    for name in ["Gamma", "Alpha", "Beta"] {
        db.create_project(NewProject::named(name)).await?;
    }
    let names: Vec<String> = db.projects().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Gamma", "Alpha", "Beta"]);
    // no uniqueness constraint on names
    db.create_project(NewProject::named("Alpha")).await?;
    assert_eq!(db.projects().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_create_under_missing_parent_returns_none() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let revision = db.snapshot().revision();

    let building = db
        .create_building("no-such-project", NewBuilding::default())
        .await?;
    assert!(building.is_none());
    let zone = db
        .create_functional_zone("no-such-building", NewFunctionalZone::default())
        .await?;
    assert!(zone.is_none());
    let shutter = db
        .create_shutter(
            "no-such-zone",
            make_new_shutter("VB-01", ShutterType::Low, 1000.0, 1000.0),
        )
        .await?;
    assert!(shutter.is_none());

    assert_eq!(db.snapshot().revision(), revision);
    Ok(())
}

#[tokio::test]
async fn test_update_shutter_refreshes_timestamps() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let h = seed_hierarchy(&db).await?;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let updated = db
        .update_shutter(
            &h.shutter.id,
            ShutterUpdate {
                measured_flow: Some(5600.0),
                remarks: Some(Some("Grille encrassée".to_string())),
                ..ShutterUpdate::default()
            },
        )
        .await?
        .expect("shutter exists");

    assert_eq!(updated.measured_flow, 5600.0);
    assert_eq!(updated.reference_flow, 5000.0);
    assert_eq!(updated.name, "VH-01");
    assert_eq!(updated.shutter_type, ShutterType::High);
    assert_eq!(updated.remarks.as_deref(), Some("Grille encrassée"));
    assert!(updated.updated_at > h.shutter.updated_at);
    assert_eq!(updated.created_at, h.shutter.created_at);
    assert_eq!(updated.compliance().status, ComplianceStatus::Acceptable);

    let project = db.project(&h.project.id).expect("project exists");
    assert!(project.updated_at > h.project.updated_at);

    let cleared = db
        .update_shutter(
            &h.shutter.id,
            ShutterUpdate {
                remarks: Some(None),
                ..ShutterUpdate::default()
            },
        )
        .await?
        .expect("shutter exists");
    assert_eq!(cleared.remarks, None);
    assert_eq!(cleared.measured_flow, 5600.0);

    Ok(())
}

#[tokio::test]
async fn test_update_parents_touch_project() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let h = seed_hierarchy(&db).await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let building = db
        .update_building(
            &h.building.id,
            BuildingUpdate {
                name: Some("Bâtiment B".to_string()),
                description: Some(None),
            },
        )
        .await?
        .expect("building exists");
    assert_eq!(building.name, "Bâtiment B");
    assert_eq!(building.description, None);
    // returned with its subtree
    assert_eq!(building.functional_zones.len(), 1);

    let zone = db
        .update_functional_zone(
            &h.zone.id,
            FunctionalZoneUpdate {
                description: Some(Some("Désenfumage mécanique".to_string())),
                ..FunctionalZoneUpdate::default()
            },
        )
        .await?
        .expect("zone exists");
    assert_eq!(zone.name, "Parking niveau -1");
    assert_eq!(zone.shutters.len(), 1);

    let project = db.project(&h.project.id).expect("project exists");
    assert!(project.updated_at > h.project.updated_at);

    let renamed = db
        .update_project(
            &h.project.id,
            ProjectUpdate {
                city: Some(None),
                ..ProjectUpdate::default()
            },
        )
        .await?
        .expect("project exists");
    assert_eq!(renamed.city, None);
    assert_eq!(renamed.name, "Résidence Les Tilleuls");
    assert_eq!(renamed.buildings.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_update_missing_entities_returns_none() -> anyhow::Result<()> {
    let db = create_test_db().await;
    seed_hierarchy(&db).await?;
    let revision = db.snapshot().revision();

    assert!(db.update_project("nope", ProjectUpdate::default()).await?.is_none());
    assert!(db.update_building("nope", BuildingUpdate::default()).await?.is_none());
    assert!(
        db.update_functional_zone("nope", FunctionalZoneUpdate::default())
            .await?
            .is_none()
    );
    assert!(db.update_shutter("nope", ShutterUpdate::default()).await?.is_none());

    assert_eq!(db.snapshot().revision(), revision);
    Ok(())
}

#[tokio::test]
async fn test_compliance_summary_over_hierarchy() -> anyhow::Result<()> {
    let db = create_test_db().await;
    let h = seed_hierarchy(&db).await?;
    for (name, reference, measured) in [
        ("VB-02", 3000.0, 3450.0),
        ("VB-03", 4000.0, 3000.0),
        ("VB-04", 0.0, 0.0),
    ] {
        db.create_shutter(&h.zone.id, make_new_shutter(name, ShutterType::Low, reference, measured))
            .await?;
    }

    let zone = db.functional_zone(&h.zone.id).expect("zone exists");
    let summary = zone.compliance_summary();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.compliant, 1);
    assert_eq!(summary.acceptable, 1);
    assert_eq!(summary.non_compliant, 1);
    assert_eq!(summary.unmeasured, 1);
    assert_eq!(summary.measured(), 3);

    let project = db.project(&h.project.id).expect("project exists");
    assert_eq!(project.compliance_summary(), summary);

    Ok(())
}
