use smokecalc::core::db::{CalcDb, ProjectRepository};
use smokecalc::StoreConfig;

#[tokio::test]
async fn test_simple() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let db = CalcDb::open(StoreConfig::default().with_data_dir(dir.path())).await?;

    let projects = db.projects();
    assert_eq!(projects.len(), 0);

    Ok(())
}
