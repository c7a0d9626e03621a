use purchasing_engine::{
    bootstrap, config::AppConfig, entities::actor::ActorRole, services::numbering::NumberingScheme,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use uuid::Uuid;

fn file_config(dir: &TempDir) -> AppConfig {
    let path = dir.path().join("purchasing.db");
    let mut cfg = AppConfig::new(
        format!("sqlite://{}?mode=rwc", path.display()),
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg
}

#[tokio::test]
async fn runtime_settings_survive_restart() {
    let dir = TempDir::new().expect("temp dir");
    let cfg = file_config(&dir);

    let (engine, _events) = bootstrap(&cfg).await.expect("first start");
    let now = chrono::Utc::now();
    let admin = purchasing_engine::entities::actor::ActiveModel {
        id: Set(Uuid::new_v4()),
        display_name: Set("Site admin".to_string()),
        role: Set(ActorRole::Admin),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*engine.db)
    .await
    .expect("insert admin");

    engine
        .services
        .settings
        .set_approval_threshold(admin.id, dec!(2500))
        .await
        .expect("raise threshold");
    drop(engine);

    // Restarting with different configured defaults must not clobber the row.
    let mut restarted_cfg = file_config(&dir);
    restarted_cfg.approval_threshold = dec!(50);
    restarted_cfg.po_numbering = NumberingScheme::Yearly;
    let (engine, _events) = bootstrap(&restarted_cfg).await.expect("second start");

    let policy = engine.services.settings.current().await.expect("settings");
    assert_eq!(policy.approval_threshold, dec!(2500));
    assert_eq!(policy.po_numbering, NumberingScheme::Global);
    assert_eq!(policy.updated_by, Some(admin.id));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let dir = TempDir::new().expect("temp dir");
    let cfg = file_config(&dir);

    let (engine, _events) = bootstrap(&cfg).await.expect("first start");
    drop(engine);
    let (engine, _events) = bootstrap(&cfg).await.expect("second start");

    purchasing_engine::db::check_connection(&engine.db)
        .await
        .expect("database reachable");
}
