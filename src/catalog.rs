//! Plan catalog: base exercise templates per goal, one per weekday slot

use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::EngineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogEntry {
  pub target: String,
  pub slot: i64,
  pub name: String,
  /// `"minutes/reps/intensity"`
  pub base_params: String,
}

/// Templates for a catalog key, in slot order. Empty when the key is unknown.
pub async fn load_templates(store: &Store, target: &str) -> EngineResult<Vec<CatalogEntry>> {
  store
    .bounded(
      "load templates",
      sqlx::query_as::<_, CatalogEntry>(
        r#"
        SELECT target, slot, name, base_params
        FROM plan_templates
        WHERE target = ?1
        ORDER BY slot
        "#,
      )
      .bind(target)
      .fetch_all(store.pool()),
    )
    .await
}

/// Insert or replace one template
pub async fn upsert_template(store: &Store, entry: &CatalogEntry) -> EngineResult<()> {
  store
    .bounded(
      "upsert template",
      sqlx::query(
        r#"
        INSERT INTO plan_templates (target, slot, name, base_params)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(target, slot) DO UPDATE SET
          name = excluded.name,
          base_params = excluded.base_params
        "#,
      )
      .bind(&entry.target)
      .bind(entry.slot)
      .bind(&entry.name)
      .bind(&entry.base_params)
      .execute(store.pool()),
    )
    .await?;
  Ok(())
}
