use crate::db::{Document, merge_documents};
use crate::domain::RecordId;
use crate::entities::{documents, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use tracing::debug;

/// Repository for document rows, one collection at a time.
pub struct DocumentRepository {
    conn: DatabaseConnection,
}

impl DocumentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn timestamp() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    fn map_model(row: documents::Model) -> Result<Document> {
        let mut document: Document = serde_json::from_str(&row.body)
            .with_context(|| format!("Corrupt document body for {}", row.id))?;
        document.insert("id".to_string(), Value::String(row.id));
        Ok(document)
    }

    fn encode_body(mut document: Document) -> Result<String> {
        document.remove("id");
        Ok(serde_json::to_string(&document)?)
    }

    async fn find_row(&self, collection: &str, id: &str) -> Result<Option<documents::Model>> {
        let row = Documents::find_by_id(id.to_string())
            .filter(documents::Column::Collection.eq(collection))
            .one(&self.conn)
            .await?;
        Ok(row)
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = Documents::find()
            .filter(documents::Column::Collection.eq(collection))
            .order_by_asc(documents::Column::CreatedAt)
            .order_by_asc(documents::Column::Id)
            .all(&self.conn)
            .await?;

        rows.into_iter().map(Self::map_model).collect()
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.find_row(collection, id)
            .await?
            .map(Self::map_model)
            .transpose()
    }

    pub async fn insert(&self, collection: &str, document: Document) -> Result<Option<Document>> {
        let id = RecordId::generate().to_string();
        let now = Self::timestamp();
        let body = Self::encode_body(document)?;

        let active_model = documents::ActiveModel {
            id: Set(id.clone()),
            collection: Set(collection.to_string()),
            body: Set(body),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = Documents::insert(active_model)
            .exec_without_returning(&self.conn)
            .await?;

        if inserted == 0 {
            return Ok(None);
        }

        debug!(collection, id = %id, "Inserted document");
        self.get(collection, &id).await
    }

    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>> {
        let Some(existing) = self.get(collection, id).await? else {
            return Ok(None);
        };

        let merged = merge_documents(existing, patch);
        let body = Self::encode_body(merged)?;

        let result = Documents::update_many()
            .col_expr(
                documents::Column::Body,
                sea_orm::sea_query::Expr::value(body),
            )
            .col_expr(
                documents::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Self::timestamp()),
            )
            .filter(documents::Column::Id.eq(id))
            .filter(documents::Column::Collection.eq(collection))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get(collection, id).await
    }

    pub async fn remove(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let Some(existing) = self.get(collection, id).await? else {
            return Ok(None);
        };

        let result = Documents::delete_many()
            .filter(documents::Column::Id.eq(id))
            .filter(documents::Column::Collection.eq(collection))
            .exec(&self.conn)
            .await?;

        Ok((result.rows_affected > 0).then_some(existing))
    }
}
