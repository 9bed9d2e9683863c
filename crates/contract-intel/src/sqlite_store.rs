//! SQLite-backed [`PassageStore`] and [`DocumentRepository`].
//!
//! Vectors are stored as little-endian `f32` BLOBs and scored with a
//! brute-force cosine scan over the passages in scope, the same way the
//! in-memory backend does it. Ranking goes through the shared
//! [`rank`] so tie-breaking matches across backends.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use contract_intel_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use contract_intel_core::models::{Document, Page, Passage};
use contract_intel_core::offsets::{OffsetTable, PageSpan};
use contract_intel_core::store::{
    rank, DocumentRepository, DocumentSummary, PassageStore, ScoredPassage,
};

/// SQLite implementation of both storage traits.
///
/// `model` is recorded next to every stored vector so `cintel stats` can
/// report which embedding model produced the index.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const PASSAGE_COLUMNS: &str =
    "p.id, p.document_id, p.page, p.ordinal, p.chunk_index, p.char_start, p.char_end, p.text, p.hash";

fn passage_from_row(row: &SqliteRow) -> Passage {
    Passage {
        id: row.get("id"),
        document_id: row.get("document_id"),
        page: row.get::<i64, _>("page") as u32,
        ordinal: row.get::<i64, _>("ordinal") as usize,
        index: row.get::<i64, _>("chunk_index") as usize,
        char_start: row.get::<i64, _>("char_start") as usize,
        char_end: row.get::<i64, _>("char_end") as usize,
        text: row.get("text"),
        hash: row.get("hash"),
    }
}

#[async_trait]
impl PassageStore for SqliteStore {
    async fn persist(&self, passage: &Passage, embedding: &[f32]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO passages (id, document_id, page, ordinal, chunk_index,
                                  char_start, char_end, text, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                page = excluded.page,
                ordinal = excluded.ordinal,
                chunk_index = excluded.chunk_index,
                char_start = excluded.char_start,
                char_end = excluded.char_end,
                text = excluded.text,
                hash = excluded.hash
            "#,
        )
        .bind(&passage.id)
        .bind(&passage.document_id)
        .bind(passage.page as i64)
        .bind(passage.ordinal as i64)
        .bind(passage.index as i64)
        .bind(passage.char_start as i64)
        .bind(passage.char_end as i64)
        .bind(&passage.text)
        .bind(&passage.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO passage_vectors (passage_id, document_id, model, dims, hash, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(passage_id) DO UPDATE SET
                document_id = excluded.document_id,
                model = excluded.model,
                dims = excluded.dims,
                hash = excluded.hash,
                embedding = excluded.embedding
            "#,
        )
        .bind(&passage.id)
        .bind(&passage.document_id)
        .bind(&self.model)
        .bind(embedding.len() as i64)
        .bind(&passage.hash)
        .bind(vec_to_blob(embedding))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        candidate_document_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {}, v.embedding FROM passages p JOIN passage_vectors v ON v.passage_id = p.id",
            PASSAGE_COLUMNS
        ));
        if !candidate_document_ids.is_empty() {
            qb.push(" WHERE p.document_id IN (");
            let mut ids = qb.separated(", ");
            for id in candidate_document_ids {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");
        }

        let rows = qb.build().fetch_all(&self.pool).await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ScoredPassage {
                    passage: passage_from_row(row),
                    score: cosine_similarity(query_embedding, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(candidates, top_k))
    }

    async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM passage_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM passages WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn passages_for(&self, document_id: &str) -> Result<Vec<Passage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM passages p WHERE p.document_id = ? ORDER BY p.chunk_index ASC",
            PASSAGE_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(passage_from_row).collect())
    }
}

#[async_trait]
impl DocumentRepository for SqliteStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, content_hash, created_at, total_chars, text)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                content_hash = excluded.content_hash,
                created_at = excluded.created_at,
                total_chars = excluded.total_chars,
                text = excluded.text
            "#,
        )
        .bind(&document.id)
        .bind(&document.filename)
        .bind(&document.content_hash)
        .bind(document.created_at)
        .bind(document.total_chars() as i64)
        .bind(&document.text)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pages WHERE document_id = ?")
            .bind(&document.id)
            .execute(&mut *tx)
            .await?;

        for page in &document.pages {
            sqlx::query(
                "INSERT INTO pages (document_id, page_number, char_start, char_end, text) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&document.id)
            .bind(page.number as i64)
            .bind(page.char_start as i64)
            .bind(page.char_end as i64)
            .bind(&page.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, content_hash, created_at, text FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let page_rows = sqlx::query(
            "SELECT page_number, char_start, char_end, text FROM pages WHERE document_id = ? ORDER BY page_number ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let pages = page_rows
            .iter()
            .map(|r| Page {
                number: r.get::<i64, _>("page_number") as u32,
                text: r.get("text"),
                char_start: r.get::<i64, _>("char_start") as usize,
                char_end: r.get::<i64, _>("char_end") as usize,
            })
            .collect();

        Ok(Some(Document {
            id: row.get("id"),
            filename: row.get("filename"),
            content_hash: row.get("content_hash"),
            created_at: row.get("created_at"),
            text: row.get("text"),
            pages,
        }))
    }

    async fn offset_table(&self, id: &str) -> Result<Option<OffsetTable>> {
        let rows = sqlx::query(
            "SELECT page_number, char_start, char_end FROM pages WHERE document_id = ? ORDER BY page_number ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let spans = rows
            .iter()
            .map(|r| PageSpan {
                page: r.get::<i64, _>("page_number") as u32,
                start: r.get::<i64, _>("char_start") as usize,
                end: r.get::<i64, _>("char_end") as usize,
            })
            .collect();

        Ok(Some(OffsetTable::from_spans(spans)?))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.created_at, d.total_chars,
                   (SELECT COUNT(*) FROM pages pg WHERE pg.document_id = d.id) AS page_count
            FROM documents d
            ORDER BY d.created_at DESC, d.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| DocumentSummary {
                id: r.get("id"),
                filename: r.get("filename"),
                page_count: r.get::<i64, _>("page_count") as usize,
                total_chars: r.get::<i64, _>("total_chars") as usize,
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
