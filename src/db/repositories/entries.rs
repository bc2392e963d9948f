use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_uuid},
    models::{Entry, Product, UsedProduct},
};

fn row_to_entry(row: &Row) -> Result<Entry> {
    let photo_id: Option<String> = row.get("photo_id")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Entry {
        id: row.get("id")?,
        title: row.get("title")?,
        note: row.get("note")?,
        photo_id: parse_optional_uuid(photo_id, "photo_id")?,
        design_category: row.get("design_category")?,
        color_category: row.get("color_category")?,
        rating: row.get("rating")?,
        used_products: Vec::new(),
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub(crate) fn load_entry(conn: &Connection, entry_id: &str) -> Result<Option<Entry>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, note, photo_id, design_category, color_category, rating, created_at, updated_at
         FROM entries
         WHERE id = ?1",
    )?;

    let mut rows = stmt.query(params![entry_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut entry = row_to_entry(row)?;
    drop(rows);

    let mut stmt = conn.prepare(
        "SELECT u.product_id, p.name, u.order_index
         FROM entry_used_items u
         JOIN products p ON p.id = u.product_id
         WHERE u.entry_id = ?1
         ORDER BY u.order_index ASC",
    )?;
    entry.used_products = stmt
        .query_map(params![entry_id], |row| {
            Ok(UsedProduct {
                product_id: row.get(0)?,
                name: row.get(1)?,
                order_index: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(entry))
}

impl Database {
    pub async fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO entries (id, title, note, photo_id, design_category, color_category, rating, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.title,
                    record.note,
                    record.photo_id.map(|id| id.to_string()),
                    record.design_category,
                    record.color_category,
                    record.rating,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to insert entry {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| load_entry(conn, &entry_id)).await
    }

    /// Replaces (or clears) the entry's photo reference.
    pub async fn set_entry_photo(
        &self,
        entry_id: &str,
        photo_id: Option<Uuid>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE entries
                 SET photo_id = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    photo_id.map(|id| id.to_string()),
                    updated_at.to_rfc3339(),
                    entry_id,
                ],
            )?;
            if changed == 0 {
                bail!("entry {entry_id} not found");
            }
            Ok(())
        })
        .await
    }

    /// Deleting an entry also removes its score record and product links.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM entries WHERE id = ?1", params![entry_id])?;
            Ok(())
        })
        .await
    }

    pub async fn insert_product(&self, product: &Product) -> Result<()> {
        let record = product.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO products (id, name, category, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.name,
                    record.category,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to insert product {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let name = name.to_string();
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT id, name, category, created_at, updated_at
                     FROM products
                     WHERE name = ?1
                     ORDER BY created_at ASC
                     LIMIT 1",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            found
                .map(|(id, name, category, created_at, updated_at)| -> Result<Product> {
                    Ok(Product {
                        id,
                        name,
                        category,
                        created_at: parse_datetime(&created_at, "created_at")?,
                        updated_at: parse_datetime(&updated_at, "updated_at")?,
                    })
                })
                .transpose()
        })
        .await
    }

    /// Replaces the entry's product links, keeping the given order.
    pub async fn link_products(&self, entry_id: &str, product_ids: Vec<String>) -> Result<()> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM entry_used_items WHERE entry_id = ?1",
                params![entry_id],
            )?;
            for (index, product_id) in product_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO entry_used_items (id, entry_id, product_id, order_index)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        Uuid::new_v4().to_string(),
                        entry_id,
                        product_id,
                        index as i64,
                    ],
                )
                .with_context(|| format!("failed to link product {product_id}"))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Database {
        Database::new(dir.path().join("journal.sqlite3")).expect("open database")
    }

    #[tokio::test]
    async fn entry_round_trips_with_ordered_products() {
        let dir = TempDir::new().expect("tempdir");
        let db = open(&dir);

        let mut entry = Entry::new("spring nails");
        entry.design_category = Some("french".into());
        entry.photo_id = Some(Uuid::new_v4());
        db.insert_entry(&entry).await.expect("insert entry");

        let base = Product::new("Base coat", Some("base".into()));
        let color = Product::new("Pink gel", Some("color".into()));
        db.insert_product(&base).await.expect("insert base");
        db.insert_product(&color).await.expect("insert color");
        db.link_products(&entry.id, vec![color.id.clone(), base.id.clone()])
            .await
            .expect("link");

        let loaded = db.get_entry(&entry.id).await.expect("get").expect("exists");
        assert_eq!(loaded.photo_id, entry.photo_id);
        assert_eq!(loaded.design_category.as_deref(), Some("french"));
        let names: Vec<_> = loaded
            .used_products
            .iter()
            .map(|p| p.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Pink gel", "Base coat"]);

        let found = db
            .find_product_by_name("Pink gel")
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.id, color.id);
    }

    #[tokio::test]
    async fn set_photo_on_unknown_entry_fails() {
        let dir = TempDir::new().expect("tempdir");
        let db = open(&dir);
        let result = db.set_entry_photo("missing", Some(Uuid::new_v4()), Utc::now()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_entry_is_none() {
        let dir = TempDir::new().expect("tempdir");
        let db = open(&dir);
        assert!(db.get_entry("nope").await.expect("get").is_none());
    }
}
