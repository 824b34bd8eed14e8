use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};
use crate::models::Recipe;

const SCHEMA_VERSION: i64 = 1;

/// Explicit handle to the recipe database file.
///
/// Opened once at startup and handed to the store; closed with [`Database::close`].
pub struct Database {
    conn: Connection,
    in_memory: bool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::StorageUnavailable)?;
        // Another process may hold the write lock briefly.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Database {
            conn,
            in_memory: false,
        };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "opened recipe database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::StorageUnavailable)?;
        let db = Database {
            conn,
            in_memory: true,
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory databases are private to their connection and never change underneath it.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Close the underlying connection, reporting any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| StoreError::StorageUnavailable(err))
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    ingredients TEXT NOT NULL,
                    instructions TEXT NOT NULL,
                    category TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            ingredients: row.get(2)?,
            instructions: row.get(3)?,
            category: row.get(4)?,
        })
    }

    // --- Recipes ---

    pub fn insert_recipe(&self, recipe: &Recipe) -> Result<Recipe> {
        if !recipe.is_draft() {
            return Err(StoreError::preassigned_id());
        }
        self.conn.execute(
            "INSERT INTO recipes (title, ingredients, instructions, category)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                recipe.title,
                recipe.ingredients,
                recipe.instructions,
                recipe.category,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Recipe {
            id,
            ..recipe.clone()
        })
    }

    pub fn update_recipe(&self, recipe: &Recipe) -> Result<Recipe> {
        let rows = self.conn.execute(
            "UPDATE recipes SET title = ?1, ingredients = ?2, instructions = ?3, category = ?4
             WHERE id = ?5",
            params![
                recipe.title,
                recipe.ingredients,
                recipe.instructions,
                recipe.category,
                recipe.id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound { id: recipe.id });
        }
        Ok(recipe.clone())
    }

    /// Returns whether a row was removed. Deleting an absent id is not an error.
    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, title, ingredients, instructions, category FROM recipes WHERE id = ?1",
                params![id],
                Self::recipe_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound { id })
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, ingredients, instructions, category FROM recipes
             ORDER BY title ASC, id ASC",
        )?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recipes)
    }

    /// SQLite's `data_version`: changes whenever another connection commits to the file.
    pub fn data_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "data_version", |row| row.get(0))?)
    }
}
