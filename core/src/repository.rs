use std::future::Future;

use crate::error::Result;
use crate::models::Recipe;
use crate::subscription::Subscription;

/// Asynchronous recipe storage.
///
/// [`crate::store::RecipeStore`] is the SQLite-backed implementation; tests
/// swap in in-memory ones.
pub trait RecipeStorage: Send + Sync + 'static {
    /// Persist a draft and return it with its assigned id.
    fn insert(&self, recipe: Recipe) -> impl Future<Output = Result<Recipe>> + Send;

    /// Replace every field of an existing recipe. Fails with `NotFound` if the id has no row.
    fn update(&self, recipe: Recipe) -> impl Future<Output = Result<Recipe>> + Send;

    /// Remove a recipe by id. Returns `false` if there was nothing to remove.
    fn delete(&self, recipe: Recipe) -> impl Future<Output = Result<bool>> + Send;

    fn get(&self, id: i64) -> impl Future<Output = Result<Recipe>> + Send;

    /// Every recipe, ordered by title.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    /// Subscribe to ordered snapshots of the recipe list.
    fn subscribe(&self) -> impl Future<Output = Result<Subscription>> + Send;
}

/// Pass-through access to a [`RecipeStorage`].
///
/// Adds nothing on top of the storage: errors and snapshots are forwarded as is.
pub struct RecipeRepository<S> {
    storage: S,
}

impl<S: RecipeStorage> RecipeRepository<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn insert(&self, recipe: Recipe) -> Result<Recipe> {
        self.storage.insert(recipe).await
    }

    pub async fn update(&self, recipe: Recipe) -> Result<Recipe> {
        self.storage.update(recipe).await
    }

    pub async fn delete(&self, recipe: Recipe) -> Result<bool> {
        self.storage.delete(recipe).await
    }

    pub async fn get(&self, id: i64) -> Result<Recipe> {
        self.storage.get(id).await
    }

    pub async fn list_all(&self) -> Result<Vec<Recipe>> {
        self.storage.list_all().await
    }

    pub async fn subscribe(&self) -> Result<Subscription> {
        self.storage.subscribe().await
    }
}
