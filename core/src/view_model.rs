use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{Result, StoreError};
use crate::models::Recipe;
use crate::repository::{RecipeRepository, RecipeStorage};
use crate::subscription::{Snapshot, Subscription};

/// Which screen the UI is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    List,
    /// Editing a recipe; a draft (`id == 0`) when adding.
    Detail(Recipe),
}

/// A mutation running in the background.
///
/// Await it for the outcome. Dropping it does not cancel the write.
#[must_use = "dropping a Pending discards the result; the write still runs"]
pub struct Pending<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.map_err(StoreError::from).and_then(|result| result))
    }
}

/// UI-facing state: the current recipe list, the screen, and mutation dispatch.
pub struct RecipeViewModel<S> {
    repository: Arc<RecipeRepository<S>>,
    subscription: Subscription,
    recipes: Snapshot,
    screen: Screen,
}

impl<S: RecipeStorage> RecipeViewModel<S> {
    /// Subscribe to the repository and start on the list screen.
    pub async fn new(repository: Arc<RecipeRepository<S>>) -> Result<Self> {
        let mut subscription = repository.subscribe().await?;
        let recipes = subscription
            .latest()
            .unwrap_or_else(|| Snapshot::from(Vec::new()));
        Ok(Self {
            repository,
            subscription,
            recipes,
            screen: Screen::List,
        })
    }

    pub fn repository(&self) -> &Arc<RecipeRepository<S>> {
        &self.repository
    }

    /// The most recently received list, ordered by title.
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Wait for the next list emission. `None` once the store has shut down.
    pub async fn next_change(&mut self) -> Option<&[Recipe]> {
        self.recipes = self.subscription.next().await?;
        Some(&self.recipes)
    }

    /// Apply any emissions already queued. Returns whether the list changed.
    pub fn refresh(&mut self) -> bool {
        match self.subscription.latest() {
            Some(snapshot) => {
                self.recipes = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn insert(&self, recipe: Recipe) -> Pending<Recipe> {
        self.dispatch("insert", move |repo| async move { repo.insert(recipe).await })
    }

    pub fn update(&self, recipe: Recipe) -> Pending<Recipe> {
        self.dispatch("update", move |repo| async move { repo.update(recipe).await })
    }

    pub fn delete(&self, recipe: Recipe) -> Pending<bool> {
        self.dispatch("delete", move |repo| async move { repo.delete(recipe).await })
    }

    fn dispatch<T, F, Fut>(&self, op: &'static str, f: F) -> Pending<T>
    where
        F: FnOnce(Arc<RecipeRepository<S>>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let fut = f(Arc::clone(&self.repository));
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if let Err(e) = &result {
                tracing::warn!(op, error = %e, "recipe mutation failed");
            }
            result
        });
        Pending { handle }
    }

    // --- Navigation ---

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// List → Detail with a fresh draft.
    pub fn add(&mut self) -> bool {
        self.open(Recipe::draft())
    }

    /// List → Detail for an existing recipe.
    pub fn select(&mut self, recipe: Recipe) -> bool {
        self.open(recipe)
    }

    fn open(&mut self, recipe: Recipe) -> bool {
        if self.screen != Screen::List {
            return false;
        }
        self.screen = Screen::Detail(recipe);
        true
    }

    /// Detail → List, inserting a draft or updating an existing recipe.
    ///
    /// The id always comes from the recipe being edited, never from `edited`.
    pub fn save(&mut self, edited: Recipe) -> Option<Pending<Recipe>> {
        let Screen::Detail(current) = &self.screen else {
            return None;
        };
        let recipe = Recipe {
            id: current.id,
            ..edited
        };
        self.screen = Screen::List;
        if recipe.is_draft() {
            Some(self.insert(recipe))
        } else {
            Some(self.update(recipe))
        }
    }

    /// Detail → List, deleting the recipe being edited. Drafts have nothing to delete.
    pub fn delete_current(&mut self) -> Option<Pending<bool>> {
        let Screen::Detail(current) = &self.screen else {
            return None;
        };
        if current.is_draft() {
            return None;
        }
        let recipe = current.clone();
        self.screen = Screen::List;
        Some(self.delete(recipe))
    }

    /// Detail → List without saving.
    pub fn cancel(&mut self) -> bool {
        if self.screen == Screen::List {
            return false;
        }
        self.screen = Screen::List;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repository::tests::MemoryStorage;
    use crate::store::RecipeStore;

    async fn view_model() -> RecipeViewModel<RecipeStore> {
        let store = RecipeStore::new(Database::open_in_memory().unwrap());
        RecipeViewModel::new(Arc::new(RecipeRepository::new(store)))
            .await
            .unwrap()
    }

    fn pancakes() -> Recipe {
        Recipe::new("Pancakes", "Flour, Eggs, Milk", "Mix and cook", "Breakfast")
    }

    #[tokio::test]
    async fn test_starts_on_empty_list() {
        let vm = view_model().await;
        assert_eq!(vm.screen(), &Screen::List);
        assert!(vm.recipes().is_empty());
    }

    #[tokio::test]
    async fn test_insert_result_and_list_emission() {
        let mut vm = view_model().await;
        let saved = vm.insert(pancakes()).await.unwrap();
        assert_ne!(saved.id, 0);

        let list = vm.next_change().await.unwrap();
        assert_eq!(list, [saved]);
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_through_pending() {
        let vm = view_model().await;
        let mut ghost = pancakes();
        ghost.id = 31;
        let err = vm.update(ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 31 }));
    }

    #[tokio::test]
    async fn test_add_save_inserts_draft() {
        let mut vm = view_model().await;
        assert!(vm.add());
        assert_eq!(vm.screen(), &Screen::Detail(Recipe::draft()));

        let saved = vm.save(pancakes()).unwrap().await.unwrap();
        assert_eq!(vm.screen(), &Screen::List);
        assert_eq!(saved.title, "Pancakes");

        vm.next_change().await.unwrap();
        assert_eq!(vm.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_select_save_updates_and_keeps_id() {
        let mut vm = view_model().await;
        let saved = vm.insert(pancakes()).await.unwrap();
        vm.next_change().await.unwrap();

        assert!(vm.select(saved.clone()));
        let edited = Recipe {
            id: 999,
            title: "Buttermilk Pancakes".to_string(),
            ..saved.clone()
        };
        let updated = vm.save(edited).unwrap().await.unwrap();
        assert_eq!(updated.id, saved.id);

        let list = vm.next_change().await.unwrap();
        assert_eq!(list[0].title, "Buttermilk Pancakes");
        assert_eq!(list[0].id, saved.id);
    }

    #[tokio::test]
    async fn test_delete_current_returns_to_list() {
        let mut vm = view_model().await;
        let saved = vm.insert(pancakes()).await.unwrap();
        vm.next_change().await.unwrap();

        vm.select(saved);
        assert!(vm.delete_current().unwrap().await.unwrap());
        assert_eq!(vm.screen(), &Screen::List);

        assert!(vm.next_change().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_rejected() {
        let mut vm = view_model().await;
        assert!(!vm.cancel());
        assert!(vm.save(pancakes()).is_none());
        assert!(vm.delete_current().is_none());

        vm.add();
        assert!(!vm.add());
        assert!(!vm.select(pancakes()));
        // A draft has no row to delete.
        assert!(vm.delete_current().is_none());
        assert!(matches!(vm.screen(), Screen::Detail(_)));

        assert!(vm.cancel());
        assert_eq!(vm.screen(), &Screen::List);
    }

    #[tokio::test]
    async fn test_dropped_pending_still_writes() {
        let mut vm = view_model().await;
        drop(vm.insert(pancakes()));
        let list = vm.next_change().await.unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_write_completes_after_view_model_dropped() {
        let store = RecipeStore::new(Database::open_in_memory().unwrap());
        let repo = Arc::new(RecipeRepository::new(store.clone()));
        let vm = RecipeViewModel::new(Arc::clone(&repo)).await.unwrap();

        let pending = vm.insert(pancakes());
        drop(vm);
        pending.await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_takes_latest_queued_snapshot() {
        let mut vm = view_model().await;
        vm.insert(Recipe::new("Pasta", "", "", "")).await.unwrap();
        vm.insert(Recipe::new("Cake", "", "", "")).await.unwrap();

        assert!(vm.refresh());
        let titles: Vec<&str> = vm.recipes().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Cake", "Pasta"]);
        assert!(!vm.refresh());
    }

    #[tokio::test]
    async fn test_works_over_any_storage() {
        let repo = Arc::new(RecipeRepository::new(MemoryStorage::default()));
        let mut vm = RecipeViewModel::new(repo).await.unwrap();
        vm.insert(pancakes()).await.unwrap();
        assert_eq!(vm.next_change().await.unwrap()[0].title, "Pancakes");

        let failing = Arc::new(RecipeRepository::new(MemoryStorage::failing()));
        let vm = RecipeViewModel::new(failing).await.unwrap();
        assert!(vm.insert(pancakes()).await.is_err());
    }
}
