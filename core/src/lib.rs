//! Recipe storage for the culinary recipe manager.
//!
//! The layers, bottom up: [`db::Database`] owns the SQLite file,
//! [`store::RecipeStore`] adds off-thread access and push snapshots,
//! [`repository::RecipeRepository`] is the swappable seam the UI talks to, and
//! [`view_model::RecipeViewModel`] holds the UI's list and screen state.

pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod store;
pub mod subscription;
pub mod view_model;

pub use error::{Result, StoreError};
pub use models::{Recipe, RecipeForm};
pub use repository::{RecipeRepository, RecipeStorage};
pub use store::RecipeStore;
pub use subscription::{Snapshot, Subscription};
pub use view_model::{Pending, RecipeViewModel, Screen};
