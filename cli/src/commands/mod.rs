mod helpers;
mod recipe;

use culinary_core::{RecipeStore, RecipeViewModel};

/// The UI state holder the CLI drives, backed by the SQLite store.
pub(crate) type ViewModel = RecipeViewModel<RecipeStore>;

pub(crate) use recipe::{cmd_add, cmd_delete, cmd_edit, cmd_list, cmd_show, cmd_watch};
