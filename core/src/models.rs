use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// A recipe as stored in the `recipes` table.
///
/// `id == 0` marks a draft that has not been persisted yet; the store assigns
/// the real id on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    pub category: String,
}

impl Recipe {
    pub fn new(
        title: impl Into<String>,
        ingredients: impl Into<String>,
        instructions: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            ingredients: ingredients.into(),
            instructions: instructions.into(),
            category: category.into(),
        }
    }

    /// An empty draft, as shown when the user starts adding a recipe.
    pub fn draft() -> Self {
        Self::new("", "", "", "")
    }

    pub fn is_draft(&self) -> bool {
        self.id == 0
    }

    /// Split the ingredients blob on newlines or commas for display.
    pub fn ingredient_lines(&self) -> Vec<&str> {
        self.ingredients
            .split(['\n', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Partially filled recipe fields, as received from the CLI or a JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeForm {
    pub title: Option<String>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub category: Option<String>,
}

impl RecipeForm {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
            && self.category.is_none()
    }

    /// Build a draft, failing on the first missing field.
    pub fn into_draft(self) -> Result<Recipe> {
        let title = self.title.ok_or_else(|| StoreError::constraint("title"))?;
        let ingredients = self
            .ingredients
            .ok_or_else(|| StoreError::constraint("ingredients"))?;
        let instructions = self
            .instructions
            .ok_or_else(|| StoreError::constraint("instructions"))?;
        let category = self
            .category
            .ok_or_else(|| StoreError::constraint("category"))?;
        Ok(Recipe::new(title, ingredients, instructions, category))
    }

    /// Overwrite only the provided fields of `recipe`. The id is never touched.
    pub fn apply_to(self, mut recipe: Recipe) -> Recipe {
        if let Some(title) = self.title {
            recipe.title = title;
        }
        if let Some(ingredients) = self.ingredients {
            recipe.ingredients = ingredients;
        }
        if let Some(instructions) = self.instructions {
            recipe.instructions = instructions;
        }
        if let Some(category) = self.category {
            recipe.category = category;
        }
        recipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_has_zero_id() {
        let draft = Recipe::draft();
        assert!(draft.is_draft());
        assert_eq!(draft.title, "");
    }

    #[test]
    fn test_ingredient_lines_split_on_commas_and_newlines() {
        let recipe = Recipe::new("Pancakes", "Flour, Eggs\nMilk,,", "Mix", "Breakfast");
        assert_eq!(recipe.ingredient_lines(), vec!["Flour", "Eggs", "Milk"]);
    }

    #[test]
    fn test_form_reports_first_missing_field() {
        let form = RecipeForm {
            title: Some("Soup".to_string()),
            ingredients: Some("Water".to_string()),
            instructions: None,
            category: None,
        };
        match form.into_draft() {
            Err(StoreError::ConstraintViolation { field, .. }) => assert_eq!(field, "instructions"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_form_apply_keeps_id_and_untouched_fields() {
        let mut salad = Recipe::new("Salad", "Lettuce", "Toss", "Lunch");
        salad.id = 4;
        let form = RecipeForm {
            title: Some("Greek Salad".to_string()),
            ..RecipeForm::default()
        };
        let updated = form.apply_to(salad);
        assert_eq!(updated.id, 4);
        assert_eq!(updated.title, "Greek Salad");
        assert_eq!(updated.ingredients, "Lettuce");
        assert_eq!(updated.category, "Lunch");
    }

    #[test]
    fn test_recipe_deserializes_without_id() {
        let json = r#"{"title":"Cake","ingredients":"Flour","instructions":"Bake","category":"Dessert"}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert!(recipe.is_draft());
        assert_eq!(recipe.category, "Dessert");
    }
}
