use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use culinary_core::models::Recipe;

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: truncate(&r.title, 35),
            category: truncate(&r.category, 20),
            ingredients: r.ingredient_lines().len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_detail(recipe: &Recipe) {
    let title = &recipe.title;
    let id = recipe.id;
    let category = &recipe.category;
    println!("=== {title} === (id: {id})");
    println!("  Category: {category}\n");

    println!("  INGREDIENTS:");
    for line in recipe.ingredient_lines() {
        println!("    - {line}");
    }

    println!("\n  INSTRUCTIONS:");
    for line in recipe.instructions.lines() {
        println!("    {line}");
    }
}

/// Report a missing recipe and exit with status 2.
pub(crate) fn exit_not_found(id: i64, json: bool) -> ! {
    let message = format!("Recipe {id} not found");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Soup", 10), "Soup");
        assert_eq!(truncate("Slow-cooked beef ragu", 10), "Slow-co...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème brûlée tart", 10), "Crème b...");
        assert_eq!(truncate("Gâteau", 10), "Gâteau");
    }

    #[test]
    fn test_json_error_escapes_quotes() {
        let out = json_error("Recipe \"x\" missing");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["error"], "Recipe \"x\" missing");
    }
}
