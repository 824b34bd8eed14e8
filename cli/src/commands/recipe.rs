use anyhow::{Context, Result, bail};
use std::process;

use culinary_core::models::{Recipe, RecipeForm};
use culinary_core::StoreError;

use super::ViewModel;
use super::helpers::{exit_not_found, print_recipe_detail, print_recipe_table};

async fn fetch(vm: &ViewModel, id: i64, json: bool) -> Result<Recipe> {
    match vm.repository().get(id).await {
        Ok(recipe) => Ok(recipe),
        Err(StoreError::NotFound { .. }) => exit_not_found(id, json),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn cmd_list(vm: &ViewModel, json: bool) -> Result<()> {
    let recipes = vm.recipes();
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(recipes)?);
    } else {
        print_recipe_table(recipes);
    }
    Ok(())
}

pub(crate) async fn cmd_show(vm: &ViewModel, id: i64, json: bool) -> Result<()> {
    let recipe = fetch(vm, id, json).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_recipe_detail(&recipe);
    }
    Ok(())
}

pub(crate) async fn cmd_add(vm: &mut ViewModel, form: RecipeForm, json: bool) -> Result<()> {
    let draft = form.into_draft()?;
    vm.add();
    let saved = vm
        .save(draft)
        .context("Recipe editor did not open")?
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        let title = &saved.title;
        let id = saved.id;
        println!("Added recipe: {title} (id: {id})");
    }
    Ok(())
}

pub(crate) async fn cmd_edit(
    vm: &mut ViewModel,
    id: i64,
    form: RecipeForm,
    json: bool,
) -> Result<()> {
    if form.is_empty() {
        bail!(
            "Nothing to update. Provide at least one of --title, --ingredients, --instructions, or --category"
        );
    }

    let existing = fetch(vm, id, json).await?;
    vm.select(existing.clone());
    let saved = vm
        .save(form.apply_to(existing))
        .context("Recipe editor did not open")?
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        let title = &saved.title;
        println!("Updated recipe {id}: {title}");
    }
    Ok(())
}

pub(crate) async fn cmd_delete(vm: &mut ViewModel, id: i64, json: bool) -> Result<()> {
    let existing = fetch(vm, id, json).await?;
    let title = existing.title.clone();
    vm.select(existing);
    vm.delete_current()
        .context("Recipe editor did not open")?
        .await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}: {title}");
    }
    Ok(())
}

/// Print the list every time it changes, including writes from other processes.
pub(crate) async fn cmd_watch(vm: &mut ViewModel, json: bool) -> Result<()> {
    print_snapshot(vm.recipes(), json)?;
    loop {
        tokio::select! {
            changed = vm.next_change() => match changed {
                Some(recipes) => print_snapshot(recipes, json)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_snapshot(recipes: &[Recipe], json: bool) -> Result<()> {
    if json {
        // One line per snapshot so the output can be streamed.
        println!("{}", serde_json::to_string(recipes)?);
    } else if recipes.is_empty() {
        println!("(no recipes)");
    } else {
        print_recipe_table(recipes);
    }
    Ok(())
}
