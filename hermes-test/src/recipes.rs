//! Recipe documents and responses.

use hermes::{QueryDocument, Variables};
use serde_json::{json, Value};

pub const RECIPE_QUERY: &str = "query Recipe($id: ID!) {
    recipe(id: $id) {
        __typename
        id
        title
        servings
    }
}";

pub const RECIPES_QUERY: &str = "query Recipes {
    recipes {
        __typename
        id
        title
        author {
            __typename
            id
            name
        }
    }
}";

pub const RENAME_RECIPE_MUTATION: &str = "mutation RenameRecipe($id: ID!, $title: String!) {
    renameRecipe(id: $id, title: $title) {
        __typename
        id
        title
    }
}";

fn parse(source: &str) -> QueryDocument {
    QueryDocument::parse(source).expect("fixture documents are valid")
}

pub fn recipe_query() -> QueryDocument {
    parse(RECIPE_QUERY)
}

pub fn recipes_query() -> QueryDocument {
    parse(RECIPES_QUERY)
}

pub fn rename_recipe_mutation() -> QueryDocument {
    parse(RENAME_RECIPE_MUTATION)
}

pub fn variables(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => Variables::new()
    }
}

pub fn recipe_variables(id: &str) -> Variables {
    variables(json!({ "id": id }))
}

pub fn rename_variables(id: &str, title: &str) -> Variables {
    variables(json!({ "id": id, "title": title }))
}

pub fn recipe_data(id: &str, title: &str, servings: i64) -> Value {
    json!({
        "recipe": {
            "__typename": "Recipe",
            "id": id,
            "title": title,
            "servings": servings
        }
    })
}

pub fn rename_data(id: &str, title: &str) -> Value {
    json!({
        "renameRecipe": {
            "__typename": "Recipe",
            "id": id,
            "title": title
        }
    })
}

pub fn recipes_data(n: usize) -> Value {
    let recipes: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "__typename": "Recipe",
                "id": i.to_string(),
                "title": format!("Recipe {}", i),
                "author": {
                    "__typename": "Author",
                    "id": (i % 3).to_string(),
                    "name": format!("Author {}", i % 3)
                }
            })
        })
        .collect();
    json!({ "recipes": recipes })
}
