use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A single recipe component
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Ingredient {
    /// Ingredient name, e.g. "milk"
    pub name: String,
    /// Display color of the ingredient layer
    pub color: String,
    /// Relative amount of the ingredient
    pub parts: u32,
}

/// Ingredient as shown on the public menu (color withheld)
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ShortIngredient {
    pub name: String,
    pub parts: u32,
}

impl From<&Ingredient> for ShortIngredient {
    fn from(ingredient: &Ingredient) -> Self {
        Self {
            name: ingredient.name.clone(),
            parts: ingredient.parts,
        }
    }
}

/// Structured recipe: either one ingredient or an ordered list of them
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
#[serde(untagged)]
pub enum IngredientList {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl IngredientList {
    pub fn into_vec(self) -> Vec<Ingredient> {
        match self {
            Self::Many(ingredients) => ingredients,
            Self::One(ingredient) => vec![ingredient],
        }
    }
}

/// Errors produced while encoding or decoding a recipe
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe is not a valid ingredient list: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to serialize recipe: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Recipe as supplied by a client.
///
/// Clients may send the recipe already serialized to text or as structured
/// JSON. Text is persisted verbatim, structured values are serialized first.
#[derive(Debug, Deserialize, ToSchema, Clone, PartialEq)]
#[serde(untagged)]
pub enum Recipe {
    RawText(String),
    Structured(IngredientList),
}

impl Recipe {
    /// Returns the text stored in the recipe column.
    ///
    /// Raw text must itself decode to an ingredient list so that every stored
    /// recipe can be read back in structured form.
    pub fn encode(&self) -> Result<String, RecipeError> {
        match self {
            Self::RawText(text) => {
                decode_recipe(text)?;
                Ok(text.clone())
            }
            Self::Structured(ingredients) => {
                serde_json::to_string(ingredients).map_err(RecipeError::Encode)
            }
        }
    }
}

/// Decodes a stored recipe column into its ingredient sequence
pub fn decode_recipe(text: &str) -> Result<Vec<Ingredient>, RecipeError> {
    serde_json::from_str::<IngredientList>(text)
        .map(IngredientList::into_vec)
        .map_err(RecipeError::Decode)
}

/// A drink on the menu
#[derive(Debug, Clone, PartialEq)]
pub struct Drink {
    pub id: i64,
    pub title: Option<String>,
    pub recipe: Vec<Ingredient>,
}

impl Drink {
    /// Public representation
    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.iter().map(ShortIngredient::from).collect(),
        }
    }

    /// Detailed representation, for callers holding `get:drinks-detail` or write permissions
    pub fn long(&self) -> LongDrink {
        LongDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ShortDrink {
    pub id: i64,
    pub title: Option<String>,
    pub recipe: Vec<ShortIngredient>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct LongDrink {
    pub id: i64,
    pub title: Option<String>,
    pub recipe: Vec<Ingredient>,
}

/// Values for a drink that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Recipe,
}

/// Replacement values for an existing drink. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrinkUpdate {
    pub title: Option<String>,
    pub recipe: Option<Recipe>,
}

/// JSON body accepted by `POST /drinks` and `PATCH /drinks/{id}`
#[derive(Debug, Deserialize, ToSchema, Clone, PartialEq)]
pub struct DrinkPayload {
    /// Drink title
    #[serde(default)]
    pub title: Option<String>,
    /// Recipe, structured or already serialized to text
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn milk() -> Ingredient {
        Ingredient {
            name: "milk".to_string(),
            color: "white".to_string(),
            parts: 1,
        }
    }

    #[test]
    fn test_recipe_accepts_single_ingredient() {
        let recipe: Recipe =
            serde_json::from_value(json!({"name": "milk", "color": "white", "parts": 1})).unwrap();
        assert_eq!(recipe, Recipe::Structured(IngredientList::One(milk())));

        let encoded = recipe.encode().unwrap();
        assert_eq!(decode_recipe(&encoded).unwrap(), vec![milk()]);
    }

    #[test]
    fn test_recipe_accepts_ingredient_list() {
        let recipe: Recipe = serde_json::from_value(json!([
            {"name": "milk", "color": "white", "parts": 1},
            {"name": "coffee", "color": "brown", "parts": 3}
        ]))
        .unwrap();

        let decoded = decode_recipe(&recipe.encode().unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0], milk());
        assert_eq!(decoded[1].name, "coffee");
        assert_eq!(decoded[1].parts, 3);
    }

    #[test]
    fn test_raw_text_recipe_stored_verbatim() {
        let text = r#"[{"name":"milk","color":"white","parts":1}]"#;
        let recipe: Recipe = serde_json::from_value(json!(text)).unwrap();
        assert_eq!(recipe, Recipe::RawText(text.to_string()));
        assert_eq!(recipe.encode().unwrap(), text);
    }

    #[test]
    fn test_raw_text_recipe_must_decode() {
        let recipe = Recipe::RawText("two shots of espresso".to_string());
        assert!(matches!(recipe.encode(), Err(RecipeError::Decode(_))));
    }

    #[test]
    fn test_recipe_rejects_incomplete_ingredient() {
        let result = serde_json::from_value::<Recipe>(json!({"name": "milk"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_short_view_withholds_color() {
        let drink = Drink {
            id: 7,
            title: Some("Latte".to_string()),
            recipe: vec![milk()],
        };

        let short = serde_json::to_value(drink.short()).unwrap();
        assert_eq!(
            short,
            json!({"id": 7, "title": "Latte", "recipe": [{"name": "milk", "parts": 1}]})
        );

        let long = serde_json::to_value(drink.long()).unwrap();
        assert_eq!(
            long,
            json!({
                "id": 7,
                "title": "Latte",
                "recipe": [{"name": "milk", "color": "white", "parts": 1}]
            })
        );
    }

    #[test]
    fn test_payload_fields_are_optional() {
        let payload: DrinkPayload = serde_json::from_value(json!({"title": "Water"})).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Water"));
        assert!(payload.recipe.is_none());
    }
}
