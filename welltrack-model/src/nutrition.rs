use crate::entity::SyncableEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use welltrack_types::{EntityId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// A logged meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: EntityId,
    pub user_id: UserId,
    pub recipe_id: Option<EntityId>,
    pub name: String,
    pub meal_type: MealType,
    pub consumed_at: DateTime<Utc>,
    pub portions: f64,
    pub notes: Option<String>,
    pub health_notes: Option<String>,
    pub rating: Option<f64>,
    pub is_favorite: bool,
    pub updated_at: DateTime<Utc>,
}

impl SyncableEntity for Meal {
    const ENTITY_TYPE: &'static str = "meal";
    const SENSITIVE_FIELDS: &'static [&'static str] = &["notes", "health_notes"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A saved recipe. Nothing in a recipe is sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: EntityId,
    pub user_id: UserId,
    pub name: String,
    pub prep_time_minutes: u32,
    pub cook_time_minutes: u32,
    pub servings: u32,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    pub fn total_time_minutes(&self) -> u32 {
        self.prep_time_minutes + self.cook_time_minutes
    }
}

impl SyncableEntity for Recipe {
    const ENTITY_TYPE: &'static str = "recipe";
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
