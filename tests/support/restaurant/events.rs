use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourced_es::named;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Created {
    pub restaurant: String,
    pub info: String,
    pub menu: Vec<String>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealSelected {
    pub person: String,
    pub meal: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealChanged {
    pub person: String,
    pub previous_meal: String,
    pub actual_meal: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scheduled {
    pub on: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rescheduled {
    pub on: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Canceled {
    pub restaurant: String,
    pub people: Vec<String>,
    pub at: DateTime<Utc>,
}

named!(Created, MealSelected, MealChanged, Scheduled, Rescheduled, Canceled);
