use chrono::{DateTime, Utc};
use sourced_es::named;

#[derive(Clone, Debug)]
pub struct Create {
    pub name: String,
    pub info: String,
    pub menu: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SelectMeal {
    pub person: String,
    pub meal: String,
}

#[derive(Clone, Debug)]
pub struct Schedule {
    pub on: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Reschedule {
    pub on: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Cancel;

named!(Create, SelectMeal, Schedule, Reschedule, Cancel);

impl Create {
    pub fn new(name: &str, menu: &[&str]) -> Self {
        Create {
            name: name.to_string(),
            info: String::new(),
            menu: menu.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl SelectMeal {
    pub fn new(person: &str, meal: &str) -> Self {
        SelectMeal {
            person: person.to_string(),
            meal: meal.to_string(),
        }
    }
}
