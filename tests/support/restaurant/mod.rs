//! Restaurant lunch subscriptions: the demo aggregate used across the
//! integration tests.

mod aggregate;
mod commands;
mod events;

pub use aggregate::{Restaurant, RestaurantSnapshot, Selection};
pub use commands::{Cancel, Create, Reschedule, Schedule, SelectMeal};
pub use events::{Canceled, Created, MealChanged, MealSelected, Rescheduled, Scheduled};
