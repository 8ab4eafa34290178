use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourced_es::{named, Aggregate, Error, Handlers, PendingEvent, Result, Snapshottable};

use super::commands::{Cancel, Create, Reschedule, Schedule, SelectMeal};
use super::events::{Canceled, Created, MealChanged, MealSelected, Rescheduled, Scheduled};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub meal: String,
    pub on: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    pub info: String,
    pub menu: Vec<String>,
    pub subscriptions: BTreeMap<String, Selection>,
    pub created: Option<DateTime<Utc>>,
    pub scheduled: Option<DateTime<Utc>>,
    pub canceled: Option<DateTime<Utc>>,
}

/// The whole state doubles as the snapshot.
pub type RestaurantSnapshot = Restaurant;

named!(Restaurant => "RestaurantSnapshot");

impl Restaurant {
    pub fn meal_of(&self, person: &str) -> Option<&str> {
        self.subscriptions.get(person).map(|s| s.meal.as_str())
    }

    fn create(&self, command: &Create) -> Result<Vec<PendingEvent>> {
        if self.created.is_some() {
            return Err(Error::validation(format!(
                "restaurant {} is already created",
                self.name
            )));
        }
        Ok(vec![PendingEvent::new(Created {
            restaurant: command.name.clone(),
            info: command.info.clone(),
            menu: command.menu.clone(),
            at: Utc::now(),
        })])
    }

    fn select_meal(&self, command: &SelectMeal) -> Result<Vec<PendingEvent>> {
        if self.canceled.is_some() {
            return Err(Error::validation(format!(
                "{} subscriptions has been canceled",
                self.name
            )));
        }
        if !self.menu.contains(&command.meal) {
            return Err(Error::validation(format!(
                "{} is not on the {} menu",
                command.meal, self.name
            )));
        }

        let event = match self.subscriptions.get(&command.person) {
            Some(previous) => PendingEvent::new(MealChanged {
                person: command.person.clone(),
                previous_meal: previous.meal.clone(),
                actual_meal: command.meal.clone(),
                at: Utc::now(),
            }),
            None => PendingEvent::new(MealSelected {
                person: command.person.clone(),
                meal: command.meal.clone(),
                at: Utc::now(),
            }),
        };
        Ok(vec![event])
    }

    fn schedule(&self, command: &Schedule) -> Result<Vec<PendingEvent>> {
        if command.on <= Utc::now() {
            return Err(Error::validation(format!(
                "restaurant {} can not be scheduled in past",
                self.name
            )));
        }
        if self.canceled.is_some() {
            return Err(Error::validation(format!(
                "restaurant {} has been canceled",
                self.name
            )));
        }
        if let Some(on) = self.scheduled {
            return Err(Error::validation(format!(
                "restaurant {} is already scheduled for {}",
                self.name,
                on.format("%Y-%m-%d")
            )));
        }
        Ok(vec![PendingEvent::new(Scheduled { on: command.on })])
    }

    fn reschedule(&self, command: &Reschedule) -> Result<Vec<PendingEvent>> {
        if self.canceled.is_some() {
            return Err(Error::validation(format!("{} is canceled", self.name)));
        }
        Ok(vec![PendingEvent::new(Rescheduled { on: command.on })])
    }

    fn cancel(&self, _: &Cancel) -> Result<Vec<PendingEvent>> {
        if self.created.is_none() {
            return Err(Error::validation("not created yet"));
        }
        if self.canceled.is_some() {
            return Err(Error::validation(format!("{} already canceled", self.name)));
        }
        Ok(vec![PendingEvent::new(Canceled {
            restaurant: self.name.clone(),
            people: self.subscriptions.keys().cloned().collect(),
            at: Utc::now(),
        })])
    }
}

impl Aggregate for Restaurant {
    const TYPE: &'static str = "restaurant";

    fn register(handlers: &mut Handlers<Self>) -> Result<()> {
        handlers
            .command(Restaurant::create)?
            .command(Restaurant::select_meal)?
            .command(Restaurant::schedule)?
            .command(Restaurant::reschedule)?
            .command(Restaurant::cancel)?;

        handlers
            .event(|r: &mut Restaurant, e: &Created| {
                r.name = e.restaurant.clone();
                r.info = e.info.clone();
                r.menu = e.menu.clone();
                r.subscriptions.clear();
                r.created = Some(e.at);
            })?
            .event(|r: &mut Restaurant, e: &MealSelected| {
                r.subscriptions.insert(
                    e.person.clone(),
                    Selection {
                        meal: e.meal.clone(),
                        on: e.at,
                    },
                );
            })?
            .event(|r: &mut Restaurant, e: &MealChanged| {
                r.subscriptions.insert(
                    e.person.clone(),
                    Selection {
                        meal: e.actual_meal.clone(),
                        on: e.at,
                    },
                );
            })?
            .event(|r: &mut Restaurant, e: &Scheduled| r.scheduled = Some(e.on))?
            .event(|r: &mut Restaurant, e: &Rescheduled| r.scheduled = Some(e.on))?
            .event(|r: &mut Restaurant, e: &Canceled| r.canceled = Some(e.at))?;
        Ok(())
    }
}

impl Snapshottable for Restaurant {
    type Snapshot = RestaurantSnapshot;

    fn take_snapshot(&self) -> RestaurantSnapshot {
        self.clone()
    }

    fn restore_snapshot(&mut self, snapshot: RestaurantSnapshot) -> Result<()> {
        *self = snapshot;
        Ok(())
    }
}
