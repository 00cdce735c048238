use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(UserId);

/// A player levels up after every this many completed orders.
pub const ORDERS_PER_LEVEL: i64 = 10;

/// Highest reachable level; the dish catalog defines tiers up to here.
pub const MAX_LEVEL: i64 = 4;

const LEVEL_TITLES: [&str; 5] = [
    "Trainee",
    "Kitchen Helper",
    "Cook",
    "Sous Chef",
    "Head Chef",
];

pub fn level_title(level: i64) -> String {
    usize::try_from(level)
        .ok()
        .and_then(|idx| LEVEL_TITLES.get(idx))
        .map(|title| (*title).to_string())
        .unwrap_or_else(|| format!("Level {level}"))
}

/// Identifiers for the scripted special orders. Orders persist the tag as a
/// plain string so an unknown stored tag degrades to a no-op instead of a
/// decode failure.
pub mod tags {
    pub const DIRTY_PLATE: &str = "dirty_plate";
    pub const STUDENT: &str = "student";
    pub const CRITIC: &str = "critic";
    pub const SECOND_CHEF: &str = "second_chef";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    pub crosses: i64,
}

impl Dish {
    pub fn new(name: impl Into<String>, crosses: i64) -> Self {
        Self {
            name: name.into(),
            crosses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub dishes: Vec<Dish>,
    pub tag: Option<String>,
}

impl Order {
    pub fn regular(dishes: Vec<Dish>) -> Self {
        Self { dishes, tag: None }
    }

    pub fn tagged(dishes: Vec<Dish>, tag: impl Into<String>) -> Self {
        Self {
            dishes,
            tag: Some(tag.into()),
        }
    }

    pub fn total(&self) -> i64 {
        self.dishes.iter().map(|dish| dish.crosses).sum()
    }
}

/// The most recently completed order, overwritten on every completion. Kept
/// around so the dirty-plate event can re-issue it doubled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub dishes: Vec<Dish>,
    pub crosses: i64,
    pub tag: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// One-time special event flags. Each transitions false -> true exactly once
/// and never reverts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFlags {
    pub student_done: bool,
    pub critic_done: bool,
    pub dirty_plate_done: bool,
    pub second_chef_done: bool,
}

impl EventFlags {
    pub fn is_done(&self, tag: &str) -> bool {
        match tag {
            tags::STUDENT => self.student_done,
            tags::CRITIC => self.critic_done,
            tags::DIRTY_PLATE => self.dirty_plate_done,
            tags::SECOND_CHEF => self.second_chef_done,
            _ => false,
        }
    }

    /// Unrecognized tags are ignored.
    pub fn mark_done(&mut self, tag: &str) {
        match tag {
            tags::STUDENT => self.student_done = true,
            tags::CRITIC => self.critic_done = true,
            tags::DIRTY_PLATE => self.dirty_plate_done = true,
            tags::SECOND_CHEF => self.second_chef_done = true,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,
    pub first_name: String,
    pub level: i64,
    pub total_orders: i64,
    pub total_crosses: i64,
    pub flags: EventFlags,
}
