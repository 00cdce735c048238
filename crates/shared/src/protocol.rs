use serde::{Deserialize, Serialize};

use crate::domain::{Dish, EventFlags, Order, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub user_id: UserId,
    pub first_name: String,
    pub level: i64,
    pub level_title: String,
    pub total_orders: i64,
    pub total_crosses: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    pub dishes: Vec<Dish>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub total: i64,
}

impl From<&Order> for OrderPayload {
    fn from(order: &Order) -> Self {
        Self {
            dishes: order.dishes.clone(),
            tag: order.tag.clone(),
            total: order.total(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum NewOrderOutcome {
    Created {
        order_number: i64,
        order: OrderPayload,
    },
    AlreadyActive {
        order: OrderPayload,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FinishOutcome {
    Completed(CompletionPayload),
    NoActiveOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub total_orders: i64,
    pub leveled_up: bool,
    pub level_title: String,
    pub total_crosses: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    GameComplete,
    GoldTrophy,
    DiamondTrophy,
}

impl Milestone {
    /// Presentation milestones keyed off the completed-order total.
    pub fn for_total(total_orders: i64) -> Option<Self> {
        match total_orders {
            40 => Some(Self::GameComplete),
            100 => Some(Self::GoldTrophy),
            200 => Some(Self::DiamondTrophy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingRow {
    pub user_id: UserId,
    pub first_name: String,
    pub level: i64,
    pub level_title: String,
    pub total_orders: i64,
    pub total_crosses: i64,
    pub flags: EventFlags,
}
