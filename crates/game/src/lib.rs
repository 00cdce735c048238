pub mod catalog;
pub mod events;
pub mod generator;

use std::sync::Arc;

use rand::thread_rng;
use tracing::{info, warn};

use shared::{
    domain::{level_title, Player, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        CompletionPayload, FinishOutcome, NewOrderOutcome, OrderPayload, PlayerSummary,
        StandingRow,
    },
};
use storage::{Storage, StoreError};

use crate::{
    catalog::DishCatalog,
    events::{standard_events, SpecialOrder},
    generator::generate_order,
};

/// The immutable game configuration: menu plus scripted event table. Built
/// once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct GameRules {
    pub catalog: DishCatalog,
    pub events: Vec<SpecialOrder>,
}

impl GameRules {
    pub fn standard() -> Self {
        Self {
            catalog: DishCatalog::standard(),
            events: standard_events(),
        }
    }
}

#[derive(Clone)]
pub struct GameContext {
    pub storage: Storage,
    pub rules: Arc<GameRules>,
}

pub async fn register_player(
    ctx: &GameContext,
    user_id: UserId,
    first_name: &str,
) -> Result<PlayerSummary, ApiError> {
    let player = ctx
        .storage
        .fetch_user(user_id, first_name)
        .await
        .map_err(store)?;
    info!(user_id = user_id.0, "player registered");
    Ok(summary(&player))
}

pub async fn player_summary(
    ctx: &GameContext,
    user_id: UserId,
) -> Result<Option<PlayerSummary>, ApiError> {
    let player = ctx.storage.get_user(user_id).await.map_err(store)?;
    Ok(player.as_ref().map(summary))
}

/// Hand the player their next order. An existing active order is returned
/// untouched; otherwise the generator runs against the player's state and
/// the result is persisted as the new active order.
pub async fn new_order(
    ctx: &GameContext,
    user_id: UserId,
    first_name: &str,
) -> Result<NewOrderOutcome, ApiError> {
    let player = ctx
        .storage
        .fetch_user(user_id, first_name)
        .await
        .map_err(store)?;

    if let Some(active) = ctx.storage.get_active_order(user_id).await.map_err(store)? {
        return Ok(NewOrderOutcome::AlreadyActive {
            order: OrderPayload::from(&active),
        });
    }

    let last_order = ctx.storage.get_last_order(user_id).await.map_err(store)?;
    let order = {
        let mut rng = thread_rng();
        generate_order(&ctx.rules, &player, last_order.as_ref(), &mut rng)
    };
    if let Some(tag) = order.tag.as_deref() {
        info!(user_id = user_id.0, tag, "special order triggered");
    }

    ctx.storage
        .save_active_order(user_id, &order)
        .await
        .map_err(store)?;

    Ok(NewOrderOutcome::Created {
        order_number: player.total_orders + 1,
        order: OrderPayload::from(&order),
    })
}

pub async fn current_order(
    ctx: &GameContext,
    user_id: UserId,
) -> Result<Option<OrderPayload>, ApiError> {
    let active = ctx.storage.get_active_order(user_id).await.map_err(store)?;
    Ok(active.as_ref().map(OrderPayload::from))
}

/// Complete the active order: score it, advance the player's counters and
/// level, and retain it as the last order for event chaining.
pub async fn finish_order(ctx: &GameContext, user_id: UserId) -> Result<FinishOutcome, ApiError> {
    let Some(active) = ctx.storage.get_active_order(user_id).await.map_err(store)? else {
        return Ok(FinishOutcome::NoActiveOrder);
    };

    let completion = ctx
        .storage
        .complete_order(user_id, active.tag.as_deref(), active.total())
        .await
        .map_err(store)?;
    if completion.leveled_up {
        info!(
            user_id = user_id.0,
            total_orders = completion.total_orders,
            title = %completion.level_title,
            "player leveled up"
        );
    }

    Ok(FinishOutcome::Completed(CompletionPayload {
        total_orders: completion.total_orders,
        leveled_up: completion.leveled_up,
        level_title: completion.level_title,
        total_crosses: completion.total_crosses,
        milestone: None,
    }))
}

pub async fn leaderboard(
    ctx: &GameContext,
    limit: Option<i64>,
) -> Result<Vec<StandingRow>, ApiError> {
    let players = ctx.storage.leaderboard(limit).await.map_err(store)?;
    Ok(players.iter().map(standing).collect())
}

pub async fn reset_all_players(ctx: &GameContext) -> Result<u64, ApiError> {
    let wiped = ctx.storage.reset_all().await.map_err(store)?;
    warn!(wiped, "all player progress wiped");
    Ok(wiped)
}

fn summary(player: &Player) -> PlayerSummary {
    PlayerSummary {
        user_id: player.user_id,
        first_name: player.first_name.clone(),
        level: player.level,
        level_title: level_title(player.level),
        total_orders: player.total_orders,
        total_crosses: player.total_crosses,
    }
}

fn standing(player: &Player) -> StandingRow {
    StandingRow {
        user_id: player.user_id,
        first_name: player.first_name.clone(),
        level: player.level,
        level_title: level_title(player.level),
        total_orders: player.total_orders,
        total_crosses: player.total_crosses,
        flags: player.flags,
    }
}

fn store(err: StoreError) -> ApiError {
    let code = match &err {
        StoreError::NotFound(_) => ErrorCode::NotFound,
        StoreError::Storage(_) => ErrorCode::Storage,
        StoreError::Serialization(_) => ErrorCode::Serialization,
    };
    ApiError::new(code, err.to_string())
}
