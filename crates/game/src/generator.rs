use rand::{seq::SliceRandom, Rng};

use shared::domain::{CompletedOrder, Dish, Order, Player};

use crate::{
    catalog::{DishCatalog, DISH_LEVEL_CAP, ORDER_SIZE},
    events::{pick_special, EventBehavior},
    GameRules,
};

/// Three dishes: one drawn from the player's current unlock tier, the rest
/// shuffled out of everything unlocked so far, all distinct by name. Thin
/// catalogs pad from the tier-0 menu in listed order.
pub fn generate_regular<R: Rng + ?Sized>(
    catalog: &DishCatalog,
    level: i64,
    rng: &mut R,
) -> Vec<Dish> {
    let dish_level = level.min(DISH_LEVEL_CAP);
    let opened = catalog.opened_pool(dish_level);
    let current_pool = {
        let pool = catalog.level_pool(dish_level);
        if pool.is_empty() {
            catalog.level_pool(0)
        } else {
            pool
        }
    };

    let mut take: Vec<Dish> = Vec::with_capacity(ORDER_SIZE);
    if let Some(cur) = current_pool.choose(rng) {
        take.push(cur.clone());
    }

    let mut pool: Vec<Dish> = Vec::new();
    for dish in &opened {
        let name_taken = take.iter().any(|taken| taken.name == dish.name);
        let name_pooled = pool.iter().any(|seen| seen.name == dish.name);
        if !name_taken && !name_pooled {
            pool.push(dish.clone());
        }
    }
    pool.shuffle(rng);
    for dish in pool {
        if take.len() == ORDER_SIZE {
            break;
        }
        take.push(dish);
    }

    if take.len() < ORDER_SIZE {
        for dish in catalog.level_pool(0) {
            if take.len() == ORDER_SIZE {
                break;
            }
            if take.iter().all(|taken| taken.name != dish.name) {
                take.push(dish.clone());
            }
        }
    }

    take
}

pub fn double_dishes(dishes: &[Dish]) -> Vec<Dish> {
    dishes
        .iter()
        .map(|dish| Dish::new(dish.name.clone(), dish.crosses * 2))
        .collect()
}

/// Halve every dish (floored, never below one cross), then push the flooring
/// shortfall onto the first dish so the order totals exactly half of the
/// original.
pub fn halve_dishes(dishes: &[Dish]) -> Vec<Dish> {
    let full_total: i64 = dishes.iter().map(|dish| dish.crosses).sum();
    let half_total = full_total / 2;
    let mut halved: Vec<Dish> = dishes
        .iter()
        .map(|dish| Dish::new(dish.name.clone(), (dish.crosses / 2).max(1)))
        .collect();
    let halved_total: i64 = halved.iter().map(|dish| dish.crosses).sum();
    if halved_total != half_total {
        if let Some(first) = halved.first_mut() {
            first.crosses = (first.crosses + half_total - halved_total).max(1);
        }
    }
    halved
}

/// The order-generation state machine. Pure: reads player state and the rule
/// tables, draws from `rng`, and returns the order to hand out. Persisting
/// it as the active order is the caller's job.
pub fn generate_order<R: Rng + ?Sized>(
    rules: &GameRules,
    player: &Player,
    last_order: Option<&CompletedOrder>,
    rng: &mut R,
) -> Order {
    let order_index = player.total_orders + 1;
    // Two special orders never run back to back, whatever the dice say.
    let follows_special = last_order.map_or(false, |last| last.tag.is_some());
    let special = if follows_special {
        None
    } else {
        pick_special(&rules.events, order_index, &player.flags, rng)
    };

    if let Some(event) = special {
        match &event.behavior {
            EventBehavior::DoublePrevious => {
                if let Some(last) = last_order {
                    if !last.dishes.is_empty() {
                        return Order::tagged(double_dishes(&last.dishes), event.tag);
                    }
                }
                // Nothing to double yet; hand out a regular order instead.
            }
            EventBehavior::FixedDish(dish) => {
                return Order::tagged(vec![dish.clone()], event.tag);
            }
            EventBehavior::HalfNewOrder => {
                let dishes = generate_regular(&rules.catalog, player.level, rng);
                return Order::tagged(halve_dishes(&dishes), event.tag);
            }
        }
    }

    Order::regular(generate_regular(&rules.catalog, player.level, rng))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};
    use shared::domain::{tags, EventFlags, UserId};

    use super::*;
    use crate::events::SpecialOrder;

    fn player(level: i64, total_orders: i64, flags: EventFlags) -> Player {
        Player {
            user_id: UserId(1),
            first_name: "Alice".to_string(),
            level,
            total_orders,
            total_crosses: 0,
            flags,
        }
    }

    fn rules_with_events(events: Vec<SpecialOrder>) -> GameRules {
        GameRules {
            catalog: DishCatalog::standard(),
            events,
        }
    }

    fn certain_event(tag: &'static str, behavior: EventBehavior) -> SpecialOrder {
        SpecialOrder {
            tag,
            probability: 1.0,
            min_order_index: 1,
            max_order_index: 1000,
            behavior,
        }
    }

    fn last_order(dishes: Vec<Dish>, tag: Option<&str>) -> CompletedOrder {
        let crosses = dishes.iter().map(|dish| dish.crosses).sum();
        CompletedOrder {
            dishes,
            crosses,
            tag: tag.map(str::to_string),
            completed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn regular_order_has_three_distinct_dishes_at_every_level() {
        let catalog = DishCatalog::standard();
        for level in 0..=5_i64 {
            let mut rng = StdRng::seed_from_u64(level as u64);
            for _ in 0..50 {
                let dishes = generate_regular(&catalog, level, &mut rng);
                assert_eq!(dishes.len(), ORDER_SIZE);
                assert!(dishes.iter().all(|dish| dish.crosses >= 1));

                let mut names: Vec<&str> =
                    dishes.iter().map(|dish| dish.name.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                assert_eq!(names.len(), ORDER_SIZE, "duplicate dish at level {level}");

                // One dish always comes from the current unlock tier.
                let dish_level = level.min(DISH_LEVEL_CAP);
                let tier = catalog.level_pool(dish_level);
                assert!(
                    dishes
                        .iter()
                        .any(|dish| tier.iter().any(|t| t.name == dish.name)),
                    "no dish from tier {dish_level}"
                );
            }
        }
    }

    #[test]
    fn order_total_is_sum_of_dish_crosses() {
        let mut rng = StdRng::seed_from_u64(42);
        let rules = rules_with_events(Vec::new());
        let order = generate_order(&rules, &player(2, 7, EventFlags::default()), None, &mut rng);
        let sum: i64 = order.dishes.iter().map(|dish| dish.crosses).sum();
        assert_eq!(order.total(), sum);
        assert!(order.tag.is_none());
    }

    #[test]
    fn double_previous_doubles_every_dish_and_tags_the_order() {
        let rules = rules_with_events(vec![certain_event(
            tags::DIRTY_PLATE,
            EventBehavior::DoublePrevious,
        )]);
        let last = last_order(vec![Dish::new("A", 10), Dish::new("B", 20)], None);
        let mut rng = StdRng::seed_from_u64(1);

        let order = generate_order(
            &rules,
            &player(0, 3, EventFlags::default()),
            Some(&last),
            &mut rng,
        );
        assert_eq!(
            order.dishes,
            vec![Dish::new("A", 20), Dish::new("B", 40)]
        );
        assert_eq!(order.tag.as_deref(), Some(tags::DIRTY_PLATE));
        assert_eq!(order.total(), 60);
    }

    #[test]
    fn double_previous_without_last_order_falls_through_to_regular() {
        let rules = rules_with_events(vec![certain_event(
            tags::DIRTY_PLATE,
            EventBehavior::DoublePrevious,
        )]);
        let mut rng = StdRng::seed_from_u64(1);

        let order = generate_order(&rules, &player(0, 3, EventFlags::default()), None, &mut rng);
        assert!(order.tag.is_none());
        assert_eq!(order.dishes.len(), ORDER_SIZE);
    }

    #[test]
    fn fixed_dish_event_replaces_the_whole_order() {
        let rules = rules_with_events(vec![certain_event(
            tags::CRITIC,
            EventBehavior::FixedDish(Dish::new("Oysters", 1000)),
        )]);
        let mut rng = StdRng::seed_from_u64(1);

        let order = generate_order(&rules, &player(3, 25, EventFlags::default()), None, &mut rng);
        assert_eq!(order.dishes, vec![Dish::new("Oysters", 1000)]);
        assert_eq!(order.tag.as_deref(), Some(tags::CRITIC));
    }

    #[test]
    fn half_order_totals_exactly_half_of_the_unhalved_order() {
        let halved = halve_dishes(&[
            Dish::new("A", 9),
            Dish::new("B", 7),
            Dish::new("C", 5),
        ]);
        let total: i64 = halved.iter().map(|dish| dish.crosses).sum();
        assert_eq!(total, 10);
        assert!(halved.iter().all(|dish| dish.crosses >= 1));
        assert_eq!(halved[0].crosses, 5);
    }

    #[test]
    fn halving_never_drops_a_dish_below_one_cross() {
        let halved = halve_dishes(&[
            Dish::new("A", 1),
            Dish::new("B", 1),
            Dish::new("C", 1),
        ]);
        assert!(halved.iter().all(|dish| dish.crosses >= 1));
    }

    #[test]
    fn half_new_order_event_keeps_dishes_valid() {
        let rules = rules_with_events(vec![certain_event(
            tags::SECOND_CHEF,
            EventBehavior::HalfNewOrder,
        )]);
        let mut rng = StdRng::seed_from_u64(9);

        let order = generate_order(&rules, &player(4, 22, EventFlags::default()), None, &mut rng);
        assert_eq!(order.tag.as_deref(), Some(tags::SECOND_CHEF));
        assert_eq!(order.dishes.len(), ORDER_SIZE);
        assert!(order.dishes.iter().all(|dish| dish.crosses >= 1));
    }

    #[test]
    fn special_orders_never_follow_a_special_order() {
        let rules = rules_with_events(vec![certain_event(
            tags::STUDENT,
            EventBehavior::FixedDish(Dish::new("Instant Noodles", 100)),
        )]);
        let last = last_order(vec![Dish::new("Oysters", 1000)], Some(tags::CRITIC));
        let mut rng = StdRng::seed_from_u64(3);

        let order = generate_order(
            &rules,
            &player(0, 5, EventFlags::default()),
            Some(&last),
            &mut rng,
        );
        assert!(order.tag.is_none());
    }

    #[test]
    fn completed_flag_suppresses_the_event_at_certainty() {
        let rules = rules_with_events(vec![certain_event(
            tags::STUDENT,
            EventBehavior::FixedDish(Dish::new("Instant Noodles", 100)),
        )]);
        let flags = EventFlags {
            student_done: true,
            ..EventFlags::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        for total_orders in 0..30 {
            let order = generate_order(&rules, &player(1, total_orders, flags), None, &mut rng);
            assert!(order.tag.is_none());
        }
    }

    #[test]
    fn name_collisions_across_tiers_still_yield_distinct_names() {
        let catalog = DishCatalog::new(vec![
            vec![
                Dish::new("House Salad", 3),
                Dish::new("Tomato Soup", 3),
                Dish::new("Lemonade", 2),
            ],
            vec![Dish::new("House Salad", 9)],
        ]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let dishes = generate_regular(&catalog, 1, &mut rng);
            let mut names: Vec<&str> = dishes.iter().map(|dish| dish.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), dishes.len());
        }
    }
}
