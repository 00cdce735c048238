use rand::Rng;

use shared::domain::{tags, Dish, EventFlags};

/// How a triggered event builds the order it hands the player.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBehavior {
    /// Re-issue the previous completed order with every dish doubled.
    DoublePrevious,
    /// A single scripted dish replaces the generated order.
    FixedDish(Dish),
    /// Generate a regular order, then halve it.
    HalfNewOrder,
}

#[derive(Debug, Clone)]
pub struct SpecialOrder {
    pub tag: &'static str,
    pub probability: f64,
    pub min_order_index: i64,
    pub max_order_index: i64,
    pub behavior: EventBehavior,
}

impl SpecialOrder {
    fn window_contains(&self, order_index: i64) -> bool {
        order_index >= self.min_order_index && order_index <= self.max_order_index
    }
}

/// The scripted event table in priority order.
pub fn standard_events() -> Vec<SpecialOrder> {
    vec![
        SpecialOrder {
            tag: tags::DIRTY_PLATE,
            probability: 0.15,
            min_order_index: 3,
            max_order_index: 40,
            behavior: EventBehavior::DoublePrevious,
        },
        SpecialOrder {
            tag: tags::STUDENT,
            probability: 0.12,
            min_order_index: 3,
            max_order_index: 40,
            behavior: EventBehavior::FixedDish(Dish::new("Instant Noodles", 100)),
        },
        SpecialOrder {
            tag: tags::CRITIC,
            probability: 0.10,
            min_order_index: 20,
            max_order_index: 40,
            behavior: EventBehavior::FixedDish(Dish::new("Oysters", 1000)),
        },
        SpecialOrder {
            tag: tags::SECOND_CHEF,
            probability: 0.12,
            min_order_index: 20,
            max_order_index: 40,
            behavior: EventBehavior::HalfNewOrder,
        },
    ]
}

/// Walk the table in priority order; the first event whose index window,
/// one-time flag and probability roll all pass wins, and later entries are
/// not evaluated.
pub fn pick_special<'a, R: Rng + ?Sized>(
    events: &'a [SpecialOrder],
    order_index: i64,
    flags: &EventFlags,
    rng: &mut R,
) -> Option<&'a SpecialOrder> {
    for event in events {
        if !event.window_contains(order_index) {
            continue;
        }
        if flags.is_done(event.tag) {
            continue;
        }
        if rng.gen::<f64>() < event.probability {
            return Some(event);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn certain(tag: &'static str, behavior: EventBehavior) -> SpecialOrder {
        SpecialOrder {
            tag,
            probability: 1.0,
            min_order_index: 1,
            max_order_index: 1000,
            behavior,
        }
    }

    #[test]
    fn first_eligible_event_wins() {
        let events = vec![
            certain(tags::STUDENT, EventBehavior::FixedDish(Dish::new("Noodles", 100))),
            certain(tags::CRITIC, EventBehavior::FixedDish(Dish::new("Oysters", 1000))),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pick_special(&events, 5, &EventFlags::default(), &mut rng)
            .expect("event should trigger");
        assert_eq!(picked.tag, tags::STUDENT);
    }

    #[test]
    fn done_flag_suppresses_event_even_at_certainty() {
        let events = vec![certain(
            tags::STUDENT,
            EventBehavior::FixedDish(Dish::new("Noodles", 100)),
        )];
        let flags = EventFlags {
            student_done: true,
            ..EventFlags::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_special(&events, 5, &flags, &mut rng).is_none());
    }

    #[test]
    fn index_window_gates_eligibility() {
        let mut event = certain(
            tags::CRITIC,
            EventBehavior::FixedDish(Dish::new("Oysters", 1000)),
        );
        event.min_order_index = 20;
        event.max_order_index = 40;
        let events = vec![event];
        let mut rng = StdRng::seed_from_u64(7);

        assert!(pick_special(&events, 19, &EventFlags::default(), &mut rng).is_none());
        assert!(pick_special(&events, 20, &EventFlags::default(), &mut rng).is_some());
        assert!(pick_special(&events, 40, &EventFlags::default(), &mut rng).is_some());
        assert!(pick_special(&events, 41, &EventFlags::default(), &mut rng).is_none());
    }

    #[test]
    fn standard_table_checks_dirty_plate_before_the_rest() {
        let events = standard_events();
        let order: Vec<&str> = events.iter().map(|event| event.tag).collect();
        assert_eq!(
            order,
            [tags::DIRTY_PLATE, tags::STUDENT, tags::CRITIC, tags::SECOND_CHEF]
        );
        assert!(events
            .iter()
            .all(|event| event.probability > 0.0 && event.probability < 1.0));
        assert!(events.iter().all(|event| event.max_order_index == 40));
    }

    #[test]
    fn zero_probability_never_triggers() {
        let mut event = certain(
            tags::STUDENT,
            EventBehavior::FixedDish(Dish::new("Noodles", 100)),
        );
        event.probability = 0.0;
        let events = vec![event];
        let mut rng = StdRng::seed_from_u64(7);
        for order_index in 1..=100 {
            assert!(pick_special(&events, order_index, &EventFlags::default(), &mut rng).is_none());
        }
    }
}
