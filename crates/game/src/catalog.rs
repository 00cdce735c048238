use shared::domain::Dish;

/// Selection never reads past this tier even when deeper tiers are defined.
pub const DISH_LEVEL_CAP: i64 = 3;

/// A regular order always carries this many dishes.
pub const ORDER_SIZE: usize = 3;

/// The menu, partitioned by the level at which each tier unlocks. Tier 0 is
/// always available and doubles as the deterministic padding pool.
#[derive(Debug, Clone)]
pub struct DishCatalog {
    by_level: Vec<Vec<Dish>>,
}

impl DishCatalog {
    pub fn new(by_level: Vec<Vec<Dish>>) -> Self {
        debug_assert!(
            by_level.iter().all(|dishes| !dishes.is_empty()),
            "every tier needs at least one dish"
        );
        Self { by_level }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            vec![
                Dish::new("Buttered Toast", 2),
                Dish::new("House Salad", 3),
                Dish::new("Tomato Soup", 3),
                Dish::new("Pancake Stack", 4),
                Dish::new("Grilled Cheese", 4),
                Dish::new("Lemonade", 2),
            ],
            vec![
                Dish::new("Herb Omelette", 5),
                Dish::new("Club Sandwich", 6),
                Dish::new("Caesar Salad", 6),
                Dish::new("Mushroom Risotto", 7),
            ],
            vec![
                Dish::new("Margherita Pizza", 8),
                Dish::new("Beef Burger", 9),
                Dish::new("Carbonara", 10),
            ],
            vec![
                Dish::new("Grilled Salmon", 12),
                Dish::new("Duck Confit", 14),
                Dish::new("Ribeye Steak", 16),
            ],
            vec![
                Dish::new("Lobster Thermidor", 20),
                Dish::new("Wagyu Tenderloin", 25),
            ],
        ])
    }

    /// Dishes unlocked at exactly `level`; empty when the tier is undefined.
    pub fn level_pool(&self, level: i64) -> &[Dish] {
        usize::try_from(level)
            .ok()
            .and_then(|idx| self.by_level.get(idx))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Everything unlocked at levels 0..=`dish_level`, concatenated in tier
    /// order.
    pub fn opened_pool(&self, dish_level: i64) -> Vec<Dish> {
        let mut opened = Vec::new();
        for level in 0..=dish_level {
            opened.extend_from_slice(self.level_pool(level));
        }
        opened
    }
}
