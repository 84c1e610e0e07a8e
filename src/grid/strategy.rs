//! Grid geometry - level calculation and replacement placement

use super::config::{round_to_decimals, BoundaryPolicy, GridConfig, MAX_GRID_LEVELS};
use super::errors::{GridError, GridResult};
use super::types::OrderSide;

/// Where the order replacing a fill should go
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Replacement {
    /// Place `side` at level `index`
    Place { index: usize, price: f64, side: OrderSide },
    /// The adjacent level is off the grid; nothing to place
    OffGrid,
}

/// Evenly spaced, ascending grid prices
#[derive(Debug, Clone, PartialEq)]
pub struct GridLevels {
    prices: Vec<f64>,
}

impl GridLevels {
    /// Calculate the levels for a configuration
    ///
    /// `price[i] = lower + i * (upper - lower) / (levels - 1)`, rounded to
    /// the configured decimals.
    pub fn compute(config: &GridConfig) -> GridResult<Self> {
        Ok(Self {
            prices: compute_levels(
                config.grid_lower,
                config.grid_upper,
                config.grid_levels,
                config.price_decimals,
            )?,
        })
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Index of the level for `price`
    ///
    /// An exact match wins. Otherwise the level with the smallest absolute
    /// distance is chosen, and on a tie the lower index (lower price) wins.
    pub fn nearest_index(&self, price: f64) -> Option<usize> {
        if let Some(idx) = self.prices.iter().position(|p| *p == price) {
            return Some(idx);
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, level) in self.prices.iter().enumerate() {
            let distance = (level - price).abs();
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((idx, distance)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Compute the order that replaces a fill
    ///
    /// A filled buy is replaced by a sell one level up, a filled sell by a
    /// buy one level down. Off the edge, [`BoundaryPolicy::Rearm`] puts the
    /// filled side back on the edge level instead.
    pub fn replacement(&self, filled_side: OrderSide, filled_price: f64, policy: BoundaryPolicy) -> Replacement {
        let Some(current) = self.nearest_index(filled_price) else {
            return Replacement::OffGrid;
        };

        let adjacent = match filled_side {
            OrderSide::Buy => current.checked_add(1).filter(|idx| *idx < self.prices.len()),
            OrderSide::Sell => current.checked_sub(1),
        };

        match (adjacent, policy) {
            (Some(index), _) => Replacement::Place {
                index,
                price: self.prices[index],
                side: filled_side.opposite(),
            },
            (None, BoundaryPolicy::Rearm) => Replacement::Place {
                index: current,
                price: self.prices[current],
                side: filled_side,
            },
            (None, BoundaryPolicy::Leak) => Replacement::OffGrid,
        }
    }
}

/// Linear grid prices between `lower` and `upper`, both included
pub fn compute_levels(lower: f64, upper: f64, levels: u32, price_decimals: u32) -> GridResult<Vec<f64>> {
    if levels < 2 {
        return Err(GridError::InvalidRange(format!(
            "grid needs at least 2 levels, got {}",
            levels
        )));
    }
    if levels > MAX_GRID_LEVELS {
        return Err(GridError::InvalidRange(format!(
            "grid allows at most {} levels, got {}",
            MAX_GRID_LEVELS, levels
        )));
    }
    if !(lower < upper) {
        return Err(GridError::InvalidRange(format!(
            "lower price {} must be below upper price {}",
            lower, upper
        )));
    }

    let ticks = (upper - lower) * 10f64.powi(price_decimals as i32);
    if f64::from(levels - 1) > ticks {
        return Err(GridError::InvalidRange(format!(
            "{} levels between {} and {} collapse at {} decimals",
            levels, lower, upper, price_decimals
        )));
    }

    let step = (upper - lower) / (levels - 1) as f64;
    let prices: Vec<f64> = (0..levels)
        .map(|i| round_to_decimals(lower + step * i as f64, price_decimals))
        .collect();

    if prices.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(GridError::InvalidRange(format!(
            "{} levels between {} and {} collapse at {} decimals",
            levels, lower, upper, price_decimals
        )));
    }

    Ok(prices)
}

/// Side an initial order takes at `level_price`; `None` at the current price
pub fn initial_side(level_price: f64, current_price: f64) -> Option<OrderSide> {
    if level_price < current_price {
        Some(OrderSide::Buy)
    } else if level_price > current_price {
        Some(OrderSide::Sell)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::config::MarketCategory;

    fn levels(prices: &[f64]) -> GridLevels {
        GridLevels { prices: prices.to_vec() }
    }

    #[test]
    fn test_five_levels_exact() {
        let prices = compute_levels(100.0, 200.0, 5, 2).unwrap();
        assert_eq!(prices, vec![100.0, 125.0, 150.0, 175.0, 200.0]);
    }

    #[test]
    fn test_levels_strictly_increasing_and_rounded() {
        let prices = compute_levels(218.5, 241.5, 7, 2).unwrap();
        assert_eq!(prices.len(), 7);
        assert_eq!(prices[0], 218.5);
        assert_eq!(prices[6], 241.5);
        for pair in prices.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        for p in &prices {
            assert_eq!(*p, round_to_decimals(*p, 2));
        }
    }

    #[test]
    fn test_invalid_range() {
        assert!(matches!(compute_levels(100.0, 200.0, 1, 2), Err(GridError::InvalidRange(_))));
        assert!(matches!(compute_levels(200.0, 200.0, 5, 2), Err(GridError::InvalidRange(_))));
        assert!(matches!(compute_levels(300.0, 200.0, 5, 2), Err(GridError::InvalidRange(_))));
        // 0.01 wide range cannot hold 5 distinct two-decimal prices
        assert!(matches!(compute_levels(1.00, 1.01, 5, 2), Err(GridError::InvalidRange(_))));
    }

    #[test]
    fn test_level_count_capped_before_allocation() {
        assert!(matches!(
            compute_levels(0.0, 1e12, 4_000_000_000, 2),
            Err(GridError::InvalidRange(_))
        ));
        let prices = compute_levels(0.0, 1e12, MAX_GRID_LEVELS, 2).unwrap();
        assert_eq!(prices.len(), MAX_GRID_LEVELS as usize);
    }

    #[test]
    fn test_compute_from_config() {
        let config = GridConfig::new("BTCUSDT", MarketCategory::Spot, 3, 10.0, 20.0, 1.0);
        let grid = GridLevels::compute(&config).unwrap();
        assert_eq!(grid.prices(), &[10.0, 15.0, 20.0]);
        assert!(!grid.is_empty());

        let config = GridConfig::new("ADAUSDT", MarketCategory::Spot, 3, 0.1, 0.2, 1.0).with_price_decimals(0);
        assert!(matches!(GridLevels::compute(&config), Err(GridError::InvalidRange(_))));
        let grid = GridLevels::compute(&config.with_price_decimals(3)).unwrap();
        assert_eq!(grid.prices(), &[0.1, 0.15, 0.2]);
    }

    #[test]
    fn test_nearest_index_exact_and_nearest() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(grid.nearest_index(150.0), Some(2));
        assert_eq!(grid.nearest_index(151.0), Some(2));
        assert_eq!(grid.nearest_index(10.0), Some(0));
        assert_eq!(grid.nearest_index(999.0), Some(4));
    }

    #[test]
    fn test_nearest_index_tie_prefers_lower() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        // 137.5 is exactly between 125 and 150
        assert_eq!(grid.nearest_index(137.5), Some(1));
        assert_eq!(grid.nearest_index(187.5), Some(3));
    }

    #[test]
    fn test_buy_fill_places_sell_above() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(
            grid.replacement(OrderSide::Buy, 125.0, BoundaryPolicy::Leak),
            Replacement::Place { index: 2, price: 150.0, side: OrderSide::Sell }
        );
    }

    #[test]
    fn test_sell_fill_places_buy_below() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(
            grid.replacement(OrderSide::Sell, 200.0, BoundaryPolicy::Leak),
            Replacement::Place { index: 3, price: 175.0, side: OrderSide::Buy }
        );
    }

    #[test]
    fn test_edge_fills_leak() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(grid.replacement(OrderSide::Buy, 200.0, BoundaryPolicy::Leak), Replacement::OffGrid);
        assert_eq!(grid.replacement(OrderSide::Sell, 100.0, BoundaryPolicy::Leak), Replacement::OffGrid);
    }

    #[test]
    fn test_edge_fills_rearm() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(
            grid.replacement(OrderSide::Buy, 200.0, BoundaryPolicy::Rearm),
            Replacement::Place { index: 4, price: 200.0, side: OrderSide::Buy }
        );
        assert_eq!(
            grid.replacement(OrderSide::Sell, 100.0, BoundaryPolicy::Rearm),
            Replacement::Place { index: 0, price: 100.0, side: OrderSide::Sell }
        );
    }

    #[test]
    fn test_mismatched_fill_uses_nearest_level() {
        let grid = levels(&[100.0, 125.0, 150.0, 175.0, 200.0]);
        // 137.5 ties between 125 and 150; lower wins, so the sell goes to 150
        assert_eq!(
            grid.replacement(OrderSide::Buy, 137.5, BoundaryPolicy::Leak),
            Replacement::Place { index: 2, price: 150.0, side: OrderSide::Sell }
        );
    }

    #[test]
    fn test_initial_side() {
        assert_eq!(initial_side(100.0, 150.0), Some(OrderSide::Buy));
        assert_eq!(initial_side(200.0, 150.0), Some(OrderSide::Sell));
        assert_eq!(initial_side(150.0, 150.0), None);
    }
}
