/// The default of [PlannerOptions::bound_column_discount].
pub const DEFAULT_BOUND_COLUMN_DISCOUNT: u64 = 1000;

/// Defines how much effort the planner spends on optimizing joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    /// Joins are evaluated in the given order and single-row operands are not unified.
    None,
    /// Single-row operands are unified, but the order of the remaining operands is kept.
    Default,
    /// Single-row operands are unified and the remaining operands are ordered by their
    /// estimated cost.
    #[default]
    Full,
}

/// Options for planning tuple operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerOptions {
    /// The defined optimization level
    pub optimization_level: OptimizationLevel,
    /// The factor by which the expected row count of a join operand is divided for each of its
    /// columns that is already bound when the operand is evaluated.
    pub bound_column_discount: u64,
}

impl PlannerOptions {
    /// Sets the [OptimizationLevel].
    #[must_use]
    pub fn with_optimization_level(mut self, optimization_level: OptimizationLevel) -> Self {
        self.optimization_level = optimization_level;
        self
    }

    /// Sets the discount per bound column.
    #[must_use]
    pub fn with_bound_column_discount(mut self, bound_column_discount: u64) -> Self {
        self.bound_column_discount = bound_column_discount;
        self
    }
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            bound_column_discount: DEFAULT_BOUND_COLUMN_DISCOUNT,
        }
    }
}
