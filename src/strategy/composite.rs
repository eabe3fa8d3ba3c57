//! Composite strategies: evaluate every child, keep one, clear the rest.

use crate::devices::types::hour_of_day;
use crate::error::{StrategyError, StrategyResult};
use crate::sim::types::{EnergyManagementState, SystemState};

use super::node::{Phase, StrategyNode};
use super::{OperationStrategy, Priority, StrategyReport};

/// Candidates with a magnitude at or below this count as "no action".
const ZERO_KW: f64 = 1e-9;

/// Rule picking the winning child of a composite for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionRule {
    /// Child 0 inside `[start_hour, end_hour)` of the day, child 1 outside.
    /// `start_hour > end_hour` wraps past midnight.
    TimeWindow { start_hour: f64, end_hour: f64 },
    /// Highest-priority child with a non-zero candidate; declaration order
    /// breaks ties. With all candidates zero, the highest-priority child.
    Priority,
}

impl SelectionRule {
    pub fn in_window(start_hour: f64, end_hour: f64, hour: f64) -> bool {
        if start_hour <= end_hour {
            hour >= start_hour && hour < end_hour
        } else {
            hour >= start_hour || hour < end_hour
        }
    }

    fn select(&self, time_s: f64, children: &[StrategyNode], candidates: &[f64]) -> usize {
        match *self {
            SelectionRule::TimeWindow {
                start_hour,
                end_hour,
            } => {
                if Self::in_window(start_hour, end_hour, hour_of_day(time_s)) {
                    0
                } else {
                    1
                }
            }
            SelectionRule::Priority => {
                let mut best_active: Option<usize> = None;
                let mut best_any = 0;
                for (i, child) in children.iter().enumerate() {
                    if child.priority() > children[best_any].priority() {
                        best_any = i;
                    }
                    if candidates[i].abs() <= ZERO_KW {
                        continue;
                    }
                    match best_active {
                        Some(b) if children[b].priority() >= child.priority() => {}
                        _ => best_active = Some(i),
                    }
                }
                best_active.unwrap_or(best_any)
            }
        }
    }
}

/// A strategy owning child strategies and dispatching exactly one per step.
///
/// Every child is evaluated each step so its own time series stays
/// continuous; the losers are cleared before `next` returns. `update` and
/// `close` reach every child regardless of the selection.
pub struct CompositeStrategy {
    name: String,
    rule: SelectionRule,
    children: Vec<StrategyNode>,
    selected: Option<usize>,
}

impl CompositeStrategy {
    /// Serial composite switching on a time-of-day window.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError::InvalidComposite` if the window hours are
    /// outside `[0, 24]` or empty.
    pub fn serial(
        name: impl Into<String>,
        start_hour: f64,
        end_hour: f64,
        in_window: Box<dyn OperationStrategy>,
        outside_window: Box<dyn OperationStrategy>,
    ) -> StrategyResult<Self> {
        let name = name.into();
        let valid_hour = |h: f64| (0.0..=24.0).contains(&h);
        if !valid_hour(start_hour) || !valid_hour(end_hour) || start_hour == end_hour {
            return Err(StrategyError::InvalidComposite {
                strategy: name,
                what: "window hours must lie in [0, 24] and differ",
            });
        }
        Ok(Self {
            name,
            rule: SelectionRule::TimeWindow {
                start_hour,
                end_hour,
            },
            children: vec![StrategyNode::new(in_window), StrategyNode::new(outside_window)],
            selected: None,
        })
    }

    /// Stacked composite selecting by priority.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError::InvalidComposite` if `children` is empty.
    pub fn stacked(
        name: impl Into<String>,
        children: Vec<Box<dyn OperationStrategy>>,
    ) -> StrategyResult<Self> {
        let name = name.into();
        if children.is_empty() {
            return Err(StrategyError::InvalidComposite {
                strategy: name,
                what: "needs at least one child",
            });
        }
        Ok(Self {
            name,
            rule: SelectionRule::Priority,
            children: children.into_iter().map(StrategyNode::new).collect(),
            selected: None,
        })
    }

    /// Current phase of every child, in declaration order.
    pub fn phases(&self) -> Vec<Phase> {
        self.children.iter().map(StrategyNode::phase).collect()
    }

    /// Index of the child selected in the current step, until `update`.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }
}

impl OperationStrategy for CompositeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.children
            .iter()
            .map(StrategyNode::priority)
            .max()
            .unwrap_or(Priority::Low)
    }

    fn next(
        &mut self,
        time_s: f64,
        state: &SystemState,
        power_request_kw: f64,
    ) -> StrategyResult<f64> {
        let mut candidates = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            candidates.push(child.evaluate(time_s, state, power_request_kw)?);
        }

        let winner = self.rule.select(time_s, &self.children, &candidates);
        for (i, child) in self.children.iter_mut().enumerate() {
            if i != winner {
                child.discard()?;
            }
        }
        self.selected = Some(winner);
        Ok(candidates[winner])
    }

    fn update(&mut self, ems: &EnergyManagementState) -> StrategyResult<()> {
        for child in &mut self.children {
            child.commit(ems)?;
        }
        self.selected = None;
        Ok(())
    }

    fn clear(&mut self) -> StrategyResult<()> {
        if let Some(winner) = self.selected.take() {
            self.children[winner].discard()?;
        }
        Ok(())
    }

    fn close(&mut self) -> StrategyResult<()> {
        for child in &mut self.children {
            child.close()?;
        }
        Ok(())
    }

    fn report(&self, path: &str, out: &mut Vec<StrategyReport>) {
        for child in &self.children {
            child.report(path, out);
        }
    }
}
