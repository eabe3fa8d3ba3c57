//! Per-step lifecycle enforcement for a single strategy.

use crate::error::{StrategyError, StrategyResult};
use crate::sim::types::{EnergyManagementState, SystemState};

use super::{OperationStrategy, Priority, StrategyReport};

/// Lifecycle state of a strategy node within one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// Start of a step; nothing evaluated yet.
    Idle,
    /// `next()` returned a candidate, nothing decided.
    Evaluated { setpoint_kw: f64 },
    /// Candidate was selected and `update()` persisted the outcome.
    Committed,
    /// Candidate was discarded via `clear()`.
    Cleared,
    /// Terminal, after `close()`.
    Closed,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Evaluated { .. } => "evaluated",
            Phase::Committed => "committed",
            Phase::Cleared => "cleared",
            Phase::Closed => "closed",
        }
    }
}

/// Wraps a strategy and enforces `Idle → Evaluated → Committed | Cleared`.
///
/// `Committed` and `Cleared` count as `Idle` for the next `evaluate`.
/// `Closed` is reached exactly once and accepts nothing afterwards.
pub struct StrategyNode {
    strategy: Box<dyn OperationStrategy>,
    phase: Phase,
    committed_steps: usize,
    cleared_steps: usize,
}

impl StrategyNode {
    pub fn new(strategy: Box<dyn OperationStrategy>) -> Self {
        Self {
            strategy,
            phase: Phase::Idle,
            committed_steps: 0,
            cleared_steps: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn priority(&self) -> Priority {
        self.strategy.priority()
    }

    pub fn strategy(&self) -> &dyn OperationStrategy {
        self.strategy.as_ref()
    }

    fn invalid(&self, event: &'static str) -> StrategyError {
        StrategyError::InvalidTransition {
            strategy: self.strategy.name().to_string(),
            phase: self.phase.label(),
            event,
        }
    }

    /// Calls `next()` and moves to `Evaluated`.
    pub fn evaluate(
        &mut self,
        time_s: f64,
        state: &SystemState,
        power_request_kw: f64,
    ) -> StrategyResult<f64> {
        match self.phase {
            Phase::Idle | Phase::Committed | Phase::Cleared => {}
            _ => return Err(self.invalid("evaluate")),
        }
        let setpoint_kw = self.strategy.next(time_s, state, power_request_kw)?;
        if !setpoint_kw.is_finite() {
            return Err(StrategyError::NonFiniteSetpoint {
                strategy: self.strategy.name().to_string(),
                value: setpoint_kw,
            });
        }
        self.phase = Phase::Evaluated { setpoint_kw };
        Ok(setpoint_kw)
    }

    /// Discards the evaluated candidate via `clear()`.
    pub fn discard(&mut self) -> StrategyResult<()> {
        if !matches!(self.phase, Phase::Evaluated { .. }) {
            return Err(self.invalid("discard"));
        }
        self.strategy.clear()?;
        self.phase = Phase::Cleared;
        self.cleared_steps += 1;
        Ok(())
    }

    /// Delivers the realized outcome via `update()`.
    ///
    /// An evaluated node becomes `Committed`; a cleared node still receives
    /// the update for its bookkeeping and stays `Cleared`.
    pub fn commit(&mut self, ems: &EnergyManagementState) -> StrategyResult<()> {
        match self.phase {
            Phase::Evaluated { .. } => {
                self.strategy.update(ems)?;
                self.phase = Phase::Committed;
                self.committed_steps += 1;
                Ok(())
            }
            Phase::Cleared => self.strategy.update(ems),
            _ => Err(self.invalid("commit")),
        }
    }

    /// Closes the strategy; legal once from any non-closed phase.
    pub fn close(&mut self) -> StrategyResult<()> {
        if self.phase == Phase::Closed {
            return Err(self.invalid("close"));
        }
        self.strategy.close()?;
        self.phase = Phase::Closed;
        Ok(())
    }

    /// Appends this node's counters, then its descendants'.
    pub fn report(&self, prefix: &str, out: &mut Vec<StrategyReport>) {
        let path = if prefix.is_empty() {
            self.name().to_string()
        } else {
            format!("{prefix}/{}", self.name())
        };
        out.push(StrategyReport {
            path: path.clone(),
            priority: self.priority(),
            committed_steps: self.committed_steps,
            cleared_steps: self.cleared_steps,
        });
        self.strategy.report(&path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::IdleStrategy;
    use crate::strategy::testing::{ems, state};

    fn node() -> StrategyNode {
        StrategyNode::new(Box::new(IdleStrategy::default()))
    }

    #[test]
    fn full_step_cycle() {
        let mut n = node();
        assert_eq!(n.phase(), Phase::Idle);
        n.evaluate(900.0, &state(0.5), 1.0).expect("idle → evaluated");
        assert_eq!(n.phase(), Phase::Evaluated { setpoint_kw: 0.0 });
        n.commit(&ems(900.0)).expect("evaluated → committed");
        assert_eq!(n.phase(), Phase::Committed);
        n.evaluate(1800.0, &state(0.5), 1.0).expect("committed → evaluated");
        n.discard().expect("evaluated → cleared");
        n.commit(&ems(1800.0)).expect("cleared still receives update");
        assert_eq!(n.phase(), Phase::Cleared);
    }

    #[test]
    fn double_evaluate_rejected() {
        let mut n = node();
        n.evaluate(900.0, &state(0.5), 0.0).expect("first evaluate");
        let err = n.evaluate(900.0, &state(0.5), 0.0);
        assert!(matches!(err, Err(StrategyError::InvalidTransition { event: "evaluate", .. })));
    }

    #[test]
    fn commit_before_evaluate_rejected() {
        let mut n = node();
        assert!(n.commit(&ems(900.0)).is_err());
    }

    #[test]
    fn discard_requires_evaluated() {
        let mut n = node();
        assert!(n.discard().is_err());
    }

    #[test]
    fn close_is_terminal_and_single() {
        let mut n = node();
        n.close().expect("first close");
        assert_eq!(n.phase(), Phase::Closed);
        assert!(n.close().is_err());
        assert!(n.evaluate(900.0, &state(0.5), 0.0).is_err());
    }

    #[test]
    fn report_counts_steps() {
        let mut n = node();
        n.evaluate(900.0, &state(0.5), 0.0).expect("evaluate");
        n.commit(&ems(900.0)).expect("commit");
        n.evaluate(1800.0, &state(0.5), 0.0).expect("evaluate");
        n.discard().expect("discard");
        let mut out = Vec::new();
        n.report("", &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "idle");
        assert_eq!(out[0].committed_steps, 1);
        assert_eq!(out[0].cleared_steps, 1);
    }
}
