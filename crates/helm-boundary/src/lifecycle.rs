use chrono::DateTime;
use chrono::Utc;

use crate::error::BoundaryError;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Approved,
    Denied,
    Executing,
    Completed,
    Failed,
    Compensated,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Approved => "approved",
            LifecycleState::Denied => "denied",
            LifecycleState::Executing => "executing",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::Compensated => "compensated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Denied
                | LifecycleState::Completed
                | LifecycleState::Failed
                | LifecycleState::Compensated
        )
    }
}

/// `EffectLifecycle`. Created at submit; terminal when
/// `completed|failed|compensated|denied`.
#[derive(Debug, Clone)]
pub struct EffectLifecycle {
    pub effect_id: String,
    pub state: LifecycleState,
    pub pdp_decision_id: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub evidence_id: Option<String>,
    /// Set when `fail` is reached with a known cause (e.g. `"CANCELED"`).
    /// `None` for a plain executor failure.
    pub failure_cause: Option<String>,
}

impl EffectLifecycle {
    pub fn new(effect_id: impl Into<String>) -> Self {
        EffectLifecycle {
            effect_id: effect_id.into(),
            state: LifecycleState::Pending,
            pdp_decision_id: None,
            executed_at: None,
            completed_at: None,
            evidence_id: None,
            failure_cause: None,
        }
    }

    fn illegal(&self, attempted: &str) -> BoundaryError {
        BoundaryError::InvalidState(format!(
            "effect {} cannot {attempted} from state {}",
            self.effect_id,
            self.state.as_str()
        ))
    }

    /// PDP returned `ALLOW`, or an explicit out-of-band `Approve`. Only
    /// legal from `pending`.
    pub fn approve(&mut self, decision_id: impl Into<String>) -> Result<()> {
        if self.state != LifecycleState::Pending {
            return Err(self.illegal("approve"));
        }
        self.state = LifecycleState::Approved;
        self.pdp_decision_id = Some(decision_id.into());
        Ok(())
    }

    /// PDP returned `DENY`/error, or an explicit out-of-band `Deny`.
    /// Legal from `pending` or `approved`.
    pub fn deny(&mut self, decision_id: Option<String>) -> Result<()> {
        if !matches!(self.state, LifecycleState::Pending | LifecycleState::Approved) {
            return Err(self.illegal("deny"));
        }
        self.state = LifecycleState::Denied;
        if decision_id.is_some() {
            self.pdp_decision_id = decision_id;
        }
        Ok(())
    }

    /// Only legal from `approved`.
    pub fn execute(&mut self, executed_at: DateTime<Utc>) -> Result<()> {
        if self.state != LifecycleState::Approved {
            return Err(self.illegal("execute"));
        }
        self.state = LifecycleState::Executing;
        self.executed_at = Some(executed_at);
        Ok(())
    }

    /// Only legal from `executing`.
    pub fn complete(&mut self, evidence_pack_id: impl Into<String>, completed_at: DateTime<Utc>) -> Result<()> {
        if self.state != LifecycleState::Executing {
            return Err(self.illegal("complete"));
        }
        self.state = LifecycleState::Completed;
        self.evidence_id = Some(evidence_pack_id.into());
        self.completed_at = Some(completed_at);
        Ok(())
    }

    /// Execution failed mid-flight. Only legal from `executing`.
    pub fn fail(&mut self) -> Result<()> {
        self.fail_with_cause(None)
    }

    /// Same as [`Self::fail`], recording `cause` (e.g. a cancellation
    /// observed at a suspension point after execution had begun).
    pub fn fail_with_cause(&mut self, cause: Option<&str>) -> Result<()> {
        if self.state != LifecycleState::Executing {
            return Err(self.illegal("fail"));
        }
        self.state = LifecycleState::Failed;
        self.failure_cause = cause.map(str::to_string);
        Ok(())
    }

    /// A failed effect's side effects were reversed out-of-band. Only
    /// legal from `failed`.
    pub fn compensate(&mut self) -> Result<()> {
        if self.state != LifecycleState::Failed {
            return Err(self.illegal("compensate"));
        }
        self.state = LifecycleState::Compensated;
        Ok(())
    }
}
