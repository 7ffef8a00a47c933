//! Item sessions: one per route position.

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::declaration::{
    COMPLETION_COMPLETED, COMPLETION_NOT_ATTEMPTED, COMPLETION_STATUS, COMPLETION_UNKNOWN,
    DURATION, NUM_ATTEMPTS,
};
use qti_core::{AssessmentItem, ItemSessionControl, ProcessingKind, Value};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::debug;

use crate::error::{EvalError, NavigationError};
use crate::expression::Environment;
use crate::rules::{Flow, ProcessingEngine};
use crate::variable::{State, VariableKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemSessionState {
    Initial,
    Interacting,
    Suspended,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ItemSession {
    pub item: Arc<AssessmentItem>,
    pub variables: State,
    pub status: ItemSessionState,
    pub attempts: u32,
    pub presented: bool,
    pub responded: bool,
    /// Responses bound but not processed yet (simultaneous submission).
    pub pending: bool,
    /// Template processing has run.
    pub instantiated: bool,
    /// Left in the middle of an attempt; the attempt resumes on return.
    pub interrupted: bool,
    pub duration: Duration,
    pub control: ItemSessionControl,
}

impl ItemSession {
    /// Instantiate the item: declare its variables and run template
    /// processing. Responses and outcomes then take the defaults template
    /// processing may have set.
    pub fn new(
        item: Arc<AssessmentItem>,
        control: ItemSessionControl,
        env: &mut Environment,
    ) -> Result<Self, NavigationError> {
        let mut session = ItemSession::declared(item, control);
        session.instantiate(env)?;
        Ok(session)
    }

    /// Run template processing once; later calls do nothing.
    pub(crate) fn instantiate(&mut self, env: &mut Environment) -> Result<(), NavigationError> {
        if self.instantiated {
            return Ok(());
        }
        let item = Arc::clone(&self.item);
        let engine = ProcessingEngine::new(ProcessingKind::Template, &item.template_processing)
            .map_err(EvalError::from)?;
        engine.run(&mut self.variables, None, env)?;
        self.variables.reset(VariableKind::Response);
        self.variables.reset(VariableKind::Outcome);
        self.instantiated = true;
        Ok(())
    }

    /// The item's variables at their initial values, template processing
    /// not run.
    pub(crate) fn declared(item: Arc<AssessmentItem>, control: ItemSessionControl) -> Self {
        ItemSession {
            variables: State::for_item(&item),
            item,
            status: ItemSessionState::Initial,
            attempts: 0,
            presented: false,
            responded: false,
            pending: false,
            instantiated: false,
            interrupted: false,
            duration: Duration::ZERO,
            control,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.item.identifier
    }

    pub fn completion_status(&self) -> Option<&str> {
        self.variables.value(COMPLETION_STATUS).and_then(Value::as_str)
    }

    /// Whether another attempt may begin. Adaptive items are limited only
    /// by completion; others by `max_attempts`, where 0 is unlimited.
    pub fn can_attempt(&self) -> bool {
        if self.status == ItemSessionState::Closed {
            return false;
        }
        if self.item.adaptive {
            return self.completion_status() != Some(COMPLETION_COMPLETED);
        }
        self.control.max_attempts == 0 || self.attempts < self.control.max_attempts
    }

    pub fn begin_attempt(&mut self) -> Result<(), NavigationError> {
        if !self.can_attempt() {
            return Err(NavigationError::AttemptLimit {
                item: self.identifier().to_string(),
                max_attempts: self.control.max_attempts,
            });
        }
        self.attempts += 1;
        self.set(NUM_ATTEMPTS, Value::integer(i64::from(self.attempts)));
        if self.completion_status() == Some(COMPLETION_NOT_ATTEMPTED) {
            self.set(COMPLETION_STATUS, Value::identifier(COMPLETION_UNKNOWN));
        }
        self.status = ItemSessionState::Interacting;
        debug!(item = self.identifier(), attempt = self.attempts, "attempt begun");
        Ok(())
    }

    /// The item variables with `responses` bound. Nothing is stored; a
    /// failed binding leaves the session untouched.
    pub fn bind(&self, responses: &BTreeMap<String, Value>) -> Result<State, NavigationError> {
        let mut bound = self.variables.clone();
        for (identifier, value) in responses {
            let binding = |message: String| NavigationError::ResponseBinding {
                item: self.identifier().to_string(),
                identifier: identifier.clone(),
                message,
            };
            let var = bound
                .get_mut(identifier)
                .filter(|v| v.kind == VariableKind::Response)
                .filter(|v| v.identifier != NUM_ATTEMPTS && v.identifier != DURATION)
                .ok_or_else(|| binding("not a declared response variable".to_string()))?;
            var.assign(value.clone()).map_err(|m| {
                binding(format!("expected {}, got {}", m.expected, m.actual))
            })?;
        }
        Ok(bound)
    }

    /// Run response processing. Non-adaptive items are complete afterwards.
    pub fn process_responses(&mut self, env: &mut Environment) -> Result<Flow, NavigationError> {
        let item = Arc::clone(&self.item);
        let engine = ProcessingEngine::new(ProcessingKind::Response, &item.response_processing)
            .map_err(EvalError::from)?;
        let flow = engine.run(&mut self.variables, None, env)?;
        if !self.item.adaptive {
            self.set(COMPLETION_STATUS, Value::identifier(COMPLETION_COMPLETED));
        }
        self.pending = false;
        Ok(flow)
    }

    /// Status after an attempt ended.
    pub(crate) fn after_attempt(&mut self) {
        self.status = if self.can_attempt() {
            ItemSessionState::Suspended
        } else {
            ItemSessionState::Closed
        };
        self.interrupted = false;
    }

    pub fn close(&mut self) {
        self.status = ItemSessionState::Closed;
        self.interrupted = false;
    }

    /// Put aside an open attempt.
    pub(crate) fn interrupt(&mut self) {
        if self.status == ItemSessionState::Interacting {
            self.status = ItemSessionState::Suspended;
            self.interrupted = true;
        }
    }

    /// Continue the attempt put aside by `interrupt`.
    pub(crate) fn resume_attempt(&mut self) {
        if self.interrupted && self.status == ItemSessionState::Suspended {
            self.status = ItemSessionState::Interacting;
        }
        self.interrupted = false;
    }

    pub fn add_duration(&mut self, elapsed: Duration) {
        self.duration += elapsed;
        self.set(DURATION, Value::duration(self.duration));
    }

    /// Built-in variables always accept their own kind of value.
    fn set(&mut self, identifier: &str, value: Value) {
        if let Some(var) = self.variables.get_mut(identifier) {
            var.value = value;
        }
    }
}
