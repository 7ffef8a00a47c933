//! Serializable session state.
//!
//! A snapshot carries everything a session accumulates: the route shape,
//! the position, every variable value and the time accounting. The test
//! definition and the engine configuration are supplied again on restore.
//! The random generator is not captured; a restored session draws from a
//! fresh generator seeded by its configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::{AssessmentTest, Value};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::item::{ItemSession, ItemSessionState};
use super::timing::Timing;
use super::{SessionState, TestSession};
use crate::config::EngineConfig;
use crate::error::NavigationError;
use crate::expression::Environment;
use crate::route::{Route, RouteEntry};
use crate::variable::State;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSnapshot {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub status: ItemSessionState,
    pub attempts: u32,
    pub presented: bool,
    pub responded: bool,
    pub pending: bool,
    #[serde(default)]
    pub instantiated: bool,
    #[serde(default)]
    pub interrupted: bool,
    pub duration: Duration,
    pub variables: BTreeMap<String, VariableSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub test: String,
    pub state: SessionState,
    pub position: usize,
    pub route: Vec<RouteEntry>,
    pub test_variables: BTreeMap<String, VariableSnapshot>,
    pub items: Vec<ItemSnapshot>,
    pub durations: BTreeMap<String, Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_instant: Option<OffsetDateTime>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<SessionSnapshot, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn capture(state: &State) -> BTreeMap<String, VariableSnapshot> {
    state
        .iter()
        .map(|v| {
            (
                v.identifier.clone(),
                VariableSnapshot {
                    value: v.value.clone(),
                    default_value: v.default_value.clone(),
                    correct_response: v.correct_response.clone(),
                },
            )
        })
        .collect()
}

/// Apply captured values over freshly declared variables. Every captured
/// variable must still be declared and every value must fit it.
fn apply(
    state: &mut State,
    captured: &BTreeMap<String, VariableSnapshot>,
    owner: &str,
) -> Result<(), NavigationError> {
    for (identifier, snap) in captured {
        let mismatch = |what: String| NavigationError::SnapshotMismatch {
            message: format!("{owner}: variable '{identifier}' {what}"),
        };
        let var = state
            .get_mut(identifier)
            .ok_or_else(|| mismatch("is not declared".to_string()))?;
        let fit = |value: &Value| {
            var.coerce(value.clone())
                .map_err(|m| mismatch(format!("expects {}, snapshot has {}", m.expected, m.actual)))
        };
        let value = fit(&snap.value)?;
        let default_value = snap.default_value.as_ref().map(&fit).transpose()?;
        let correct_response = snap.correct_response.as_ref().map(fit).transpose()?;
        var.value = value;
        var.default_value = default_value;
        var.correct_response = correct_response;
    }
    Ok(())
}

impl TestSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            test: self.test.identifier.clone(),
            state: self.state,
            position: self.position,
            route: self.route.entries(),
            test_variables: capture(&self.test_state),
            items: self
                .items
                .iter()
                .map(|s| ItemSnapshot {
                    status: s.status,
                    attempts: s.attempts,
                    presented: s.presented,
                    responded: s.responded,
                    pending: s.pending,
                    instantiated: s.instantiated,
                    interrupted: s.interrupted,
                    duration: s.duration,
                    variables: capture(&s.variables),
                })
                .collect(),
            durations: self.timing.durations.clone(),
            last_instant: self.timing.last,
        }
    }

    /// Rebuild a session of `test` from `snapshot`. Template processing is
    /// not run again; the captured values stand.
    pub fn restore(
        test: Arc<AssessmentTest>,
        config: EngineConfig,
        snapshot: &SessionSnapshot,
    ) -> Result<TestSession, NavigationError> {
        let mismatch = |message: String| NavigationError::SnapshotMismatch { message };
        if snapshot.test != test.identifier {
            return Err(mismatch(format!(
                "snapshot of test '{}' cannot restore test '{}'",
                snapshot.test, test.identifier
            )));
        }
        let route = Route::from_entries(&test, &snapshot.route)?;
        if snapshot.items.len() != route.len() {
            return Err(mismatch(format!(
                "{} item sessions for a route of {}",
                snapshot.items.len(),
                route.len()
            )));
        }
        if !route.is_empty() && snapshot.position >= route.len() {
            return Err(mismatch(format!("position {} is off the route", snapshot.position)));
        }

        let mut items = Vec::with_capacity(route.len());
        for (route_item, snap) in route.iter().zip(&snapshot.items) {
            let mut session = ItemSession::declared(
                Arc::clone(&route_item.item_ref.item),
                route_item.session_control(),
            );
            apply(&mut session.variables, &snap.variables, &route_item.key())?;
            session.status = snap.status;
            session.attempts = snap.attempts;
            session.presented = snap.presented;
            session.responded = snap.responded;
            session.pending = snap.pending;
            session.instantiated = snap.instantiated;
            session.interrupted = snap.interrupted;
            session.duration = snap.duration;
            items.push(session);
        }

        let mut test_state = State::for_test(&test);
        apply(&mut test_state, &snapshot.test_variables, &test.identifier)?;

        debug!(test = %test.identifier, position = snapshot.position, "test session restored");
        Ok(TestSession {
            test,
            route,
            position: snapshot.position,
            state: snapshot.state,
            test_state,
            items,
            timing: Timing {
                durations: snapshot.durations.clone(),
                last: snapshot.last_instant,
            },
            env: Environment::new(config),
        })
    }
}
