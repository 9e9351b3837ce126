//! Common-cause failure groups.
//!
//! A group ties together basic events that can fail from a shared cause.
//! Expansion replaces every member with the OR of generated CCF events, one
//! per combination of members up to the model's maximum level; each
//! generated event's probability is a level-dependent share of the group's
//! total failure probability `Q`.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{ExpressionError, ValidationError};
use crate::expression::Expression;
use crate::model::Model;
use crate::types::EventId;
use crate::utils::{binomial, combinations};

/// Tolerance on the sum of phi factors.
const PHI_EPSILON: f64 = 1e-4;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CcfModel {
    /// One factor β; only independent failures and the failure of all
    /// members are modelled.
    BetaFactor,
    /// Multiple Greek letters: factors for levels `2..=m`.
    Mgl,
    /// Alpha factors for levels `1..=m`.
    AlphaFactor,
    /// Phi factors for levels `1..=m`, summing to 1.
    PhiFactor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CcfGroup {
    pub name: String,
    pub model: CcfModel,
    pub members: Vec<EventId>,
    /// Total failure probability `Q` of each member.
    pub distribution: Expression,
    pub factors: Vec<f64>,
}

impl CcfGroup {
    pub fn new(
        name: impl Into<String>,
        model: CcfModel,
        members: impl IntoIterator<Item = EventId>,
        distribution: Expression,
        factors: impl IntoIterator<Item = f64>,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            members: members.into_iter().collect(),
            distribution,
            factors: factors.into_iter().collect(),
        }
    }

    /// Largest number of members failing together from the common cause.
    pub fn max_level(&self) -> usize {
        match self.model {
            CcfModel::BetaFactor => self.members.len(),
            CcfModel::Mgl => self.factors.len() + 1,
            CcfModel::AlphaFactor | CcfModel::PhiFactor => self.factors.len(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::CcfGroup {
            group: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn validate(&self, model: &Model) -> Result<(), ValidationError> {
        if self.members.len() < 2 {
            return Err(self.error("at least 2 members are required"));
        }
        let mut seen = HashSet::new();
        for &id in &self.members {
            let event = model.try_event(id)?;
            if event.basic().is_none() {
                return Err(self.error(format!("member `{}` is not a basic event", event.name)));
            }
            if !seen.insert(id) {
                return Err(self.error(format!("duplicate member `{}`", event.name)));
            }
        }

        if self.model == CcfModel::BetaFactor && self.factors.len() != 1 {
            return Err(self.error("the beta-factor model takes exactly one factor"));
        }
        if self.factors.is_empty() {
            return Err(self.error("no factors given"));
        }
        let max_level = self.max_level();
        if max_level < 2 {
            return Err(self.error("factors must reach at least level 2"));
        }
        if max_level > self.members.len() {
            return Err(self.error(format!(
                "factor level {} exceeds the number of members {}",
                max_level,
                self.members.len()
            )));
        }
        if let Some(f) = self.factors.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(self.error(format!("factor {} is outside [0, 1]", f)));
        }
        if self.model == CcfModel::PhiFactor {
            let sum: f64 = self.factors.iter().sum();
            if (sum - 1.0).abs() > PHI_EPSILON {
                return Err(self.error(format!("phi factors sum to {} instead of 1", sum)));
            }
        }
        Ok(())
    }

    /// Share of `Q` taken by one CCF event of `level` members, or `None` when
    /// the model generates no events of that level.
    pub fn multiplier(&self, level: usize) -> Option<f64> {
        let n = self.members.len() as u64;
        let m = self.max_level();
        if level == 0 || level > m {
            return None;
        }
        let i = level - 1;
        let binom = binomial(n - 1, i as u64) as f64;
        match self.model {
            CcfModel::BetaFactor => {
                let beta = self.factors[0];
                if level == 1 {
                    Some(1.0 - beta)
                } else if level == m {
                    Some(beta)
                } else {
                    None
                }
            }
            CcfModel::Mgl => {
                let mut k: f64 = self.factors[..i].iter().product();
                if i < m - 1 {
                    k *= 1.0 - self.factors[i];
                }
                Some(k / binom)
            }
            CcfModel::AlphaFactor => {
                let sum: f64 = self.factors.iter().sum();
                if sum == 0.0 {
                    return Some(0.0);
                }
                Some(self.factors[i] / sum / binom)
            }
            CcfModel::PhiFactor => Some(self.factors[i]),
        }
    }
}

/// A generated common-cause event.
#[derive(Debug, Clone, PartialEq)]
pub struct CcfEvent {
    /// Member names in brackets, e.g. `[A B]`.
    pub name: String,
    pub members: Vec<EventId>,
    pub distribution: Expression,
    pub multiplier: f64,
}

impl CcfEvent {
    pub fn probability(&self, mission_time: f64) -> Result<f64, ExpressionError> {
        Ok(self.multiplier * self.distribution.probability(&self.name, mission_time)?)
    }
}

/// All CCF events of a model and the member-to-event mapping.
#[derive(Debug, Clone, Default)]
pub struct CcfExpansion {
    events: Vec<CcfEvent>,
    members: HashMap<EventId, Vec<usize>>,
    failures: HashMap<EventId, ValidationError>,
}

impl CcfExpansion {
    /// Expand every group of the model. Invalid groups are not expanded;
    /// their members remember the error so that only fault trees using
    /// them fail.
    pub fn new(model: &Model) -> Self {
        let mut expansion = Self::default();

        let mut owners: HashMap<EventId, usize> = HashMap::new();
        let mut shared = HashSet::new();
        for (g, group) in model.ccf_groups().iter().enumerate() {
            for &id in &group.members {
                if let Some(&other) = owners.get(&id) {
                    if other != g {
                        shared.insert(g);
                        shared.insert(other);
                    }
                } else {
                    owners.insert(id, g);
                }
            }
        }

        for (g, group) in model.ccf_groups().iter().enumerate() {
            let result = if shared.contains(&g) {
                Err(group.error("a member belongs to another CCF group"))
            } else {
                group.validate(model)
            };
            match result {
                Ok(()) => expansion.expand(model, group),
                Err(e) => {
                    debug!("CCF group `{}` rejected: {}", group.name, e);
                    for &id in &group.members {
                        expansion.failures.insert(id, e.clone());
                    }
                }
            }
        }

        expansion
    }

    fn expand(&mut self, model: &Model, group: &CcfGroup) {
        let n = group.members.len();
        let before = self.events.len();
        for level in 1..=group.max_level() {
            let Some(multiplier) = group.multiplier(level) else {
                continue;
            };
            for combination in combinations(n, level) {
                let members: Vec<EventId> = combination.iter().map(|&i| group.members[i]).collect();
                let names: Vec<&str> = members.iter().map(|&id| model.event(id).name.as_str()).collect();
                let index = self.events.len();
                for &id in &members {
                    self.members.entry(id).or_default().push(index);
                }
                self.events.push(CcfEvent {
                    name: format!("[{}]", names.join(" ")),
                    members,
                    distribution: group.distribution,
                    multiplier,
                });
            }
        }
        debug!(
            "CCF group `{}` expanded into {} events",
            group.name,
            self.events.len() - before
        );
    }

    pub fn events(&self) -> &[CcfEvent] {
        &self.events
    }

    pub fn event(&self, index: usize) -> &CcfEvent {
        &self.events[index]
    }

    /// CCF events replacing the basic event `id`: `None` if `id` is not a
    /// member of any group, an error if its group is invalid.
    pub fn replacement(&self, id: EventId) -> Option<Result<&[usize], ValidationError>> {
        if let Some(e) = self.failures.get(&id) {
            return Some(Err(e.clone()));
        }
        self.members.get(&id).map(|events| Ok(events.as_slice()))
    }
}
