//! The model graph: events, gate formulas, fault trees and CCF groups.
//!
//! Events live in an arena addressed by [`EventId`]. A [`Model`] is built
//! once through [`ModelBuilder`] and is immutable afterwards, so it can be
//! shared between analysis threads.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::ccf::CcfGroup;
use crate::error::ValidationError;
use crate::expression::{Deviate, Expression};
use crate::types::{EventId, FaultTreeId};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Connective {
    And,
    Or,
    /// At least `min` of the arguments.
    AtLeast(usize),
    Xor,
    Not,
    Nand,
    Nor,
    /// Pass-through of a single argument.
    Null,
}

impl Connective {
    /// Check the argument count, returning the violated rule.
    pub fn check_arity(&self, args: usize) -> Result<(), String> {
        let ok = match *self {
            Connective::And | Connective::Or | Connective::Nand | Connective::Nor => args >= 2,
            Connective::Xor => args == 2,
            Connective::Not | Connective::Null => args == 1,
            Connective::AtLeast(min) => min >= 2 && args > min,
        };
        if ok {
            return Ok(());
        }
        Err(match *self {
            Connective::And | Connective::Or | Connective::Nand | Connective::Nor => {
                "at least 2 arguments".to_string()
            }
            Connective::Xor => "exactly 2 arguments".to_string(),
            Connective::Not | Connective::Null => "exactly 1 argument".to_string(),
            Connective::AtLeast(min) if min < 2 => "a minimum of at least 2".to_string(),
            Connective::AtLeast(min) => format!("more than {} arguments", min),
        })
    }
}

impl Display for Connective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Connective::And => write!(f, "and"),
            Connective::Or => write!(f, "or"),
            Connective::AtLeast(min) => write!(f, "atleast {}", min),
            Connective::Xor => write!(f, "xor"),
            Connective::Not => write!(f, "not"),
            Connective::Nand => write!(f, "nand"),
            Connective::Nor => write!(f, "nor"),
            Connective::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Event(EventId),
    Formula(Formula),
}

impl From<EventId> for Arg {
    fn from(id: EventId) -> Self {
        Arg::Event(id)
    }
}

impl From<Formula> for Arg {
    fn from(formula: Formula) -> Self {
        Arg::Formula(formula)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub connective: Connective,
    pub args: Vec<Arg>,
}

impl Formula {
    pub fn new(connective: Connective, args: impl IntoIterator<Item = Arg>) -> Self {
        Self {
            connective,
            args: args.into_iter().collect(),
        }
    }

    pub fn and(args: impl IntoIterator<Item = Arg>) -> Self {
        Self::new(Connective::And, args)
    }
    pub fn or(args: impl IntoIterator<Item = Arg>) -> Self {
        Self::new(Connective::Or, args)
    }
    pub fn atleast(min: usize, args: impl IntoIterator<Item = Arg>) -> Self {
        Self::new(Connective::AtLeast(min), args)
    }
    pub fn xor(a: impl Into<Arg>, b: impl Into<Arg>) -> Self {
        Self::new(Connective::Xor, [a.into(), b.into()])
    }
    pub fn not(arg: impl Into<Arg>) -> Self {
        Self::new(Connective::Not, [arg.into()])
    }
    pub fn null(arg: impl Into<Arg>) -> Self {
        Self::new(Connective::Null, [arg.into()])
    }

    /// Event ids referenced anywhere in this formula, nested formulas
    /// included.
    pub fn events(&self) -> Vec<EventId> {
        let mut out = Vec::new();
        self.collect_events(&mut out);
        out
    }

    fn collect_events(&self, out: &mut Vec<EventId>) {
        for arg in &self.args {
            match arg {
                Arg::Event(id) => out.push(*id),
                Arg::Formula(f) => f.collect_events(out),
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Flavor {
    #[default]
    Basic,
    Undeveloped,
    Conditional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicEvent {
    pub flavor: Flavor,
    pub expression: Expression,
    pub uncertainty: Option<Deviate>,
}

impl BasicEvent {
    pub fn new(expression: Expression) -> Self {
        Self {
            flavor: Flavor::Basic,
            expression,
            uncertainty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    House(bool),
    Basic(BasicEvent),
    Gate(Formula),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub label: Option<String>,
    pub owner: Option<FaultTreeId>,
    pub kind: EventKind,
}

impl Event {
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, EventKind::Gate(_))
    }

    pub fn formula(&self) -> Option<&Formula> {
        match &self.kind {
            EventKind::Gate(formula) => Some(formula),
            _ => None,
        }
    }

    pub fn basic(&self) -> Option<&BasicEvent> {
        match &self.kind {
            EventKind::Basic(basic) => Some(basic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultTree {
    pub name: String,
    pub label: Option<String>,
    /// Gates owned by this tree, in insertion order.
    pub gates: Vec<EventId>,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    events: Vec<Event>,
    names: HashMap<String, EventId>,
    fault_trees: Vec<FaultTree>,
    ccf_groups: Vec<CcfGroup>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn contains(&self, id: EventId) -> bool {
        id.0 < self.events.len()
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    /// Like [`Model::event`], but reports foreign ids as a validation error.
    pub fn try_event(&self, id: EventId) -> Result<&Event, ValidationError> {
        self.events
            .get(id.0)
            .ok_or_else(|| ValidationError::UndefinedEvent(id.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<EventId> {
        self.names.get(name).copied()
    }

    pub fn events(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    pub fn fault_trees(&self) -> &[FaultTree] {
        &self.fault_trees
    }

    pub fn fault_tree(&self, name: &str) -> Option<&FaultTree> {
        self.fault_trees.iter().find(|ft| ft.name == name)
    }

    pub fn ccf_groups(&self) -> &[CcfGroup] {
        &self.ccf_groups
    }
}

/// Incremental constructor of a [`Model`].
///
/// Formulas may reference events that are defined later, which is also how
/// cyclic (invalid) models are expressed: add the gates, then rewire one of
/// them with [`ModelBuilder::set_formula`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            model: Model {
                name: name.into(),
                ..Model::default()
            },
        }
    }

    fn add_event(&mut self, name: String, kind: EventKind, owner: Option<FaultTreeId>) -> Result<EventId, ValidationError> {
        if self.model.names.contains_key(&name) {
            return Err(ValidationError::DuplicateEvent(name));
        }
        let id = EventId(self.model.events.len());
        self.model.names.insert(name.clone(), id);
        self.model.events.push(Event {
            name,
            label: None,
            owner,
            kind,
        });
        Ok(id)
    }

    pub fn add_fault_tree(&mut self, name: impl Into<String>) -> Result<FaultTreeId, ValidationError> {
        let name = name.into();
        if self.model.fault_trees.iter().any(|ft| ft.name == name) {
            return Err(ValidationError::DuplicateFaultTree(name));
        }
        self.model.fault_trees.push(FaultTree {
            name,
            label: None,
            gates: Vec::new(),
        });
        Ok(FaultTreeId(self.model.fault_trees.len() - 1))
    }

    pub fn add_house_event(&mut self, name: impl Into<String>, state: bool) -> Result<EventId, ValidationError> {
        self.add_event(name.into(), EventKind::House(state), None)
    }

    pub fn add_basic_event(&mut self, name: impl Into<String>, expression: Expression) -> Result<EventId, ValidationError> {
        self.add_event(name.into(), EventKind::Basic(BasicEvent::new(expression)), None)
    }

    pub fn add_basic_event_with(&mut self, name: impl Into<String>, basic: BasicEvent) -> Result<EventId, ValidationError> {
        self.add_event(name.into(), EventKind::Basic(basic), None)
    }

    /// Add a gate owned by fault tree `tree`.
    pub fn add_gate(&mut self, tree: FaultTreeId, name: impl Into<String>, formula: Formula) -> Result<EventId, ValidationError> {
        let id = self.add_event(name.into(), EventKind::Gate(formula), Some(tree))?;
        self.model.fault_trees[tree.0].gates.push(id);
        Ok(id)
    }

    /// Replace the formula of an existing gate.
    pub fn set_formula(&mut self, gate: EventId, formula: Formula) -> Result<(), ValidationError> {
        let event = self
            .model
            .events
            .get_mut(gate.0)
            .ok_or_else(|| ValidationError::UndefinedEvent(gate.to_string()))?;
        match &mut event.kind {
            EventKind::Gate(f) => {
                *f = formula;
                Ok(())
            }
            _ => Err(ValidationError::NotAGate(event.name.clone())),
        }
    }

    pub fn set_label(&mut self, event: EventId, label: impl Into<String>) -> Result<(), ValidationError> {
        let event = self
            .model
            .events
            .get_mut(event.0)
            .ok_or_else(|| ValidationError::UndefinedEvent(event.to_string()))?;
        event.label = Some(label.into());
        Ok(())
    }

    pub fn set_uncertainty(&mut self, event: EventId, deviate: Deviate) -> Result<(), ValidationError> {
        let event = self
            .model
            .events
            .get_mut(event.0)
            .ok_or_else(|| ValidationError::UndefinedEvent(event.to_string()))?;
        match &mut event.kind {
            EventKind::Basic(basic) => {
                basic.uncertainty = Some(deviate);
                Ok(())
            }
            _ => Err(ValidationError::NotABasicEvent(event.name.clone())),
        }
    }

    /// Register a common-cause group. The group itself is validated when a
    /// fault tree that uses its members is analyzed.
    pub fn add_ccf_group(&mut self, group: CcfGroup) -> Result<(), ValidationError> {
        if self.model.ccf_groups.iter().any(|g| g.name == group.name) {
            return Err(ValidationError::CcfGroup {
                group: group.name,
                reason: "duplicate group name".to_string(),
            });
        }
        self.model.ccf_groups.push(group);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<EventId> {
        self.model.lookup(name)
    }

    pub fn build(self) -> Model {
        self.model
    }
}
