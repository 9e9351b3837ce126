//! Structural validation of gate formulas and fault trees.
//!
//! Nothing here corrects the model: the first defect found is reported.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::ValidationError;
use crate::model::{Arg, FaultTree, Formula, Model};
use crate::types::EventId;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Color {
    Gray,
    Black,
}

/// Check the shape of one formula: arity, duplicate arguments, unknown
/// events and self-references, recursively through nested formulas.
fn check_formula(model: &Model, gate: EventId, name: &str, formula: &Formula) -> Result<(), ValidationError> {
    formula
        .connective
        .check_arity(formula.args.len())
        .map_err(|expected| ValidationError::Arity {
            gate: name.to_string(),
            connective: formula.connective.to_string(),
            args: formula.args.len(),
            expected,
        })?;

    let mut seen = HashSet::new();
    for arg in &formula.args {
        match arg {
            Arg::Event(id) => {
                let event = model.try_event(*id)?;
                if *id == gate {
                    return Err(ValidationError::SelfCycle(name.to_string()));
                }
                if !seen.insert(*id) {
                    return Err(ValidationError::DuplicateArgument {
                        gate: name.to_string(),
                        argument: event.name.clone(),
                    });
                }
            }
            Arg::Formula(nested) => check_formula(model, gate, name, nested)?,
        }
    }
    Ok(())
}

struct CycleFinder<'a> {
    model: &'a Model,
    colors: HashMap<EventId, Color>,
    stack: Vec<EventId>,
}

impl<'a> CycleFinder<'a> {
    fn new(model: &'a Model) -> Self {
        Self {
            model,
            colors: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn visit(&mut self, id: EventId) -> Result<(), ValidationError> {
        let event = self.model.try_event(id)?;
        let Some(formula) = event.formula() else {
            return Ok(());
        };

        match self.colors.get(&id) {
            Some(Color::Black) => return Ok(()),
            Some(Color::Gray) => {
                let start = self.stack.iter().position(|&g| g == id).unwrap_or(0);
                let mut path: Vec<String> = self.stack[start..]
                    .iter()
                    .map(|&g| self.model.event(g).name.clone())
                    .collect();
                path.push(event.name.clone());
                debug!("cycle through {:?}", path);
                return Err(ValidationError::Cycle { path });
            }
            None => {}
        }

        check_formula(self.model, id, &event.name, formula)?;

        self.colors.insert(id, Color::Gray);
        self.stack.push(id);
        for child in formula.events() {
            self.visit(child)?;
        }
        self.stack.pop();
        self.colors.insert(id, Color::Black);
        Ok(())
    }
}

/// Validate every gate of the model, whether or not a fault tree reaches it.
pub fn validate_model(model: &Model) -> Result<(), ValidationError> {
    let mut finder = CycleFinder::new(model);
    for (id, event) in model.events() {
        if event.is_gate() {
            finder.visit(id)?;
        }
    }
    Ok(())
}

/// The unique owned gate that no other owned gate references.
pub fn top_gate(model: &Model, tree: &FaultTree) -> Result<EventId, ValidationError> {
    let mut referenced = HashSet::new();
    for &gate in &tree.gates {
        if let Some(formula) = model.try_event(gate)?.formula() {
            referenced.extend(formula.events());
        }
    }
    let candidates: Vec<EventId> = tree.gates.iter().copied().filter(|g| !referenced.contains(g)).collect();
    match candidates.as_slice() {
        [top] => Ok(*top),
        _ => Err(ValidationError::TopGate {
            tree: tree.name.clone(),
            candidates: candidates.iter().map(|&g| model.event(g).name.clone()).collect(),
        }),
    }
}

/// Validate every gate owned by `tree` and everything they reach, then
/// find its top gate.
///
/// Cycles are searched first: a cycle through every candidate would
/// otherwise surface as a missing top gate.
pub fn validate_fault_tree(model: &Model, tree: &FaultTree) -> Result<EventId, ValidationError> {
    let mut finder = CycleFinder::new(model);
    for &gate in &tree.gates {
        finder.visit(gate)?;
    }
    top_gate(model, tree)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expression::Expression;
    use crate::model::{Connective, ModelBuilder};

    #[test]
    fn test_valid_tree() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let c = b.add_basic_event("C", Expression::Constant(0.1)).unwrap();
        let g = b.add_gate(ft, "G", Formula::and([a.into(), c.into()])).unwrap();
        let top = b.add_gate(ft, "Top", Formula::or([a.into(), g.into()])).unwrap();
        let model = b.build();

        let tree = &model.fault_trees()[0];
        assert_eq!(validate_fault_tree(&model, tree), Ok(top));
        assert_eq!(validate_model(&model), Ok(()));
    }

    #[test]
    fn test_cycles_of_every_length() {
        for n in 1..=5 {
            let mut b = ModelBuilder::new("m");
            let ft = b.add_fault_tree("FT").unwrap();
            let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
            let gates: Vec<EventId> = (0..n)
                .map(|i| b.add_gate(ft, format!("G{}", i), Formula::or([a.into(), a.into()])).unwrap())
                .collect();
            for i in 0..n {
                let next = gates[(i + 1) % n];
                b.set_formula(gates[i], Formula::or([a.into(), next.into()])).unwrap();
            }
            b.add_gate(ft, "Top", Formula::and([a.into(), gates[0].into()])).unwrap();
            let model = b.build();

            let err = validate_fault_tree(&model, &model.fault_trees()[0]).unwrap_err();
            if n == 1 {
                assert_eq!(err, ValidationError::SelfCycle("G0".into()));
            } else {
                let mut path: Vec<String> = (0..n).map(|i| format!("G{}", i)).collect();
                path.push("G0".into());
                assert_eq!(err, ValidationError::Cycle { path });
            }
        }
    }

    #[test]
    fn test_cycle_through_top_gate() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let c = b.add_basic_event("B", Expression::Constant(0.1)).unwrap();
        let top = b.add_gate(ft, "Top", Formula::not(a)).unwrap();
        let g1 = b.add_gate(ft, "G1", Formula::and([c.into(), top.into()])).unwrap();
        b.set_formula(top, Formula::or([a.into(), g1.into()])).unwrap();
        let model = b.build();

        let err = validate_fault_tree(&model, &model.fault_trees()[0]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Cycle {
                path: vec!["Top".into(), "G1".into(), "Top".into()]
            }
        );
    }

    #[test]
    fn test_lone_self_referencing_gate() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let s = b.add_gate(ft, "S", Formula::not(a)).unwrap();
        b.set_formula(s, Formula::or([a.into(), s.into()])).unwrap();
        let model = b.build();

        let err = validate_fault_tree(&model, &model.fault_trees()[0]).unwrap_err();
        assert_eq!(err, ValidationError::SelfCycle("S".into()));
    }

    #[test]
    fn test_self_cycle_in_nested_formula() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let g = b.add_gate(ft, "G", Formula::not(a)).unwrap();
        b.set_formula(g, Formula::or([a.into(), Formula::not(g).into()])).unwrap();
        let model = b.build();

        assert_eq!(validate_model(&model), Err(ValidationError::SelfCycle("G".into())));
    }

    #[test]
    fn test_arity() {
        let mut b = ModelBuilder::new("m");
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let c = b.add_basic_event("C", Expression::Constant(0.1)).unwrap();
        let cases = [
            Formula::atleast(2, [a.into(), c.into()]),
            Formula::and([a.into()]),
            Formula::new(Connective::Not, [a.into(), c.into()]),
        ];
        for (i, formula) in cases.into_iter().enumerate() {
            let ft = b.add_fault_tree(format!("FT{}", i)).unwrap();
            b.add_gate(ft, format!("G{}", i), formula).unwrap();
        }
        let model = b.build();

        for tree in model.fault_trees() {
            let err = validate_fault_tree(&model, tree).unwrap_err();
            assert!(matches!(err, ValidationError::Arity { .. }), "{}", err);
        }
    }

    #[test]
    fn test_duplicate_argument() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        b.add_gate(ft, "G", Formula::and([a.into(), a.into()])).unwrap();
        let model = b.build();

        assert_eq!(
            validate_fault_tree(&model, &model.fault_trees()[0]),
            Err(ValidationError::DuplicateArgument {
                gate: "G".into(),
                argument: "A".into()
            })
        );
    }

    #[test]
    fn test_top_gate() {
        let mut b = ModelBuilder::new("m");
        b.add_fault_tree("Empty").unwrap();
        let two = b.add_fault_tree("Two").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let c = b.add_basic_event("C", Expression::Constant(0.1)).unwrap();
        b.add_gate(two, "G1", Formula::and([a.into(), c.into()])).unwrap();
        b.add_gate(two, "G2", Formula::or([a.into(), c.into()])).unwrap();
        let model = b.build();

        assert_eq!(
            top_gate(&model, &model.fault_trees()[0]),
            Err(ValidationError::TopGate {
                tree: "Empty".into(),
                candidates: vec![]
            })
        );
        assert_eq!(
            top_gate(&model, &model.fault_trees()[1]),
            Err(ValidationError::TopGate {
                tree: "Two".into(),
                candidates: vec!["G1".into(), "G2".into()]
            })
        );
    }

    #[test]
    fn test_undefined_event() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        b.add_gate(ft, "G", Formula::not(EventId(99))).unwrap();
        let model = b.build();

        assert!(matches!(
            validate_fault_tree(&model, &model.fault_trees()[0]),
            Err(ValidationError::UndefinedEvent(_))
        ));
    }
}
