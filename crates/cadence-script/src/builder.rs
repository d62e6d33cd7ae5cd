//! Assembling a character from definitions

use crate::schema::{CharacterDef, ExpiryDef, MetaDef, OperationDef, StateDef};
use crate::Result;
use cadence_core::{
    Character, ChargeSpec, MetaOperation, OpId, Operation, Resource, State, StateExpiry, Timer,
};

/// Build a validated character from a merged definition set.
///
/// Sections are applied in definition order: resources, states, operations,
/// metas, regen rules, trigger rules. Registration order is semantically
/// significant because it decides driver tie-breaking and sweep order.
/// Dangling id references are rejected before the character is handed out.
pub fn build_character(def: &CharacterDef) -> Result<Character> {
    let name = if def.name.is_empty() {
        "character"
    } else {
        def.name.as_str()
    };
    let mut character = Character::new(name, Timer::new());

    for resource in &def.resources {
        character.add_resource(Resource::new(
            resource.id.as_str(),
            resource.upper_limit,
            resource.current,
        ))?;
    }

    for state in &def.states {
        character.add_state(build_state(state))?;
    }

    for op in &def.operations {
        let operation = build_operation(op);
        match &op.charges {
            Some(charges) => {
                let mut spec = ChargeSpec::new(charges.max_charges);
                if let Some(cooldown) = charges.cooldown {
                    spec = spec.with_cooldown(cooldown);
                }
                if let Some(resource) = &charges.resource {
                    spec = spec.with_resource(resource.as_str());
                }
                character.add_operation_with_charges(operation, spec)?;
            }
            None => character.add_operation(operation)?,
        }
    }

    for meta in &def.metas {
        character.add_meta_operation(build_meta(meta))?;
    }

    for rule in &def.regen_rules {
        character.add_regen_rule(rule.clone());
    }
    for rule in &def.trigger_rules {
        character.add_trigger_rule(rule.clone());
    }

    character.validate()?;
    Ok(character)
}

fn build_state(def: &StateDef) -> State {
    let expiry = match def.expiry {
        ExpiryDef::KeepAfterLastTouch { window } => StateExpiry::keep_after_last_touch(window),
        ExpiryDef::PerStackTimed { duration, slots } => {
            StateExpiry::per_stack_timed(duration, slots)
        }
    };
    let mut state = State::new(def.id.as_str(), def.stacks, def.max_stacks, expiry);
    state.resource_effects = def.resource_effects.clone();
    state.meta_priority_rules = def.meta_priority.clone();
    state.accelerate_rules = def.accelerates.clone();
    state.efficiency_rules = def.efficiencies.clone();
    state
}

fn build_operation(def: &OperationDef) -> Operation {
    let mut op = Operation::new(def.id.as_str(), def.base_time);
    op.consumes = def.costs.clone();
    op.produces = def.produces.clone();
    op.consume_upper_limit = def.consume_upper_limit;
    op.consume_lower_limit = def.consume_lower_limit;
    op.states_output = def.states_output.clone();
    op.state_requirements = def.state_requirements.clone();
    op.state_forbids = def.state_forbids.clone();
    op.state_effects = def.state_effects.clone();
    op.resource_state_rules = def.resource_state_rules.clone();
    op.resource_state_remove_rules = def.resource_state_remove_rules.clone();
    op
}

fn build_meta(def: &MetaDef) -> MetaOperation {
    let operations: Vec<OpId> = def.operations.iter().map(OpId::new).collect();
    let mut meta = MetaOperation::new(def.id.as_str(), def.kind, operations);
    meta.base_priority = def.base_priority;
    meta.state_requirements = def.state_requirements.clone();
    meta.state_forbids = def.state_forbids.clone();
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Error as CoreError, ResourceId, StateId};

    #[test]
    fn test_build_and_run() {
        let def: CharacterDef = ron::from_str(
            r#"(
                name: "pyromancer",
                resources: [
                    (id: "energy", upper_limit: 100.0, current: 100.0),
                    (id: "heat", upper_limit: 100.0),
                ],
                states: [
                    (
                        id: "frenzy",
                        max_stacks: 1,
                        expiry: KeepAfterLastTouch(window: 3.0),
                        accelerates: [(operation: "strike", ratio: 0.5)],
                    ),
                ],
                operations: [
                    (
                        id: "strike",
                        base_time: 1.0,
                        costs: [(resource: "energy", amount: 10.0)],
                        produces: [(resource: "heat", amount: 25.0)],
                        resource_state_rules: [
                            (resource: "heat", threshold: 50.0, state: "frenzy"),
                        ],
                    ),
                ],
                metas: [
                    (id: "spam", operations: ["strike"]),
                ],
            )"#,
        )
        .unwrap();

        let mut character = build_character(&def).unwrap();
        assert_eq!(character.name, "pyromancer");

        let log = character.build_rotation_from_meta(20).unwrap();
        assert_eq!(log.len(), 10);
        assert_eq!(
            character
                .resources
                .get(&ResourceId::new("energy"))
                .unwrap()
                .current,
            0.0
        );
        assert_eq!(character.states.stacks_of(&StateId::new("frenzy")).unwrap(), 0);
    }

    #[test]
    fn test_charge_definition_creates_resource() {
        let def: CharacterDef = ron::from_str(
            r#"(
                resources: [(id: "energy", upper_limit: 50.0, current: 50.0)],
                operations: [
                    (
                        id: "nova",
                        base_time: 1.0,
                        costs: [(resource: "energy", amount: 5.0)],
                        charges: Some((max_charges: 2, cooldown: Some(8.0))),
                    ),
                ],
            )"#,
        )
        .unwrap();

        let character = build_character(&def).unwrap();
        let charges = character
            .resources
            .get(&ResourceId::new("charge_nova"))
            .unwrap();
        assert_eq!(charges.upper_limit, 2.0);
        assert_eq!(charges.current, 2.0);
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let def: CharacterDef = ron::from_str(
            r#"(
                metas: [(id: "spam", operations: ["missing"])],
            )"#,
        )
        .unwrap();

        let err = build_character(&def).unwrap_err();
        match err {
            crate::Error::Core(CoreError::UnknownOperation(id)) => {
                assert_eq!(id.as_str(), "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
