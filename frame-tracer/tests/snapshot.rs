//! Recorded history must survive later mutation of the live objects.

use frame_tracer::{Frame, Instruction, Logger, Opcode, Value};

/// A store of an aliased list, then an in-place append through the alias.
#[test]
fn test_recorded_value_is_independent_of_later_list_mutation() -> anyhow::Result<()> {
    // 0 LOAD_FAST xs; 2 STORE_FAST ys; 4 NOP
    let mut frame = Frame::new(vec![
        Instruction::load_fast(0, "xs"),
        Instruction::store_fast(2, "ys"),
        Instruction::simple(4, Opcode::Nop),
    ]);
    let live = Value::list(vec![Value::Int(1)]);
    frame.set_local("xs", live.clone());
    // After the store, ys aliases the same backing storage.
    frame.set_local("ys", live.clone());

    let mut logger = Logger::starting_at(&frame, 0);
    frame.advance_to(4);
    logger.detect_changes(&frame)?;

    assert_eq!(logger.mutations().len(), 1);
    assert_eq!(logger.mutations()[0].value, Value::list(vec![Value::Int(1)]));

    // The traced program keeps running and appends through the alias.
    if let Value::List(items) = &live {
        items.borrow_mut().push(Value::Int(2));
    }

    assert_eq!(
        logger.mutations()[0].value,
        Value::list(vec![Value::Int(1)]),
        "history must not collapse to the latest state of the live object"
    );
    Ok(())
}

#[test]
fn test_recorded_object_is_independent_of_later_attribute_writes() -> anyhow::Result<()> {
    // 0 LOAD_CONST 9; 2 LOAD_FAST p; 4 STORE_ATTR x; 6 NOP
    let mut frame = Frame::new(vec![
        Instruction::load_const(0, Value::Int(9)),
        Instruction::load_fast(2, "p"),
        Instruction::store_attr(4, "x"),
        Instruction::simple(6, Opcode::Nop),
    ]);
    let point = Value::object("Point", Default::default());
    frame.set_local("p", point.clone());

    let mut logger = Logger::starting_at(&frame, 0);
    if let Value::Object(object) = &point {
        object.borrow_mut().attrs.insert("x".to_owned(), Value::Int(9));
    }
    frame.advance_to(6);
    logger.detect_changes(&frame)?;

    let recorded = logger.mutations()[0].value.clone();

    // Later attribute write through the live object.
    if let Value::Object(object) = &point {
        object.borrow_mut().attrs.insert("x".to_owned(), Value::Int(99));
    }

    if let Value::Object(object) = &recorded {
        assert_eq!(
            object.borrow().attrs.get("x"),
            Some(&Value::Int(9)),
            "the snapshot keeps the attribute value seen at record time"
        );
    } else {
        panic!("recorded value should be an object snapshot");
    }
    Ok(())
}

/// A scope can hold a value that contains itself; scanning a store of it
/// must still terminate and record a self-contained copy.
#[test]
fn test_self_referencing_value_in_scope_is_recorded_without_crashing() -> anyhow::Result<()> {
    // 0 LOAD_FAST xs; 2 STORE_FAST ys; 4 NOP
    let mut frame = Frame::new(vec![
        Instruction::load_fast(0, "xs"),
        Instruction::store_fast(2, "ys"),
        Instruction::simple(4, Opcode::Nop),
    ]);
    let live = Value::list(vec![Value::Int(1)]);
    if let Value::List(items) = &live {
        let alias = live.clone();
        items.borrow_mut().push(alias);
    }
    frame.set_local("xs", live.clone());
    frame.set_local("ys", live.clone());

    let mut logger = Logger::starting_at(&frame, 0);
    frame.advance_to(4);
    logger.detect_changes(&frame)?;

    assert_eq!(logger.mutations().len(), 1);
    let Value::List(recorded) = &logger.mutations()[0].value else {
        panic!("the recorded value should be a list");
    };
    let recorded_ref = recorded.borrow();
    assert_eq!(recorded_ref.len(), 2);
    assert_eq!(recorded_ref[0], Value::Int(1));
    let Value::List(inner) = &recorded_ref[1] else {
        panic!("the cyclic element should still be a list");
    };
    assert!(
        std::rc::Rc::ptr_eq(inner, recorded),
        "the recorded copy should close its own cycle"
    );
    if let Value::List(live_items) = &live {
        assert!(
            !std::rc::Rc::ptr_eq(inner, live_items),
            "the recorded copy must not point back into the live value"
        );
    }
    Ok(())
}

#[test]
fn test_mutation_log_round_trips_through_json() -> anyhow::Result<()> {
    let mut frame = Frame::new(vec![
        Instruction::load_const(0, Value::str("hello")),
        Instruction::store_fast(2, "greeting"),
        Instruction::simple(4, Opcode::Nop),
    ]);
    frame.set_local("greeting", Value::str("hello"));

    let mut logger = Logger::starting_at(&frame, 0);
    frame.advance_to(4);
    logger.detect_changes(&frame)?;

    let json = logger.mutations_json()?;
    let parsed: frame_tracer::MutationLog = serde_json::from_str(&json)?;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed.as_slice()[0].target_name(), Some("greeting"));
    assert_eq!(parsed.as_slice()[0].value, Value::str("hello"));
    Ok(())
}
