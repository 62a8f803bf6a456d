use easywork::tuples::{create_get_node, register_tuple_type, tuple_size, TupleError};
use easywork::types::ID_FORWARD;
use easywork::typesys::{Packet, TypeDesc};

#[test]
fn registered_tuples_report_their_arity() {
    register_tuple_type::<(i64, String, f64)>();
    let desc = TypeDesc::of::<(i64, String, f64)>();
    assert_eq!(tuple_size(&desc).unwrap(), 3);
}

#[test]
fn unregistered_tuples_fail_with_typed_errors() {
    let desc = TypeDesc::of::<(bool, bool, bool, bool)>();
    assert!(matches!(
        tuple_size(&desc),
        Err(TupleError::Unregistered { .. })
    ));
    assert!(matches!(
        create_get_node(&desc, 1),
        Err(TupleError::Unregistered { .. })
    ));
}

#[test]
fn every_index_projects_with_matching_types() {
    register_tuple_type::<(i64, String, f64)>();
    let desc = TypeDesc::of::<(i64, String, f64)>();
    let expected = [
        TypeDesc::of::<i64>(),
        TypeDesc::of::<String>(),
        TypeDesc::of::<f64>(),
    ];

    for (index, element_desc) in expected.iter().enumerate() {
        let node = create_get_node(&desc, index).unwrap();
        let forward = node.registry().get(ID_FORWARD).unwrap();
        assert_eq!(forward.arg_types, vec![desc.clone()]);
        assert_eq!(&forward.return_type, element_desc);
    }

    assert!(matches!(
        create_get_node(&desc, 3),
        Err(TupleError::IndexOutOfRange { .. })
    ));
}

#[test]
fn projections_extract_the_right_elements() {
    register_tuple_type::<(i64, String, f64)>();
    let desc = TypeDesc::of::<(i64, String, f64)>();
    let value = (7_i64, String::from("seven"), 7.5_f64);

    let first = create_get_node(&desc, 0).unwrap();
    let second = create_get_node(&desc, 1).unwrap();
    let third = create_get_node(&desc, 2).unwrap();

    let input = Packet::from(value, 11);
    assert_eq!(
        first.invoke("forward", &[input.clone()]).unwrap().cast::<i64>().unwrap(),
        7
    );
    assert_eq!(
        second
            .invoke("forward", &[input.clone()])
            .unwrap()
            .cast::<String>()
            .unwrap(),
        "seven"
    );
    assert_eq!(
        third.invoke("forward", &[input]).unwrap().cast::<f64>().unwrap(),
        7.5
    );
}

#[test]
fn projection_dispatch_preserves_timestamps() {
    register_tuple_type::<(i64, String)>();
    let desc = TypeDesc::of::<(i64, String)>();
    let projection = create_get_node(&desc, 0).unwrap();

    // Drive the node through a dispatch pass with a stamped tuple in an
    // upstream output slot (another projection node stands in as the
    // upstream; only its output slot matters here).
    let emitter = create_get_node(&desc, 0).unwrap();
    projection.add_upstream(&emitter, "forward");
    projection.open(&[]).unwrap();

    emitter.set_output(Packet::from((3_i64, String::from("x")), 55));
    projection.dispatch();

    let out = projection.output();
    assert_eq!(out.cast::<i64>().unwrap(), 3);
    assert_eq!(out.timestamp(), 55);
}
