//! Object identity, shared instances and cycles.

mod common;

use std::sync::Arc;

use common::*;
use pof_core::serialization::constants::{T_IDENTITY, T_REFERENCE};
use pof_core::serialization::{downcast_object, BufferInput, DataInput, PofObject};
use pof_core::{PofError, PofValue};

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_two_node_cycle_keeps_identity() {
    let service = tracking_service(graph_context());

    let a = friend("a");
    let b = friend("b");
    a.write().unwrap().friend = Some(Arc::clone(&b));
    b.write().unwrap().friend = Some(Arc::clone(&a));

    let bytes = service.serialize_object(&a).unwrap();
    let decoded_a = service.deserialize_object::<Friend>(&bytes).unwrap();

    let decoded_b = decoded_a.read().unwrap().friend.clone().unwrap();
    assert_eq!(decoded_b.read().unwrap().name, "b");
    let back = decoded_b.read().unwrap().friend.clone().unwrap();
    assert!(Arc::ptr_eq(&back, &decoded_a));
    assert_eq!(decoded_a.read().unwrap().name, "a");

    // break the cycles so the handles are freed
    decoded_a.write().unwrap().friend = None;
    a.write().unwrap().friend = None;
}

#[test]
fn test_self_reference() {
    let service = tracking_service(graph_context());

    let a = friend("self");
    a.write().unwrap().friend = Some(Arc::clone(&a));

    let bytes = service.serialize_object(&a).unwrap();
    let decoded = service.deserialize_object::<Friend>(&bytes).unwrap();
    let inner = decoded.read().unwrap().friend.clone().unwrap();
    assert!(Arc::ptr_eq(&inner, &decoded));

    decoded.write().unwrap().friend = None;
    a.write().unwrap().friend = None;
}

#[test]
fn test_wire_uses_identity_then_reference() {
    let service = tracking_service(graph_context());

    let a = friend("a");
    a.write().unwrap().friend = Some(Arc::clone(&a));
    let bytes = service.serialize_object(&a).unwrap();

    let mut input = BufferInput::from_slice(&bytes);
    assert_eq!(input.read_packed_i32().unwrap(), T_IDENTITY);
    assert_eq!(input.read_packed_i32().unwrap(), 0);
    assert_eq!(input.read_packed_i32().unwrap(), FRIEND_TYPE);

    // the back-reference is the last value before the end marker
    let tail = &bytes[bytes.len() - 3..];
    let mut tail_input = BufferInput::from_slice(tail);
    assert_eq!(tail_input.read_packed_i32().unwrap(), T_REFERENCE);
    assert_eq!(tail_input.read_packed_i32().unwrap(), 0);

    a.write().unwrap().friend = None;
}

// ============================================================================
// Shared instances
// ============================================================================

fn shared_holder() -> PofValue {
    let shared = friend("shared");
    PofValue::Object(PofObject::new(Holder {
        first: Some(Arc::clone(&shared)),
        second: Some(shared),
    }))
}

#[test]
fn test_shared_instance_decodes_once_with_tracking() {
    let service = service(graph_context());
    let value = shared_holder();

    let bytes = service.serialize_with(&value, tracked()).unwrap();
    let decoded = service.deserialize(&bytes).unwrap();
    let holder = downcast_object::<Holder>(&decoded.as_object().unwrap().unwrap()).unwrap();
    let holder = holder.read().unwrap();
    assert!(Arc::ptr_eq(
        holder.first.as_ref().unwrap(),
        holder.second.as_ref().unwrap()
    ));
}

#[test]
fn test_shared_instance_duplicates_without_tracking() {
    let service = service(graph_context());
    let value = shared_holder();

    let untracked = service.serialize(&value).unwrap();
    let decoded = service.deserialize(&untracked).unwrap();
    let holder = downcast_object::<Holder>(&decoded.as_object().unwrap().unwrap()).unwrap();
    let holder = holder.read().unwrap();
    let first = holder.first.as_ref().unwrap();
    let second = holder.second.as_ref().unwrap();
    assert!(!Arc::ptr_eq(first, second));
    assert_eq!(first.read().unwrap().name, "shared");
    assert_eq!(second.read().unwrap().name, "shared");
}

#[test]
fn test_equal_but_distinct_instances_stay_distinct() {
    let service = tracking_service(graph_context());
    let holder = Holder {
        first: Some(friend("twin")),
        second: Some(friend("twin")),
    };
    let value = PofValue::Object(PofObject::new(holder));

    let decoded = service.deserialize(&service.serialize(&value).unwrap()).unwrap();
    let holder = downcast_object::<Holder>(&decoded.as_object().unwrap().unwrap()).unwrap();
    let holder = holder.read().unwrap();
    assert!(!Arc::ptr_eq(
        holder.first.as_ref().unwrap(),
        holder.second.as_ref().unwrap()
    ));
}

#[test]
fn test_reference_ids_are_per_call() {
    let service = tracking_service(graph_context());
    let a = friend("a");

    let first = service.serialize_object(&a).unwrap();
    let second = service.serialize_object(&a).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_shared_instances_inside_a_collection() {
    let service = tracking_service(graph_context());
    let a = PofObject::from_shared(friend("a"));
    let value = PofValue::Collection(vec![
        PofValue::Object(a.clone()),
        PofValue::Object(a),
        PofValue::Null,
    ]);

    let decoded = service.deserialize(&service.serialize(&value).unwrap()).unwrap();
    let items = decoded.into_elements().unwrap();
    let first = items[0].as_object().unwrap().unwrap();
    let second = items[1].as_object().unwrap().unwrap();
    assert!(first.ptr_eq(&second));
    assert!(items[2].is_null());
}

// ============================================================================
// Skipped definitions
// ============================================================================

#[test]
fn test_reference_to_skipped_definition_materializes() {
    let writer_ctx = graph_context();
    let shared = friend("late");
    let holder = Holder {
        first: Some(Arc::clone(&shared)),
        second: Some(shared),
    };
    let bytes = tracking_service(writer_ctx)
        .serialize(&PofValue::Object(PofObject::new(holder)))
        .unwrap();

    // a reader that ignores property 0 and only reads property 1
    let reader_ctx = graph_context();
    reader_ctx
        .register_serializer::<Holder>(
            HOLDER_TYPE,
            Arc::new(FnSerializer::read_only(|reader| {
                let second: Option<pof_core::Shared<Friend>> = reader.read(1)?;
                Ok(PofObject::new(Holder {
                    first: None,
                    second,
                }))
            })),
        )
        .unwrap();

    let decoded = service(reader_ctx).deserialize(&bytes).unwrap();
    let holder = downcast_object::<Holder>(&decoded.as_object().unwrap().unwrap()).unwrap();
    let holder = holder.read().unwrap();
    assert!(holder.first.is_none());
    assert_eq!(holder.second.as_ref().unwrap().read().unwrap().name, "late");
}

#[test]
fn test_dangling_reference_is_malformed() {
    let service = service(graph_context());
    // T_REFERENCE 5 with nothing defined
    let err = service.deserialize(&[0x5F, 0x05]).unwrap_err();
    assert!(matches!(err, PofError::Malformed(_)));
}

#[test]
fn test_nested_arrays_hit_depth_limit() {
    let config = pof_core::PofConfig::builder().max_depth(16).build().unwrap();
    let service = pof_core::PofService::with_config(graph_context(), config);

    let value = (0..20).fold(PofValue::Null, |inner, _| PofValue::Array(vec![inner]));
    let err = service.serialize(&value).unwrap_err();
    assert!(matches!(err, PofError::DepthExceeded { limit: 16 }));
}

#[test]
fn test_untracked_self_cycle_hits_depth_limit() {
    let service = service(graph_context());

    let a = friend("a");
    a.write().unwrap().friend = Some(Arc::clone(&a));

    let err = service.serialize_object(&a).unwrap_err();
    a.write().unwrap().friend = None;
    assert!(matches!(err, PofError::DepthExceeded { limit: 512 }));
}

#[test]
fn test_deep_arrays_stop_at_default_limit() {
    let service = service(graph_context());

    // T_ARRAY of size 1, 600 levels deep, innermost null
    let mut bytes = [0x57, 0x01].repeat(600);
    bytes.push(0x64);
    let err = service.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, PofError::DepthExceeded { limit: 512 }));
}

#[test]
fn test_deep_user_types_stop_at_default_limit() {
    let service = service(graph_context());

    // FRIEND_TYPE, version 0, index 1 (friend), repeated; innermost null
    let mut bytes = [0xA9, 0x0F, 0x00, 0x01].repeat(600);
    bytes.push(0x64);
    bytes.extend(std::iter::repeat(0x40).take(600));
    let err = service.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, PofError::DepthExceeded { limit: 512 }));
}
