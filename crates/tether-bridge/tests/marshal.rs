//! Marshalling integration tests
//!
//! End-to-end conversion through bound functions:
//! - Primitive fast path (no conversion, no resource scope)
//! - Strings, class pointers, and the Nullable policy
//! - Scratch-stack restoration after converted calls
//! - Vectors, fixed arrays, and length enforcement
//! - Buffer mirroring and commit-back
//! - Inverse callback thunks
//! - Arity-based overload dispatch

use std::rc::Rc;

use tether_abi::{BridgeError, HostValue, Word};
use tether_bridge::caller::{make_callback_thunk, Signature};
use tether_bridge::context::BridgeContext;
use tether_bridge::types::{ArrayType, BufferType, PolicySet, StringType, TypeId, VectorType};

fn fresh_context() -> BridgeContext {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    ctx
}

fn type_id(ctx: &BridgeContext, name: &str) -> TypeId {
    ctx.type_by_name(name).unwrap().id()
}

fn register_string(ctx: &mut BridgeContext) -> TypeId {
    let id = ctx.alloc_type_id();
    ctx.register_type(Rc::new(StringType::new(id))).unwrap();
    id
}

// ===== Primitives =====

#[test]
fn test_primitive_add_round_trip() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let sig = Signature::new(int32, [int32, int32]);
    ctx.bind_function(
        "add",
        &sig,
        Rc::new(|_ctx, words| Ok(Word::from_i64(words[0].as_i64() + words[1].as_i64()))),
        PolicySet::NONE,
    )
    .unwrap();

    let sum = ctx
        .call("add", &[HostValue::Int(2), HostValue::Int(40)])
        .unwrap();
    assert_eq!(sum, HostValue::Int(42));
}

#[test]
fn test_unsigned_narrow_value_is_masked() {
    let mut ctx = fresh_context();
    let uint8 = type_id(&ctx, "uint8_t");
    let sig = Signature::new(uint8, [uint8]);
    ctx.bind_function(
        "echo",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();

    // 300 does not fit a byte; only the low 8 bits cross
    let out = ctx.call("echo", &[HostValue::Int(300)]).unwrap();
    assert_eq!(out, HostValue::UInt(300 & 0xFF));
}

#[test]
fn test_strict_policy_rejects_float_for_int() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let sig = Signature::new(int32, [int32]);
    ctx.bind_function(
        "echo",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::STRICT,
    )
    .unwrap();

    let err = ctx.call("echo", &[HostValue::Float(1.5)]).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
}

#[test]
fn test_float_round_trip() {
    let mut ctx = fresh_context();
    let f64_t = type_id(&ctx, "float64_t");
    let sig = Signature::new(f64_t, [f64_t]);
    ctx.bind_function(
        "halve",
        &sig,
        Rc::new(|_ctx, words| Ok(Word::from_f64(words[0].as_f64() / 2.0))),
        PolicySet::NONE,
    )
    .unwrap();

    let out = ctx.call("halve", &[HostValue::Float(5.0)]).unwrap();
    assert_eq!(out, HostValue::Float(2.5));
}

#[test]
fn test_wrong_argument_count_is_error() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let sig = Signature::new(int32, [int32, int32]);
    ctx.bind_function(
        "add",
        &sig,
        Rc::new(|_ctx, words| Ok(Word::from_i64(words[0].as_i64() + words[1].as_i64()))),
        PolicySet::NONE,
    )
    .unwrap();

    // Overload table has only arity 2
    let err = ctx.call("add", &[HostValue::Int(1)]).unwrap_err();
    assert!(matches!(err, BridgeError::NoMatchingOverload { .. }));
}

// ===== Strings =====

#[test]
fn test_string_round_trip_through_native() {
    let mut ctx = fresh_context();
    let string = register_string(&mut ctx);
    let sig = Signature::new(string, [string]);
    ctx.bind_function(
        "shout",
        &sig,
        Rc::new(|ctx, words| {
            let s = ctx.heap.read_string(words[0].as_offset())?;
            let offset = ctx.heap.stack_push_string(&s.to_uppercase())?;
            Ok(Word::from_offset(offset))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    let out = ctx
        .call("shout", &[HostValue::Str("hello".to_string())])
        .unwrap();
    assert_eq!(out, HostValue::Str("HELLO".to_string()));
}

#[test]
fn test_nullable_string_crosses_as_zero() {
    let mut ctx = fresh_context();
    let string = register_string(&mut ctx);
    let sig = Signature::new(string, [string]);
    ctx.bind_function(
        "echo",
        &sig,
        Rc::new(|_ctx, words| {
            assert!(words[0].is_zero());
            Ok(words[0])
        }),
        PolicySet::NULLABLE,
    )
    .unwrap();

    let out = ctx.call("echo", &[HostValue::Null]).unwrap();
    assert_eq!(out, HostValue::Null);

    // Without the policy the same call is a type mismatch
    ctx.bind_function(
        "strict_echo",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();
    let err = ctx.call("strict_echo", &[HostValue::Null]).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
}

#[test]
fn test_nullable_class_pointer_crosses_as_zero() {
    use tether_bridge::types::{ClassPtrType, TypeFlags};

    let mut ctx = fresh_context();
    ctx.register_class(1, "Node", vec![]).unwrap();
    let node_ptr = ctx.alloc_type_id();
    ctx.register_type(Rc::new(ClassPtrType::new(
        node_ptr,
        "Node *",
        1,
        TypeFlags::NONE,
    )))
    .unwrap();

    let sig = Signature::new(node_ptr, [node_ptr]);
    ctx.bind_function(
        "next",
        &sig,
        Rc::new(|_ctx, words| {
            // A null pointer must arrive as the zero word
            assert!(words[0].is_zero());
            Ok(Word::ZERO)
        }),
        PolicySet::NULLABLE,
    )
    .unwrap();

    let out = ctx.call("next", &[HostValue::Null]).unwrap();
    assert_eq!(out, HostValue::Null);

    // Without the policy a null argument is a type mismatch
    ctx.bind_function(
        "strict_next",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();
    let err = ctx.call("strict_next", &[HostValue::Null]).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
}

#[test]
fn test_stack_restored_after_converted_call() {
    let mut ctx = fresh_context();
    let string = register_string(&mut ctx);
    let sig = Signature::new(string, [string, string, string]);
    ctx.bind_function(
        "pick_first",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();

    let before = ctx.heap.stack_save();
    let args = [
        HostValue::Str("a".to_string()),
        HostValue::Str("b".to_string()),
        HostValue::Str("c".to_string()),
    ];
    let out = ctx.call("pick_first", &args).unwrap();
    assert_eq!(out, HostValue::Str("a".to_string()));

    // Three string parameters share one stack acquisition, released once
    assert_eq!(ctx.heap.stack_save(), before);
}

// ===== Sequences =====

#[test]
fn test_vector_round_trip() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let vec_id = ctx.alloc_type_id();
    ctx.register_type(Rc::new(VectorType::new(vec_id, "std::vector<int32_t>", int32)))
        .unwrap();

    let sig = Signature::new(vec_id, [vec_id]);
    ctx.bind_function(
        "echo",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();

    let list = HostValue::List(vec![HostValue::Int(1), HostValue::Int(-2), HostValue::Int(3)]);
    let out = ctx.call("echo", &[list.clone()]).unwrap();
    assert_eq!(out, list);
}

#[test]
fn test_array_enforces_fixed_length() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let arr_id = ctx.alloc_type_id();
    ctx.register_type(Rc::new(ArrayType::new(
        arr_id,
        "std::array<int32_t, 3>",
        int32,
        3,
    )))
    .unwrap();

    let sig = Signature::new(arr_id, [arr_id]);
    ctx.bind_function(
        "echo",
        &sig,
        Rc::new(|_ctx, words| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();

    let short = HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]);
    let err = ctx.call("echo", &[short]).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));

    let exact = HostValue::List(vec![
        HostValue::Int(1),
        HostValue::Int(2),
        HostValue::Int(3),
    ]);
    let out = ctx.call("echo", &[exact.clone()]).unwrap();
    assert_eq!(out, exact);
}

// ===== Buffers =====

#[test]
fn test_buffer_mutation_commits_back_to_host() {
    let mut ctx = fresh_context();
    let uint32 = type_id(&ctx, "uint32_t");
    let buf_id = ctx.alloc_type_id();
    ctx.register_type(Rc::new(BufferType::new(buf_id))).unwrap();

    // Native increments every byte of the mirrored copy and commits,
    // returning the external handle so the host can release it
    let sig = Signature::new(uint32, [buf_id]);
    ctx.bind_function(
        "bump",
        &sig,
        Rc::new(|ctx, words| {
            let descriptor = words[0].as_offset();
            let len = ctx.heap.read_u32(descriptor)?;
            let data = ctx.heap.read_u32(descriptor + 4)?;
            let handle = ctx.heap.read_u32(descriptor + 8)?;
            let mut bytes = ctx.heap.read_bytes(data, len)?.to_vec();
            for b in &mut bytes {
                *b = b.wrapping_add(1);
            }
            ctx.heap.write_bytes(data, &bytes)?;
            ctx.commit_buffer(handle)?;
            Ok(Word::from_u64(handle as u64))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    let buffer = HostValue::bytes(vec![1, 2, 3]);
    let HostValue::Bytes(shared) = buffer.clone() else {
        unreachable!()
    };
    let out = ctx.call("bump", &[buffer]).unwrap();

    assert_eq!(*shared.borrow(), vec![2, 3, 4]);

    let HostValue::UInt(handle) = out else {
        panic!("expected handle, got {out:?}");
    };
    ctx.release_external(handle as u32).unwrap();
    assert_eq!(ctx.externals.live(), 0);
}

// ===== Callbacks =====

#[test]
fn test_callback_inverse_thunk() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let sig = Signature::new(int32, [int32, int32]);

    let handle = ctx.callbacks.register(Rc::new(|args: &[HostValue]| {
        let a = args[0].as_i64().unwrap();
        let b = args[1].as_i64().unwrap();
        Ok(HostValue::Int(a * b))
    }));

    let thunk = make_callback_thunk(&ctx, &sig).unwrap();
    let out = thunk(&mut ctx, handle, &[Word::from_i64(6), Word::from_i64(7)]).unwrap();
    assert_eq!(out.as_i64(), 42);
}

#[test]
fn test_callback_bad_handle() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");
    let sig = Signature::new(int32, [int32]);

    let thunk = make_callback_thunk(&ctx, &sig).unwrap();
    let err = thunk(&mut ctx, 99, &[Word::from_i64(1)]).unwrap_err();
    assert!(matches!(err, BridgeError::BadHandle(99)));
}

// ===== Overloads =====

#[test]
fn test_overload_dispatch_by_arity() {
    let mut ctx = fresh_context();
    let int32 = type_id(&ctx, "int32_t");

    for arity in 0..3usize {
        let params = vec![int32; arity];
        let sig = Signature::new(int32, params);
        ctx.bind_function(
            "pick",
            &sig,
            Rc::new(move |_ctx, _words| Ok(Word::from_i64(arity as i64 * 10))),
            PolicySet::NONE,
        )
        .unwrap();
    }

    assert_eq!(ctx.call("pick", &[]).unwrap(), HostValue::Int(0));
    assert_eq!(
        ctx.call("pick", &[HostValue::Int(0)]).unwrap(),
        HostValue::Int(10)
    );
    assert_eq!(
        ctx.call("pick", &[HostValue::Int(0), HostValue::Int(0)])
            .unwrap(),
        HostValue::Int(20)
    );

    let err = ctx
        .call("pick", &vec![HostValue::Int(0); 3])
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::NoMatchingOverload { arity: 3, .. }
    ));
}
