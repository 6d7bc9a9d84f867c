//! Value-object and shared-pointer integration tests
//!
//! - Value objects copy through the registered host value class in both
//!   directions, with pool scratch restored after the call
//! - A value-object read without a registered host class fails with
//!   MissingValueClass
//! - Shared pointers cross as {shared handle, raw pointer} pairs, queue
//!   into the deferred collector when it is enabled, and free through the
//!   shared handle

use std::cell::Cell;
use std::rc::Rc;

use tether_abi::{BridgeError, HostValue, Word};
use tether_bridge::caller::Signature;
use tether_bridge::class::ValueClass;
use tether_bridge::context::BridgeContext;
use tether_bridge::types::{PolicySet, SharedClassPtrType, TypeFlags, ValueObjectType};

const PAIR: u32 = 1;
const SERVICE: u32 = 2;

/// Host representation of the native `Pair` value class: a two-int list.
fn register_pair(ctx: &mut BridgeContext) {
    ctx.register_class(PAIR, "Pair", vec![]).unwrap();
    ctx.classes
        .register_value_class(
            "Pair",
            ValueClass {
                from_wire: Rc::new(|ctx: &mut BridgeContext, offset: u32| {
                    let a = ctx.heap.read_u32(offset)? as i32 as i64;
                    let b = ctx.heap.read_u32(offset + 4)? as i32 as i64;
                    Ok(HostValue::List(vec![HostValue::Int(a), HostValue::Int(b)]))
                }),
                to_wire: Rc::new(|ctx: &mut BridgeContext, value: &HostValue| {
                    let items = value
                        .as_list()
                        .ok_or_else(|| BridgeError::mismatch("Pair", value.type_name()))?;
                    let offset = ctx.heap.pool_alloc(8)?;
                    ctx.heap
                        .write_u32(offset, items[0].as_i64().unwrap_or(0) as u32)?;
                    ctx.heap
                        .write_u32(offset + 4, items[1].as_i64().unwrap_or(0) as u32)?;
                    Ok(offset)
                }),
            },
        )
        .unwrap();
}

#[test]
fn test_value_object_round_trip_restores_pool() {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    register_pair(&mut ctx);

    let pair_ty = ctx.alloc_type_id();
    ctx.register_type(Rc::new(ValueObjectType::new(pair_ty, "Pair", "Pair")))
        .unwrap();

    // Pair swap(Pair p) — native swaps the two fields into fresh pool space
    let sig = Signature::new(pair_ty, [pair_ty]);
    ctx.bind_function(
        "swap",
        &sig,
        Rc::new(|ctx: &mut BridgeContext, words: &[Word]| {
            let src = words[0].as_offset();
            let a = ctx.heap.read_u32(src)?;
            let b = ctx.heap.read_u32(src + 4)?;
            let dst = ctx.heap.pool_alloc(8)?;
            ctx.heap.write_u32(dst, b)?;
            ctx.heap.write_u32(dst + 4, a)?;
            Ok(Word::from_offset(dst))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    let checkpoint = ctx.heap.pool_save();
    let out = ctx
        .call(
            "swap",
            &[HostValue::List(vec![HostValue::Int(3), HostValue::Int(9)])],
        )
        .unwrap();
    assert_eq!(
        out,
        HostValue::List(vec![HostValue::Int(9), HostValue::Int(3)])
    );
    // Both the argument copy and the result lived in pool scratch
    assert_eq!(ctx.heap.pool_save(), checkpoint);
}

#[test]
fn test_missing_value_class_is_detected() {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    ctx.register_class(PAIR, "Pair", vec![]).unwrap();
    // No value class registered for "Pair"
    let pair_ty = ctx.alloc_type_id();
    ctx.register_type(Rc::new(ValueObjectType::new(pair_ty, "Pair", "Pair")))
        .unwrap();

    let sig = Signature::new(pair_ty, [pair_ty]);
    ctx.bind_function(
        "swap",
        &sig,
        Rc::new(|_ctx: &mut BridgeContext, words: &[Word]| Ok(words[0])),
        PolicySet::NONE,
    )
    .unwrap();

    let err = ctx
        .call(
            "swap",
            &[HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])],
        )
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingValueClass(name) if name == "Pair"));
}

fn bind_service(ctx: &mut BridgeContext, freed_handle: Rc<Cell<u32>>) {
    let int32 = ctx.type_by_name("int32_t").unwrap().id();
    ctx.register_class(SERVICE, "Service", vec![]).unwrap();
    let shared_ty = ctx.alloc_type_id();
    ctx.register_type(Rc::new(SharedClassPtrType::new(
        shared_ty,
        "std::shared_ptr<Service>",
        SERVICE,
        TypeFlags::NONE,
    )))
    .unwrap();

    // std::shared_ptr<Service> acquire() — returns the {shared, raw} pair
    ctx.bind_function(
        "acquire",
        &Signature::new(shared_ty, []),
        Rc::new(|ctx: &mut BridgeContext, _words: &[Word]| {
            let raw = ctx.heap.alloc(4)?;
            ctx.heap.write_u32(raw, 41)?;
            let pair = ctx.heap.alloc(8)?;
            ctx.heap.write_u32(pair, 77)?; // shared handle
            ctx.heap.write_u32(pair + 4, raw)?;
            Ok(Word::from_offset(pair))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    // int handle_of(std::shared_ptr<Service> s) — the handle, not the raw
    // pointer, crosses on write
    ctx.bind_function(
        "handle_of",
        &Signature::new(int32, [shared_ty]),
        Rc::new(|_ctx: &mut BridgeContext, words: &[Word]| {
            Ok(Word::from_i64(words[0].as_offset() as i64))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    ctx.set_destructor(
        SERVICE,
        Rc::new(move |_ctx: &mut BridgeContext, words: &[Word]| {
            freed_handle.set(words[0].as_offset());
            Ok(Word::ZERO)
        }),
    )
    .unwrap();
}

#[test]
fn test_shared_pointer_crosses_as_handle() {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    let freed = Rc::new(Cell::new(0u32));
    bind_service(&mut ctx, freed.clone());

    let service = match ctx.call("acquire", &[]).unwrap() {
        HostValue::Instance(inst) => inst,
        other => panic!("expected instance, got {other:?}"),
    };
    {
        let b = service.borrow();
        assert!(b.is_shared());
        assert_eq!(b.shared().unwrap(), 77);
        assert_ne!(b.ptr().unwrap(), 77);
    }

    assert_eq!(
        ctx.call("handle_of", &[HostValue::Instance(service.clone())])
            .unwrap(),
        HostValue::Int(77)
    );

    // Release goes through the shared handle
    ctx.free_instance(&service).unwrap();
    assert_eq!(freed.get(), 77);
}

#[test]
fn test_shared_pointer_read_queues_for_collection() {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    let freed = Rc::new(Cell::new(0u32));
    bind_service(&mut ctx, freed.clone());
    ctx.gc.enable();

    let service = match ctx.call("acquire", &[]).unwrap() {
        HostValue::Instance(inst) => inst,
        other => panic!("expected instance, got {other:?}"),
    };

    assert_eq!(ctx.run_pending_sweep().unwrap(), 1);
    assert!(service.borrow().is_deleted());
    assert_eq!(freed.get(), 77);
}
