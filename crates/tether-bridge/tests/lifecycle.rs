//! Instance lifecycle and deferred reclamation tests
//!
//! - Explicit free runs the bound destructor exactly once
//! - Freed instances fail pointer access with UseAfterFree
//! - The deferred sweep frees queued instances, skips persistent and
//!   already-deleted ones, and propagates destructor failures
//! - Teardown invalidates tracked instances without running destructors
//! - External slot cleanups run exactly once, at reference count zero

use std::cell::Cell;
use std::rc::Rc;

use tether_abi::{BridgeError, HostValue, InstanceRef, Word};
use tether_bridge::caller::Signature;
use tether_bridge::class::MethodKind;
use tether_bridge::context::BridgeContext;
use tether_bridge::slots::External;
use tether_bridge::types::{ClassPtrType, PolicySet, TypeFlags};

const WIDGET: u32 = 1;

struct Fixture {
    ctx: BridgeContext,
    drops: Rc<Cell<u32>>,
}

fn bind_widget(failing_destructor: bool) -> Fixture {
    let mut ctx = BridgeContext::default();
    ctx.register_standard_primitives().unwrap();
    let int32 = ctx.type_by_name("int32_t").unwrap().id();

    ctx.register_class(WIDGET, "Widget", vec![]).unwrap();
    let widget_ptr = ctx.alloc_type_id();
    ctx.register_type(Rc::new(ClassPtrType::new(
        widget_ptr,
        "Widget *",
        WIDGET,
        TypeFlags::NONE,
    )))
    .unwrap();

    ctx.bind_constructor(
        WIDGET,
        &Signature::new(widget_ptr, []),
        Rc::new(|ctx: &mut BridgeContext, _words: &[Word]| {
            let ptr = ctx.heap.alloc(4)?;
            ctx.heap.write_u32(ptr, 1)?;
            Ok(Word::from_offset(ptr))
        }),
        PolicySet::NONE,
    )
    .unwrap();

    ctx.bind_method(
        WIDGET,
        "probe",
        &Signature::new(int32, []),
        Rc::new(|ctx: &mut BridgeContext, words: &[Word]| {
            let v = ctx.heap.read_u32(words[0].as_offset())? as i64;
            Ok(Word::from_i64(v))
        }),
        PolicySet::NONE,
        MethodKind::Instance,
        true,
        None,
    )
    .unwrap();

    let drops = Rc::new(Cell::new(0u32));
    let counter = drops.clone();
    ctx.set_destructor(
        WIDGET,
        Rc::new(move |_ctx: &mut BridgeContext, _words: &[Word]| {
            if failing_destructor {
                return Err(BridgeError::NativeError("destructor exploded".to_string()));
            }
            counter.set(counter.get() + 1);
            Ok(Word::ZERO)
        }),
    )
    .unwrap();

    Fixture { ctx, drops }
}

fn make_widget(ctx: &mut BridgeContext) -> InstanceRef {
    match ctx.construct("Widget", &[]).unwrap() {
        HostValue::Instance(inst) => inst,
        other => panic!("expected instance, got {other:?}"),
    }
}

// ===== Explicit free =====

#[test]
fn test_free_runs_destructor_once() {
    let mut f = bind_widget(false);
    let widget = make_widget(&mut f.ctx);

    f.ctx.free_instance(&widget).unwrap();
    assert_eq!(f.drops.get(), 1);
    assert!(widget.borrow().is_deleted());

    // Freeing again is a harmless no-op
    f.ctx.free_instance(&widget).unwrap();
    assert_eq!(f.drops.get(), 1);
}

#[test]
fn test_use_after_free_is_detected() {
    let mut f = bind_widget(false);
    let widget = make_widget(&mut f.ctx);
    f.ctx.free_instance(&widget).unwrap();

    let err = f.ctx.call_method(&widget, "probe", &[]).unwrap_err();
    assert!(matches!(err, BridgeError::UseAfterFree(_)));
    assert!(widget.borrow().ptr().is_err());
}

// ===== Deferred sweep =====

#[test]
fn test_sweep_frees_queued_and_skips_persistent() {
    let mut f = bind_widget(false);
    f.ctx.gc.enable();

    let doomed = make_widget(&mut f.ctx);
    let kept = make_widget(&mut f.ctx);
    f.ctx.gc.register(&doomed);
    f.ctx.gc.register(&kept);
    f.ctx.persist(&kept);

    let freed = f.ctx.run_pending_sweep().unwrap();
    assert_eq!(freed, 1);
    assert_eq!(f.drops.get(), 1);
    assert!(doomed.borrow().is_deleted());
    assert!(!kept.borrow().is_deleted());

    // Queue drained; the next pump has nothing to do
    assert_eq!(f.ctx.run_pending_sweep().unwrap(), 0);
}

#[test]
fn test_sweep_skips_already_freed() {
    let mut f = bind_widget(false);
    f.ctx.gc.enable();

    let widget = make_widget(&mut f.ctx);
    f.ctx.gc.register(&widget);
    f.ctx.free_instance(&widget).unwrap();

    assert_eq!(f.ctx.run_pending_sweep().unwrap(), 0);
    assert_eq!(f.drops.get(), 1);
}

#[test]
fn test_sweep_propagates_destructor_failure() {
    let mut f = bind_widget(true);
    f.ctx.gc.enable();

    let widget = make_widget(&mut f.ctx);
    f.ctx.gc.register(&widget);

    let err = f.ctx.run_pending_sweep().unwrap_err();
    assert!(matches!(err, BridgeError::NativeError(_)));
}

#[test]
fn test_registration_while_disabled_is_dropped() {
    let mut f = bind_widget(false);
    // Collector never enabled
    let widget = make_widget(&mut f.ctx);
    f.ctx.gc.register(&widget);

    assert_eq!(f.ctx.run_pending_sweep().unwrap(), 0);
    assert!(!widget.borrow().is_deleted());
}

// ===== Teardown =====

#[test]
fn test_teardown_invalidates_without_destructors() {
    let mut f = bind_widget(false);
    let widget = make_widget(&mut f.ctx);

    f.ctx.teardown();
    assert!(widget.borrow().is_deleted());
    // Native memory ownership stays native-side; no destructor call
    assert_eq!(f.drops.get(), 0);
}

// ===== External slots =====

#[test]
fn test_external_cleanup_runs_once_at_zero() {
    let mut ctx = BridgeContext::default();
    let cleaned = Rc::new(Cell::new(false));
    let flag = cleaned.clone();

    let handle = ctx
        .externals
        .register(External::opaque_with_cleanup(move || flag.set(true)));
    ctx.externals.reference(handle).unwrap();

    // Two references, first release keeps the slot alive
    ctx.release_external(handle).unwrap();
    assert!(!cleaned.get());
    assert_eq!(ctx.externals.live(), 1);

    ctx.release_external(handle).unwrap();
    assert!(cleaned.get());
    assert_eq!(ctx.externals.live(), 0);

    let err = ctx.release_external(handle).unwrap_err();
    assert!(matches!(err, BridgeError::BadHandle(_)));
}
