//! Validation and tracing layers: what they reject, what they observe and
//! the order in which they run relative to the driver.
//!
//! Run with: cargo test -p accel-loader --test layers_test

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use accel_api::*;
use accel_loader::{ApiTracer, Tracer, Validator};
use accel_null_driver::NullDriverConfig;

use common::{context, devices, drivers, Harness};

fn with_layers(configs: Vec<NullDriverConfig>) -> Harness {
    Harness::initialized_with(configs, |b| b.validation(Validator::new()).tracing(ApiTracer::new()))
}

fn two_drivers_with_layers() -> Harness {
    with_layers(vec![NullDriverConfig::named("a"), NullDriverConfig::named("b")])
}

#[test]
fn test_layers_run_tracing_then_validation_then_driver() {
    for configs in [
        vec![NullDriverConfig::named("solo")],
        vec![NullDriverConfig::named("a"), NullDriverConfig::named("b")],
    ] {
        let h = with_layers(configs);
        let device = devices(&h.tables, drivers(&h.tables)[0])[0];

        let journal = Arc::clone(&h.journal);
        h.loader.tracer().unwrap().register(Tracer::new().on_enter(move |api, _| {
            journal.record("tracer", api, &[]);
        }));
        let journal = Arc::clone(&h.journal);
        h.loader.validator().unwrap().add_checker(move |call: &Call<'_>| -> Result<(), ZeResult> {
            journal.record("validator", call.name, &[]);
            Ok(())
        });

        h.journal.clear();
        assert_eq!(
            h.tables.device.get_status.as_deref().unwrap()(device),
            ZeResult::SUCCESS
        );
        let order: Vec<_> = h.journal.entries().into_iter().map(|e| e.source).collect();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], "tracer");
        assert_eq!(order[1], "validator");
        assert_ne!(order[2], "tracer");
        assert_ne!(order[2], "validator");
    }
}

#[test]
fn test_validation_rejects_null_handles_before_the_loader() {
    let h = two_drivers_with_layers();
    h.journal.clear();

    assert_eq!(
        h.tables.device.get_status.as_deref().unwrap()(DeviceHandle::NULL),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    let ctx = context(&h.tables, drivers(&h.tables)[0]);
    h.journal.clear();
    let mut list = CommandListHandle::NULL;
    assert_eq!(
        h.tables.command_list.create.as_deref().unwrap()(
            ctx,
            DeviceHandle::NULL,
            &CommandListDesc::default(),
            &mut list
        ),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    assert!(list.is_null());
    assert!(h.journal.is_empty(), "no driver was called");
}

#[test]
fn test_validation_rejects_unknown_enumerations() {
    let h = two_drivers_with_layers();
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);

    let desc = CommandQueueDesc {
        priority: CommandQueuePriority(17),
        ..Default::default()
    };
    let mut queue = CommandQueueHandle::NULL;
    assert_eq!(
        h.tables.command_queue.create.as_deref().unwrap()(ctx, device, &desc, &mut queue),
        ZeResult::ERROR_INVALID_ENUMERATION
    );

    let flags = ContextDesc {
        flags: ContextFlags::from_bits_retain(1 << 30),
    };
    let mut other = ContextHandle::NULL;
    assert_eq!(
        h.tables.context.create.as_deref().unwrap()(driver, &flags, &mut other),
        ZeResult::ERROR_INVALID_ENUMERATION
    );
    assert!(h.journal.calls("zeCommandQueueCreate").is_empty());
}

#[test]
fn test_validation_rejects_null_wait_list_entries() {
    let h = two_drivers_with_layers();
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);

    let mut list = CommandListHandle::NULL;
    h.tables.command_list.create.as_deref().unwrap()(ctx, device, &CommandListDesc::default(), &mut list);
    assert_eq!(
        h.tables.command_list.append_wait_on_events.as_deref().unwrap()(list, &[EventHandle::NULL]),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    assert_eq!(
        h.tables.command_list.append_barrier.as_deref().unwrap()(list, Some(EventHandle::NULL), &[]),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    assert_eq!(
        h.tables.command_list.append_barrier.as_deref().unwrap()(list, None, &[]),
        ZeResult::SUCCESS
    );
}

#[test]
fn test_without_validation_the_driver_sees_bad_enumerations() {
    let h = Harness::initialized(vec![NullDriverConfig::named("a"), NullDriverConfig::named("b")]);
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);

    let desc = CommandQueueDesc {
        mode: CommandQueueMode(9),
        ..Default::default()
    };
    let mut queue = CommandQueueHandle::NULL;
    assert_eq!(
        h.tables.command_queue.create.as_deref().unwrap()(ctx, device, &desc, &mut queue),
        ZeResult::SUCCESS
    );
    assert_eq!(h.journal.calls("zeCommandQueueCreate").len(), 1);
}

#[test]
fn test_checker_can_veto_calls() {
    let h = two_drivers_with_layers();
    let validator = h.loader.validator().unwrap();
    validator.add_checker(|call: &Call<'_>| -> Result<(), ZeResult> {
        if call.name == "zeDeviceGetStatus" {
            Err(ZeResult::ERROR_UNSUPPORTED_FEATURE)
        } else {
            Ok(())
        }
    });
    assert_eq!(validator.checker_count(), 1);

    let device = devices(&h.tables, drivers(&h.tables)[0])[0];
    assert_eq!(
        h.tables.device.get_status.as_deref().unwrap()(device),
        ZeResult::ERROR_UNSUPPORTED_FEATURE
    );
    let mut props = DeviceProperties::default();
    assert_eq!(
        h.tables.device.get_properties.as_deref().unwrap()(device, &mut props),
        ZeResult::SUCCESS
    );
}

#[test]
fn test_tracer_sees_arguments_and_results() {
    let h = two_drivers_with_layers();
    let entered = Arc::new(Mutex::new(Vec::new()));
    let exited = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&entered);
    let results = Arc::clone(&exited);
    h.loader.tracer().unwrap().register(
        Tracer::new()
            .on_enter(move |_, args| log.lock().unwrap().push(args.to_string()))
            .on_exit(move |api, result| results.lock().unwrap().push((api, result))),
    );

    let status = h.tables.device.get_status.as_deref().unwrap();
    assert_eq!(status(DeviceHandle::NULL), ZeResult::ERROR_INVALID_NULL_HANDLE);

    assert_eq!(
        entered.lock().unwrap().as_slice(),
        ["zeDeviceGetStatus(device=DeviceHandle(0x0))"]
    );
    assert_eq!(
        exited.lock().unwrap().as_slice(),
        [("zeDeviceGetStatus", ZeResult::ERROR_INVALID_NULL_HANDLE)]
    );
}

#[test]
fn test_tracer_enable_disable_and_unregister() {
    let h = two_drivers_with_layers();
    let device = devices(&h.tables, drivers(&h.tables)[0])[0];
    let status = h.tables.device.get_status.as_deref().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let api_tracer = h.loader.tracer().unwrap();
    let tracer = api_tracer.register(Tracer::new().on_exit(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(api_tracer.tracer_count(), 1);

    status(device);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tracer.set_enabled(false);
    status(device);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tracer.set_enabled(true);
    assert!(api_tracer.unregister(&tracer));
    assert!(!api_tracer.unregister(&tracer));
    status(device);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_layers_wrap_every_populated_entry() {
    let h = two_drivers_with_layers();
    let plain = Harness::new(vec![NullDriverConfig::named("a"), NullDriverConfig::named("b")]);
    assert_eq!(h.tables.populated(), plain.tables.populated());
    assert!(!h.tables.device.same_entries(&plain.tables.device));
}

#[test]
fn test_validated_device_enumeration_routes_to_owning_driver() {
    let h = Harness::initialized_with(
        vec![NullDriverConfig::named("a").devices(2), NullDriverConfig::named("b").devices(3)],
        |b| b.validation(Validator::new()),
    );
    let handles = drivers(&h.tables);
    assert_eq!(handles.len(), 2);
    assert_eq!(common::device_count(&h.tables, handles[0]) + common::device_count(&h.tables, handles[1]), 5);

    let status = h.tables.device.get_status.as_deref().unwrap();
    for (driver, name, natives) in [
        (handles[0], "a", h.driver(0).native_devices()),
        (handles[1], "b", h.driver(1).native_devices()),
    ] {
        for device in devices(&h.tables, driver) {
            assert_eq!(status(device), ZeResult::SUCCESS);
            let call = h.journal.last("zeDeviceGetStatus").unwrap();
            assert_eq!(call.source, name);
            assert!(natives.iter().any(|n| n.as_raw() == call.handles[0]));
        }
    }
}

#[test]
fn test_validation_rejects_null_driver_enumeration() {
    let h = two_drivers_with_layers();
    let mut count = 0;
    assert_eq!(
        h.tables.device.get.as_deref().unwrap()(DriverHandle::NULL, &mut count, None),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    assert_eq!(count, 0);
}
