//! Dispatch tables: entry bookkeeping, interception and argument checks.
//!
//! Run with: cargo test -p accel-api --test ddi_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use accel_api::*;

fn device_table() -> DeviceDdi {
    DeviceDdi {
        get_status: Some(Arc::new(|device: DeviceHandle| {
            if device.0 == 0xdead {
                ZeResult::ERROR_DEVICE_LOST
            } else {
                ZeResult::SUCCESS
            }
        })),
        get_properties: Some(Arc::new(|_: DeviceHandle, props: &mut DeviceProperties| {
            props.name = "fake".to_string();
            ZeResult::SUCCESS
        })),
        ..Default::default()
    }
}

/// Records prologue text and epilogue results; rejects calls named in
/// `deny`.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    results: Mutex<Vec<(&'static str, ZeResult)>>,
    deny: Option<&'static str>,
}

impl Interceptor for Recorder {
    fn prologue(&self, call: &Call<'_>) -> Result<(), ZeResult> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.deny == Some(call.name) {
            return Err(ZeResult::ERROR_UNSUPPORTED_FEATURE);
        }
        Ok(())
    }

    fn epilogue(&self, name: &'static str, result: ZeResult) -> ZeResult {
        self.results.lock().unwrap().push((name, result));
        result
    }
}

#[test]
fn test_entry_names_follow_declaration_order() {
    assert_eq!(GlobalDdi::ENTRY_NAMES, &["zeInit"]);
    assert_eq!(DeviceDdi::ENTRY_NAMES[0], "zeDeviceGet");
    assert!(FabricEdgeDdi::ENTRY_NAMES.contains(&"zeFabricEdgeGetVerticesExp"));
    assert_eq!(InterfaceFamily::Device.entry_names(), DeviceDdi::ENTRY_NAMES);
    assert_eq!(InterfaceFamily::ALL.len(), 20);
}

#[test]
fn test_populated_and_clear_entry() {
    let mut table = device_table();
    assert_eq!(table.populated(), 2);
    assert_eq!(table.entry_count(), 2);

    assert!(table.clear_entry("zeDeviceGetStatus"));
    assert!(!table.clear_entry("zeDeviceGetStatus"), "already cleared");
    assert!(!table.clear_entry("zeNoSuchFunction"));
    assert!(table.get_status.is_none());
    assert_eq!(table.populated(), 1);
}

#[test]
fn test_clone_shares_entries() {
    let table = device_table();
    let copy = table.clone();
    assert!(table.same_entries(&copy));
    assert!(DeviceDdi::default().same_entries(&DeviceDdi::default()));

    // Same behavior, different function objects.
    assert!(!table.same_entries(&device_table()));
}

#[test]
fn test_intercept_runs_prologue_then_entry_then_epilogue() {
    let hook = Arc::new(Recorder::default());
    let table = device_table().intercept(&hook);
    assert_eq!(table.populated(), 2, "unset entries stay unset");
    assert!(table.get.is_none());

    let status = table.get_status.as_deref().unwrap();
    assert_eq!(status(DeviceHandle(0x10)), ZeResult::SUCCESS);
    assert_eq!(status(DeviceHandle(0xdead)), ZeResult::ERROR_DEVICE_LOST);

    let calls = hook.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], "zeDeviceGetStatus(device=DeviceHandle(0x10))");
    let results = hook.results.lock().unwrap();
    assert_eq!(
        *results,
        vec![
            ("zeDeviceGetStatus", ZeResult::SUCCESS),
            ("zeDeviceGetStatus", ZeResult::ERROR_DEVICE_LOST),
        ]
    );
}

#[test]
fn test_prologue_rejection_skips_wrapped_entry() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);
    let table = DeviceDdi {
        get_status: Some(Arc::new(move |_: DeviceHandle| {
            counter.fetch_add(1, Ordering::SeqCst);
            ZeResult::SUCCESS
        })),
        ..Default::default()
    };
    let hook = Arc::new(Recorder {
        deny: Some("zeDeviceGetStatus"),
        ..Default::default()
    });
    let wrapped = table.intercept(&hook);

    let result = wrapped.get_status.as_deref().unwrap()(DeviceHandle(1));
    assert_eq!(result, ZeResult::ERROR_UNSUPPORTED_FEATURE);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    // The epilogue still sees the rejection.
    assert_eq!(
        hook.results.lock().unwrap().as_slice(),
        &[("zeDeviceGetStatus", ZeResult::ERROR_UNSUPPORTED_FEATURE)]
    );
}

#[test]
fn test_intercept_layer_wraps_prior_table() {
    let layer = InterceptLayer::new("recorder", Recorder::default());
    assert_eq!(layer.name(), "recorder");
    assert_eq!(DdiProvider::api_version(&layer), ApiVersion::CURRENT);

    let prior = device_table();
    let table = DeviceDdi::request(&layer, ApiVersion::CURRENT, &prior).unwrap();
    assert!(!table.same_entries(&prior));

    let mut props = DeviceProperties::default();
    table.get_properties.as_deref().unwrap()(DeviceHandle(7), &mut props);
    assert_eq!(props.name, "fake");
    assert_eq!(layer.hook().calls.lock().unwrap().len(), 1);
}

#[test]
fn test_default_provider_hands_prior_back() {
    struct Empty;
    impl DdiProvider for Empty {
        fn name(&self) -> &str {
            "empty"
        }
    }

    let prior = device_table();
    let table = DeviceDdi::request(&Empty, ApiVersion::CURRENT, &prior).unwrap();
    assert!(table.same_entries(&prior));
}

#[test]
fn test_call_validation_checks_every_argument() {
    let desc = CommandQueueDesc {
        mode: CommandQueueMode(42),
        ..Default::default()
    };
    let context = ContextHandle(1);
    let device = DeviceHandle(2);
    let params: [(&'static str, &dyn Param); 3] = [
        ("context", &context as &dyn Param),
        ("device", &device as &dyn Param),
        ("desc", &desc as &dyn Param),
    ];
    let call = Call::new("zeCommandQueueCreate", &params);
    assert_eq!(call.validate(), Err(ZeResult::ERROR_INVALID_ENUMERATION));

    let null_device = DeviceHandle::NULL;
    let params: [(&'static str, &dyn Param); 2] = [
        ("context", &context as &dyn Param),
        ("device", &null_device as &dyn Param),
    ];
    let call = Call::new("zeCommandQueueCreate", &params);
    assert_eq!(call.validate(), Err(ZeResult::ERROR_INVALID_NULL_HANDLE));
}

#[test]
fn test_param_rules() {
    assert_eq!(
        ImageDesc { width: 0, ..Default::default() }.validate(),
        Err(ZeResult::ERROR_INVALID_SIZE)
    );
    assert_eq!(ModuleDesc::default().validate(), Err(ZeResult::ERROR_INVALID_SIZE));
    assert_eq!(
        KernelDesc::default().validate(),
        Err(ZeResult::ERROR_INVALID_NULL_POINTER)
    );
    assert_eq!(
        ContextDesc { flags: ContextFlags::from_bits_retain(0x80) }.validate(),
        Err(ZeResult::ERROR_INVALID_ENUMERATION)
    );
    assert!(RtasBuilderDesc { builder_version: RtasBuilderVersion::V1_0 }.validate().is_ok());

    // Absent optional handles pass; present ones must be non-null.
    assert!(None::<EventHandle>.validate().is_ok());
    assert_eq!(
        Some(EventHandle::NULL).validate(),
        Err(ZeResult::ERROR_INVALID_NULL_HANDLE)
    );
    let waits = [EventHandle(1), EventHandle::NULL];
    assert_eq!(waits[..].validate(), Err(ZeResult::ERROR_INVALID_NULL_HANDLE));
}

#[test]
fn test_open_enums_keep_unknown_values() {
    let unknown = DeviceType(99);
    assert!(!unknown.is_known());
    assert_eq!(format!("{:?}", unknown), "DeviceType(99)");
    assert_eq!(format!("{:?}", DeviceType::GPU), "GPU");

    let json = serde_json::to_string(&unknown).unwrap();
    assert_eq!(serde_json::from_str::<DeviceType>(&json).unwrap(), unknown);
}

#[test]
fn test_handles_carry_family() {
    assert_eq!(ImageHandle::FAMILY, ObjectFamily::Image);
    assert_eq!(ObjectFamily::Driver.tag(), 1);
    assert!(KernelHandle::NULL.is_null());
    assert_eq!(KernelHandle::from_raw(5).as_raw(), 5);
    assert_eq!(format!("{:?}", FenceHandle(0x20)), "FenceHandle(0x20)");
}
