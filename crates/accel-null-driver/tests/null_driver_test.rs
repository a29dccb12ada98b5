//! Null driver used directly, without a loader in front of it.
//!
//! Run with: cargo test -p accel-null-driver --test null_driver_test

use accel_api::*;
use accel_null_driver::{Journal, KernelArg, NullDriver, NullDriverConfig};

fn tables(driver: &NullDriver) -> DdiTables {
    let v = ApiVersion::CURRENT;
    let mut t = DdiTables::default();
    t.global = driver.global_table(v, &t.global).unwrap();
    t.driver = driver.driver_table(v, &t.driver).unwrap();
    t.device = driver.device_table(v, &t.device).unwrap();
    t.context = driver.context_table(v, &t.context).unwrap();
    t.command_queue = driver.command_queue_table(v, &t.command_queue).unwrap();
    t.command_list = driver.command_list_table(v, &t.command_list).unwrap();
    t.fence = driver.fence_table(v, &t.fence).unwrap();
    t.event_pool = driver.event_pool_table(v, &t.event_pool).unwrap();
    t.event = driver.event_table(v, &t.event).unwrap();
    t.image = driver.image_table(v, &t.image).unwrap();
    t.kernel = driver.kernel_table(v, &t.kernel).unwrap();
    t.module = driver.module_table(v, &t.module).unwrap();
    t.mem = driver.mem_table(v, &t.mem).unwrap();
    t
}

fn initialized(config: NullDriverConfig) -> (NullDriver, DdiTables) {
    let driver = NullDriver::new(config);
    let t = tables(&driver);
    assert_eq!(t.global.init.as_deref().unwrap()(InitFlags::empty()), ZeResult::SUCCESS);
    (driver, t)
}

fn first_driver(t: &DdiTables) -> DriverHandle {
    let mut handles = [DriverHandle::NULL; 1];
    let mut count = 1;
    assert_eq!(
        t.driver.get.as_deref().unwrap()(&mut count, Some(&mut handles)),
        ZeResult::SUCCESS
    );
    handles[0]
}

#[test]
fn test_every_entry_is_populated() {
    let driver = NullDriver::new(NullDriverConfig::default());
    let t = tables(&driver);
    assert_eq!(t.device.populated(), DeviceDdi::ENTRY_NAMES.len());
    assert_eq!(t.command_list.populated(), CommandListDdi::ENTRY_NAMES.len());

    let fabric = driver
        .fabric_edge_table(ApiVersion::CURRENT, &FabricEdgeDdi::default())
        .unwrap();
    assert_eq!(fabric.populated(), FabricEdgeDdi::ENTRY_NAMES.len());
}

#[test]
fn test_driver_get_requires_init() {
    let driver = NullDriver::new(NullDriverConfig::default());
    let t = tables(&driver);
    let mut count = 0;
    assert_eq!(
        t.driver.get.as_deref().unwrap()(&mut count, None),
        ZeResult::ERROR_UNINITIALIZED
    );

    assert_eq!(
        t.global.init.as_deref().unwrap()(InitFlags::VPU_ONLY),
        ZeResult::ERROR_UNINITIALIZED
    );
    assert_eq!(t.global.init.as_deref().unwrap()(InitFlags::GPU_ONLY), ZeResult::SUCCESS);
    assert_eq!(t.driver.get.as_deref().unwrap()(&mut count, None), ZeResult::SUCCESS);
    assert_eq!(count, 1);
}

#[test]
fn test_two_phase_enumeration() {
    let (driver, t) = initialized(NullDriverConfig::default().devices(3));
    let drv = first_driver(&t);
    let get = t.device.get.as_deref().unwrap();

    let mut count = 0;
    assert_eq!(get(drv, &mut count, None), ZeResult::SUCCESS);
    assert_eq!(count, 3);

    // Asking for fewer than available returns exactly that many.
    let mut two = [DeviceHandle::NULL; 2];
    let mut count = 2;
    assert_eq!(get(drv, &mut count, Some(&mut two)), ZeResult::SUCCESS);
    assert_eq!(count, 2);
    assert_eq!(two.to_vec(), driver.native_devices()[..2].to_vec());

    // Asking for more than available clamps the count.
    let mut many = [DeviceHandle::NULL; 8];
    let mut count = 8;
    assert_eq!(get(drv, &mut count, Some(&mut many)), ZeResult::SUCCESS);
    assert_eq!(count, 3);

    // A buffer shorter than the requested count is rejected.
    let mut short = [DeviceHandle::NULL; 1];
    let mut count = 3;
    assert_eq!(get(drv, &mut count, Some(&mut short)), ZeResult::ERROR_INVALID_SIZE);
}

#[test]
fn test_foreign_handles_are_rejected() {
    let (_a, ta) = initialized(NullDriverConfig::named("a"));
    let (b, _tb) = initialized(NullDriverConfig::named("b"));

    let foreign = b.native_devices()[0];
    let status = ta.device.get_status.as_deref().unwrap();
    assert_eq!(status(foreign), ZeResult::ERROR_INVALID_ARGUMENT);
    assert_eq!(status(DeviceHandle::NULL), ZeResult::ERROR_INVALID_NULL_HANDLE);

    // Right driver, wrong family.
    let drv = first_driver(&ta);
    assert_eq!(status(DeviceHandle(drv.0)), ZeResult::ERROR_INVALID_ARGUMENT);
}

#[test]
fn test_native_handles_leave_top_byte_clear() {
    let driver = NullDriver::new(NullDriverConfig::default().driver_count(2));
    for raw in driver
        .native_drivers()
        .iter()
        .map(|d| d.0)
        .chain(driver.native_devices().iter().map(|d| d.0))
    {
        assert_eq!(raw >> 56, 0, "{raw:#x}");
    }
}

#[test]
fn test_create_and_destroy_track_live_objects() {
    let (driver, t) = initialized(NullDriverConfig::default());
    let drv = first_driver(&t);
    let device = driver.native_devices()[0];

    let mut ctx = ContextHandle::NULL;
    assert_eq!(
        t.context.create.as_deref().unwrap()(drv, &ContextDesc::default(), &mut ctx),
        ZeResult::SUCCESS
    );
    let mut queue = CommandQueueHandle::NULL;
    assert_eq!(
        t.command_queue.create.as_deref().unwrap()(ctx, device, &CommandQueueDesc::default(), &mut queue),
        ZeResult::SUCCESS
    );
    assert_eq!(driver.live_objects(), 2);

    let destroy_queue = t.command_queue.destroy.as_deref().unwrap();
    assert_eq!(destroy_queue(queue), ZeResult::SUCCESS);
    assert_eq!(destroy_queue(queue), ZeResult::ERROR_INVALID_ARGUMENT, "already destroyed");
    assert_eq!(t.context.destroy.as_deref().unwrap()(ctx), ZeResult::SUCCESS);
    assert_eq!(driver.live_objects(), 0);

    // Topology objects cannot be destroyed.
    assert_eq!(
        t.context.destroy.as_deref().unwrap()(ContextHandle(device.0)),
        ZeResult::ERROR_INVALID_ARGUMENT
    );
}

#[test]
fn test_execution_signals_fence_and_events() {
    let (driver, t) = initialized(NullDriverConfig::default());
    let drv = first_driver(&t);
    let device = driver.native_devices()[0];

    let mut ctx = ContextHandle::NULL;
    t.context.create.as_deref().unwrap()(drv, &ContextDesc::default(), &mut ctx);
    let mut queue = CommandQueueHandle::NULL;
    t.command_queue.create.as_deref().unwrap()(ctx, device, &CommandQueueDesc::default(), &mut queue);
    let mut list = CommandListHandle::NULL;
    t.command_list.create.as_deref().unwrap()(ctx, device, &CommandListDesc::default(), &mut list);
    let mut pool = EventPoolHandle::NULL;
    t.event_pool.create.as_deref().unwrap()(ctx, &EventPoolDesc::default(), &[device], &mut pool);
    let mut event = EventHandle::NULL;
    t.event.create.as_deref().unwrap()(pool, &EventDesc::default(), &mut event);
    let mut fence = FenceHandle::NULL;
    t.fence.create.as_deref().unwrap()(queue, &FenceDesc::default(), &mut fence);

    let execute = t.command_queue.execute_command_lists.as_deref().unwrap();
    let query_event = t.event.query_status.as_deref().unwrap();
    let query_fence = t.fence.query_status.as_deref().unwrap();

    assert_eq!(
        t.command_list.append_barrier.as_deref().unwrap()(list, Some(event), &[]),
        ZeResult::SUCCESS
    );
    assert_eq!(
        execute(queue, &[list], Some(fence)),
        ZeResult::ERROR_INVALID_ARGUMENT,
        "list is still open"
    );
    assert_eq!(t.command_list.close.as_deref().unwrap()(list), ZeResult::SUCCESS);
    assert_eq!(query_event(event), ZeResult::NOT_READY);
    assert_eq!(query_fence(fence), ZeResult::NOT_READY);

    assert_eq!(execute(queue, &[list], Some(fence)), ZeResult::SUCCESS);
    assert_eq!(query_event(event), ZeResult::SUCCESS);
    assert_eq!(query_fence(fence), ZeResult::SUCCESS);

    assert_eq!(t.event.host_reset.as_deref().unwrap()(event), ZeResult::SUCCESS);
    assert_eq!(query_event(event), ZeResult::NOT_READY);
}

#[test]
fn test_kernel_arguments_are_recorded() {
    let (driver, t) = initialized(NullDriverConfig::default());
    let drv = first_driver(&t);
    let device = driver.native_devices()[0];

    let mut ctx = ContextHandle::NULL;
    t.context.create.as_deref().unwrap()(drv, &ContextDesc::default(), &mut ctx);
    let desc = ModuleDesc {
        input: vec![0x03, 0x02, 0x23, 0x07],
        ..Default::default()
    };
    let mut module = ModuleHandle::NULL;
    let mut log = ModuleBuildLogHandle::NULL;
    assert_eq!(
        t.module.create.as_deref().unwrap()(ctx, device, &desc, &mut module, Some(&mut log)),
        ZeResult::SUCCESS
    );
    assert!(!log.is_null());

    let create_kernel = t.kernel.create.as_deref().unwrap();
    let mut kernel = KernelHandle::NULL;
    let unknown = KernelDesc {
        name: "missing".to_string(),
        ..Default::default()
    };
    assert_eq!(create_kernel(module, &unknown, &mut kernel), ZeResult::ERROR_INVALID_ARGUMENT);
    let main = KernelDesc {
        name: "main".to_string(),
        ..Default::default()
    };
    assert_eq!(create_kernel(module, &main, &mut kernel), ZeResult::SUCCESS);

    let mut image = ImageHandle::NULL;
    t.image.create.as_deref().unwrap()(ctx, device, &ImageDesc::default(), &mut image);

    let set = t.kernel.set_argument_value.as_deref().unwrap();
    assert_eq!(set(kernel, 0, ArgValue::Bytes(&[1, 2, 3, 4])), ZeResult::SUCCESS);
    assert_eq!(set(kernel, 1, ArgValue::Image(image)), ZeResult::SUCCESS);
    assert_eq!(
        set(kernel, 2, ArgValue::Image(ImageHandle(0xbad))),
        ZeResult::ERROR_INVALID_ARGUMENT
    );

    assert_eq!(driver.kernel_argument(kernel, 0), Some(KernelArg::Bytes(vec![1, 2, 3, 4])));
    assert_eq!(driver.kernel_argument(kernel, 1), Some(KernelArg::Image(image)));
    assert_eq!(driver.kernel_argument(kernel, 2), None);

    let mut name = String::new();
    t.kernel.get_name.as_deref().unwrap()(kernel, &mut name);
    assert_eq!(name, "main");
}

#[test]
fn test_memory_allocation_rules() {
    let (driver, t) = initialized(NullDriverConfig::default());
    let drv = first_driver(&t);
    let device = driver.native_devices()[0];
    let mut ctx = ContextHandle::NULL;
    t.context.create.as_deref().unwrap()(drv, &ContextDesc::default(), &mut ctx);

    let alloc = t.mem.alloc_device.as_deref().unwrap();
    let desc = DeviceMemAllocDesc::default();
    let mut ptr = 0;
    assert_eq!(alloc(ctx, &desc, 0, 64, device, &mut ptr), ZeResult::ERROR_UNSUPPORTED_SIZE);
    assert_eq!(alloc(ctx, &desc, 64, 3, device, &mut ptr), ZeResult::ERROR_UNSUPPORTED_ALIGNMENT);
    assert_eq!(alloc(ctx, &desc, 64, 64, device, &mut ptr), ZeResult::SUCCESS);
    assert_ne!(ptr, 0);

    let free = t.mem.free.as_deref().unwrap();
    assert_eq!(free(ctx, ptr), ZeResult::SUCCESS);
    assert_eq!(free(ctx, ptr), ZeResult::ERROR_INVALID_ARGUMENT);
}

#[test]
fn test_fault_injection() {
    let driver = NullDriver::new(NullDriverConfig::default().fail_init(ZeResult::ERROR_DEVICE_LOST));
    assert_eq!(
        tables(&driver).global.init.as_deref().unwrap()(InitFlags::empty()),
        ZeResult::ERROR_DEVICE_LOST
    );

    let driver = NullDriver::new(
        NullDriverConfig::default().fail_table(InterfaceFamily::Mem, ZeResult::ERROR_UNSUPPORTED_FEATURE),
    );
    assert!(driver.device_table(ApiVersion::CURRENT, &DeviceDdi::default()).is_ok());
    assert_eq!(
        driver.mem_table(ApiVersion::CURRENT, &MemDdi::default()).unwrap_err(),
        ZeResult::ERROR_UNSUPPORTED_FEATURE
    );

    let driver = NullDriver::new(NullDriverConfig::default().without_entry("zeDeviceGetStatus"));
    let device = driver.device_table(ApiVersion::CURRENT, &DeviceDdi::default()).unwrap();
    assert!(device.get_status.is_none());
    assert!(device.get.is_some());

    let (_driver, t) = initialized(NullDriverConfig::default().enumeration_error(ZeResult::ERROR_DEVICE_LOST));
    let mut count = 0;
    assert_eq!(
        t.device.get.as_deref().unwrap()(first_driver(&t), &mut count, None),
        ZeResult::ERROR_DEVICE_LOST
    );
}

#[test]
fn test_table_request_checks_major_version() {
    let driver = NullDriver::new(NullDriverConfig::default());
    assert!(driver.global_table(ApiVersion::V1_0, &GlobalDdi::default()).is_ok());
    assert_eq!(
        driver.global_table(ApiVersion::new(2, 0), &GlobalDdi::default()).unwrap_err(),
        ZeResult::ERROR_UNSUPPORTED_VERSION
    );
}

#[test]
fn test_shared_journal_orders_calls_across_drivers() {
    let journal = Journal::new();
    let a = NullDriver::with_journal(NullDriverConfig::named("a"), journal.clone());
    let b = NullDriver::with_journal(NullDriverConfig::named("b"), journal.clone());

    tables(&b).global.init.as_deref().unwrap()(InitFlags::empty());
    tables(&a).global.init.as_deref().unwrap()(InitFlags::empty());

    let sources: Vec<_> = journal.calls("zeInit").into_iter().map(|e| e.source).collect();
    assert_eq!(sources, ["b", "a"]);
    assert_eq!(journal.last("zeInit").unwrap().source, "a");

    journal.clear();
    assert!(journal.is_empty());
}
