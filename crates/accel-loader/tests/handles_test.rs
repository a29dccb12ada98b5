//! Handle virtualization across several drivers: fan-out enumeration,
//! identity, object lifetime and routing of calls to the owning driver.
//!
//! Run with: cargo test -p accel-loader --test handles_test

mod common;

use accel_api::*;
use accel_null_driver::{KernelArg, NullDriverConfig};

use common::{context, device_count, devices, drivers, Harness};

fn two_drivers() -> Harness {
    Harness::initialized(vec![
        NullDriverConfig::named("a").devices(2),
        NullDriverConfig::named("b").driver_count(2).devices(3),
    ])
}

#[test]
fn test_driver_enumeration_concatenates_in_registration_order() {
    let h = two_drivers();
    let all = drivers(&h.tables);
    assert_eq!(all.len(), 3);

    // Routing follows the owner: a's instance first, then b's two.
    assert_eq!(device_count(&h.tables, all[0]), 2);
    assert_eq!(device_count(&h.tables, all[1]), 3);
    assert_eq!(device_count(&h.tables, all[2]), 3);

    let natives: Vec<_> = h
        .driver(0)
        .native_drivers()
        .into_iter()
        .chain(h.driver(1).native_drivers())
        .collect();
    for handle in &all {
        assert!(!natives.contains(handle), "{handle:?} leaked a native handle");
    }
}

#[test]
fn test_device_count_is_conserved_across_drivers() {
    let h = two_drivers();
    let per_driver: u32 = drivers(&h.tables)
        .into_iter()
        .map(|d| device_count(&h.tables, d))
        .sum();
    assert_eq!(per_driver, 8);

    // A null driver handle enumerates every instance at once.
    assert_eq!(device_count(&h.tables, DriverHandle::NULL), 8);
    let everything = devices(&h.tables, DriverHandle::NULL);
    assert_eq!(everything.len(), 8);

    let mut by_driver = Vec::new();
    for d in drivers(&h.tables) {
        by_driver.extend(devices(&h.tables, d));
    }
    assert_eq!(everything, by_driver, "same handles, same order");
}

#[test]
fn test_enumeration_twice_yields_identical_handles() {
    let h = two_drivers();
    let first = drivers(&h.tables);
    let live = h.loader.live_objects();
    let second = drivers(&h.tables);
    assert_eq!(first, second);
    assert_eq!(h.loader.live_objects(), live, "no new wrappers for known objects");
}

#[test]
fn test_partial_fill_returns_requested_prefix() {
    let h = two_drivers();
    let get = h.tables.driver.get.as_deref().unwrap();
    let all = drivers(&h.tables);

    let mut two = [DriverHandle::NULL; 2];
    let mut count = 2;
    assert_eq!(get(&mut count, Some(&mut two)), ZeResult::SUCCESS);
    assert_eq!(count, 2);
    assert_eq!(two.to_vec(), all[..2].to_vec());

    let mut roomy = [DriverHandle::NULL; 10];
    let mut count = 10;
    assert_eq!(get(&mut count, Some(&mut roomy)), ZeResult::SUCCESS);
    assert_eq!(count, 3);
}

#[test]
fn test_short_buffer_is_invalid_size() {
    let h = two_drivers();
    let get = h.tables.driver.get.as_deref().unwrap();
    let mut one = [DriverHandle::NULL; 1];
    let mut count = 3;
    assert_eq!(get(&mut count, Some(&mut one)), ZeResult::ERROR_INVALID_SIZE);
    assert_eq!(count, 3);
    assert_eq!(one[0], DriverHandle::NULL);
}

#[test]
fn test_enumeration_error_aborts_without_partial_results() {
    let h = Harness::initialized(vec![
        NullDriverConfig::named("good").devices(2),
        NullDriverConfig::named("bad").enumeration_error(ZeResult::ERROR_DEVICE_LOST),
    ]);
    let live = h.loader.live_objects();
    let get = h.tables.device.get.as_deref().unwrap();

    let mut count = 0;
    assert_eq!(get(DriverHandle::NULL, &mut count, None), ZeResult::ERROR_DEVICE_LOST);
    assert_eq!(count, 0);

    let mut out = [DeviceHandle::NULL; 4];
    let mut count = 4;
    assert_eq!(
        get(DriverHandle::NULL, &mut count, Some(&mut out)),
        ZeResult::ERROR_DEVICE_LOST
    );
    assert_eq!(count, 4, "count untouched on error");
    assert!(out.iter().all(|d| d.is_null()));
    assert_eq!(h.loader.live_objects(), live, "wrappers made before the error are released");
}

#[test]
fn test_sub_devices_are_wrapped() {
    let h = Harness::initialized(vec![
        NullDriverConfig::named("a").devices(1).sub_devices(2),
        NullDriverConfig::named("b"),
    ]);
    let device = devices(&h.tables, drivers(&h.tables)[0])[0];
    let get = h.tables.device.get_sub_devices.as_deref().unwrap();

    let mut count = 0;
    assert_eq!(get(device, &mut count, None), ZeResult::SUCCESS);
    assert_eq!(count, 2);
    let mut subs = [DeviceHandle::NULL; 2];
    assert_eq!(get(device, &mut count, Some(&mut subs)), ZeResult::SUCCESS);

    let mut props = DeviceProperties::default();
    let properties = h.tables.device.get_properties.as_deref().unwrap();
    assert_eq!(properties(subs[1], &mut props), ZeResult::SUCCESS);
    assert!(props.is_sub_device);
    assert_eq!(props.sub_device_id, 1);
}

#[test]
fn test_calls_route_to_owning_driver() {
    let h = two_drivers();
    let all = drivers(&h.tables);
    let ctx = context(&h.tables, all[2]);

    let created = h.journal.last("zeContextCreate").unwrap();
    assert_eq!(created.source, "b");
    assert_eq!(created.handles[0], h.driver(1).native_drivers()[1].0);
    assert_ne!(ctx.0, created.handles[1], "application sees the loader handle");

    assert_eq!(
        h.tables.context.get_status.as_deref().unwrap()(ctx),
        ZeResult::SUCCESS
    );
    let status = h.journal.last("zeContextGetStatus").unwrap();
    assert_eq!(status.source, "b");
    assert_eq!(status.handles, [created.handles[1]]);
}

#[test]
fn test_destroyed_handle_is_stale() {
    let h = two_drivers();
    let ctx = context(&h.tables, drivers(&h.tables)[0]);
    let live = h.loader.live_objects();
    let destroy = h.tables.context.destroy.as_deref().unwrap();

    assert_eq!(destroy(ctx), ZeResult::SUCCESS);
    assert_eq!(h.loader.live_objects(), live - 1);
    assert_eq!(h.driver(0).live_objects(), 0);

    assert_eq!(destroy(ctx), ZeResult::ERROR_INVALID_NULL_HANDLE);
    assert_eq!(
        h.tables.context.get_status.as_deref().unwrap()(ctx),
        ZeResult::ERROR_INVALID_NULL_HANDLE
    );
    assert_eq!(h.journal.calls("zeContextDestroy").len(), 1, "stale calls never reach a driver");
}

#[test]
fn test_handle_of_wrong_family_is_rejected() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[0];
    let status = h.tables.device.get_status.as_deref().unwrap();
    assert_eq!(status(DeviceHandle(driver.0)), ZeResult::ERROR_INVALID_NULL_HANDLE);
    assert!(h.journal.calls("zeDeviceGetStatus").is_empty());
}

#[test]
fn test_failed_driver_call_keeps_the_wrapper() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);

    let alloc = h.tables.mem.alloc_device.as_deref().unwrap();
    let mut ptr = 0;
    assert_eq!(
        alloc(ctx, &DeviceMemAllocDesc::default(), 128, 64, device, &mut ptr),
        ZeResult::SUCCESS
    );
    let free = h.tables.mem.free.as_deref().unwrap();
    assert_eq!(free(ctx, ptr), ZeResult::SUCCESS);
    assert_eq!(free(ctx, ptr), ZeResult::ERROR_INVALID_ARGUMENT);

    // The context is still usable after the driver rejected a call on it.
    assert_eq!(
        h.tables.context.destroy.as_deref().unwrap()(ctx),
        ZeResult::SUCCESS
    );
}

#[test]
fn test_command_submission_round_trip() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[1];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);
    let t = &h.tables;

    let mut queue = CommandQueueHandle::NULL;
    t.command_queue.create.as_deref().unwrap()(ctx, device, &CommandQueueDesc::default(), &mut queue);
    let mut list = CommandListHandle::NULL;
    t.command_list.create.as_deref().unwrap()(ctx, device, &CommandListDesc::default(), &mut list);
    let mut pool = EventPoolHandle::NULL;
    assert_eq!(
        t.event_pool.create.as_deref().unwrap()(ctx, &EventPoolDesc::default(), &[device], &mut pool),
        ZeResult::SUCCESS
    );
    let mut event = EventHandle::NULL;
    t.event.create.as_deref().unwrap()(pool, &EventDesc::default(), &mut event);
    let mut fence = FenceHandle::NULL;
    assert_eq!(
        t.fence.create.as_deref().unwrap()(queue, &FenceDesc::default(), &mut fence),
        ZeResult::SUCCESS
    );

    assert_eq!(
        t.command_list.append_barrier.as_deref().unwrap()(list, Some(event), &[]),
        ZeResult::SUCCESS
    );
    assert_eq!(t.command_list.close.as_deref().unwrap()(list), ZeResult::SUCCESS);
    assert_eq!(t.event.query_status.as_deref().unwrap()(event), ZeResult::NOT_READY);
    assert_eq!(
        t.command_queue.execute_command_lists.as_deref().unwrap()(queue, &[list], Some(fence)),
        ZeResult::SUCCESS
    );
    assert_eq!(t.fence.host_synchronize.as_deref().unwrap()(fence, u64::MAX), ZeResult::SUCCESS);
    assert_eq!(t.event.host_synchronize.as_deref().unwrap()(event, 0), ZeResult::SUCCESS);

    // The driver saw its own handles throughout.
    let executed = h.journal.last("zeCommandQueueExecuteCommandLists").unwrap();
    let native_list = h.journal.last("zeCommandListCreate").unwrap().handles[2];
    let native_fence = h.journal.last("zeFenceCreate").unwrap().handles[1];
    assert_eq!(executed.handles[1..], [native_list, native_fence]);

    for result in [
        t.fence.destroy.as_deref().unwrap()(fence),
        t.event.destroy.as_deref().unwrap()(event),
        t.event_pool.destroy.as_deref().unwrap()(pool),
        t.command_list.destroy.as_deref().unwrap()(list),
        t.command_queue.destroy.as_deref().unwrap()(queue),
        t.context.destroy.as_deref().unwrap()(ctx),
    ] {
        assert_eq!(result, ZeResult::SUCCESS);
    }
    assert_eq!(h.driver(1).live_objects(), 0);
}

#[test]
fn test_image_kernel_argument_is_translated() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);
    let t = &h.tables;

    let desc = ModuleDesc {
        input: vec![0x07, 0x23, 0x02, 0x03],
        ..Default::default()
    };
    let mut module = ModuleHandle::NULL;
    assert_eq!(
        t.module.create.as_deref().unwrap()(ctx, device, &desc, &mut module, None),
        ZeResult::SUCCESS
    );
    let mut kernel = KernelHandle::NULL;
    let kernel_desc = KernelDesc {
        name: "main".to_string(),
        ..Default::default()
    };
    assert_eq!(
        t.kernel.create.as_deref().unwrap()(module, &kernel_desc, &mut kernel),
        ZeResult::SUCCESS
    );
    let mut image = ImageHandle::NULL;
    assert_eq!(
        t.image.create.as_deref().unwrap()(ctx, device, &ImageDesc::default(), &mut image),
        ZeResult::SUCCESS
    );
    let mut sampler = SamplerHandle::NULL;
    assert_eq!(
        t.sampler.create.as_deref().unwrap()(ctx, device, &SamplerDesc::default(), &mut sampler),
        ZeResult::SUCCESS
    );

    let set = t.kernel.set_argument_value.as_deref().unwrap();
    assert_eq!(set(kernel, 0, ArgValue::Image(image)), ZeResult::SUCCESS);
    assert_eq!(set(kernel, 1, ArgValue::Sampler(sampler)), ZeResult::SUCCESS);
    assert_eq!(set(kernel, 2, ArgValue::Bytes(&7u32.to_le_bytes())), ZeResult::SUCCESS);

    let native_kernel = KernelHandle(h.journal.last("zeKernelCreate").unwrap().handles[1]);
    let native_image = ImageHandle(h.journal.last("zeImageCreate").unwrap().handles[2]);
    let native_sampler = SamplerHandle(h.journal.last("zeSamplerCreate").unwrap().handles[2]);
    assert_ne!(native_image.0, image.0);

    let driver_a = h.driver(0);
    assert_eq!(driver_a.kernel_argument(native_kernel, 0), Some(KernelArg::Image(native_image)));
    assert_eq!(driver_a.kernel_argument(native_kernel, 1), Some(KernelArg::Sampler(native_sampler)));
    assert_eq!(
        driver_a.kernel_argument(native_kernel, 2),
        Some(KernelArg::Bytes(vec![7, 0, 0, 0]))
    );

    // Once destroyed the image is no longer translated, so the driver sees a
    // handle it does not own.
    assert_eq!(t.image.destroy.as_deref().unwrap()(image), ZeResult::SUCCESS);
    assert_eq!(set(kernel, 3, ArgValue::Image(image)), ZeResult::ERROR_INVALID_ARGUMENT);
}

#[test]
fn test_module_build_log_is_wrapped() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);
    let t = &h.tables;

    let desc = ModuleDesc {
        input: vec![1],
        ..Default::default()
    };
    let mut module = ModuleHandle::NULL;
    let mut log = ModuleBuildLogHandle::NULL;
    assert_eq!(
        t.module.create.as_deref().unwrap()(ctx, device, &desc, &mut module, Some(&mut log)),
        ZeResult::SUCCESS
    );
    let native_log = h.journal.last("zeModuleCreate").unwrap().handles[3];
    assert!(!log.is_null());
    assert_ne!(log.0, native_log);

    let mut text = String::new();
    assert_eq!(
        t.module_build_log.get_string.as_deref().unwrap()(log, &mut text),
        ZeResult::SUCCESS
    );
    assert_eq!(text, "a: build succeeded");
    assert_eq!(t.module_build_log.destroy.as_deref().unwrap()(log), ZeResult::SUCCESS);

    let link = t.module.dynamic_link.as_deref().unwrap();
    assert_eq!(link(&[], None), ZeResult::ERROR_INVALID_SIZE);
    let mut link_log = ModuleBuildLogHandle::NULL;
    assert_eq!(link(&[module], Some(&mut link_log)), ZeResult::SUCCESS);
    assert!(!link_log.is_null());
}

#[test]
fn test_module_wrap_failure_still_wraps_the_build_log() {
    let h = Harness::initialized_with(
        vec![NullDriverConfig::named("a").devices(1), NullDriverConfig::named("b").devices(1)],
        |b| b.max_live_handles(2),
    );
    let driver = drivers(&h.tables)[0];
    let device = devices(&h.tables, driver)[0];
    let ctx = context(&h.tables, driver);
    let t = &h.tables;
    let create = t.module.create.as_deref().unwrap();
    let destroy_log = t.module_build_log.destroy.as_deref().unwrap();
    let desc = ModuleDesc {
        input: vec![1],
        ..Default::default()
    };

    for _ in 0..2 {
        let mut module = ModuleHandle::NULL;
        let mut log = ModuleBuildLogHandle::NULL;
        assert_eq!(create(ctx, device, &desc, &mut module, Some(&mut log)), ZeResult::SUCCESS);
        assert_eq!(destroy_log(log), ZeResult::SUCCESS);
    }
    let native_live = h.driver(0).live_objects();

    let mut module = ModuleHandle::NULL;
    let mut log = ModuleBuildLogHandle::NULL;
    assert_eq!(
        create(ctx, device, &desc, &mut module, Some(&mut log)),
        ZeResult::ERROR_OUT_OF_HOST_MEMORY
    );
    assert!(module.is_null());
    let native_log = h.journal.last("zeModuleCreate").unwrap().handles[3];
    assert!(!log.is_null());
    assert_ne!(log.0, native_log);

    let mut text = String::new();
    assert_eq!(
        t.module_build_log.get_string.as_deref().unwrap()(log, &mut text),
        ZeResult::SUCCESS
    );
    assert_eq!(destroy_log(log), ZeResult::SUCCESS);
    // The driver's module stays created.
    assert_eq!(h.driver(0).live_objects(), native_live + 1);
}

#[test]
fn test_wrap_failure_after_create_is_out_of_host_memory() {
    let h = Harness::initialized_with(
        vec![NullDriverConfig::named("a").devices(1), NullDriverConfig::named("b").devices(1)],
        |b| b.max_live_handles(2),
    );
    let driver = drivers(&h.tables)[0];
    context(&h.tables, driver);
    context(&h.tables, driver);
    let loader_live = h.loader.live_objects();
    let native_live = h.driver(0).live_objects();

    let mut ctx = ContextHandle::NULL;
    assert_eq!(
        h.tables.context.create.as_deref().unwrap()(driver, &ContextDesc::default(), &mut ctx),
        ZeResult::ERROR_OUT_OF_HOST_MEMORY
    );
    assert!(ctx.is_null());
    assert_eq!(h.journal.calls("zeContextCreate").len(), 3);
    assert_eq!(h.driver(0).live_objects(), native_live + 1, "driver object not rolled back");
    assert_eq!(h.loader.live_objects(), loader_live);
}

#[test]
fn test_wrap_failure_mid_enumeration_releases_the_whole_array() {
    let h = Harness::initialized_with(
        vec![NullDriverConfig::named("a").devices(2), NullDriverConfig::named("b").devices(2)],
        |b| b.max_live_handles(3),
    );
    let get = h.tables.device.get.as_deref().unwrap();
    let live = h.loader.live_objects();

    let mut count = 0;
    assert_eq!(get(DriverHandle::NULL, &mut count, None), ZeResult::SUCCESS);
    assert_eq!(count, 4);

    let mut out = [DeviceHandle::NULL; 4];
    assert_eq!(
        get(DriverHandle::NULL, &mut count, Some(&mut out)),
        ZeResult::ERROR_OUT_OF_HOST_MEMORY
    );
    assert_eq!(count, 4, "count untouched on error");
    assert!(out.iter().all(|d| d.is_null()));
    assert_eq!(h.loader.live_objects(), live);

    // Three fit.
    let mut count = 3;
    assert_eq!(get(DriverHandle::NULL, &mut count, Some(&mut out[..3])), ZeResult::SUCCESS);
    assert_eq!(count, 3);
    assert!(out[..3].iter().all(|d| !d.is_null()));
    assert_eq!(h.loader.live_objects(), live + 3);
}

#[test]
fn test_fabric_topology_is_virtualized() {
    let h = two_drivers();
    let t = &h.tables;
    let get = t.fabric_vertex.get.as_deref().unwrap();

    // Two vertices per driver instance, three instances.
    let mut count = 0;
    assert_eq!(get(DriverHandle::NULL, &mut count, None), ZeResult::SUCCESS);
    assert_eq!(count, 6);

    let driver = drivers(t)[0];
    let mut count = 0;
    assert_eq!(get(driver, &mut count, None), ZeResult::SUCCESS);
    let mut vertices = vec![FabricVertexHandle::NULL; count as usize];
    assert_eq!(get(driver, &mut count, Some(vertices.as_mut_slice())), ZeResult::SUCCESS);

    let edges = t.fabric_edge.get.as_deref().unwrap();
    let mut count = 1;
    let mut edge = [FabricEdgeHandle::NULL; 1];
    assert_eq!(
        edges(vertices[0], vertices[1], &mut count, Some(&mut edge)),
        ZeResult::SUCCESS
    );
    assert_eq!(count, 1);

    let mut a = FabricVertexHandle::NULL;
    let mut b = FabricVertexHandle::NULL;
    assert_eq!(
        t.fabric_edge.get_vertices.as_deref().unwrap()(edge[0], &mut a, &mut b),
        ZeResult::SUCCESS
    );
    assert_eq!((a, b), (vertices[0], vertices[1]), "known vertices map back to the same handles");

    let mut device = DeviceHandle::NULL;
    assert_eq!(
        t.fabric_vertex.get_device.as_deref().unwrap()(vertices[0], &mut device),
        ZeResult::SUCCESS
    );
    assert_eq!(device, devices(t, driver)[0]);
}

#[test]
fn test_rtas_objects_route_through_driver() {
    let h = two_drivers();
    let driver = drivers(&h.tables)[2];
    let t = &h.tables;

    let mut builder = RtasBuilderHandle::NULL;
    let desc = RtasBuilderDesc {
        builder_version: RtasBuilderVersion::V1_0,
    };
    assert_eq!(
        t.rtas_builder.create.as_deref().unwrap()(driver, &desc, &mut builder),
        ZeResult::SUCCESS
    );
    let mut props = RtasBuilderBuildProperties::default();
    assert_eq!(
        t.rtas_builder.get_build_properties.as_deref().unwrap()(builder, &mut props),
        ZeResult::SUCCESS
    );
    assert!(props.rtas_buffer_size_bytes > 0);

    let mut op = RtasParallelOperationHandle::NULL;
    assert_eq!(
        t.rtas_parallel_operation.create.as_deref().unwrap()(driver, &mut op),
        ZeResult::SUCCESS
    );
    assert_eq!(t.rtas_parallel_operation.join.as_deref().unwrap()(op), ZeResult::SUCCESS);
    assert_eq!(t.rtas_parallel_operation.destroy.as_deref().unwrap()(op), ZeResult::SUCCESS);
    assert_eq!(t.rtas_builder.destroy.as_deref().unwrap()(builder), ZeResult::SUCCESS);
    assert_eq!(h.driver(1).live_objects(), 0);
}
