//! Dispatch tables of the null driver: every entry forwards to a `State`
//! method.

use std::sync::Arc;

use accel_api::*;

use crate::state::State;

macro_rules! entry {
    ($state:expr, $method:ident, |$($arg:ident : $ty:ty),* $(,)?|) => {{
        let state = Arc::clone($state);
        Some(Arc::new(move |$($arg: $ty),*| -> ZeResult {
            ZeResult::from(state.$method($($arg),*))
        }))
    }};
}

pub(crate) fn global(s: &Arc<State>) -> GlobalDdi {
    GlobalDdi {
        init: entry!(s, init, |flags: InitFlags|),
    }
}

pub(crate) fn driver(s: &Arc<State>) -> DriverDdi {
    DriverDdi {
        get: entry!(s, driver_get, |count: &mut u32, drivers: Option<&mut [DriverHandle]>|),
        get_api_version: entry!(s, driver_get_api_version, |driver: DriverHandle, version: &mut ApiVersion|),
        get_properties: entry!(s, driver_get_properties, |
            driver: DriverHandle,
            properties: &mut DriverProperties,
        |),
        get_extension_properties: entry!(s, driver_get_extension_properties, |
            driver: DriverHandle,
            count: &mut u32,
            extensions: Option<&mut [ExtensionProperties]>,
        |),
    }
}

pub(crate) fn device(s: &Arc<State>) -> DeviceDdi {
    DeviceDdi {
        get: entry!(s, device_get, |
            driver: DriverHandle,
            count: &mut u32,
            devices: Option<&mut [DeviceHandle]>,
        |),
        get_sub_devices: entry!(s, device_get_sub_devices, |
            device: DeviceHandle,
            count: &mut u32,
            sub_devices: Option<&mut [DeviceHandle]>,
        |),
        get_properties: entry!(s, device_get_properties, |
            device: DeviceHandle,
            properties: &mut DeviceProperties,
        |),
        can_access_peer: entry!(s, device_can_access_peer, |
            device: DeviceHandle,
            peer: DeviceHandle,
            value: &mut bool,
        |),
        get_status: entry!(s, device_get_status, |device: DeviceHandle|),
        get_fabric_vertex: entry!(s, device_get_fabric_vertex, |
            device: DeviceHandle,
            vertex: &mut FabricVertexHandle,
        |),
    }
}

pub(crate) fn context(s: &Arc<State>) -> ContextDdi {
    ContextDdi {
        create: entry!(s, context_create, |
            driver: DriverHandle,
            desc: &ContextDesc,
            context: &mut ContextHandle,
        |),
        create_ex: entry!(s, context_create_ex, |
            driver: DriverHandle,
            desc: &ContextDesc,
            devices: &[DeviceHandle],
            context: &mut ContextHandle,
        |),
        destroy: entry!(s, context_destroy, |context: ContextHandle|),
        get_status: entry!(s, context_get_status, |context: ContextHandle|),
        make_memory_resident: entry!(s, context_make_memory_resident, |
            context: ContextHandle,
            device: DeviceHandle,
            ptr: u64,
            size: usize,
        |),
    }
}

pub(crate) fn command_queue(s: &Arc<State>) -> CommandQueueDdi {
    CommandQueueDdi {
        create: entry!(s, command_queue_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandQueueDesc,
            queue: &mut CommandQueueHandle,
        |),
        destroy: entry!(s, command_queue_destroy, |queue: CommandQueueHandle|),
        execute_command_lists: entry!(s, command_queue_execute_command_lists, |
            queue: CommandQueueHandle,
            lists: &[CommandListHandle],
            fence: Option<FenceHandle>,
        |),
        synchronize: entry!(s, command_queue_synchronize, |queue: CommandQueueHandle, timeout: u64|),
    }
}

pub(crate) fn command_list(s: &Arc<State>) -> CommandListDdi {
    CommandListDdi {
        create: entry!(s, command_list_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandListDesc,
            list: &mut CommandListHandle,
        |),
        create_immediate: entry!(s, command_list_create_immediate, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandQueueDesc,
            list: &mut CommandListHandle,
        |),
        destroy: entry!(s, command_list_destroy, |list: CommandListHandle|),
        close: entry!(s, command_list_close, |list: CommandListHandle|),
        reset: entry!(s, command_list_reset, |list: CommandListHandle|),
        append_barrier: entry!(s, command_list_append_barrier, |
            list: CommandListHandle,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        |),
        append_memory_copy: entry!(s, command_list_append_memory_copy, |
            list: CommandListHandle,
            dst: u64,
            src: u64,
            size: usize,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        |),
        append_image_copy: entry!(s, command_list_append_image_copy, |
            list: CommandListHandle,
            dst: ImageHandle,
            src: ImageHandle,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        |),
        append_signal_event: entry!(s, command_list_append_signal_event, |
            list: CommandListHandle,
            event: EventHandle,
        |),
        append_wait_on_events: entry!(s, command_list_append_wait_on_events, |
            list: CommandListHandle,
            events: &[EventHandle],
        |),
        append_launch_kernel: entry!(s, command_list_append_launch_kernel, |
            list: CommandListHandle,
            kernel: KernelHandle,
            groups: &GroupCount,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        |),
    }
}

pub(crate) fn fence(s: &Arc<State>) -> FenceDdi {
    FenceDdi {
        create: entry!(s, fence_create, |
            queue: CommandQueueHandle,
            desc: &FenceDesc,
            fence: &mut FenceHandle,
        |),
        destroy: entry!(s, fence_destroy, |fence: FenceHandle|),
        host_synchronize: entry!(s, fence_host_synchronize, |fence: FenceHandle, timeout: u64|),
        query_status: entry!(s, fence_query_status, |fence: FenceHandle|),
        reset: entry!(s, fence_reset, |fence: FenceHandle|),
    }
}

pub(crate) fn event_pool(s: &Arc<State>) -> EventPoolDdi {
    EventPoolDdi {
        create: entry!(s, event_pool_create, |
            context: ContextHandle,
            desc: &EventPoolDesc,
            devices: &[DeviceHandle],
            pool: &mut EventPoolHandle,
        |),
        destroy: entry!(s, event_pool_destroy, |pool: EventPoolHandle|),
    }
}

pub(crate) fn event(s: &Arc<State>) -> EventDdi {
    EventDdi {
        create: entry!(s, event_create, |
            pool: EventPoolHandle,
            desc: &EventDesc,
            event: &mut EventHandle,
        |),
        destroy: entry!(s, event_destroy, |event: EventHandle|),
        host_signal: entry!(s, event_host_signal, |event: EventHandle|),
        host_synchronize: entry!(s, event_host_synchronize, |event: EventHandle, timeout: u64|),
        query_status: entry!(s, event_query_status, |event: EventHandle|),
        host_reset: entry!(s, event_host_reset, |event: EventHandle|),
    }
}

pub(crate) fn image(s: &Arc<State>) -> ImageDdi {
    ImageDdi {
        get_properties: entry!(s, image_get_properties, |
            device: DeviceHandle,
            desc: &ImageDesc,
            properties: &mut ImageProperties,
        |),
        create: entry!(s, image_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &ImageDesc,
            image: &mut ImageHandle,
        |),
        destroy: entry!(s, image_destroy, |image: ImageHandle|),
    }
}

pub(crate) fn module(s: &Arc<State>) -> ModuleDdi {
    ModuleDdi {
        create: entry!(s, module_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &ModuleDesc,
            module: &mut ModuleHandle,
            build_log: Option<&mut ModuleBuildLogHandle>,
        |),
        destroy: entry!(s, module_destroy, |module: ModuleHandle|),
        dynamic_link: entry!(s, module_dynamic_link, |
            modules: &[ModuleHandle],
            link_log: Option<&mut ModuleBuildLogHandle>,
        |),
        get_kernel_names: entry!(s, module_get_kernel_names, |
            module: ModuleHandle,
            count: &mut u32,
            names: Option<&mut [String]>,
        |),
    }
}

pub(crate) fn module_build_log(s: &Arc<State>) -> ModuleBuildLogDdi {
    ModuleBuildLogDdi {
        destroy: entry!(s, module_build_log_destroy, |log: ModuleBuildLogHandle|),
        get_string: entry!(s, module_build_log_get_string, |log: ModuleBuildLogHandle, text: &mut String|),
    }
}

pub(crate) fn kernel(s: &Arc<State>) -> KernelDdi {
    KernelDdi {
        create: entry!(s, kernel_create, |
            module: ModuleHandle,
            desc: &KernelDesc,
            kernel: &mut KernelHandle,
        |),
        destroy: entry!(s, kernel_destroy, |kernel: KernelHandle|),
        set_argument_value: entry!(s, kernel_set_argument_value, |
            kernel: KernelHandle,
            index: u32,
            value: ArgValue<'_>,
        |),
        set_group_size: entry!(s, kernel_set_group_size, |kernel: KernelHandle, x: u32, y: u32, z: u32|),
        get_name: entry!(s, kernel_get_name, |kernel: KernelHandle, name: &mut String|),
    }
}

pub(crate) fn sampler(s: &Arc<State>) -> SamplerDdi {
    SamplerDdi {
        create: entry!(s, sampler_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &SamplerDesc,
            sampler: &mut SamplerHandle,
        |),
        destroy: entry!(s, sampler_destroy, |sampler: SamplerHandle|),
    }
}

pub(crate) fn physical_mem(s: &Arc<State>) -> PhysicalMemDdi {
    PhysicalMemDdi {
        create: entry!(s, physical_mem_create, |
            context: ContextHandle,
            device: DeviceHandle,
            desc: &PhysicalMemDesc,
            memory: &mut PhysicalMemHandle,
        |),
        destroy: entry!(s, physical_mem_destroy, |context: ContextHandle, memory: PhysicalMemHandle|),
    }
}

pub(crate) fn mem(s: &Arc<State>) -> MemDdi {
    MemDdi {
        alloc_device: entry!(s, mem_alloc_device, |
            context: ContextHandle,
            desc: &DeviceMemAllocDesc,
            size: usize,
            alignment: usize,
            device: DeviceHandle,
            ptr: &mut u64,
        |),
        free: entry!(s, mem_free, |context: ContextHandle, ptr: u64|),
    }
}

pub(crate) fn fabric_vertex(s: &Arc<State>) -> FabricVertexDdi {
    FabricVertexDdi {
        get: entry!(s, fabric_vertex_get, |
            driver: DriverHandle,
            count: &mut u32,
            vertices: Option<&mut [FabricVertexHandle]>,
        |),
        get_sub_vertices: entry!(s, fabric_vertex_get_sub_vertices, |
            vertex: FabricVertexHandle,
            count: &mut u32,
            sub_vertices: Option<&mut [FabricVertexHandle]>,
        |),
        get_properties: entry!(s, fabric_vertex_get_properties, |
            vertex: FabricVertexHandle,
            properties: &mut FabricVertexProperties,
        |),
        get_device: entry!(s, fabric_vertex_get_device, |
            vertex: FabricVertexHandle,
            device: &mut DeviceHandle,
        |),
    }
}

pub(crate) fn fabric_edge(s: &Arc<State>) -> FabricEdgeDdi {
    FabricEdgeDdi {
        get: entry!(s, fabric_edge_get, |
            vertex_a: FabricVertexHandle,
            vertex_b: FabricVertexHandle,
            count: &mut u32,
            edges: Option<&mut [FabricEdgeHandle]>,
        |),
        get_vertices: entry!(s, fabric_edge_get_vertices, |
            edge: FabricEdgeHandle,
            vertex_a: &mut FabricVertexHandle,
            vertex_b: &mut FabricVertexHandle,
        |),
        get_properties: entry!(s, fabric_edge_get_properties, |
            edge: FabricEdgeHandle,
            properties: &mut FabricEdgeProperties,
        |),
    }
}

pub(crate) fn rtas_builder(s: &Arc<State>) -> RtasBuilderDdi {
    RtasBuilderDdi {
        create: entry!(s, rtas_builder_create, |
            driver: DriverHandle,
            desc: &RtasBuilderDesc,
            builder: &mut RtasBuilderHandle,
        |),
        get_build_properties: entry!(s, rtas_builder_get_build_properties, |
            builder: RtasBuilderHandle,
            properties: &mut RtasBuilderBuildProperties,
        |),
        destroy: entry!(s, rtas_builder_destroy, |builder: RtasBuilderHandle|),
    }
}

pub(crate) fn rtas_parallel_operation(s: &Arc<State>) -> RtasParallelOperationDdi {
    RtasParallelOperationDdi {
        create: entry!(s, rtas_parallel_operation_create, |
            driver: DriverHandle,
            operation: &mut RtasParallelOperationHandle,
        |),
        join: entry!(s, rtas_parallel_operation_join, |operation: RtasParallelOperationHandle|),
        destroy: entry!(s, rtas_parallel_operation_destroy, |operation: RtasParallelOperationHandle|),
    }
}
