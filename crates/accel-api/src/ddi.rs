//! Per-family dispatch tables.
//!
//! An entry is `None` when the component filling the table does not
//! implement that function; callers must treat it as unavailable. Entries
//! are reference-counted closures, so a layer can capture the table it
//! wraps and two tables can be compared entry-by-entry for identity.

use std::fmt;
use std::sync::Arc;

use crate::handle::*;
use crate::intercept::{Call, Interceptor, Param};
use crate::result::ZeResult;
use crate::types::*;

fn same_entry<F: ?Sized>(a: &Option<Arc<F>>, b: &Option<Arc<F>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

macro_rules! ddi_table {
    (
        $(#[$meta:meta])*
        $table:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident => $api:literal : fn($($arg:ident : $ty:ty),* $(,)?);
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $table {
            $(
                $(#[$field_meta])*
                #[doc = concat!("`", $api, "`")]
                pub $field: Option<Arc<dyn Fn($($ty),*) -> ZeResult + Send + Sync>>,
            )*
        }

        impl $table {
            /// API names of every entry, in declaration order.
            pub const ENTRY_NAMES: &'static [&'static str] = &[$($api),*];

            /// Number of populated entries.
            pub fn populated(&self) -> usize {
                [$(self.$field.is_some()),*].iter().filter(|set| **set).count()
            }

            /// `true` when every entry is the very same function object as in
            /// `other` (both unset counts as the same).
            pub fn same_entries(&self, other: &Self) -> bool {
                true $(&& same_entry(&self.$field, &other.$field))*
            }

            /// Unset the entry named `api`. Returns whether it was set.
            pub fn clear_entry(&mut self, api: &str) -> bool {
                $(
                    if api == $api {
                        return self.$field.take().is_some();
                    }
                )*
                false
            }

            /// A copy of this table where every populated entry is routed
            /// through `hook` before reaching the original entry.
            pub fn intercept<I: Interceptor>(&self, hook: &Arc<I>) -> Self {
                Self {
                    $(
                        $field: self.$field.as_ref().map(|next| {
                            let next = Arc::clone(next);
                            let hook = Arc::clone(hook);
                            let wrapped: Arc<dyn Fn($($ty),*) -> ZeResult + Send + Sync> =
                                Arc::new(move |$($arg: $ty),*| {
                                    let verdict = hook.prologue(&Call::new(
                                        $api,
                                        &[$((stringify!($arg), &$arg as &dyn Param)),*],
                                    ));
                                    let result = match verdict {
                                        Ok(()) => next($($arg),*),
                                        Err(code) => code,
                                    };
                                    hook.epilogue($api, result)
                                });
                            wrapped
                        }),
                    )*
                }
            }
        }

        impl fmt::Debug for $table {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($table))
                    $(.field(stringify!($field), &self.$field.is_some()))*
                    .finish()
            }
        }
    };
}

ddi_table! {
    /// Process-wide entry points.
    GlobalDdi {
        init => "zeInit": fn(flags: InitFlags);
    }
}

ddi_table! {
    DriverDdi {
        /// Two-phase enumeration of driver instances.
        get => "zeDriverGet": fn(count: &mut u32, drivers: Option<&mut [DriverHandle]>);
        get_api_version => "zeDriverGetApiVersion": fn(driver: DriverHandle, version: &mut ApiVersion);
        get_properties => "zeDriverGetProperties": fn(driver: DriverHandle, properties: &mut DriverProperties);
        get_extension_properties => "zeDriverGetExtensionProperties": fn(
            driver: DriverHandle,
            count: &mut u32,
            extensions: Option<&mut [ExtensionProperties]>,
        );
    }
}

ddi_table! {
    DeviceDdi {
        get => "zeDeviceGet": fn(driver: DriverHandle, count: &mut u32, devices: Option<&mut [DeviceHandle]>);
        get_sub_devices => "zeDeviceGetSubDevices": fn(
            device: DeviceHandle,
            count: &mut u32,
            sub_devices: Option<&mut [DeviceHandle]>,
        );
        get_properties => "zeDeviceGetProperties": fn(device: DeviceHandle, properties: &mut DeviceProperties);
        can_access_peer => "zeDeviceCanAccessPeer": fn(device: DeviceHandle, peer: DeviceHandle, value: &mut bool);
        get_status => "zeDeviceGetStatus": fn(device: DeviceHandle);
        get_fabric_vertex => "zeDeviceGetFabricVertexExp": fn(device: DeviceHandle, vertex: &mut FabricVertexHandle);
    }
}

ddi_table! {
    ContextDdi {
        create => "zeContextCreate": fn(driver: DriverHandle, desc: &ContextDesc, context: &mut ContextHandle);
        /// Create restricted to a set of devices.
        create_ex => "zeContextCreateEx": fn(
            driver: DriverHandle,
            desc: &ContextDesc,
            devices: &[DeviceHandle],
            context: &mut ContextHandle,
        );
        destroy => "zeContextDestroy": fn(context: ContextHandle);
        get_status => "zeContextGetStatus": fn(context: ContextHandle);
        make_memory_resident => "zeContextMakeMemoryResident": fn(
            context: ContextHandle,
            device: DeviceHandle,
            ptr: u64,
            size: usize,
        );
    }
}

ddi_table! {
    CommandQueueDdi {
        create => "zeCommandQueueCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandQueueDesc,
            queue: &mut CommandQueueHandle,
        );
        destroy => "zeCommandQueueDestroy": fn(queue: CommandQueueHandle);
        execute_command_lists => "zeCommandQueueExecuteCommandLists": fn(
            queue: CommandQueueHandle,
            lists: &[CommandListHandle],
            fence: Option<FenceHandle>,
        );
        /// `timeout` in nanoseconds; `u64::MAX` waits forever, `0` polls.
        synchronize => "zeCommandQueueSynchronize": fn(queue: CommandQueueHandle, timeout: u64);
    }
}

ddi_table! {
    CommandListDdi {
        create => "zeCommandListCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandListDesc,
            list: &mut CommandListHandle,
        );
        create_immediate => "zeCommandListCreateImmediate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &CommandQueueDesc,
            list: &mut CommandListHandle,
        );
        destroy => "zeCommandListDestroy": fn(list: CommandListHandle);
        close => "zeCommandListClose": fn(list: CommandListHandle);
        reset => "zeCommandListReset": fn(list: CommandListHandle);
        append_barrier => "zeCommandListAppendBarrier": fn(
            list: CommandListHandle,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        );
        append_memory_copy => "zeCommandListAppendMemoryCopy": fn(
            list: CommandListHandle,
            dst: u64,
            src: u64,
            size: usize,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        );
        append_image_copy => "zeCommandListAppendImageCopy": fn(
            list: CommandListHandle,
            dst: ImageHandle,
            src: ImageHandle,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        );
        append_signal_event => "zeCommandListAppendSignalEvent": fn(list: CommandListHandle, event: EventHandle);
        append_wait_on_events => "zeCommandListAppendWaitOnEvents": fn(list: CommandListHandle, events: &[EventHandle]);
        append_launch_kernel => "zeCommandListAppendLaunchKernel": fn(
            list: CommandListHandle,
            kernel: KernelHandle,
            groups: &GroupCount,
            signal: Option<EventHandle>,
            wait: &[EventHandle],
        );
    }
}

ddi_table! {
    FenceDdi {
        create => "zeFenceCreate": fn(queue: CommandQueueHandle, desc: &FenceDesc, fence: &mut FenceHandle);
        destroy => "zeFenceDestroy": fn(fence: FenceHandle);
        host_synchronize => "zeFenceHostSynchronize": fn(fence: FenceHandle, timeout: u64);
        query_status => "zeFenceQueryStatus": fn(fence: FenceHandle);
        reset => "zeFenceReset": fn(fence: FenceHandle);
    }
}

ddi_table! {
    EventPoolDdi {
        create => "zeEventPoolCreate": fn(
            context: ContextHandle,
            desc: &EventPoolDesc,
            devices: &[DeviceHandle],
            pool: &mut EventPoolHandle,
        );
        destroy => "zeEventPoolDestroy": fn(pool: EventPoolHandle);
    }
}

ddi_table! {
    EventDdi {
        create => "zeEventCreate": fn(pool: EventPoolHandle, desc: &EventDesc, event: &mut EventHandle);
        destroy => "zeEventDestroy": fn(event: EventHandle);
        host_signal => "zeEventHostSignal": fn(event: EventHandle);
        host_synchronize => "zeEventHostSynchronize": fn(event: EventHandle, timeout: u64);
        query_status => "zeEventQueryStatus": fn(event: EventHandle);
        host_reset => "zeEventHostReset": fn(event: EventHandle);
    }
}

ddi_table! {
    ImageDdi {
        get_properties => "zeImageGetProperties": fn(
            device: DeviceHandle,
            desc: &ImageDesc,
            properties: &mut ImageProperties,
        );
        create => "zeImageCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &ImageDesc,
            image: &mut ImageHandle,
        );
        destroy => "zeImageDestroy": fn(image: ImageHandle);
    }
}

ddi_table! {
    ModuleDdi {
        create => "zeModuleCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &ModuleDesc,
            module: &mut ModuleHandle,
            build_log: Option<&mut ModuleBuildLogHandle>,
        );
        destroy => "zeModuleDestroy": fn(module: ModuleHandle);
        dynamic_link => "zeModuleDynamicLink": fn(
            modules: &[ModuleHandle],
            link_log: Option<&mut ModuleBuildLogHandle>,
        );
        get_kernel_names => "zeModuleGetKernelNames": fn(
            module: ModuleHandle,
            count: &mut u32,
            names: Option<&mut [String]>,
        );
    }
}

ddi_table! {
    ModuleBuildLogDdi {
        destroy => "zeModuleBuildLogDestroy": fn(log: ModuleBuildLogHandle);
        get_string => "zeModuleBuildLogGetString": fn(log: ModuleBuildLogHandle, text: &mut String);
    }
}

ddi_table! {
    KernelDdi {
        create => "zeKernelCreate": fn(module: ModuleHandle, desc: &KernelDesc, kernel: &mut KernelHandle);
        destroy => "zeKernelDestroy": fn(kernel: KernelHandle);
        set_argument_value => "zeKernelSetArgumentValue": fn(kernel: KernelHandle, index: u32, value: ArgValue<'_>);
        set_group_size => "zeKernelSetGroupSize": fn(kernel: KernelHandle, x: u32, y: u32, z: u32);
        get_name => "zeKernelGetName": fn(kernel: KernelHandle, name: &mut String);
    }
}

ddi_table! {
    SamplerDdi {
        create => "zeSamplerCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &SamplerDesc,
            sampler: &mut SamplerHandle,
        );
        destroy => "zeSamplerDestroy": fn(sampler: SamplerHandle);
    }
}

ddi_table! {
    PhysicalMemDdi {
        create => "zePhysicalMemCreate": fn(
            context: ContextHandle,
            device: DeviceHandle,
            desc: &PhysicalMemDesc,
            memory: &mut PhysicalMemHandle,
        );
        destroy => "zePhysicalMemDestroy": fn(context: ContextHandle, memory: PhysicalMemHandle);
    }
}

ddi_table! {
    /// Device memory allocation. Pointers are plain addresses and are never
    /// translated by the loader.
    MemDdi {
        alloc_device => "zeMemAllocDevice": fn(
            context: ContextHandle,
            desc: &DeviceMemAllocDesc,
            size: usize,
            alignment: usize,
            device: DeviceHandle,
            ptr: &mut u64,
        );
        free => "zeMemFree": fn(context: ContextHandle, ptr: u64);
    }
}

ddi_table! {
    FabricVertexDdi {
        get => "zeFabricVertexGetExp": fn(
            driver: DriverHandle,
            count: &mut u32,
            vertices: Option<&mut [FabricVertexHandle]>,
        );
        get_sub_vertices => "zeFabricVertexGetSubVerticesExp": fn(
            vertex: FabricVertexHandle,
            count: &mut u32,
            sub_vertices: Option<&mut [FabricVertexHandle]>,
        );
        get_properties => "zeFabricVertexGetPropertiesExp": fn(
            vertex: FabricVertexHandle,
            properties: &mut FabricVertexProperties,
        );
        get_device => "zeFabricVertexGetDeviceExp": fn(vertex: FabricVertexHandle, device: &mut DeviceHandle);
    }
}

ddi_table! {
    FabricEdgeDdi {
        get => "zeFabricEdgeGetExp": fn(
            vertex_a: FabricVertexHandle,
            vertex_b: FabricVertexHandle,
            count: &mut u32,
            edges: Option<&mut [FabricEdgeHandle]>,
        );
        get_vertices => "zeFabricEdgeGetVerticesExp": fn(
            edge: FabricEdgeHandle,
            vertex_a: &mut FabricVertexHandle,
            vertex_b: &mut FabricVertexHandle,
        );
        get_properties => "zeFabricEdgeGetPropertiesExp": fn(
            edge: FabricEdgeHandle,
            properties: &mut FabricEdgeProperties,
        );
    }
}

ddi_table! {
    RtasBuilderDdi {
        create => "zeRTASBuilderCreateExt": fn(
            driver: DriverHandle,
            desc: &RtasBuilderDesc,
            builder: &mut RtasBuilderHandle,
        );
        get_build_properties => "zeRTASBuilderGetBuildPropertiesExt": fn(
            builder: RtasBuilderHandle,
            properties: &mut RtasBuilderBuildProperties,
        );
        destroy => "zeRTASBuilderDestroyExt": fn(builder: RtasBuilderHandle);
    }
}

ddi_table! {
    RtasParallelOperationDdi {
        create => "zeRTASParallelOperationCreateExt": fn(
            driver: DriverHandle,
            operation: &mut RtasParallelOperationHandle,
        );
        join => "zeRTASParallelOperationJoinExt": fn(operation: RtasParallelOperationHandle);
        destroy => "zeRTASParallelOperationDestroyExt": fn(operation: RtasParallelOperationHandle);
    }
}
