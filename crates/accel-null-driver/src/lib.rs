//! Null driver.
//!
//! A driver module with no hardware behind it. It answers every entry point
//! from in-memory bookkeeping: a fixed topology of driver instances, devices,
//! sub-devices and fabric vertices, plus whatever objects callers create.
//! Handles it receives must be its own native handles, so a loader that
//! forgets to translate a handle is caught with `ERROR_INVALID_ARGUMENT`.
//!
//! Besides standing in for real hardware it is the loader's test double:
//! faults can be injected per instance and every call is recorded in a
//! [`Journal`].

mod journal;
mod state;
mod tables;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use accel_api::*;

pub use journal::{Journal, JournalEntry};
pub use state::KernelArg;

use state::State;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Shape and fault injection for one [`NullDriver`].
#[derive(Debug, Clone)]
pub struct NullDriverConfig {
    pub name: String,
    pub api_version: ApiVersion,
    /// Native driver instances reported by `zeDriverGet`.
    pub driver_count: u32,
    pub devices_per_driver: u32,
    pub sub_devices_per_device: u32,
    pub fabric_vertices_per_driver: u32,
    pub kernel_names: Vec<String>,
    /// `zeInit` returns this code.
    pub fail_init: Option<ZeResult>,
    /// The table request for this family fails with this code.
    pub fail_table: Option<(InterfaceFamily, ZeResult)>,
    /// Device and fabric vertex enumeration fail with this code.
    pub enumeration_error: Option<ZeResult>,
    /// API names left unset in the tables this driver hands out.
    pub missing_entries: Vec<String>,
    /// High bits of every native handle. Distinct per instance by default.
    pub handle_base: u64,
}

impl NullDriverConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn driver_count(mut self, count: u32) -> Self {
        self.driver_count = count;
        self
    }

    pub fn devices(mut self, per_driver: u32) -> Self {
        self.devices_per_driver = per_driver;
        self
    }

    pub fn sub_devices(mut self, per_device: u32) -> Self {
        self.sub_devices_per_device = per_device;
        self
    }

    pub fn fabric_vertices(mut self, per_driver: u32) -> Self {
        self.fabric_vertices_per_driver = per_driver;
        self
    }

    pub fn fail_init(mut self, code: ZeResult) -> Self {
        self.fail_init = Some(code);
        self
    }

    pub fn fail_table(mut self, family: InterfaceFamily, code: ZeResult) -> Self {
        self.fail_table = Some((family, code));
        self
    }

    pub fn enumeration_error(mut self, code: ZeResult) -> Self {
        self.enumeration_error = Some(code);
        self
    }

    pub fn without_entry(mut self, api: impl Into<String>) -> Self {
        self.missing_entries.push(api.into());
        self
    }
}

impl Default for NullDriverConfig {
    fn default() -> Self {
        Self {
            name: "null".to_string(),
            api_version: ApiVersion::CURRENT,
            driver_count: 1,
            devices_per_driver: 2,
            sub_devices_per_device: 0,
            fabric_vertices_per_driver: 2,
            kernel_names: vec!["main".to_string()],
            fail_init: None,
            fail_table: None,
            enumeration_error: None,
            missing_entries: Vec::new(),
            handle_base: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed) << 40,
        }
    }
}

/// In-process driver module backed by [`NullDriverConfig`].
pub struct NullDriver {
    state: Arc<State>,
}

impl NullDriver {
    pub fn new(config: NullDriverConfig) -> Self {
        Self::with_journal(config, Journal::new())
    }

    /// Record calls into an existing journal, shared with other drivers or
    /// with test code.
    pub fn with_journal(config: NullDriverConfig, journal: Arc<Journal>) -> Self {
        Self {
            state: Arc::new(State::new(config, journal)),
        }
    }

    pub fn journal(&self) -> Arc<Journal> {
        Arc::clone(&self.state.journal)
    }

    pub fn config(&self) -> &NullDriverConfig {
        &self.state.config
    }

    /// Native driver instance handles, in enumeration order.
    pub fn native_drivers(&self) -> Vec<DriverHandle> {
        self.state.native_drivers()
    }

    /// Native device handles of every driver instance, in enumeration order.
    pub fn native_devices(&self) -> Vec<DeviceHandle> {
        self.state.native_devices()
    }

    /// Objects created through this driver and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.state.live_created()
    }

    /// Last value bound to argument `index` of native kernel `kernel`.
    pub fn kernel_argument(&self, kernel: KernelHandle, index: u32) -> Option<KernelArg> {
        self.state.kernel_argument(kernel, index)
    }
}

macro_rules! provide_tables {
    ($($method:ident: $table:ident => $build:path;)*) => {
        impl DdiProvider for NullDriver {
            fn name(&self) -> &str {
                &self.state.config.name
            }

            fn api_version(&self) -> ApiVersion {
                self.state.config.api_version
            }

            $(
                fn $method(&self, version: ApiVersion, _prior: &$table) -> Result<$table, ZeResult> {
                    self.state.accept_table_request(<$table as DdiTable>::FAMILY, version)?;
                    let mut table = $build(&self.state);
                    for api in &self.state.config.missing_entries {
                        table.clear_entry(api);
                    }
                    Ok(table)
                }
            )*
        }
    };
}

provide_tables! {
    global_table: GlobalDdi => tables::global;
    driver_table: DriverDdi => tables::driver;
    device_table: DeviceDdi => tables::device;
    context_table: ContextDdi => tables::context;
    command_queue_table: CommandQueueDdi => tables::command_queue;
    command_list_table: CommandListDdi => tables::command_list;
    fence_table: FenceDdi => tables::fence;
    event_pool_table: EventPoolDdi => tables::event_pool;
    event_table: EventDdi => tables::event;
    image_table: ImageDdi => tables::image;
    module_table: ModuleDdi => tables::module;
    module_build_log_table: ModuleBuildLogDdi => tables::module_build_log;
    kernel_table: KernelDdi => tables::kernel;
    sampler_table: SamplerDdi => tables::sampler;
    physical_mem_table: PhysicalMemDdi => tables::physical_mem;
    mem_table: MemDdi => tables::mem;
    fabric_vertex_table: FabricVertexDdi => tables::fabric_vertex;
    fabric_edge_table: FabricEdgeDdi => tables::fabric_edge;
    rtas_builder_table: RtasBuilderDdi => tables::rtas_builder;
    rtas_parallel_operation_table: RtasParallelOperationDdi => tables::rtas_parallel_operation;
}

#[cfg(feature = "entry")]
accel_api::export_driver!(NullDriver::new(NullDriverConfig::named("null")));
