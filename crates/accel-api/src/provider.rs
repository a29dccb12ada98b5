//! Components that fill dispatch tables: drivers and layers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ddi::*;
use crate::intercept::{InterceptLayer, Interceptor};
use crate::result::ZeResult;
use crate::types::ApiVersion;

/// Symbol a dynamically loaded driver module exports; see [`export_driver!`].
pub const DRIVER_ENTRY_SYMBOL: &[u8] = b"accel_driver_entry\0";

/// Shared behavior of the per-family table types, so table population can be
/// written once and instantiated per family.
pub trait DdiTable: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const FAMILY: InterfaceFamily;

    /// Ask `provider` for its version of this family's table, passing the
    /// table it should build on.
    fn request(
        provider: &dyn DdiProvider,
        version: ApiVersion,
        prior: &Self,
    ) -> Result<Self, ZeResult>;

    /// Number of populated entries.
    fn entry_count(&self) -> usize;

    /// This family's slot in a table bundle.
    fn select(tables: &DdiTables) -> &Self;
    fn select_mut(tables: &mut DdiTables) -> &mut Self;
}

macro_rules! ddi_families {
    ($( $family:ident => $field:ident : $table:ident, $method:ident; )*) => {
        /// One family of entry points, each with its own table type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum InterfaceFamily {
            $($family,)*
        }

        impl InterfaceFamily {
            pub const ALL: &'static [InterfaceFamily] = &[$(Self::$family),*];

            /// Entry point names belonging to this family.
            pub fn entry_names(self) -> &'static [&'static str] {
                match self {
                    $(Self::$family => $table::ENTRY_NAMES,)*
                }
            }
        }

        /// One table per family. Each driver owns one of these; the loader's
        /// handle wrappers point at the bundle of the driver that produced
        /// the native handle.
        #[derive(Clone, Default, Debug)]
        pub struct DdiTables {
            $(pub $field: $table,)*
        }

        impl DdiTables {
            /// Total populated entries across all families.
            pub fn populated(&self) -> usize {
                0 $(+ self.$field.populated())*
            }
        }

        /// A component that can fill dispatch tables.
        ///
        /// Each `*_table` method receives the table assembled so far (empty
        /// for a driver, the next component's table for a layer) and returns
        /// this component's version. The defaults hand `prior` back untouched,
        /// so a driver only overrides the families it implements.
        pub trait DdiProvider: Send + Sync {
            fn name(&self) -> &str;

            /// Highest API version this component implements.
            fn api_version(&self) -> ApiVersion {
                ApiVersion::CURRENT
            }

            $(
                #[doc = concat!("Fill the `", stringify!($family), "` table.")]
                fn $method(&self, version: ApiVersion, prior: &$table) -> Result<$table, ZeResult> {
                    let _ = version;
                    Ok(prior.clone())
                }
            )*
        }

        $(
            impl DdiTable for $table {
                const FAMILY: InterfaceFamily = InterfaceFamily::$family;

                fn request(
                    provider: &dyn DdiProvider,
                    version: ApiVersion,
                    prior: &Self,
                ) -> Result<Self, ZeResult> {
                    provider.$method(version, prior)
                }

                fn entry_count(&self) -> usize {
                    self.populated()
                }

                fn select(tables: &DdiTables) -> &Self {
                    &tables.$field
                }

                fn select_mut(tables: &mut DdiTables) -> &mut Self {
                    &mut tables.$field
                }
            }
        )*

        impl<I: Interceptor> DdiProvider for InterceptLayer<I> {
            fn name(&self) -> &str {
                self.layer_name()
            }

            fn api_version(&self) -> ApiVersion {
                self.version()
            }

            $(
                fn $method(&self, _version: ApiVersion, prior: &$table) -> Result<$table, ZeResult> {
                    Ok(prior.intercept(self.hook()))
                }
            )*
        }
    };
}

ddi_families! {
    Global => global: GlobalDdi, global_table;
    Driver => driver: DriverDdi, driver_table;
    Device => device: DeviceDdi, device_table;
    Context => context: ContextDdi, context_table;
    CommandQueue => command_queue: CommandQueueDdi, command_queue_table;
    CommandList => command_list: CommandListDdi, command_list_table;
    Fence => fence: FenceDdi, fence_table;
    EventPool => event_pool: EventPoolDdi, event_pool_table;
    Event => event: EventDdi, event_table;
    Image => image: ImageDdi, image_table;
    Module => module: ModuleDdi, module_table;
    ModuleBuildLog => module_build_log: ModuleBuildLogDdi, module_build_log_table;
    Kernel => kernel: KernelDdi, kernel_table;
    Sampler => sampler: SamplerDdi, sampler_table;
    PhysicalMem => physical_mem: PhysicalMemDdi, physical_mem_table;
    Mem => mem: MemDdi, mem_table;
    FabricVertex => fabric_vertex: FabricVertexDdi, fabric_vertex_table;
    FabricEdge => fabric_edge: FabricEdgeDdi, fabric_edge_table;
    RtasBuilder => rtas_builder: RtasBuilderDdi, rtas_builder_table;
    RtasParallelOperation => rtas_parallel_operation: RtasParallelOperationDdi, rtas_parallel_operation_table;
}

impl fmt::Display for InterfaceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Export a [`DdiProvider`] from a `cdylib` driver module.
///
/// The expression is evaluated once per load. The loader takes ownership of
/// the boxed provider returned through [`DRIVER_ENTRY_SYMBOL`].
#[macro_export]
macro_rules! export_driver {
    ($provider:expr) => {
        #[no_mangle]
        pub extern "C" fn accel_driver_entry() -> *mut ::std::ffi::c_void {
            let provider: ::std::sync::Arc<dyn $crate::DdiProvider> =
                ::std::sync::Arc::new($provider);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(provider)).cast()
        }
    };
}
