//! Loader context: the registered drivers, their dispatch bundles, the
//! object factories and the optional layers.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use accel_api::{ApiVersion, DdiProvider, DdiTable, GlobalDdi, ImageHandle, InitFlags, SamplerHandle, ZeResult};
use accel_core::config::LoaderConfig;
use accel_core::{AuxiliaryMap, DispatchBundle, ObjectFactories};
use accel_null_driver::{NullDriver, NullDriverConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::LoaderError;
use crate::layers::tracer::{ApiTracer, TracingLayer};
use crate::layers::validation::{ValidationLayer, Validator};
use crate::library::DriverLibrary;

/// Default cap on live wrappers per family.
const DEFAULT_MAX_LIVE_HANDLES: usize = 1 << 20;

/// Initialization state of one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Registered, `zeInit` not yet forwarded.
    Pending,
    Ready,
    /// Excluded from enumeration and table population from now on.
    Failed(ZeResult),
}

/// One registered driver.
pub(crate) struct DriverDescriptor {
    pub(crate) name: String,
    pub(crate) provider: Arc<dyn DdiProvider>,
    pub(crate) dispatch: Arc<DispatchBundle>,
    status: Mutex<DriverStatus>,
    // Kept for its path; the module itself stays mapped.
    library: Option<DriverLibrary>,
}

impl DriverDescriptor {
    pub(crate) fn status(&self) -> DriverStatus {
        *self.status.lock()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.status() == DriverStatus::Ready
    }

    pub(crate) fn is_failed(&self) -> bool {
        matches!(self.status(), DriverStatus::Failed(_))
    }

    pub(crate) fn mark_failed(&self, code: ZeResult) {
        let mut status = self.status.lock();
        if !matches!(*status, DriverStatus::Failed(_)) {
            warn!(driver = %self.name, ?code, "driver downgraded");
            *status = DriverStatus::Failed(code);
        }
    }
}

/// Shared state behind a [`Loader`]. Loader trampolines keep it alive for as
/// long as any table built from it exists.
pub struct LoaderContext {
    pub(crate) drivers: Vec<DriverDescriptor>,
    pub(crate) version: ApiVersion,
    pub(crate) force_intercept: bool,
    pub(crate) factories: ObjectFactories,
    pub(crate) images: AuxiliaryMap<ImageHandle>,
    pub(crate) samplers: AuxiliaryMap<SamplerHandle>,
    pub(crate) validation: Option<Arc<ValidationLayer>>,
    pub(crate) tracing: Option<Arc<TracingLayer>>,
}

impl LoaderContext {
    /// `true` when tables are handed out straight from the only driver.
    pub(crate) fn passthrough(&self) -> bool {
        self.drivers.len() == 1 && !self.force_intercept
    }

    pub(crate) fn ready_drivers(&self) -> Vec<&DriverDescriptor> {
        self.drivers.iter().filter(|d| d.is_ready()).collect()
    }

    /// Layers in the order they wrap the selected table.
    pub(crate) fn layers(&self) -> Vec<&dyn DdiProvider> {
        let mut layers: Vec<&dyn DdiProvider> = Vec::with_capacity(2);
        if let Some(layer) = &self.validation {
            layers.push(layer.as_ref());
        }
        if let Some(layer) = &self.tracing {
            layers.push(layer.as_ref());
        }
        layers
    }

    /// Forward `zeInit` to every driver not yet initialized. Succeeds if at
    /// least one driver ends up ready.
    pub(crate) fn init(&self, flags: InitFlags) -> Result<(), ZeResult> {
        let mut any_ready = false;
        for drv in &self.drivers {
            match drv.status() {
                DriverStatus::Ready => any_ready = true,
                DriverStatus::Failed(_) => {}
                DriverStatus::Pending => {
                    // The driver may call back into the loader; no lock held.
                    let result = match drv.dispatch.entry(|t| t.global.init.clone()) {
                        Ok(init) => init(flags),
                        Err(code) => code,
                    };
                    let mut status = drv.status.lock();
                    match *status {
                        DriverStatus::Pending if result.is_success() => {
                            info!(driver = %drv.name, "driver initialized");
                            *status = DriverStatus::Ready;
                        }
                        DriverStatus::Pending => {
                            warn!(driver = %drv.name, ?result, "driver failed to initialize");
                            *status = DriverStatus::Failed(result);
                        }
                        // Settled by a concurrent init.
                        DriverStatus::Ready | DriverStatus::Failed(_) => {}
                    }
                    any_ready |= *status == DriverStatus::Ready;
                }
            }
        }
        if any_ready {
            Ok(())
        } else {
            Err(ZeResult::ERROR_UNINITIALIZED)
        }
    }
}

impl Drop for LoaderContext {
    fn drop(&mut self) {
        let live = self.factories.live_objects();
        if live > 0 {
            debug!(live, "releasing outstanding loader handles");
        }
        self.factories.clear();
        self.images.clear();
        self.samplers.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Loader,
    Driver,
    Layer,
}

/// One entry of [`Loader::component_versions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    pub kind: ComponentKind,
    pub name: String,
    pub api_version: ApiVersion,
}

/// Handle on a configured loader. Cheap to clone.
#[derive(Clone)]
pub struct Loader {
    pub(crate) context: Arc<LoaderContext>,
}

impl Loader {
    /// Crate version of the loader itself.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Build a loader from configuration: open each listed driver library,
    /// add null drivers if enabled, and attach the configured layers.
    ///
    /// A driver that fails to load is logged and skipped.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, LoaderError> {
        // A host application that installed its own subscriber keeps it.
        accel_common::logging::try_init_logging();

        let mut builder = LoaderBuilder::new()
            .api_version(config.api_version()?)
            .force_intercept(config.loader.force_intercept)
            .max_live_handles(config.factory.max_live_handles);

        for entry in &config.drivers {
            let path = entry.library_path();
            match builder.load_library(&entry.name, &path) {
                Ok(next) => builder = next,
                Err((prev, e)) => {
                    warn!(driver = %entry.name, "skipping driver: {}", e);
                    builder = prev;
                }
            }
        }

        if config.loader.enable_null_driver {
            for i in 0..config.loader.null_driver_instances {
                let name = if i == 0 {
                    "null".to_string()
                } else {
                    format!("null{i}")
                };
                builder = builder.driver(NullDriver::new(NullDriverConfig::named(name)));
            }
        }

        if config.layers.validation {
            builder = builder.validation(Validator::new());
        }
        if config.layers.tracing {
            builder = builder.tracing(ApiTracer::new());
        }
        Ok(builder.build())
    }

    /// API version the loader advertises.
    pub fn api_version(&self) -> ApiVersion {
        self.context.version
    }

    pub fn driver_count(&self) -> usize {
        self.context.drivers.len()
    }

    pub fn driver_names(&self) -> Vec<&str> {
        self.context.drivers.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn driver_status(&self, name: &str) -> Option<DriverStatus> {
        self.context
            .drivers
            .iter()
            .find(|d| d.name == name)
            .map(DriverDescriptor::status)
    }

    /// Module a driver was loaded from; `None` for in-process drivers.
    pub fn driver_path(&self, name: &str) -> Option<&Path> {
        self.context
            .drivers
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.library.as_ref())
            .map(DriverLibrary::path)
    }

    /// Whether tables come straight from the only driver.
    pub fn is_passthrough(&self) -> bool {
        self.context.passthrough()
    }

    /// Initialize all drivers. Equivalent to calling `zeInit` through a
    /// loader Global table.
    pub fn init(&self, flags: InitFlags) -> ZeResult {
        self.context.init(flags).into()
    }

    /// Callback registry of the tracing layer, if one is attached.
    pub fn tracer(&self) -> Option<&Arc<ApiTracer>> {
        self.context.tracing.as_ref().map(|layer| layer.hook())
    }

    /// Checker registry of the validation layer, if one is attached.
    pub fn validator(&self) -> Option<&Arc<Validator>> {
        self.context.validation.as_ref().map(|layer| layer.hook())
    }

    /// Live wrapped objects across all families.
    pub fn live_objects(&self) -> usize {
        self.context.factories.live_objects()
    }

    /// Versions of the loader, each driver and each attached layer.
    pub fn component_versions(&self) -> Vec<ComponentVersion> {
        let ctx = &self.context;
        let mut components = vec![ComponentVersion {
            kind: ComponentKind::Loader,
            name: format!("accel-loader {}", Self::VERSION),
            api_version: ctx.version,
        }];
        components.extend(ctx.drivers.iter().map(|d| ComponentVersion {
            kind: ComponentKind::Driver,
            name: d.name.clone(),
            api_version: d.provider.api_version(),
        }));
        components.extend(ctx.layers().into_iter().map(|layer| ComponentVersion {
            kind: ComponentKind::Layer,
            name: layer.name().to_string(),
            api_version: layer.api_version(),
        }));
        components
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("version", &self.context.version)
            .field("drivers", &self.driver_names())
            .field("passthrough", &self.is_passthrough())
            .finish()
    }
}

struct PendingDriver {
    provider: Arc<dyn DdiProvider>,
    library: Option<DriverLibrary>,
}

/// Assembles a [`Loader`] from providers and settings.
pub struct LoaderBuilder {
    drivers: Vec<PendingDriver>,
    version: ApiVersion,
    force_intercept: bool,
    max_live_handles: usize,
    validation: Option<ValidationLayer>,
    tracing: Option<TracingLayer>,
}

impl LoaderBuilder {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            version: ApiVersion::CURRENT,
            force_intercept: false,
            max_live_handles: DEFAULT_MAX_LIVE_HANDLES,
            validation: None,
            tracing: None,
        }
    }

    /// Register an in-process driver. Registration order is enumeration
    /// order.
    pub fn driver(self, provider: impl DdiProvider + 'static) -> Self {
        self.driver_arc(Arc::new(provider))
    }

    pub fn driver_arc(mut self, provider: Arc<dyn DdiProvider>) -> Self {
        self.drivers.push(PendingDriver {
            provider,
            library: None,
        });
        self
    }

    /// Open a driver module and register the provider it exports. On failure
    /// the builder is handed back unchanged with the error.
    pub fn load_library(mut self, name: &str, path: &Path) -> Result<Self, (Self, LoaderError)> {
        // SAFETY: the path comes from the loader configuration, which is
        // trusted to name driver modules built against this crate's API.
        match unsafe { DriverLibrary::open(path) } {
            Ok((provider, library)) => {
                debug!(driver = name, path = %path.display(), "driver library loaded");
                self.drivers.push(PendingDriver {
                    provider,
                    library: Some(library),
                });
                Ok(self)
            }
            Err(e) => Err((self, e)),
        }
    }

    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    pub fn force_intercept(mut self, enabled: bool) -> Self {
        self.force_intercept = enabled;
        self
    }

    pub fn max_live_handles(mut self, limit: usize) -> Self {
        self.max_live_handles = limit.max(1);
        self
    }

    /// Attach the parameter validation layer.
    pub fn validation(mut self, validator: Validator) -> Self {
        self.validation = Some(ValidationLayer::new("accel-validation-layer", validator));
        self
    }

    /// Attach the call tracing layer.
    pub fn tracing(mut self, tracer: ApiTracer) -> Self {
        self.tracing = Some(TracingLayer::new("accel-tracing-layer", tracer));
        self
    }

    pub fn build(self) -> Loader {
        let version = self.version;
        let drivers = self
            .drivers
            .into_iter()
            .map(|pending| {
                let name = pending.provider.name().to_string();
                let dispatch = Arc::new(DispatchBundle::new(name.clone()));
                let status = match GlobalDdi::request(pending.provider.as_ref(), version, &GlobalDdi::default()) {
                    Ok(global) => {
                        dispatch.install(global);
                        DriverStatus::Pending
                    }
                    Err(code) => {
                        warn!(driver = %name, ?code, "driver rejected the global table request");
                        DriverStatus::Failed(code)
                    }
                };
                DriverDescriptor {
                    name,
                    provider: pending.provider,
                    dispatch,
                    status: Mutex::new(status),
                    library: pending.library,
                }
            })
            .collect::<Vec<_>>();

        info!(
            drivers = drivers.len(),
            %version,
            force_intercept = self.force_intercept,
            validation = self.validation.is_some(),
            tracing = self.tracing.is_some(),
            "loader configured"
        );

        Loader {
            context: Arc::new(LoaderContext {
                drivers,
                version,
                force_intercept: self.force_intercept,
                factories: ObjectFactories::new(self.max_live_handles),
                images: AuxiliaryMap::new(),
                samplers: AuxiliaryMap::new(),
                validation: self.validation.map(Arc::new),
                tracing: self.tracing.map(Arc::new),
            }),
        }
    }
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
