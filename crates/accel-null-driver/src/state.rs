use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use accel_api::*;
use parking_lot::Mutex;
use tracing::debug;

use crate::journal::Journal;
use crate::NullDriverConfig;

/// A kernel argument as the driver received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelArg {
    Null,
    Bytes(Vec<u8>),
    Image(ImageHandle),
    Sampler(SamplerHandle),
}

/// Objects that exist from construction on and cannot be destroyed.
#[derive(Default)]
struct Topology {
    drivers: Vec<DriverHandle>,
    devices: HashMap<DriverHandle, Vec<DeviceHandle>>,
    device_owner: HashMap<DeviceHandle, DriverHandle>,
    sub_devices: HashMap<DeviceHandle, Vec<DeviceHandle>>,
    vertices: HashMap<DriverHandle, Vec<FabricVertexHandle>>,
    vertex_device: HashMap<FabricVertexHandle, DeviceHandle>,
    edges: HashMap<(FabricVertexHandle, FabricVertexHandle), FabricEdgeHandle>,
    edge_vertices: HashMap<FabricEdgeHandle, (FabricVertexHandle, FabricVertexHandle)>,
}

#[derive(Default)]
struct Objects {
    next: u64,
    live: HashMap<u64, ObjectFamily>,
    created: usize,
    signaled: HashSet<u64>,
    immediate_lists: HashSet<u64>,
    closed_lists: HashSet<u64>,
    pending_signals: HashMap<u64, Vec<EventHandle>>,
    kernel_names: HashMap<u64, String>,
    kernel_args: HashMap<(u64, u32), KernelArg>,
    allocations: HashSet<u64>,
}

pub(crate) struct State {
    pub(crate) config: NullDriverConfig,
    pub(crate) journal: Arc<Journal>,
    initialized: AtomicBool,
    topology: Topology,
    objects: Mutex<Objects>,
}

const ALLOCATION_BASE: u64 = 0x1000_0000;

/// Write `items` under the two-phase query convention.
fn fill<T: Clone>(items: &[T], count: &mut u32, out: Option<&mut [T]>) -> Result<(), ZeResult> {
    match out {
        Some(out) if *count > 0 => {
            let requested = *count as usize;
            if out.len() < requested {
                return Err(ZeResult::ERROR_INVALID_SIZE);
            }
            let n = requested.min(items.len());
            out[..n].clone_from_slice(&items[..n]);
            *count = n as u32;
        }
        _ => *count = items.len() as u32,
    }
    Ok(())
}

fn uuid_of(seed: u64) -> [u8; 16] {
    let mut uuid = [0u8; 16];
    uuid[..8].copy_from_slice(&seed.to_le_bytes());
    uuid[8..].copy_from_slice(&(!seed).to_le_bytes());
    uuid
}

impl State {
    pub(crate) fn new(config: NullDriverConfig, journal: Arc<Journal>) -> Self {
        let mut objects = Objects::default();
        let mut topology = Topology::default();
        let base = config.handle_base;
        let mut mint = |family: ObjectFamily| -> u64 {
            objects.next += 1;
            let raw = base | (u64::from(family.tag()) << 32) | objects.next;
            objects.live.insert(raw, family);
            raw
        };

        for _ in 0..config.driver_count {
            let driver = DriverHandle::from_raw(mint(ObjectFamily::Driver));
            let mut devices = Vec::new();
            for _ in 0..config.devices_per_driver {
                let device = DeviceHandle::from_raw(mint(ObjectFamily::Device));
                let subs = (0..config.sub_devices_per_device)
                    .map(|_| DeviceHandle::from_raw(mint(ObjectFamily::Device)))
                    .collect::<Vec<_>>();
                for sub in &subs {
                    topology.device_owner.insert(*sub, driver);
                }
                topology.sub_devices.insert(device, subs);
                topology.device_owner.insert(device, driver);
                devices.push(device);
            }

            let vertices = (0..config.fabric_vertices_per_driver)
                .map(|_| FabricVertexHandle::from_raw(mint(ObjectFamily::FabricVertex)))
                .collect::<Vec<_>>();
            for (i, vertex) in vertices.iter().enumerate() {
                if !devices.is_empty() {
                    topology.vertex_device.insert(*vertex, devices[i % devices.len()]);
                }
                for other in &vertices[i + 1..] {
                    let edge = FabricEdgeHandle::from_raw(mint(ObjectFamily::FabricEdge));
                    topology.edges.insert((*vertex, *other), edge);
                    topology.edges.insert((*other, *vertex), edge);
                    topology.edge_vertices.insert(edge, (*vertex, *other));
                }
            }

            topology.devices.insert(driver, devices);
            topology.vertices.insert(driver, vertices);
            topology.drivers.push(driver);
        }

        debug!(
            driver = %config.name,
            instances = topology.drivers.len(),
            devices = topology.device_owner.len(),
            "null driver topology built"
        );

        Self {
            config,
            journal,
            initialized: AtomicBool::new(false),
            topology,
            objects: Mutex::new(objects),
        }
    }

    // ── Bookkeeping ─────────────────────────────────────────

    fn log(&self, api: &str, handles: &[u64]) {
        self.journal.record(&self.config.name, api, handles);
    }

    /// `h` must be a live native handle of this driver.
    fn check<H: Handle>(&self, h: H) -> Result<(), ZeResult> {
        if h.is_null() {
            return Err(ZeResult::ERROR_INVALID_NULL_HANDLE);
        }
        match self.objects.lock().live.get(&h.as_raw()) {
            Some(family) if *family == H::FAMILY => Ok(()),
            _ => Err(ZeResult::ERROR_INVALID_ARGUMENT),
        }
    }

    fn check_all<H: Handle>(&self, handles: &[H]) -> Result<(), ZeResult> {
        handles.iter().try_for_each(|h| self.check(*h))
    }

    fn check_optional<H: Handle>(&self, h: Option<H>) -> Result<(), ZeResult> {
        h.map_or(Ok(()), |h| self.check(h))
    }

    fn create<H: Handle>(&self) -> H {
        let mut objects = self.objects.lock();
        objects.next += 1;
        let raw = self.config.handle_base | (u64::from(H::FAMILY.tag()) << 32) | objects.next;
        objects.live.insert(raw, H::FAMILY);
        objects.created += 1;
        H::from_raw(raw)
    }

    fn destroy<H: Handle>(&self, h: H) -> Result<(), ZeResult> {
        self.check(h)?;
        let mut objects = self.objects.lock();
        if self.is_stable(h.as_raw()) {
            return Err(ZeResult::ERROR_INVALID_ARGUMENT);
        }
        objects.live.remove(&h.as_raw());
        objects.created -= 1;
        objects.signaled.remove(&h.as_raw());
        Ok(())
    }

    fn is_stable(&self, raw: u64) -> bool {
        let t = &self.topology;
        t.drivers.iter().any(|d| d.as_raw() == raw)
            || t.device_owner.keys().any(|d| d.as_raw() == raw)
            || t.vertex_device.keys().any(|v| v.as_raw() == raw)
            || t.edge_vertices.keys().any(|e| e.as_raw() == raw)
    }

    fn require_init(&self) -> Result<(), ZeResult> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ZeResult::ERROR_UNINITIALIZED)
        }
    }

    pub(crate) fn accept_table_request(
        &self,
        family: InterfaceFamily,
        version: ApiVersion,
    ) -> Result<(), ZeResult> {
        if version.major() != self.config.api_version.major() {
            return Err(ZeResult::ERROR_UNSUPPORTED_VERSION);
        }
        match self.config.fail_table {
            Some((failing, code)) if failing == family => Err(code),
            _ => Ok(()),
        }
    }

    pub(crate) fn native_drivers(&self) -> Vec<DriverHandle> {
        self.topology.drivers.clone()
    }

    pub(crate) fn native_devices(&self) -> Vec<DeviceHandle> {
        self.topology
            .drivers
            .iter()
            .flat_map(|d| self.topology.devices.get(d).cloned().unwrap_or_default())
            .collect()
    }

    pub(crate) fn live_created(&self) -> usize {
        self.objects.lock().created
    }

    pub(crate) fn kernel_argument(&self, kernel: KernelHandle, index: u32) -> Option<KernelArg> {
        self.objects.lock().kernel_args.get(&(kernel.as_raw(), index)).cloned()
    }

    // ── Global / driver ─────────────────────────────────────

    pub(crate) fn init(&self, flags: InitFlags) -> Result<(), ZeResult> {
        self.log("zeInit", &[]);
        if let Some(code) = self.config.fail_init {
            return Err(code);
        }
        // Every device this driver reports is a GPU.
        if flags.contains(InitFlags::VPU_ONLY) && !flags.contains(InitFlags::GPU_ONLY) {
            return Err(ZeResult::ERROR_UNINITIALIZED);
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn driver_get(
        &self,
        count: &mut u32,
        drivers: Option<&mut [DriverHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeDriverGet", &[]);
        self.require_init()?;
        fill(&self.topology.drivers, count, drivers)
    }

    pub(crate) fn driver_get_api_version(
        &self,
        driver: DriverHandle,
        version: &mut ApiVersion,
    ) -> Result<(), ZeResult> {
        self.log("zeDriverGetApiVersion", &[driver.as_raw()]);
        self.check(driver)?;
        *version = self.config.api_version;
        Ok(())
    }

    pub(crate) fn driver_get_properties(
        &self,
        driver: DriverHandle,
        properties: &mut DriverProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeDriverGetProperties", &[driver.as_raw()]);
        self.check(driver)?;
        *properties = DriverProperties {
            uuid: uuid_of(driver.as_raw()),
            driver_version: 1,
        };
        Ok(())
    }

    pub(crate) fn driver_get_extension_properties(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        extensions: Option<&mut [ExtensionProperties]>,
    ) -> Result<(), ZeResult> {
        self.log("zeDriverGetExtensionProperties", &[driver.as_raw()]);
        self.check(driver)?;
        let known = [
            ExtensionProperties {
                name: "ZE_experimental_fabric".to_string(),
                version: 1,
            },
            ExtensionProperties {
                name: "ZE_extension_rtas".to_string(),
                version: 1,
            },
        ];
        fill(&known, count, extensions)
    }

    // ── Device ──────────────────────────────────────────────

    pub(crate) fn device_get(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        devices: Option<&mut [DeviceHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeDeviceGet", &[driver.as_raw()]);
        self.check(driver)?;
        if let Some(code) = self.config.enumeration_error {
            return Err(code);
        }
        let known = self.topology.devices.get(&driver).map(Vec::as_slice).unwrap_or_default();
        fill(known, count, devices)
    }

    pub(crate) fn device_get_sub_devices(
        &self,
        device: DeviceHandle,
        count: &mut u32,
        sub_devices: Option<&mut [DeviceHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeDeviceGetSubDevices", &[device.as_raw()]);
        self.check(device)?;
        let known = self.topology.sub_devices.get(&device).map(Vec::as_slice).unwrap_or_default();
        fill(known, count, sub_devices)
    }

    pub(crate) fn device_get_properties(
        &self,
        device: DeviceHandle,
        properties: &mut DeviceProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeDeviceGetProperties", &[device.as_raw()]);
        self.check(device)?;
        let parent = self
            .topology
            .sub_devices
            .iter()
            .find_map(|(parent, subs)| subs.iter().position(|s| *s == device).map(|i| (*parent, i)));
        *properties = DeviceProperties {
            device_type: DeviceType::GPU,
            vendor_id: 0,
            device_id: (device.as_raw() & 0xffff) as u32,
            name: format!("{} device {:#x}", self.config.name, device.as_raw()),
            is_sub_device: parent.is_some(),
            sub_device_id: parent.map_or(0, |(_, i)| i as u32),
            core_clock_rate: 1000,
            max_mem_alloc_size: 1 << 32,
        };
        Ok(())
    }

    pub(crate) fn device_can_access_peer(
        &self,
        device: DeviceHandle,
        peer: DeviceHandle,
        value: &mut bool,
    ) -> Result<(), ZeResult> {
        self.log("zeDeviceCanAccessPeer", &[device.as_raw(), peer.as_raw()]);
        self.check(device)?;
        self.check(peer)?;
        *value = self.topology.device_owner.get(&device) == self.topology.device_owner.get(&peer);
        Ok(())
    }

    pub(crate) fn device_get_status(&self, device: DeviceHandle) -> Result<(), ZeResult> {
        self.log("zeDeviceGetStatus", &[device.as_raw()]);
        self.check(device)
    }

    pub(crate) fn device_get_fabric_vertex(
        &self,
        device: DeviceHandle,
        vertex: &mut FabricVertexHandle,
    ) -> Result<(), ZeResult> {
        self.log("zeDeviceGetFabricVertexExp", &[device.as_raw()]);
        self.check(device)?;
        let found = self
            .topology
            .vertex_device
            .iter()
            .filter(|(_, d)| **d == device)
            .map(|(v, _)| *v)
            .min_by_key(|v| v.as_raw());
        match found {
            Some(found) => {
                *vertex = found;
                Ok(())
            }
            None => Err(ZeResult::ERROR_UNSUPPORTED_FEATURE),
        }
    }

    // ── Context ─────────────────────────────────────────────

    pub(crate) fn context_create(
        &self,
        driver: DriverHandle,
        _desc: &ContextDesc,
        context: &mut ContextHandle,
    ) -> Result<(), ZeResult> {
        self.check(driver)?;
        *context = self.create();
        self.log("zeContextCreate", &[driver.as_raw(), context.as_raw()]);
        Ok(())
    }

    pub(crate) fn context_create_ex(
        &self,
        driver: DriverHandle,
        _desc: &ContextDesc,
        devices: &[DeviceHandle],
        context: &mut ContextHandle,
    ) -> Result<(), ZeResult> {
        self.check(driver)?;
        self.check_all(devices)?;
        *context = self.create();
        let mut handles = vec![driver.as_raw()];
        handles.extend(devices.iter().map(|d| d.as_raw()));
        handles.push(context.as_raw());
        self.log("zeContextCreateEx", &handles);
        Ok(())
    }

    pub(crate) fn context_destroy(&self, context: ContextHandle) -> Result<(), ZeResult> {
        self.log("zeContextDestroy", &[context.as_raw()]);
        self.destroy(context)
    }

    pub(crate) fn context_get_status(&self, context: ContextHandle) -> Result<(), ZeResult> {
        self.log("zeContextGetStatus", &[context.as_raw()]);
        self.check(context)
    }

    pub(crate) fn context_make_memory_resident(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        ptr: u64,
        _size: usize,
    ) -> Result<(), ZeResult> {
        self.log("zeContextMakeMemoryResident", &[context.as_raw(), device.as_raw()]);
        self.check(context)?;
        self.check(device)?;
        if self.objects.lock().allocations.contains(&ptr) {
            Ok(())
        } else {
            Err(ZeResult::ERROR_INVALID_ARGUMENT)
        }
    }

    // ── Command queue ───────────────────────────────────────

    pub(crate) fn command_queue_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &CommandQueueDesc,
        queue: &mut CommandQueueHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *queue = self.create();
        self.log("zeCommandQueueCreate", &[context.as_raw(), device.as_raw(), queue.as_raw()]);
        Ok(())
    }

    pub(crate) fn command_queue_destroy(&self, queue: CommandQueueHandle) -> Result<(), ZeResult> {
        self.log("zeCommandQueueDestroy", &[queue.as_raw()]);
        self.destroy(queue)
    }

    /// Runs synchronously: every event signalled by the lists, and the
    /// fence, are signalled before returning.
    pub(crate) fn command_queue_execute_command_lists(
        &self,
        queue: CommandQueueHandle,
        lists: &[CommandListHandle],
        fence: Option<FenceHandle>,
    ) -> Result<(), ZeResult> {
        let mut handles = vec![queue.as_raw()];
        handles.extend(lists.iter().map(|l| l.as_raw()));
        handles.extend(fence.map(|f| f.as_raw()));
        self.log("zeCommandQueueExecuteCommandLists", &handles);

        self.check(queue)?;
        self.check_all(lists)?;
        self.check_optional(fence)?;
        let mut objects = self.objects.lock();
        if lists.iter().any(|l| !objects.closed_lists.contains(&l.as_raw())) {
            return Err(ZeResult::ERROR_INVALID_ARGUMENT);
        }
        for list in lists {
            let signals = objects.pending_signals.get(&list.as_raw()).cloned().unwrap_or_default();
            objects.signaled.extend(signals.iter().map(|e| e.as_raw()));
        }
        if let Some(fence) = fence {
            objects.signaled.insert(fence.as_raw());
        }
        Ok(())
    }

    pub(crate) fn command_queue_synchronize(
        &self,
        queue: CommandQueueHandle,
        _timeout: u64,
    ) -> Result<(), ZeResult> {
        self.log("zeCommandQueueSynchronize", &[queue.as_raw()]);
        self.check(queue)
    }

    // ── Command list ────────────────────────────────────────

    pub(crate) fn command_list_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &CommandListDesc,
        list: &mut CommandListHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *list = self.create();
        self.log("zeCommandListCreate", &[context.as_raw(), device.as_raw(), list.as_raw()]);
        Ok(())
    }

    pub(crate) fn command_list_create_immediate(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &CommandQueueDesc,
        list: &mut CommandListHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *list = self.create();
        self.objects.lock().immediate_lists.insert(list.as_raw());
        self.log(
            "zeCommandListCreateImmediate",
            &[context.as_raw(), device.as_raw(), list.as_raw()],
        );
        Ok(())
    }

    pub(crate) fn command_list_destroy(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        self.log("zeCommandListDestroy", &[list.as_raw()]);
        self.destroy(list)?;
        let mut objects = self.objects.lock();
        objects.immediate_lists.remove(&list.as_raw());
        objects.closed_lists.remove(&list.as_raw());
        objects.pending_signals.remove(&list.as_raw());
        Ok(())
    }

    pub(crate) fn command_list_close(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        self.log("zeCommandListClose", &[list.as_raw()]);
        self.check(list)?;
        self.objects.lock().closed_lists.insert(list.as_raw());
        Ok(())
    }

    pub(crate) fn command_list_reset(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        self.log("zeCommandListReset", &[list.as_raw()]);
        self.check(list)?;
        let mut objects = self.objects.lock();
        objects.closed_lists.remove(&list.as_raw());
        objects.pending_signals.remove(&list.as_raw());
        Ok(())
    }

    /// Append a command that signals `signal` when the list runs; on an
    /// immediate list that is now.
    fn append(
        &self,
        api: &str,
        list: CommandListHandle,
        operands: &[u64],
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let mut handles = vec![list.as_raw()];
        handles.extend_from_slice(operands);
        handles.extend(signal.map(|e| e.as_raw()));
        handles.extend(wait.iter().map(|e| e.as_raw()));
        self.log(api, &handles);

        self.check(list)?;
        self.check_optional(signal)?;
        self.check_all(wait)?;
        let mut objects = self.objects.lock();
        if objects.closed_lists.contains(&list.as_raw()) {
            return Err(ZeResult::ERROR_INVALID_ARGUMENT);
        }
        if let Some(signal) = signal {
            if objects.immediate_lists.contains(&list.as_raw()) {
                objects.signaled.insert(signal.as_raw());
            } else {
                objects.pending_signals.entry(list.as_raw()).or_default().push(signal);
            }
        }
        Ok(())
    }

    pub(crate) fn command_list_append_barrier(
        &self,
        list: CommandListHandle,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        self.append("zeCommandListAppendBarrier", list, &[], signal, wait)
    }

    pub(crate) fn command_list_append_memory_copy(
        &self,
        list: CommandListHandle,
        dst: u64,
        src: u64,
        _size: usize,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        {
            let objects = self.objects.lock();
            if !objects.allocations.contains(&dst) || !objects.allocations.contains(&src) {
                return Err(ZeResult::ERROR_INVALID_ARGUMENT);
            }
        }
        self.append("zeCommandListAppendMemoryCopy", list, &[], signal, wait)
    }

    pub(crate) fn command_list_append_image_copy(
        &self,
        list: CommandListHandle,
        dst: ImageHandle,
        src: ImageHandle,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        self.check(dst)?;
        self.check(src)?;
        self.append(
            "zeCommandListAppendImageCopy",
            list,
            &[dst.as_raw(), src.as_raw()],
            signal,
            wait,
        )
    }

    pub(crate) fn command_list_append_signal_event(
        &self,
        list: CommandListHandle,
        event: EventHandle,
    ) -> Result<(), ZeResult> {
        self.append("zeCommandListAppendSignalEvent", list, &[], Some(event), &[])
    }

    pub(crate) fn command_list_append_wait_on_events(
        &self,
        list: CommandListHandle,
        events: &[EventHandle],
    ) -> Result<(), ZeResult> {
        self.append("zeCommandListAppendWaitOnEvents", list, &[], None, events)
    }

    pub(crate) fn command_list_append_launch_kernel(
        &self,
        list: CommandListHandle,
        kernel: KernelHandle,
        _groups: &GroupCount,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        self.check(kernel)?;
        self.append(
            "zeCommandListAppendLaunchKernel",
            list,
            &[kernel.as_raw()],
            signal,
            wait,
        )
    }

    // ── Fence ───────────────────────────────────────────────

    pub(crate) fn fence_create(
        &self,
        queue: CommandQueueHandle,
        desc: &FenceDesc,
        fence: &mut FenceHandle,
    ) -> Result<(), ZeResult> {
        self.check(queue)?;
        *fence = self.create();
        if desc.flags.contains(FenceFlags::SIGNALED) {
            self.objects.lock().signaled.insert(fence.as_raw());
        }
        self.log("zeFenceCreate", &[queue.as_raw(), fence.as_raw()]);
        Ok(())
    }

    pub(crate) fn fence_destroy(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        self.log("zeFenceDestroy", &[fence.as_raw()]);
        self.destroy(fence)
    }

    fn signal_status(&self, raw: u64) -> Result<(), ZeResult> {
        if self.objects.lock().signaled.contains(&raw) {
            Ok(())
        } else {
            Err(ZeResult::NOT_READY)
        }
    }

    /// Nothing runs in the background, so waiting cannot change the outcome:
    /// any timeout behaves like a poll.
    pub(crate) fn fence_host_synchronize(&self, fence: FenceHandle, _timeout: u64) -> Result<(), ZeResult> {
        self.log("zeFenceHostSynchronize", &[fence.as_raw()]);
        self.check(fence)?;
        self.signal_status(fence.as_raw())
    }

    pub(crate) fn fence_query_status(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        self.log("zeFenceQueryStatus", &[fence.as_raw()]);
        self.check(fence)?;
        self.signal_status(fence.as_raw())
    }

    pub(crate) fn fence_reset(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        self.log("zeFenceReset", &[fence.as_raw()]);
        self.check(fence)?;
        self.objects.lock().signaled.remove(&fence.as_raw());
        Ok(())
    }

    // ── Event pool / event ──────────────────────────────────

    pub(crate) fn event_pool_create(
        &self,
        context: ContextHandle,
        _desc: &EventPoolDesc,
        devices: &[DeviceHandle],
        pool: &mut EventPoolHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check_all(devices)?;
        *pool = self.create();
        let mut handles = vec![context.as_raw()];
        handles.extend(devices.iter().map(|d| d.as_raw()));
        handles.push(pool.as_raw());
        self.log("zeEventPoolCreate", &handles);
        Ok(())
    }

    pub(crate) fn event_pool_destroy(&self, pool: EventPoolHandle) -> Result<(), ZeResult> {
        self.log("zeEventPoolDestroy", &[pool.as_raw()]);
        self.destroy(pool)
    }

    pub(crate) fn event_create(
        &self,
        pool: EventPoolHandle,
        _desc: &EventDesc,
        event: &mut EventHandle,
    ) -> Result<(), ZeResult> {
        self.check(pool)?;
        *event = self.create();
        self.log("zeEventCreate", &[pool.as_raw(), event.as_raw()]);
        Ok(())
    }

    pub(crate) fn event_destroy(&self, event: EventHandle) -> Result<(), ZeResult> {
        self.log("zeEventDestroy", &[event.as_raw()]);
        self.destroy(event)
    }

    pub(crate) fn event_host_signal(&self, event: EventHandle) -> Result<(), ZeResult> {
        self.log("zeEventHostSignal", &[event.as_raw()]);
        self.check(event)?;
        self.objects.lock().signaled.insert(event.as_raw());
        Ok(())
    }

    pub(crate) fn event_host_synchronize(&self, event: EventHandle, _timeout: u64) -> Result<(), ZeResult> {
        self.log("zeEventHostSynchronize", &[event.as_raw()]);
        self.check(event)?;
        self.signal_status(event.as_raw())
    }

    pub(crate) fn event_query_status(&self, event: EventHandle) -> Result<(), ZeResult> {
        self.log("zeEventQueryStatus", &[event.as_raw()]);
        self.check(event)?;
        self.signal_status(event.as_raw())
    }

    pub(crate) fn event_host_reset(&self, event: EventHandle) -> Result<(), ZeResult> {
        self.log("zeEventHostReset", &[event.as_raw()]);
        self.check(event)?;
        self.objects.lock().signaled.remove(&event.as_raw());
        Ok(())
    }

    // ── Image / sampler ─────────────────────────────────────

    pub(crate) fn image_get_properties(
        &self,
        device: DeviceHandle,
        _desc: &ImageDesc,
        properties: &mut ImageProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeImageGetProperties", &[device.as_raw()]);
        self.check(device)?;
        properties.sampler_filter_flags = ImageSamplerFilterFlags::POINT | ImageSamplerFilterFlags::LINEAR;
        Ok(())
    }

    pub(crate) fn image_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &ImageDesc,
        image: &mut ImageHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *image = self.create();
        self.log("zeImageCreate", &[context.as_raw(), device.as_raw(), image.as_raw()]);
        Ok(())
    }

    pub(crate) fn image_destroy(&self, image: ImageHandle) -> Result<(), ZeResult> {
        self.log("zeImageDestroy", &[image.as_raw()]);
        self.destroy(image)
    }

    pub(crate) fn sampler_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &SamplerDesc,
        sampler: &mut SamplerHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *sampler = self.create();
        self.log("zeSamplerCreate", &[context.as_raw(), device.as_raw(), sampler.as_raw()]);
        Ok(())
    }

    pub(crate) fn sampler_destroy(&self, sampler: SamplerHandle) -> Result<(), ZeResult> {
        self.log("zeSamplerDestroy", &[sampler.as_raw()]);
        self.destroy(sampler)
    }

    // ── Module / build log / kernel ─────────────────────────

    pub(crate) fn module_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &ModuleDesc,
        module: &mut ModuleHandle,
        build_log: Option<&mut ModuleBuildLogHandle>,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *module = self.create();
        let mut handles = vec![context.as_raw(), device.as_raw(), module.as_raw()];
        if let Some(log) = build_log {
            *log = self.create();
            handles.push(log.as_raw());
        }
        self.log("zeModuleCreate", &handles);
        Ok(())
    }

    pub(crate) fn module_destroy(&self, module: ModuleHandle) -> Result<(), ZeResult> {
        self.log("zeModuleDestroy", &[module.as_raw()]);
        self.destroy(module)
    }

    pub(crate) fn module_dynamic_link(
        &self,
        modules: &[ModuleHandle],
        link_log: Option<&mut ModuleBuildLogHandle>,
    ) -> Result<(), ZeResult> {
        self.check_all(modules)?;
        let mut handles = modules.iter().map(|m| m.as_raw()).collect::<Vec<_>>();
        if let Some(log) = link_log {
            *log = self.create();
            handles.push(log.as_raw());
        }
        self.log("zeModuleDynamicLink", &handles);
        Ok(())
    }

    pub(crate) fn module_get_kernel_names(
        &self,
        module: ModuleHandle,
        count: &mut u32,
        names: Option<&mut [String]>,
    ) -> Result<(), ZeResult> {
        self.log("zeModuleGetKernelNames", &[module.as_raw()]);
        self.check(module)?;
        fill(&self.config.kernel_names, count, names)
    }

    pub(crate) fn module_build_log_destroy(&self, log: ModuleBuildLogHandle) -> Result<(), ZeResult> {
        self.log("zeModuleBuildLogDestroy", &[log.as_raw()]);
        self.destroy(log)
    }

    pub(crate) fn module_build_log_get_string(
        &self,
        log: ModuleBuildLogHandle,
        text: &mut String,
    ) -> Result<(), ZeResult> {
        self.log("zeModuleBuildLogGetString", &[log.as_raw()]);
        self.check(log)?;
        *text = format!("{}: build succeeded", self.config.name);
        Ok(())
    }

    pub(crate) fn kernel_create(
        &self,
        module: ModuleHandle,
        desc: &KernelDesc,
        kernel: &mut KernelHandle,
    ) -> Result<(), ZeResult> {
        self.check(module)?;
        if !self.config.kernel_names.contains(&desc.name) {
            return Err(ZeResult::ERROR_INVALID_ARGUMENT);
        }
        *kernel = self.create();
        self.objects.lock().kernel_names.insert(kernel.as_raw(), desc.name.clone());
        self.log("zeKernelCreate", &[module.as_raw(), kernel.as_raw()]);
        Ok(())
    }

    pub(crate) fn kernel_destroy(&self, kernel: KernelHandle) -> Result<(), ZeResult> {
        self.log("zeKernelDestroy", &[kernel.as_raw()]);
        self.destroy(kernel)?;
        let mut objects = self.objects.lock();
        objects.kernel_names.remove(&kernel.as_raw());
        objects.kernel_args.retain(|(k, _), _| *k != kernel.as_raw());
        Ok(())
    }

    /// Image and sampler arguments must be this driver's own handles.
    pub(crate) fn kernel_set_argument_value(
        &self,
        kernel: KernelHandle,
        index: u32,
        value: ArgValue<'_>,
    ) -> Result<(), ZeResult> {
        let arg = match value {
            ArgValue::Null => KernelArg::Null,
            ArgValue::Bytes(bytes) => KernelArg::Bytes(bytes.to_vec()),
            ArgValue::Image(image) => KernelArg::Image(image),
            ArgValue::Sampler(sampler) => KernelArg::Sampler(sampler),
        };
        let mut handles = vec![kernel.as_raw()];
        match &arg {
            KernelArg::Image(image) => handles.push(image.as_raw()),
            KernelArg::Sampler(sampler) => handles.push(sampler.as_raw()),
            _ => {}
        }
        self.log("zeKernelSetArgumentValue", &handles);

        self.check(kernel)?;
        match &arg {
            KernelArg::Image(image) => self.check(*image)?,
            KernelArg::Sampler(sampler) => self.check(*sampler)?,
            _ => {}
        }
        self.objects.lock().kernel_args.insert((kernel.as_raw(), index), arg);
        Ok(())
    }

    pub(crate) fn kernel_set_group_size(
        &self,
        kernel: KernelHandle,
        x: u32,
        y: u32,
        z: u32,
    ) -> Result<(), ZeResult> {
        self.log("zeKernelSetGroupSize", &[kernel.as_raw()]);
        self.check(kernel)?;
        if x == 0 || y == 0 || z == 0 {
            return Err(ZeResult::ERROR_INVALID_ARGUMENT);
        }
        Ok(())
    }

    pub(crate) fn kernel_get_name(&self, kernel: KernelHandle, name: &mut String) -> Result<(), ZeResult> {
        self.log("zeKernelGetName", &[kernel.as_raw()]);
        self.check(kernel)?;
        *name = self
            .objects
            .lock()
            .kernel_names
            .get(&kernel.as_raw())
            .cloned()
            .unwrap_or_default();
        Ok(())
    }

    // ── Memory ──────────────────────────────────────────────

    pub(crate) fn physical_mem_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        _desc: &PhysicalMemDesc,
        memory: &mut PhysicalMemHandle,
    ) -> Result<(), ZeResult> {
        self.check(context)?;
        self.check(device)?;
        *memory = self.create();
        self.log("zePhysicalMemCreate", &[context.as_raw(), device.as_raw(), memory.as_raw()]);
        Ok(())
    }

    pub(crate) fn physical_mem_destroy(
        &self,
        context: ContextHandle,
        memory: PhysicalMemHandle,
    ) -> Result<(), ZeResult> {
        self.log("zePhysicalMemDestroy", &[context.as_raw(), memory.as_raw()]);
        self.check(context)?;
        self.destroy(memory)
    }

    pub(crate) fn mem_alloc_device(
        &self,
        context: ContextHandle,
        _desc: &DeviceMemAllocDesc,
        size: usize,
        alignment: usize,
        device: DeviceHandle,
        ptr: &mut u64,
    ) -> Result<(), ZeResult> {
        self.log("zeMemAllocDevice", &[context.as_raw(), device.as_raw()]);
        self.check(context)?;
        self.check(device)?;
        if size == 0 {
            return Err(ZeResult::ERROR_UNSUPPORTED_SIZE);
        }
        if alignment != 0 && !alignment.is_power_of_two() {
            return Err(ZeResult::ERROR_UNSUPPORTED_ALIGNMENT);
        }
        let mut objects = self.objects.lock();
        objects.next += 1;
        let address = self.config.handle_base | ALLOCATION_BASE | (objects.next << 12);
        objects.allocations.insert(address);
        *ptr = address;
        Ok(())
    }

    pub(crate) fn mem_free(&self, context: ContextHandle, ptr: u64) -> Result<(), ZeResult> {
        self.log("zeMemFree", &[context.as_raw()]);
        self.check(context)?;
        if self.objects.lock().allocations.remove(&ptr) {
            Ok(())
        } else {
            Err(ZeResult::ERROR_INVALID_ARGUMENT)
        }
    }

    // ── Fabric ──────────────────────────────────────────────

    pub(crate) fn fabric_vertex_get(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        vertices: Option<&mut [FabricVertexHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricVertexGetExp", &[driver.as_raw()]);
        self.check(driver)?;
        if let Some(code) = self.config.enumeration_error {
            return Err(code);
        }
        let known = self.topology.vertices.get(&driver).map(Vec::as_slice).unwrap_or_default();
        fill(known, count, vertices)
    }

    /// The null topology is flat: no vertex has sub-vertices.
    pub(crate) fn fabric_vertex_get_sub_vertices(
        &self,
        vertex: FabricVertexHandle,
        count: &mut u32,
        sub_vertices: Option<&mut [FabricVertexHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricVertexGetSubVerticesExp", &[vertex.as_raw()]);
        self.check(vertex)?;
        fill(&[], count, sub_vertices)
    }

    pub(crate) fn fabric_vertex_get_properties(
        &self,
        vertex: FabricVertexHandle,
        properties: &mut FabricVertexProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricVertexGetPropertiesExp", &[vertex.as_raw()]);
        self.check(vertex)?;
        *properties = FabricVertexProperties {
            uuid: uuid_of(vertex.as_raw()),
            vertex_type: FabricVertexType::DEVICE,
            remote: false,
        };
        Ok(())
    }

    pub(crate) fn fabric_vertex_get_device(
        &self,
        vertex: FabricVertexHandle,
        device: &mut DeviceHandle,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricVertexGetDeviceExp", &[vertex.as_raw()]);
        self.check(vertex)?;
        match self.topology.vertex_device.get(&vertex) {
            Some(found) => {
                *device = *found;
                Ok(())
            }
            None => Err(ZeResult::ERROR_UNSUPPORTED_FEATURE),
        }
    }

    pub(crate) fn fabric_edge_get(
        &self,
        vertex_a: FabricVertexHandle,
        vertex_b: FabricVertexHandle,
        count: &mut u32,
        edges: Option<&mut [FabricEdgeHandle]>,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricEdgeGetExp", &[vertex_a.as_raw(), vertex_b.as_raw()]);
        self.check(vertex_a)?;
        self.check(vertex_b)?;
        let found = self
            .topology
            .edges
            .get(&(vertex_a, vertex_b))
            .map(std::slice::from_ref)
            .unwrap_or_default();
        fill(found, count, edges)
    }

    pub(crate) fn fabric_edge_get_vertices(
        &self,
        edge: FabricEdgeHandle,
        vertex_a: &mut FabricVertexHandle,
        vertex_b: &mut FabricVertexHandle,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricEdgeGetVerticesExp", &[edge.as_raw()]);
        self.check(edge)?;
        let (a, b) = self
            .topology
            .edge_vertices
            .get(&edge)
            .copied()
            .ok_or(ZeResult::ERROR_INVALID_ARGUMENT)?;
        *vertex_a = a;
        *vertex_b = b;
        Ok(())
    }

    pub(crate) fn fabric_edge_get_properties(
        &self,
        edge: FabricEdgeHandle,
        properties: &mut FabricEdgeProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeFabricEdgeGetPropertiesExp", &[edge.as_raw()]);
        self.check(edge)?;
        *properties = FabricEdgeProperties {
            uuid: uuid_of(edge.as_raw()),
            model: "null-link".to_string(),
            bandwidth: 1,
            latency: 1,
        };
        Ok(())
    }

    // ── Ray tracing ─────────────────────────────────────────

    pub(crate) fn rtas_builder_create(
        &self,
        driver: DriverHandle,
        desc: &RtasBuilderDesc,
        builder: &mut RtasBuilderHandle,
    ) -> Result<(), ZeResult> {
        self.check(driver)?;
        if !desc.builder_version.is_known() {
            return Err(ZeResult::ERROR_INVALID_ENUMERATION);
        }
        *builder = self.create();
        self.log("zeRTASBuilderCreateExt", &[driver.as_raw(), builder.as_raw()]);
        Ok(())
    }

    pub(crate) fn rtas_builder_get_build_properties(
        &self,
        builder: RtasBuilderHandle,
        properties: &mut RtasBuilderBuildProperties,
    ) -> Result<(), ZeResult> {
        self.log("zeRTASBuilderGetBuildPropertiesExt", &[builder.as_raw()]);
        self.check(builder)?;
        *properties = RtasBuilderBuildProperties {
            scratch_buffer_size_bytes: 1 << 16,
            rtas_buffer_size_bytes: 1 << 20,
        };
        Ok(())
    }

    pub(crate) fn rtas_builder_destroy(&self, builder: RtasBuilderHandle) -> Result<(), ZeResult> {
        self.log("zeRTASBuilderDestroyExt", &[builder.as_raw()]);
        self.destroy(builder)
    }

    pub(crate) fn rtas_parallel_operation_create(
        &self,
        driver: DriverHandle,
        operation: &mut RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        self.check(driver)?;
        *operation = self.create();
        self.log("zeRTASParallelOperationCreateExt", &[driver.as_raw(), operation.as_raw()]);
        Ok(())
    }

    pub(crate) fn rtas_parallel_operation_join(
        &self,
        operation: RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        self.log("zeRTASParallelOperationJoinExt", &[operation.as_raw()]);
        self.check(operation)
    }

    pub(crate) fn rtas_parallel_operation_destroy(
        &self,
        operation: RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        self.log("zeRTASParallelOperationDestroyExt", &[operation.as_raw()]);
        self.destroy(operation)
    }
}
