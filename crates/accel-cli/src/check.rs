//! `accel check`: exercise the full dispatch path on every device.
//!
//! Each device gets a context, a command queue, a closed command list, a
//! fence and a small device allocation. The list is executed with the
//! fence, the fence is queried, and everything is torn down again. Any
//! failure along the way fails that device's check; objects created before
//! the failure are still destroyed.

use accel_api::*;
use serde::Serialize;

use crate::query::{self, entry};

// ── Check result types ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            details: Vec::new(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    fn skip(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Skip, message)
    }

    fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

pub fn any_failed(results: &[CheckResult]) -> bool {
    results.iter().any(|r| r.status == CheckStatus::Fail)
}

// ── Checks ──────────────────────────────────────────────────────────

pub fn run_checks(tables: &DdiTables) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let drivers = match query::drivers(tables) {
        Ok(drivers) if drivers.is_empty() => {
            results.push(CheckResult::fail("Drivers", "no driver instances reported"));
            return results;
        }
        Ok(drivers) => {
            results.push(CheckResult::pass(
                "Drivers",
                &format!("{} driver instance(s)", drivers.len()),
            ));
            drivers
        }
        Err(e) => {
            results.push(CheckResult::fail("Drivers", &format!("{:#}", e)));
            return results;
        }
    };

    for (i, &driver) in drivers.iter().enumerate() {
        let devices = match query::devices(tables, driver) {
            Ok(devices) => devices,
            Err(e) => {
                results.push(CheckResult::fail(&format!("Driver {}", i), &format!("{:#}", e)));
                continue;
            }
        };
        if devices.is_empty() {
            results.push(CheckResult::warn(&format!("Driver {}", i), "no devices"));
            continue;
        }
        for (j, &device) in devices.iter().enumerate() {
            let name = format!("Driver {} device {}", i, j);
            let mut steps = Vec::new();
            let result = match round_trip(tables, driver, device, &mut steps) {
                Ok(()) => CheckResult::pass(&name, "objects created, executed and destroyed"),
                Err(e) => CheckResult::fail(&name, &format!("{:#}", e)),
            };
            results.push(steps.into_iter().fold(result, CheckResult::detail));
        }
    }

    results.push(check_fabric(tables, &drivers));
    results
}

/// Destroy calls queued while objects are created, run newest first.
#[derive(Default)]
struct Teardown<'a> {
    steps: Vec<Box<dyn FnOnce() -> ZeResult + 'a>>,
}

impl<'a> Teardown<'a> {
    fn push(&mut self, step: impl FnOnce() -> ZeResult + 'a) {
        self.steps.push(Box::new(step));
    }

    fn run(&mut self) -> ZeResult {
        let mut first_error = ZeResult::SUCCESS;
        while let Some(step) = self.steps.pop() {
            let result = step();
            if result.is_error() && !first_error.is_error() {
                first_error = result;
            }
        }
        first_error
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

fn round_trip(
    tables: &DdiTables,
    driver: DriverHandle,
    device: DeviceHandle,
    steps: &mut Vec<String>,
) -> anyhow::Result<()> {
    let mut teardown = Teardown::default();

    let mut context = ContextHandle::NULL;
    entry(&tables.context.create, "zeContextCreate")?(driver, &ContextDesc::default(), &mut context)
        .check()?;
    let destroy_context = entry(&tables.context.destroy, "zeContextDestroy")?;
    teardown.push(move || destroy_context(context));
    steps.push(format!("context {:?}", context));

    let mut queue = CommandQueueHandle::NULL;
    entry(&tables.command_queue.create, "zeCommandQueueCreate")?(
        context,
        device,
        &CommandQueueDesc::default(),
        &mut queue,
    )
    .check()?;
    let destroy_queue = entry(&tables.command_queue.destroy, "zeCommandQueueDestroy")?;
    teardown.push(move || destroy_queue(queue));

    let mut list = CommandListHandle::NULL;
    entry(&tables.command_list.create, "zeCommandListCreate")?(
        context,
        device,
        &CommandListDesc::default(),
        &mut list,
    )
    .check()?;
    let destroy_list = entry(&tables.command_list.destroy, "zeCommandListDestroy")?;
    teardown.push(move || destroy_list(list));
    entry(&tables.command_list.append_barrier, "zeCommandListAppendBarrier")?(list, None, &[])
        .check()?;
    entry(&tables.command_list.close, "zeCommandListClose")?(list).check()?;

    let mut fence = FenceHandle::NULL;
    entry(&tables.fence.create, "zeFenceCreate")?(queue, &FenceDesc::default(), &mut fence)
        .check()?;
    let destroy_fence = entry(&tables.fence.destroy, "zeFenceDestroy")?;
    teardown.push(move || destroy_fence(fence));

    entry(
        &tables.command_queue.execute_command_lists,
        "zeCommandQueueExecuteCommandLists",
    )?(queue, &[list], Some(fence))
    .check()?;
    entry(&tables.fence.host_synchronize, "zeFenceHostSynchronize")?(fence, u64::MAX).check()?;
    entry(&tables.fence.query_status, "zeFenceQueryStatus")?(fence).check()?;
    steps.push("command list executed, fence signaled".to_string());

    let mut ptr = 0u64;
    entry(&tables.mem.alloc_device, "zeMemAllocDevice")?(
        context,
        &DeviceMemAllocDesc::default(),
        4096,
        64,
        device,
        &mut ptr,
    )
    .check()?;
    let free = entry(&tables.mem.free, "zeMemFree")?;
    teardown.push(move || free(context, ptr));
    steps.push(format!("allocated 4096 bytes at {:#x}", ptr));

    teardown.run().check()?;
    Ok(())
}

fn check_fabric(tables: &DdiTables, drivers: &[DriverHandle]) -> CheckResult {
    let Some(get) = tables.fabric_vertex.get.as_deref() else {
        return CheckResult::skip("Fabric", "zeFabricVertexGetExp not available");
    };
    let mut result = CheckResult::pass("Fabric", "fabric vertices enumerated");
    for (i, &driver) in drivers.iter().enumerate() {
        match query::enumerate(|n, out| get(driver, n, out)) {
            Ok(vertices) => {
                result = result.detail(format!("driver {}: {} vertices", i, vertices.len()));
            }
            Err(e) => {
                return CheckResult::fail("Fabric", &format!("driver {}: {:#}", i, e));
            }
        }
    }
    result
}

// ── Output ──────────────────────────────────────────────────────────

pub fn print_results(results: &[CheckResult]) {
    println!();
    println!("Accelerator Dispatch Check");
    println!("==========================");
    println!();

    let mut pass_count = 0u32;
    let mut fail_count = 0u32;
    let mut warn_count = 0u32;

    for result in results {
        let (icon, color_start, color_end) = match result.status {
            CheckStatus::Pass => {
                pass_count += 1;
                ("[PASS]", "\x1b[32m", "\x1b[0m")
            }
            CheckStatus::Fail => {
                fail_count += 1;
                ("[FAIL]", "\x1b[31m", "\x1b[0m")
            }
            CheckStatus::Warn => {
                warn_count += 1;
                ("[WARN]", "\x1b[33m", "\x1b[0m")
            }
            CheckStatus::Skip => ("[SKIP]", "\x1b[90m", "\x1b[0m"),
        };

        println!(
            "  {}{}{} {} - {}",
            color_start, icon, color_end, result.name, result.message
        );
        for detail in &result.details {
            println!("         {}", detail);
        }
    }

    println!();
    println!("--------------------------");
    println!(
        "  {} passed, {} failed, {} warnings",
        pass_count, fail_count, warn_count
    );
    println!();
}
