//! Handle translation helpers shared by the trampolines: fan-out
//! enumeration across drivers, in-place wrapping of returned handles and
//! unwrapping of handle arrays.

use std::sync::Arc;

use accel_api::{Handle, ZeResult};
use accel_core::{DispatchBundle, ObjectFactory};

/// Two-phase enumeration over several sources (drivers, or driver instances
/// within drivers).
///
/// With `*count == 0` or no output buffer, `*count` receives the sum of every
/// source's count. Otherwise up to `*count` handles are collected in source
/// order, each wrapped for the source that produced it, and `*count` becomes
/// the number written. Any source error aborts the call with `*count`
/// unchanged and nothing left in `out`.
pub(crate) fn fan_out<S, H: Handle>(
    sources: &[S],
    count: &mut u32,
    out: Option<&mut [H]>,
    factory: &ObjectFactory<H>,
    mut enumerate: impl FnMut(&S, &mut u32, Option<&mut [H]>) -> ZeResult,
    dispatch_of: impl Fn(&S) -> Arc<DispatchBundle>,
) -> Result<(), ZeResult> {
    let requested = *count as usize;
    let out = match out {
        Some(out) if requested > 0 => out,
        _ => {
            let mut total: u32 = 0;
            for source in sources {
                let mut available = 0;
                enumerate(source, &mut available, None).check()?;
                total = total.saturating_add(available);
            }
            *count = total;
            return Ok(());
        }
    };
    if out.len() < requested {
        return Err(ZeResult::ERROR_INVALID_SIZE);
    }

    let mut written = 0usize;
    for source in sources {
        if written == requested {
            break;
        }
        let step = collect_from(source, &mut out[written..requested], factory, &mut enumerate, &dispatch_of);
        match step {
            Ok(filled) => written += filled,
            Err(code) => {
                release_written(factory, &mut out[..written]);
                return Err(code);
            }
        }
    }
    *count = written as u32;
    Ok(())
}

/// Query one source's count, then fill as much of `window` as it has.
fn collect_from<S, H: Handle>(
    source: &S,
    window: &mut [H],
    factory: &ObjectFactory<H>,
    enumerate: &mut impl FnMut(&S, &mut u32, Option<&mut [H]>) -> ZeResult,
    dispatch_of: &impl Fn(&S) -> Arc<DispatchBundle>,
) -> Result<usize, ZeResult> {
    let mut available = 0u32;
    enumerate(source, &mut available, None).check()?;
    if available == 0 {
        return Ok(0);
    }
    let take = window.len().min(available as usize);
    let mut filled = take as u32;
    enumerate(source, &mut filled, Some(&mut window[..take])).check()?;
    let filled = take.min(filled as usize);
    wrap_in_place(factory, &mut window[..filled], &dispatch_of(source))?;
    Ok(filled)
}

/// Single-driver two-phase enumeration: forward, then wrap what came back.
pub(crate) fn enumerate_one<H: Handle>(
    count: &mut u32,
    out: Option<&mut [H]>,
    factory: &ObjectFactory<H>,
    dispatch: &Arc<DispatchBundle>,
    call: impl FnOnce(&mut u32, Option<&mut [H]>) -> ZeResult,
) -> Result<(), ZeResult> {
    let requested = *count as usize;
    match out {
        Some(out) if requested > 0 => {
            if out.len() < requested {
                return Err(ZeResult::ERROR_INVALID_SIZE);
            }
            let mut filled = *count;
            call(&mut filled, Some(&mut out[..requested])).check()?;
            let filled = requested.min(filled as usize);
            wrap_in_place(factory, &mut out[..filled], dispatch)?;
            *count = filled as u32;
            Ok(())
        }
        _ => call(count, None).check(),
    }
}

/// Replace native handles with loader handles. On failure every wrap made
/// here is undone and the whole slice is nulled.
pub(crate) fn wrap_in_place<H: Handle>(
    factory: &ObjectFactory<H>,
    slots: &mut [H],
    dispatch: &Arc<DispatchBundle>,
) -> Result<(), ZeResult> {
    for i in 0..slots.len() {
        match factory.get_instance(slots[i], dispatch) {
            Ok(handle) => slots[i] = handle,
            Err(code) => {
                release_written(factory, &mut slots[..i]);
                slots[i..].fill(H::NULL);
                return Err(code);
            }
        }
    }
    Ok(())
}

/// Wrap a single created object.
pub(crate) fn wrap_output<H: Handle>(
    factory: &ObjectFactory<H>,
    out: &mut H,
    dispatch: &Arc<DispatchBundle>,
) -> Result<(), ZeResult> {
    match factory.get_instance(*out, dispatch) {
        Ok(handle) => {
            *out = handle;
            Ok(())
        }
        Err(code) => {
            *out = H::NULL;
            Err(code)
        }
    }
}

fn release_written<H: Handle>(factory: &ObjectFactory<H>, slots: &mut [H]) {
    for slot in slots {
        let _ = factory.release(*slot);
        *slot = H::NULL;
    }
}

/// Native handles for an input array, in a scratch buffer freed on return.
pub(crate) fn unwrap_all<H: Handle>(
    factory: &ObjectFactory<H>,
    handles: &[H],
) -> Result<Vec<H>, ZeResult> {
    let mut natives = Vec::new();
    natives
        .try_reserve_exact(handles.len())
        .map_err(|_| ZeResult::ERROR_OUT_OF_HOST_MEMORY)?;
    for &handle in handles {
        natives.push(factory.unwrap(handle)?.0);
    }
    Ok(natives)
}

/// An absent (or null) optional handle stays absent.
pub(crate) fn unwrap_optional<H: Handle>(
    factory: &ObjectFactory<H>,
    handle: Option<H>,
) -> Result<Option<H>, ZeResult> {
    match handle {
        Some(handle) if !handle.is_null() => Ok(Some(factory.unwrap(handle)?.0)),
        _ => Ok(None),
    }
}
