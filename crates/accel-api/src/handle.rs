use std::fmt;
use std::hash::Hash;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::intercept::Param;
use crate::result::ZeResult;

/// Object families that carry a handle.
///
/// The discriminant is also the tag the loader embeds in the handles it
/// hands out, so a handle of one family is never accepted as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectFamily {
    Driver = 1,
    Device,
    Context,
    CommandQueue,
    CommandList,
    Fence,
    EventPool,
    Event,
    Image,
    Module,
    ModuleBuildLog,
    Kernel,
    Sampler,
    PhysicalMem,
    FabricVertex,
    FabricEdge,
    RtasBuilder,
    RtasParallelOperation,
}

impl ObjectFamily {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// An opaque 64-bit object handle. Zero is the null handle.
pub trait Handle:
    Copy + Eq + Hash + Default + fmt::Debug + Send + Sync + Param + 'static
{
    const FAMILY: ObjectFamily;
    const NULL: Self;

    fn from_raw(raw: u64) -> Self;
    fn as_raw(self) -> u64;

    fn is_null(self) -> bool {
        self.as_raw() == 0
    }
}

macro_rules! define_handles {
    ($( $(#[$doc:meta])* $name:ident => $family:ident; )*) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize, Deserialize)]
            #[repr(transparent)]
            pub struct $name(pub u64);

            impl Handle for $name {
                const FAMILY: ObjectFamily = ObjectFamily::$family;
                const NULL: Self = Self(0);

                fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                fn as_raw(self) -> u64 {
                    self.0
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({:#x})", stringify!($name), self.0)
                }
            }

            impl Param for $name {
                fn validate(&self) -> Result<(), ZeResult> {
                    if self.is_null() {
                        Err(ZeResult::ERROR_INVALID_NULL_HANDLE)
                    } else {
                        Ok(())
                    }
                }
            }
        )*
    };
}

define_handles! {
    /// A driver instance, as enumerated by `zeDriverGet`.
    DriverHandle => Driver;
    DeviceHandle => Device;
    ContextHandle => Context;
    CommandQueueHandle => CommandQueue;
    CommandListHandle => CommandList;
    FenceHandle => Fence;
    EventPoolHandle => EventPool;
    EventHandle => Event;
    /// Images are also tracked in the loader's auxiliary map so they can be
    /// translated when passed by value as kernel arguments.
    ImageHandle => Image;
    ModuleHandle => Module;
    ModuleBuildLogHandle => ModuleBuildLog;
    KernelHandle => Kernel;
    /// Same auxiliary tracking as [`ImageHandle`].
    SamplerHandle => Sampler;
    PhysicalMemHandle => PhysicalMem;
    FabricVertexHandle => FabricVertex;
    FabricEdgeHandle => FabricEdge;
    RtasBuilderHandle => RtasBuilder;
    RtasParallelOperationHandle => RtasParallelOperation;
}
