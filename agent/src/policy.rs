//! Built-in allocation policies selectable from the config file.

use pedlar::{AllocationPolicy, HoldPolicy, PolicyContext, TargetHoldings};

use crate::error::{Error, Result};

/// Volume used by `constant` when `params.volume` is unset.
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Hold `params.volume` units of every instrument, every step.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantVolume;

impl AllocationPolicy for ConstantVolume {
    fn target(&self, ctx: &PolicyContext<'_>) -> TargetHoldings {
        let volume = ctx.param("volume", DEFAULT_VOLUME).round() as i64;
        TargetHoldings::uniform(ctx.universe, volume)
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Look up a built-in policy by name.
pub fn by_name(name: &str) -> Result<Box<dyn AllocationPolicy>> {
    match name {
        "hold" => Ok(Box::new(HoldPolicy)),
        "constant" => Ok(Box::new(ConstantVolume)),
        other => Err(Error::UnknownPolicy(other.to_string())),
    }
}
