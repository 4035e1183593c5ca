// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use basalt_shared::keys;
use basalt_shared::resource::ResourceLimitData;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::syscall_error;

use super::types::{ConsumeBlockResourcesArguments, GetResourceLimitsReturn};

pub(crate) fn limit_data(ctx: &ExecutionContext) -> Result<ResourceLimitData> {
    match ctx.read_metadata(&keys::RESOURCE_LIMIT_DATA)? {
        Some(bytes) => Ok(bcs::from_bytes(&bytes)?),
        None => Ok(ResourceLimitData::default()),
    }
}

pub fn get_resource_limits(ctx: &mut ExecutionContext, _args: &[u8]) -> Result<Vec<u8>> {
    let limits = limit_data(ctx)?;
    Ok(bcs::to_bytes(&GetResourceLimitsReturn { limits }).expect("return serializes"))
}

/// Validate a block's total consumption against the stored limits. The
/// block producer charges itself through this call so that governance can
/// override the policy.
pub fn consume_block_resources(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ConsumeBlockResourcesArguments = bcs::from_bytes(args)?;
    let limits = limit_data(ctx)?;
    if args.disk_storage > limits.disk_storage_limit
        || args.network_bandwidth > limits.network_bandwidth_limit
        || args.compute_bandwidth > limits.compute_bandwidth_limit
    {
        return Err(syscall_error!(BlockResourceExceeded;
            "block resources exceed limits: disk {}/{}, network {}/{}, compute {}/{}",
            args.disk_storage, limits.disk_storage_limit,
            args.network_bandwidth, limits.network_bandwidth_limit,
            args.compute_bandwidth, limits.compute_bandwidth_limit));
    }
    Ok(bcs::to_bytes(&true).expect("return serializes"))
}
