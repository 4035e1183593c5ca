// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use basalt_shared::crypto;
use basalt_shared::error::ErrorNumber;

use crate::context::ExecutionContext;
use crate::error::{ClassifyResult, Result};

use super::types::{HashArguments, RecoverPublicKeyArguments, VerifySignatureArguments};

pub fn hash(_ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: HashArguments = bcs::from_bytes(args)?;
    let digest = crypto::hash(&args.data).to_vec();
    Ok(bcs::to_bytes(&digest).expect("return serializes"))
}

pub fn recover_public_key(_ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: RecoverPublicKeyArguments = bcs::from_bytes(args)?;
    let key = crypto::recover_public_key(&args.signature, &args.digest)
        .or_error(ErrorNumber::MalformedObject)?;
    Ok(bcs::to_bytes(&key.to_vec()).expect("return serializes"))
}

pub fn verify_signature(_ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: VerifySignatureArguments = bcs::from_bytes(args)?;
    let ok = crypto::verify_signature(&args.public_key, &args.signature, &args.digest)
        .unwrap_or(false);
    Ok(bcs::to_bytes(&ok).expect("return serializes"))
}
