//! Resource lifecycle handlers exposed as registry actions
//!
//! Every handler follows the same shape: resolve the connection, query the
//! control plane through the mutation guard, issue the mutation, then poll
//! until the resource converges. Mutation failures surface as
//! [`CloudError::RemoteRejection`] and query failures as
//! [`CloudError::QueryFailed`].

pub mod nat_gateway;
pub mod redis;
pub mod storage;

use crate::connection::ClientFactory;
use crate::error::TencentError;
use cloudplug_engine::{CloudError, FailurePolicy, ItemFailure, PollPolicy, RegistryBuilder};
use std::sync::Arc;
use std::time::Duration;

pub const NAT_GATEWAY: &str = "nat-gateway";
pub const REDIS: &str = "redis";
pub const STORAGE: &str = "storage";

pub const CREATE: &str = "create";
pub const TERMINATE: &str = "terminate";

/// Polling budget and batch discipline for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindOptions {
    pub poll: PollPolicy,
    pub failure_policy: FailurePolicy,
}

impl KindOptions {
    pub const fn new(poll: PollPolicy, failure_policy: FailurePolicy) -> Self {
        Self {
            poll,
            failure_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginOptions {
    pub nat_gateway: KindOptions,
    pub redis: KindOptions,
    pub storage: KindOptions,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            nat_gateway: KindOptions::new(
                PollPolicy::new(Duration::from_secs(10), 20),
                FailurePolicy::AbortOnFirstFailure,
            ),
            redis: KindOptions::new(
                PollPolicy::new(Duration::from_secs(10), 20),
                FailurePolicy::AbortOnFirstFailure,
            ),
            storage: KindOptions::new(
                PollPolicy::new(Duration::from_secs(5), 20),
                FailurePolicy::ContinueOnFailure,
            ),
        }
    }
}

/// Register the create/terminate actions of every resource kind
pub fn register_plugins(
    builder: RegistryBuilder,
    factory: Arc<dyn ClientFactory>,
    options: &PluginOptions,
) -> RegistryBuilder {
    builder
        .register(
            NAT_GATEWAY,
            CREATE,
            nat_gateway::CreateAction::new(factory.clone(), options.nat_gateway),
        )
        .register(
            NAT_GATEWAY,
            TERMINATE,
            nat_gateway::TerminateAction::new(factory.clone(), options.nat_gateway),
        )
        .register(
            REDIS,
            CREATE,
            redis::CreateAction::new(factory.clone(), options.redis),
        )
        .register(
            REDIS,
            TERMINATE,
            redis::TerminateAction::new(factory.clone(), options.redis),
        )
        .register(
            STORAGE,
            CREATE,
            storage::CreateAction::new(factory.clone(), options.storage),
        )
        .register(
            STORAGE,
            TERMINATE,
            storage::TerminateAction::new(factory, options.storage),
        )
}

fn rejected(err: TencentError) -> CloudError {
    CloudError::rejected(err)
}

fn query_failed(err: TencentError) -> CloudError {
    CloudError::query_failed(err)
}

/// Pair a handler outcome with the output built so far
fn finish<O>(output: O, result: cloudplug_engine::Result<()>) -> Result<O, ItemFailure<O>> {
    match result {
        Ok(()) => Ok(output),
        Err(err) => Err(ItemFailure::new(output, err)),
    }
}
