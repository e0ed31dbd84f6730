//! Tencent Cloud provider for cloudplug
//!
//! Signed API 3.0 clients for the VPC, Redis, CVM and CBS services, and the
//! `nat-gateway`, `redis` and `storage` plugins built on them.

pub mod api;
pub mod cbs;
pub mod connection;
pub mod error;
pub mod plugins;
pub mod redis;
pub mod sign;
pub mod vpc;

// Re-exports
pub use api::{ApiClient, Credential, MutationAck, Service, TaskAck};
pub use cbs::{CbsClient, CreateDisks, Disk, DiskApi};
pub use connection::{ClientFactory, Connection, Endpoints, TencentClientFactory};
pub use error::TencentError;
pub use plugins::{KindOptions, PluginOptions, register_plugins};
pub use redis::{
    CreateRedisInstances, DealAck, DealDetail, RedisApi, RedisClient, RedisInstance,
    RedisTaskAck, RedisTaskStatus,
};
pub use vpc::{CreateNatGateway, NatGateway, NatGatewayApi, VpcClient, VpcTaskStatus};
