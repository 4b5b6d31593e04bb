//! The BACnet application-layer engine: segmentation, transaction state
//! machines, service dispatch, and change-of-value subscriptions, driven by
//! one cooperative event loop over a [`DataLink`](bacstack_datalink::DataLink).

pub mod client;
pub mod config;
pub mod device_info;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod segmentation;
pub mod store;
pub mod subscription;
pub mod transaction;

pub use client::{BacnetClient, DiscoveredDevice, PendingRequest};
pub use config::EngineConfig;
pub use device_info::{DeviceInfo, DeviceInfoCache};
pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, ProtocolError};
pub use store::{MemoryObjectStore, ObjectStore, PropertyError, ValueChangeListener};
pub use subscription::{SubscriptionInfo, SubscriptionKey, SubscriptionRegistry};
