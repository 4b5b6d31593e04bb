//! Two engines on an in-memory network: one serves an analog input, the
//! other discovers it, reads it, subscribes to changes and watches them.
//!
//! Usage:
//!   RUST_LOG=debug cargo run -p bacstack-engine --example local_loopback

use bacstack_core::types::{AnyValue, DataValue, ObjectId, ObjectType, PropertyId};
use bacstack_datalink::{Address, MemoryNetwork};
use bacstack_engine::{Engine, EngineConfig, EngineEvent, MemoryObjectStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let network = MemoryNetwork::new();

    let store = Arc::new(MemoryObjectStore::new());
    let (server_engine, server) = Engine::new(
        network.attach([1])?,
        Arc::clone(&store),
        EngineConfig::new(1001).with_vendor_id(999),
    );
    tokio::spawn(server_engine.run());
    store.add_listener(Arc::new(server.clone()));

    let sensor = ObjectId::new(ObjectType::AnalogInput, 1);
    store.add_object(sensor, "supply air temp").await;
    store
        .set_property(sensor, PropertyId::PresentValue, AnyValue::single(DataValue::Real(18.0)))
        .await?;

    let (client_engine, client) = Engine::new(
        network.attach([2])?,
        Arc::new(MemoryObjectStore::new()),
        EngineConfig::new(2002),
    );
    tokio::spawn(client_engine.run());

    let devices = client
        .discover(Address::local_broadcast(), None, Duration::from_millis(200))
        .await?;
    for device in &devices {
        println!("Device {:?} at {}", device.device_id, device.address);
    }
    let Some(target) = devices.first().map(|d| d.address.clone()) else {
        println!("No devices found.");
        return Ok(());
    };

    let value = client
        .read_property(target.clone(), sensor, PropertyId::PresentValue)
        .await?;
    println!("Present value: {value:?}");

    let mut events = client.events();
    client
        .subscribe_cov(target, 1, sensor, true, Some(Duration::from_secs(300)))
        .await?;

    for reading in [18.5, 19.25, 20.0] {
        store
            .set_property(
                sensor,
                PropertyId::PresentValue,
                AnyValue::single(DataValue::Real(reading)),
            )
            .await?;
        if let EngineEvent::CovNotification { notification, .. } = events.recv().await? {
            println!(
                "COV: {:?} -> {:?} ({} s left)",
                notification.monitored_object_id,
                notification.value_of(PropertyId::PresentValue),
                notification.time_remaining_seconds
            );
        }
    }

    client.shutdown();
    server.shutdown();
    Ok(())
}
