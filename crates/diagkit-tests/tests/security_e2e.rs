//! Security-access handshake against the ECU simulator.

use std::sync::Arc;
use std::time::Duration;

use diagkit_crypto::SeedKeyAlgorithm;
use diagkit_tests::{EcuSimulator, VENDOR_KEY};
use diagkit_uds::{
    Broker, Component, NegativeResponseCode, SecurityKeyMaterial, ServiceRegistry, SessionConfig,
    SessionManager,
};

fn component() -> Component {
    Component::new("ecm", "Engine Control Module", 0x7E0, 0x7E8)
}

fn broker_over(simulator: Arc<EcuSimulator>) -> Arc<Broker> {
    Arc::new(
        Broker::builder(simulator, ServiceRegistry::standard())
            .response_budget(Duration::from_millis(1000))
            .start(),
    )
}

#[tokio::test]
async fn correct_key_material_unlocks_the_ecu() {
    let simulator = EcuSimulator::new(0x7E8, vec![0u8; 16]);
    let broker = broker_over(simulator.clone());

    let material = SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel(VENDOR_KEY));
    diagkit_uds::unlock(&broker, &component(), &material)
        .await
        .unwrap();
    assert!(simulator.is_unlocked());
}

#[tokio::test]
async fn wrong_key_material_is_rejected_with_invalid_key() {
    let simulator = EcuSimulator::new(0x7E8, vec![0u8; 16]);
    let broker = broker_over(simulator.clone());

    let material =
        SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel([0xFF; 8]));
    let err = diagkit_uds::unlock(&broker, &component(), &material)
        .await
        .unwrap_err();
    assert!(err.is_negative(NegativeResponseCode::InvalidKey));
    assert!(!simulator.is_unlocked());
}

#[tokio::test]
async fn session_manager_tracks_the_unlocked_level() {
    let simulator = EcuSimulator::new(0x7E8, vec![0u8; 16]);
    let broker = broker_over(simulator.clone());
    let manager = SessionManager::new(
        broker,
        component(),
        SessionConfig {
            keepalive_enabled: false,
            ..SessionConfig::default()
        },
    );

    let material = SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel(VENDOR_KEY));
    manager.unlock(&material).await.unwrap();
    assert_eq!(manager.unlocked_level(), Some(0x01));

    // A session transition re-locks security.
    manager.change_session(0x03).await.unwrap();
    assert_eq!(manager.unlocked_level(), None);
}
