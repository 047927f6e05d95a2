//! UDS security access: the seed/key challenge-response exchange.

use diagkit_crypto::{derive_key, SeedKeyAlgorithm};
use tracing::{debug, info};

use crate::broker::Broker;
use crate::component::Component;
use crate::uds::{Request, Response, UdsError};

/// Pre-shared secret for one component's security level.
///
/// `level` is the odd seed-request sub-function; the key submission uses
/// `level + 1` per the UDS convention.
#[derive(Debug, Clone)]
pub struct SecurityKeyMaterial {
    pub level: u8,
    pub algorithm: SeedKeyAlgorithm,
}

impl SecurityKeyMaterial {
    pub fn new(level: u8, algorithm: SeedKeyAlgorithm) -> Self {
        Self { level, algorithm }
    }
}

/// Run the two-step security-access handshake over the broker.
///
/// Requests the seed, derives the key with the configured algorithm,
/// submits it. An all-zero seed means the level is already unlocked and
/// the key step is skipped. Negative responses at either step
/// (InvalidKey, RequiredTimeDelayNotExpired, ...) surface as terminal
/// errors; whether to retry after a delay is the caller's decision.
pub async fn unlock(
    broker: &Broker,
    component: &Component,
    material: &SecurityKeyMaterial,
) -> Result<(), UdsError> {
    let tx = broker
        .request(
            component,
            Request::SecuritySeed {
                level: material.level,
            },
        )
        .await?;

    let seed = match tx.wait().await? {
        Some(Response::SecuritySeed { level, seed }) if level == material.level => seed,
        other => {
            return Err(UdsError::UnexpectedResponse(format!(
                "seed request answered with {other:?}"
            )))
        }
    };

    if seed.iter().all(|&b| b == 0) {
        debug!(component = %component.id, level = material.level, "zero seed, already unlocked");
        return Ok(());
    }

    let key = derive_key(&material.algorithm, &seed)
        .map_err(|e| UdsError::SecurityAccess(e.to_string()))?;

    let tx = broker
        .request(
            component,
            Request::SecurityKey {
                level: material.level + 1,
                key,
            },
        )
        .await?;

    match tx.wait().await? {
        Some(Response::SecurityKey { .. }) => {
            info!(component = %component.id, level = material.level, "security access granted");
            Ok(())
        }
        other => Err(UdsError::UnexpectedResponse(format!(
            "key submission answered with {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportFrame};
    use crate::uds::{NegativeResponseCode, ServiceRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    const FEISTEL_KEY: [u8; 8] = [0xC1, 0xE5, 0x6F, 0xEE, 0xE6, 0x92, 0x70, 0x83];

    fn component() -> Component {
        Component::new("ecm", "Engine Control Module", 0x7E0, 0x7E8)
    }

    fn broker_over(transport: Arc<MockTransport>) -> Broker {
        Broker::builder(transport, ServiceRegistry::standard())
            .response_budget(Duration::from_millis(200))
            .start()
    }

    #[tokio::test]
    async fn handshake_submits_the_encrypted_seed() {
        let transport = Arc::new(MockTransport::new());
        // Seed of all zeros encrypts to the fixture value 0x98A49DE7.
        transport.enqueue_reply(vec![TransportFrame::new(
            0x7E8,
            vec![0x67, 0x01, 0x00, 0x00, 0x00, 0x01],
        )]);
        transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x67, 0x02])]);
        let broker = broker_over(transport.clone());

        let material = SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel(FEISTEL_KEY));
        unlock(&broker, &component(), &material).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].data, vec![0x27, 0x01]);
        assert_eq!(sent[1].data[..2], [0x27, 0x02]);
        // The key is the Feistel encryption of the seed.
        assert_eq!(sent[1].data.len(), 2 + 4);
    }

    #[tokio::test]
    async fn zero_seed_skips_the_key_step() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_reply(vec![TransportFrame::new(
            0x7E8,
            vec![0x67, 0x01, 0x00, 0x00, 0x00, 0x00],
        )]);
        let broker = broker_over(transport.clone());

        let material = SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel(FEISTEL_KEY));
        unlock(&broker, &component(), &material).await.unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn invalid_key_is_a_terminal_error() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue_reply(vec![TransportFrame::new(
            0x7E8,
            vec![0x67, 0x01, 0xAA, 0xBB, 0xCC, 0xDD],
        )]);
        transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x7F, 0x27, 0x35])]);
        let broker = broker_over(transport);

        let material = SecurityKeyMaterial::new(0x01, SeedKeyAlgorithm::Feistel(FEISTEL_KEY));
        let err = unlock(&broker, &component(), &material).await.unwrap_err();
        assert!(err.is_negative(NegativeResponseCode::InvalidKey));
    }
}
