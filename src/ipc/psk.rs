//! `generatePsk` reply decoding.

use log::{error, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::app::clicker::DeviceId;
use crate::events::PreSharedKey;

/// Method called on the credential service.
pub const GENERATE_PSK: &str = "generatePsk";

/// Reply document of `generatePsk`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GeneratePskReply {
    #[serde(rename = "pskIdentity")]
    pub identity: Option<String>,
    #[serde(rename = "pskSecret")]
    pub secret: Option<String>,
    pub error: Option<String>,
}

/// Turn a reply into the credential for `clicker`.
///
/// Any failure (undecodable document, reported error, missing identity or
/// secret) yields [`PreSharedKey::failed`], so the workflow always hears
/// back about the attempt.
pub fn credential_from_reply(clicker: DeviceId, reply: &Value) -> PreSharedKey {
    let reply = match GeneratePskReply::deserialize(reply) {
        Ok(r) => r,
        Err(e) => {
            error!("IPC: malformed generatePsk reply for clicker {}: {}", clicker, e);
            return PreSharedKey::failed(clicker);
        }
    };

    if let Some(err) = reply.error {
        error!("IPC: credential service failed for clicker {}: {}", clicker, err);
        return PreSharedKey::failed(clicker);
    }

    match (reply.identity, reply.secret) {
        (Some(identity), Some(secret)) => PreSharedKey::new(clicker, &identity, &secret),
        (identity, _) => {
            let missing = if identity.is_none() {
                "pskIdentity"
            } else {
                "pskSecret"
            };
            warn!("IPC: generatePsk reply for clicker {} lacks {}", clicker, missing);
            PreSharedKey::failed(clicker)
        }
    }
}
