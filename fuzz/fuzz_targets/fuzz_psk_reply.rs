//! Fuzz target: `credential_from_reply`
//!
//! Feeds arbitrary JSON documents as `generatePsk` replies.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - The credential always targets the requested clicker
//! - A credential is non-empty only when both identity and secret are
//!
//! cargo fuzz run fuzz_psk_reply

#![no_main]

use libfuzzer_sys::fuzz_target;
use provisiond::ipc::psk::credential_from_reply;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(reply) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let psk = credential_from_reply(42, &reply);
    assert_eq!(psk.clicker_id, 42);
    if !psk.is_empty() {
        assert!(reply.get("pskIdentity").is_some_and(Value::is_string));
        assert!(reply.get("pskSecret").is_some_and(Value::is_string));
        assert!(reply.get("error").is_none_or(Value::is_null));
    }
});
