//! RPC methods of the `provisioning-daemon` object.
//!
//! | Method           | Args                              | Effect                          |
//! |------------------|-----------------------------------|---------------------------------|
//! | `getState`       | none                              | history + connected clickers    |
//! | `select`         | `clickerID`                       | `ClickerSelected` event         |
//! | `startProvision` | `clickerID` (optional)            | `StartProvision` event          |
//! | `setClickerName` | `clickerID`, `clickerName`        | renames the registry record     |
//!
//! Handlers run on the IPC loop thread and only touch shared state through
//! the agent's ports.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::clicker::DeviceId;
use crate::app::ports::RegistryExt;
use crate::error::Error;
use crate::events::Event;

use super::agent::AgentDeps;
use super::bus::{MethodStatus, ObjectSpec};

pub const GET_STATE: &str = "getState";
pub const SELECT: &str = "select";
pub const START_PROVISION: &str = "startProvision";
pub const SET_CLICKER_NAME: &str = "setClickerName";

/// Every method the daemon object exposes.
pub const METHODS: [&str; 4] = [GET_STATE, SELECT, START_PROVISION, SET_CLICKER_NAME];

/// Object description for registration.
pub fn object_spec(name: &str) -> ObjectSpec {
    ObjectSpec {
        name: name.to_owned(),
        methods: METHODS.to_vec(),
    }
}

// ───────────────────────────────────────────────────────────────
// Schema
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ClickerArgs {
    #[serde(rename = "clickerID")]
    clicker_id: Option<DeviceId>,
}

#[derive(Debug, Default, Deserialize)]
struct RenameArgs {
    #[serde(rename = "clickerID")]
    clicker_id: Option<DeviceId>,
    #[serde(rename = "clickerName")]
    clicker_name: Option<String>,
}

/// One row of the `getState` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickerState {
    pub id: DeviceId,
    pub name: String,
    pub selected: bool,
    pub in_provision_state: bool,
    pub is_provisioned: bool,
    pub is_error: bool,
}

/// The `getState` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReply {
    pub clickers: Vec<ClickerState>,
}

// ───────────────────────────────────────────────────────────────
// Dispatch
// ───────────────────────────────────────────────────────────────

/// Route a call to its handler.
pub fn dispatch(deps: &AgentDeps, method: &str, args: &Value) -> Result<Option<Value>, MethodStatus> {
    debug!("IPC: call {}", method);
    match method {
        GET_STATE => get_state(deps),
        SELECT => select(deps, decode(args)?),
        START_PROVISION => start_provision(deps, decode(args)?),
        SET_CLICKER_NAME => set_clicker_name(deps, decode(args)?),
        _ => {
            warn!("IPC: unknown method '{}'", method);
            Err(MethodStatus::MethodNotFound)
        }
    }
}

/// Decode call arguments. An absent body reads as all-defaults.
fn decode<T: DeserializeOwned + Default>(args: &Value) -> Result<T, MethodStatus> {
    if args.is_null() {
        return Ok(T::default());
    }
    T::deserialize(args).map_err(|e| {
        warn!("IPC: bad arguments: {}", e);
        MethodStatus::InvalidArgument
    })
}

fn no_data(e: Error) -> MethodStatus {
    warn!("IPC: {}", e);
    MethodStatus::NoData
}

fn get_state(deps: &AgentDeps) -> Result<Option<Value>, MethodStatus> {
    let mut reply = StateReply::default();
    let mut seen = HashSet::new();

    for item in deps.history.provisioned() {
        if seen.insert(item.id) {
            reply.clickers.push(ClickerState {
                id: item.id,
                name: item.name.as_str().to_owned(),
                selected: false,
                in_provision_state: false,
                is_provisioned: true,
                is_error: item.is_error,
            });
        }
    }

    let selected = deps.selection.selected_id();
    for id in deps.selection.connected_ids() {
        if seen.contains(&id) {
            continue;
        }
        let row = deps.registry.with_clicker(id, |c| ClickerState {
            id,
            name: c.name.as_str().to_owned(),
            selected: Some(id) == selected,
            in_provision_state: c.provisioning_in_progress,
            is_provisioned: false,
            is_error: c.error,
        });
        match row {
            Some(row) => {
                seen.insert(id);
                reply.clickers.push(row);
            }
            None => debug!("IPC: clicker {} vanished from registry", id),
        }
    }

    serde_json::to_value(&reply)
        .map(Some)
        .map_err(|_| MethodStatus::InvalidArgument)
}

fn select(deps: &AgentDeps, args: ClickerArgs) -> Result<Option<Value>, MethodStatus> {
    let id = args
        .clicker_id
        .ok_or(Error::MissingField("clickerID"))
        .map_err(no_data)?;
    deps.events.push(Event::ClickerSelected(id));
    Ok(None)
}

fn start_provision(deps: &AgentDeps, args: ClickerArgs) -> Result<Option<Value>, MethodStatus> {
    let target = args.clicker_id.or_else(|| deps.selection.selected_id());
    info!("IPC: remote start provisioning for {:?}", target);
    deps.events.push(Event::StartProvision(target));
    Ok(None)
}

fn set_clicker_name(deps: &AgentDeps, args: RenameArgs) -> Result<Option<Value>, MethodStatus> {
    let id = args
        .clicker_id
        .ok_or(Error::MissingField("clickerID"))
        .map_err(no_data)?;
    let name = args
        .clicker_name
        .ok_or(Error::MissingField("clickerName"))
        .map_err(no_data)?;

    deps.registry
        .with_clicker(id, |c| c.rename(&name))
        .ok_or(Error::Lookup(id))
        .map_err(no_data)?;
    info!("IPC: clicker {} renamed", id);
    Ok(None)
}
