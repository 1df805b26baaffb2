//! IPC/RPC subsystem.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       IPC Stack                          │
//! │                                                          │
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ BusPort  │──▶│ AgentHandler │──▶│ methods / psk    │  │
//! │  │ (trait)  │   │ (loop thread)│   │ → EventSink      │  │
//! │  └──────────┘   └──────────────┘   └──────────────────┘  │
//! │       ▲                                                  │
//! │       │  interrupt ⇄ confirm (LoopControl)               │
//! │  ┌──────────┐                                            │
//! │  │ IpcAgent │  enable_remote_control / credential request│
//! │  └──────────┘                                            │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod bus;
pub mod control;
pub mod methods;
pub mod psk;
pub mod requests;

pub use agent::{AgentDeps, IpcAgent};
