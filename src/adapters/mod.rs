//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter       | Implements          | Connects to                   |
//! |---------------|---------------------|-------------------------------|
//! | `config_file` | ConfigPort          | JSON file on disk             |
//! | `connection`  | ConnectionPort      | simulated clicker links       |
//! | `history`     | HistoryPort         | memory / postcard file        |
//! | `local_bus`   | BusConnector/BusPort| in-process bus hub            |
//! | `registry`    | DeviceRegistry      | in-memory record map          |
//! | `time`        | Clock               | `Instant` / manual time       |

pub mod config_file;
pub mod connection;
pub mod history;
pub mod local_bus;
pub mod registry;
pub mod time;
