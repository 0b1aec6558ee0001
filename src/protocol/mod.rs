//! Tuner/trainer command protocol.
//!
//! Commands are JSON objects carrying a `channel` (`to-algo` or
//! `from-algo`), a `commandType` and camelCase payload fields. Decoding looks
//! up an explicit `(channel, commandType)` registry populated at
//! construction. Transport is out of scope.
//!
//! # Example
//!
//! ```
//! use podar::protocol::{Command, CommandRegistry};
//!
//! let registry = CommandRegistry::standard();
//! let command = registry.decode(r#"{"channel":"to-algo","commandType":"terminate"}"#).unwrap();
//! assert_eq!(command, Command::Terminate);
//! ```

mod command;
mod registry;

pub use command::{camel_case, Command, MetricType, FROM_ALGO, TO_ALGO};
pub use registry::{CommandRegistry, Decoder, Fields};
