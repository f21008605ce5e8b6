use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

/// Common surface of every error and diagnostic the compiler produces.
///
/// `node` is the host-side key of the offending block, when there is one.
pub trait BlockforgeErrorExt {
    fn level(&self) -> Level;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    fn node(&self) -> Option<String>;
}

impl fmt::Debug for dyn BlockforgeErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node_str = self.node().unwrap_or_else(|| "node:none".to_string());

        write!(
            f,
            "BLOCKFORGE | {} | {} | {} | {}",
            self.level(),
            node_str,
            self.issuer(),
            self.message()
        )
    }
}

impl fmt::Display for dyn BlockforgeErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
