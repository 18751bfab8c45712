//! Pure decision functions extracted from the coordinator.
//!
//! These take plain parameters (no capture sessions, no shared state) and can be
//! unit-tested in isolation.

use crate::capture::InterfaceInfo;
use crate::error::AppError;

use super::Command;

/// First interface, in enumeration order, with at least one bound address.
pub fn pick_default_interface(interfaces: &[InterfaceInfo]) -> Option<String> {
    interfaces
        .iter()
        .find(|i| i.has_address)
        .map(|i| i.name.clone())
}

/// Interface to monitor at startup: explicit override, then the persisted
/// selection, then the default pick.
pub fn resolve_startup_interface(
    preferred: Option<&str>,
    persisted: &str,
    interfaces: &[InterfaceInfo],
) -> Option<String> {
    preferred
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| {
            let persisted = persisted.trim();
            (!persisted.is_empty()).then(|| persisted.to_string())
        })
        .or_else(|| pick_default_interface(interfaces))
}

/// Reject empty interface names before touching the capture layer.
pub fn validate_interface_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Interface name must not be empty".into()));
    }
    Ok(name)
}

/// Parse one control-console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, AppError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(AppError::InvalidInput(format!(
            "Too many arguments for \"{verb}\""
        )));
    }

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("select", Some(name)) => Command::SelectInterface(name.to_string()),
        ("select", None) => {
            return Err(AppError::InvalidInput("Usage: select <interface>".into()))
        }
        ("usage" | "status", None) => Command::Usage,
        ("interfaces" | "list", None) => Command::ListInterfaces,
        ("threshold", Some(bytes)) => Command::SetThreshold(bytes.parse().map_err(|_| {
            AppError::InvalidInput(format!("Invalid threshold \"{bytes}\": expected a byte count"))
        })?),
        ("threshold", None) => {
            return Err(AppError::InvalidInput("Usage: threshold <bytes>".into()))
        }
        ("quit" | "exit", None) => Command::Shutdown,
        ("usage" | "status" | "interfaces" | "list" | "quit" | "exit", Some(_)) => {
            return Err(AppError::InvalidInput(format!(
                "\"{verb}\" takes no arguments"
            )))
        }
        (other, _) => {
            return Err(AppError::InvalidInput(format!(
                "Unknown command \"{other}\" (expected select, usage, interfaces, threshold, quit)"
            )))
        }
    };
    Ok(Some(command))
}
