//! User-facing copy for status and error messages

use crate::backend::BackendErrorKind;
use crate::config::Persona;

pub const THINKING: &str = "🧠 *Thinking...*";
pub const SERVICE_UNAVAILABLE: &str =
    "⚠️ **Service Unavailable:** We are experiencing high traffic.";
pub const TIMEOUT: &str =
    "⚠️ **Timeout:** The specialist is taking too long to respond. Please try again.";
pub const CONNECTION_ERROR: &str =
    "⚠️ **Connection Error:** Could not reach the intelligent services.";
pub const CONFIG_ERROR: &str =
    "⚠️ **System Error:** Configuration missing. Please contact support.";

pub fn handoff(category: &str) -> String {
    format!("🔄 *Connecting you to the {category} Specialist...*")
}

pub fn welcome(persona: &Persona) -> String {
    format!(
        "👋 **Hello! I'm {}**\n\nI'm your {}. I can check orders, help with returns, or answer product questions.",
        persona.bot_name, persona.bot_role
    )
}

/// The message that replaces the indicator when a turn fails. Status codes
/// and transport details stay in the logs.
pub fn for_failure(kind: BackendErrorKind) -> &'static str {
    match kind {
        BackendErrorKind::Status => SERVICE_UNAVAILABLE,
        BackendErrorKind::Timeout => TIMEOUT,
        BackendErrorKind::Connect | BackendErrorKind::Decode | BackendErrorKind::Unknown => {
            CONNECTION_ERROR
        }
    }
}
