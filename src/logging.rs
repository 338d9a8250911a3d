use log::{info, warn};

/// Logs a rotation-relevant event with standardized formatting
///
/// # Parameters
/// * `event_type` - Type of rotation event (e.g., "KEY_GENERATED", "ROOT_UPLOAD")
/// * `details` - Additional details about the event
/// * `success` - Whether the operation was successful
pub fn log_rotation_event(event_type: &str, details: &str, success: bool) {
    let status = if success { "SUCCESS" } else { "FAILURE" };

    if success {
        info!("{} - {}: {}", status, event_type, details);
    } else {
        warn!("{} - {}: {}", status, event_type, details);
    }
}
