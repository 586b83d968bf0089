//! Decides which provider failures are eligible for model substitution.

/// Shown to end users instead of the raw provider text when every model in a
/// chain reported no available channels.
pub const CHANNEL_UNAVAILABLE_MESSAGE: &str = "The image generation service is busy right now \
     (no available channels). Please try again in a moment.";

const CHANNEL_UNAVAILABLE_MARKER: &str = "no available channels";

/// True for 503 with any body, or any status whose body reports that no
/// channels are available. Other 5xx responses are not channel failures.
pub fn is_channel_unavailable(status: u16, body: &str) -> bool {
    status == 503
        || body
            .to_ascii_lowercase()
            .contains(CHANNEL_UNAVAILABLE_MARKER)
}
