//! User-visible notice texts. Short and specific; no internal error detail
//! ever reaches the end user.

pub const NO_ACTIVE_SUBSCRIPTION: &str = "Error: No active subscription found.";

pub const QUOTA_EXCEEDED: &str =
    "Sorry, I can't answer right now. The token limit for this billing period has been exceeded.";

pub const TECHNICAL_DIFFICULTIES: &str =
    "Sorry, we're experiencing technical difficulties. Please try again later.";
