//! Defaults and fixed values used throughout the wellness-call core.

use std::time::Duration;

/// Every Nth completed call is a comprehensive call.
pub const DEFAULT_COMPREHENSIVE_EVERY: u32 = 13;

/// Maximum re-attempts for a missed outbound call within one window.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before re-attempting a missed outbound call.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

/// Number of most recent calls inspected by the consecutive-miss scan.
pub const DEFAULT_MISS_LOOKBACK_CALLS: usize = 5;

/// Trailing days inspected by the consecutive-miss scan.
pub const DEFAULT_MISS_LOOKBACK_DAYS: i64 = 21;

/// Consecutive misses at which an unreachability escalation is raised.
pub const DEFAULT_MISS_THRESHOLD: usize = 3;

/// Time allowed for speech synthesis to finish before the call is ended.
pub const DEFAULT_END_CALL_GRACE: Duration = Duration::from_secs(5);

/// Lifetime of a real-time transport session token.
pub const DEFAULT_SESSION_TOKEN_TTL: Duration = Duration::from_secs(120);

/// Delays between transcript index polls.
pub const DEFAULT_TRANSCRIPT_POLL_DELAYS: [Duration; 4] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(20),
    Duration::from_secs(30),
];

/// Default daily call window, local to the configured time zone.
pub const DEFAULT_WINDOW_START: &str = "09:00";
pub const DEFAULT_WINDOW_END: &str = "17:00";
pub const DEFAULT_WINDOW_TZ: &str = "Europe/London";

/// PHQ-2 score at or above which the screen is positive.
pub const PHQ2_POSITIVE: u8 = 3;

/// Spoken when the language model fails mid-conversation.
pub const APOLOGY_UTTERANCE: &str =
    "I'm sorry, I didn't quite catch that. Could you say that again for me?";

/// Spoken when the call is being wrapped up and the model gave no closing words.
pub const DEFAULT_GOODBYE: &str = "Thank you for talking with me today. Take care, goodbye.";

/// Token budgets for the two model roles.
pub const OPENING_MAX_TOKENS: u32 = 150;
pub const TURN_MAX_TOKENS: u32 = 400;
pub const SCORING_MAX_TOKENS: u32 = 1_024;
