use crate::model::{HOUR_MS, Ms};

/// Longest accepted student or instructor identifier (RFC 5321 address length).
pub const MAX_ID_LEN: usize = 320;

/// The only lesson lengths on sale.
pub const LESSON_DURATIONS_MS: [Ms; 2] = [HOUR_MS, 2 * HOUR_MS];

/// Capacity of the group-commit channel between stores and the WAL writer.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;

/// Largest WAL frame payload. Anything longer is treated as corruption.
pub const MAX_FRAME_LEN: usize = 1 << 20;
