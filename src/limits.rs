//! Hard bounds on client-supplied input.

pub const MAX_TEAM_NAME_LEN: usize = 64;
pub const MAX_COURT_NAME_LEN: usize = 128;
pub const MIN_PHONE_LEN: usize = 6;
pub const MAX_PHONE_LEN: usize = 20;
/// Price entries accepted in one update.
pub const MAX_PRICE_ENTRIES: usize = 64;
/// Bookings kept per slot key, history included.
pub const MAX_BOOKINGS_PER_SLOT: usize = 512;
/// Bookings returned by a single list call.
pub const MAX_LIST_RESULTS: usize = 1000;
