//! Well-known keys persisted by the session layer.

pub const TOKEN: &str = "token";
pub const CURRENT_USER: &str = "currentUser";
pub const USER_TYPE: &str = "userType";
pub const EXPIRES_AT: &str = "expiresAt";
/// UI theme preference; persisted alongside session keys but not owned by
/// the session layer.
pub const DARK_MODE: &str = "darkMode";

/// Keys that survive a selective refresh. Everything else in the medium is
/// permanently lost by it, `expiresAt` included.
pub const RESTORE_WHITELIST: [&str; 4] = [TOKEN, CURRENT_USER, USER_TYPE, DARK_MODE];
