//! Storage key constants.

/// Storage keys used by the session core.
///
/// The strings are part of the on-device contract and must not change:
/// existing installs hold credentials under these exact names.
pub struct StoreKeys;

impl StoreKeys {
    /// Access token for authenticated API calls
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Refresh token used to obtain a new access token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Account email, held only between registration and confirmation
    pub const EMAIL: &'static str = "email";

    /// Account password, held only between registration and confirmation
    pub const PASSWORD: &'static str = "password";

    /// Every key the store manages
    pub const ALL: [&'static str; 4] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::EMAIL,
        Self::PASSWORD,
    ];
}
