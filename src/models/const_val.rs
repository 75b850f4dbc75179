/// Profile applied when an invite names one that no longer exists.
pub const DEFAULT_PROFILE: &str = "Default";
/// Identity of the caller, set by the fronting proxy.
pub const LOBBY_USER_ID_HEADER: &str = "x-lobby-user-id";
pub const LOBBY_REQUEST_ID_HEADER: &str = "x-lobby-request-id";
/// Jellyfin reports both as success.
pub const MEDIA_OK_STATUSES: [u16; 2] = [200, 204];
/// `templates` row holding the settings stamped onto new Ombi users.
pub const OMBI_TEMPLATE_KIND: &str = "ombi";
