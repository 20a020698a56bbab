//! Structural contract with the web client's markup.
//!
//! Every selector and class marker the driver relies on lives here, keyed to
//! a single markup revision. A markup change on the client side means editing
//! this table.

pub const MARKUP_REVISION: &str = "2017-08";

pub const APP_WRAPPER: &str = ".app-wrapper";
pub const MAIN_APP: &str = ".app-wrapper-main";
pub const LOGIN_LOGO: &str = "span[data-icon=\"logo\"]";
pub const LOGIN_CODE_IMAGE: &str = ".app-wrapper img";
pub const LOGIN_CODE_PREFIX: &str = "data:image/png;base64,";
pub const SCRIPT: &str = "script";

pub const CHAT: &str = ".chat";
pub const UNREAD_CHAT: &str = ".chat.unread";
pub const CHAT_TITLE: &str = ".chat-title";
pub const CHAT_LIST_TOP: &str = ".chatlist-panel-body div:first-child";
pub const JUMP_TO_LATEST: &str = ".incoming-msgs";

pub const MESSAGE: &str = ".pane-chat-msgs .message";
pub const CLASS_ATTRIBUTE: &str = "class";
pub const SOURCE_ATTRIBUTE: &str = "src";
pub const OUTBOUND_MARKER: &str = "message-out";
pub const TEXT_MARKER: &str = "message-text";
pub const IMAGE_MARKER: &str = "message-image";
pub const ANIMATED_IMAGE_MARKER: &str = "message-gif";
pub const SYSTEM_MARKER: &str = "message-system";

pub const BUBBLE: &str = ".bubble";
pub const METADATA_ATTRIBUTE: &str = "data-pre-plain-text";
pub const TEXT_BODY: &str = ".bubble .selectable-text";
pub const GLYPH_TAG: &str = "img";
pub const GLYPH_CLASS: &str = "emoji";
pub const GLYPH_FALLBACK_ATTRIBUTE: &str = "alt";
pub const THUMBNAIL: &str = ".bubble img";
pub const DISPLAY_TIME: &str = ".bubble .message-datetime";

pub const SEARCH_INPUT: &str = "#input-chatlist-search";
pub const COMPOSE_INPUT: &str = ".pluggable-input";
pub const SEND_BUTTON: &str = "button.compose-btn-send";

pub const PROFILE_AVATAR: &str = ".pane-list-user .avatar";
pub const PROFILE_NAME: &str = ".drawer .pluggable-input-body";
pub const PROFILE_PHOTO: &str = ".drawer img";
pub const VIEW_PHOTO: &str = "li div[title=\"Ver foto\"]";
pub const PHONE_NUMBER: &str = "span.emojitext";
pub const CLOSE_VIEWER: &str = "span[data-icon=\"x-viewer\"]";
pub const CLOSE_DRAWER: &str = ".drawer-header .btn-close-drawer";

pub const STANDALONE_IMAGE: &str = "img";
