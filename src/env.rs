//! Environment constants and path utilities for the membership client.
//!
//! This module centralizes the fixed names used throughout the crate (store keys,
//! configuration file names, environment variables and default header names),
//! making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const MEMBERKIT_DIR_NAME: &str = ".memberkit";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "memberkit.toml";

/// Durable session file name
pub const SESSION_FILE_NAME: &str = "session.json";

/// Keys under which the session is persisted in the credential store
pub mod store {
    /// Serialized identity (without its credential)
    pub const IDENTITY_KEY: &str = "memberkit.identity";

    /// Raw credential string
    pub const CREDENTIAL_KEY: &str = "memberkit.credential";

    /// Version of the serialized identity envelope
    pub const IDENTITY_FORMAT_VERSION: u32 = 1;
}

/// Environment variables read by the configuration layer
pub mod vars {
    /// Explicit configuration file path
    pub const CONFIG_PATH: &str = "MEMBERKIT_CONFIG";

    /// Overrides `api.base_url`
    pub const BASE_URL: &str = "MEMBERKIT_BASE_URL";

    /// Password used by the CLI when `--password` is omitted
    pub const PASSWORD: &str = "MEMBERKIT_PASSWORD";
}

/// Default wire names used by the backend
pub mod wire {
    pub const CREDENTIAL_HEADER: &str = "hash";
    pub const IDENTITY_HEADER: &str = "id-usuario";
    pub const ERROR_FIELD: &str = "erro";
    pub const OK_FIELD: &str = "ok";
    pub const IDENTITY_FIELD: &str = "usuario";
    pub const CREDENTIAL_FIELD: &str = "hash";
    pub const LOGIN_ENDPOINT: &str = "login.php";
    pub const LOGIN_DOCUMENT_PARAM: &str = "cpf";
    pub const LOGIN_PASSWORD_PARAM: &str = "senha";
}

/// Build the main .memberkit directory path from a base directory
pub fn memberkit_dir_path(base: &Path) -> PathBuf {
    base.join(MEMBERKIT_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    memberkit_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    memberkit_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the default durable session file path in user's home directory
pub fn user_session_file_path(home_dir: &Path) -> PathBuf {
    memberkit_dir_path(home_dir).join(SESSION_FILE_NAME)
}

/// Get home directory path
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}
