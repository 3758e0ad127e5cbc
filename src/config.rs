use std::path::{Path, PathBuf};

/// Default bind host, matching the `WEBSOCKET_SERVER_IP_ADDRESS` env var.
pub const DEFAULT_IP_ADDRESS: &str = "localhost";

/// Default bind port, matching the `WEBSOCKET_SERVER_PORT` env var.
pub const DEFAULT_PORT: u16 = 8765;

/// Default OBS Studio install directory (the stock Windows location).
pub const DEFAULT_OBS_WORKING_DIRECTORY: &str = r"C:\Program Files\obs-studio\bin\64bit";

/// Default OBS Studio executable file name.
pub const DEFAULT_OBS_EXECUTABLE_FILE: &str = "obs64.exe";

/// Runtime configuration, resolved from CLI flags and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the WebSocket server binds to (also echoed by CONNECT_SERVER).
    pub ip_address: String,
    /// Port the WebSocket server binds to.
    pub port: u16,
    /// Directory containing the OBS Studio executable.
    pub obs_directory: PathBuf,
    /// OBS Studio executable file name, joined onto `obs_directory`.
    pub obs_executable: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip_address: DEFAULT_IP_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            obs_directory: PathBuf::from(DEFAULT_OBS_WORKING_DIRECTORY),
            obs_executable: DEFAULT_OBS_EXECUTABLE_FILE.to_string(),
        }
    }
}

impl Config {
    /// Full path to the configured OBS Studio executable.
    pub fn executable_path(&self) -> PathBuf {
        self.obs_directory.join(&self.obs_executable)
    }

    /// Address string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }

    /// Config pointing at an explicit executable path. Used by tests and by
    /// deployments that pass `--obs-directory`/`--obs-executable` directly.
    pub fn with_executable(executable: &Path) -> Self {
        let obs_directory = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let obs_executable = executable
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            obs_directory,
            obs_executable,
            ..Self::default()
        }
    }
}
