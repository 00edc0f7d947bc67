pub const INTERVIEW_API_URL: &str = "INTERVIEW_API_URL";
pub const INTERVIEW_TOKEN: &str = "INTERVIEW_TOKEN";

pub const BASE_URL: &str = "http://localhost:5000";
pub const SOCKET_PATH: &str = "/socket.io/";
pub const ENGINE_IO_VERSION: &str = "4";

pub const AUTHORIZATION_HEADER: &str = "Authorization";

pub const DEFAULT_CAPACITY: usize = 1024;
pub const RECONNECT_DELAY_MS: u64 = 1000;
pub const RECONNECT_DELAY_MAX_MS: u64 = 5000;
pub const CONNECT_TIMEOUT_MS: u64 = 20000;
