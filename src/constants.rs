// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_DATA_PATH: &str = "data";
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:8080";
pub const DATABASE_FILE_NAME: &str = "finance.db";

// Session configuration
pub const SESSION_NAME: &str = "finance_session";
pub const SESSION_USER_KEY: &str = "user";
pub const SESSION_EXPIRY_DAYS: i64 = 30;
pub const MIN_SESSION_SECRET_LENGTH: usize = 64;

// Database limits and defaults
pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const DEFAULT_TRANSACTIONS_LIMIT: u32 = 500;
pub const MAX_LIMIT: u32 = 1000;
pub const MAX_OFFSET: u32 = 1_000_000;

// Validation limits
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_WALLET_NAME_LENGTH: usize = 50;
pub const MAX_JAR_NAME_LENGTH: usize = 50;
pub const MAX_TRANSACTION_NAME_LENGTH: usize = 100;
pub const MAX_GOAL_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_FULL_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;

// Amount limits
pub const MAX_MOVEMENT_AMOUNT: f64 = 999_999.99;
pub const MAX_GOAL_TARGET_AMOUNT: f64 = 9_999_999.99;

// Jar history
pub const INITIAL_BALANCE_DESCRIPTION: &str = "Initial balance";

// Error messages
pub const ERR_INVALID_SESSION: &str = "Invalid session";
pub const ERR_UNAUTHORIZED: &str = "Not logged in";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid email or password";
