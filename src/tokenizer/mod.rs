mod prefix;
mod timestamp;

pub use prefix::{
    is_supported_prefix, PrefixTokenizer, TokenizerError, PREFIX_AMAZON_RDS, PREFIX_LINE_NUMBER,
    PREFIX_SIMPLE, PREFIX_USER_DB_APP, SUPPORTED_PREFIXES,
};
pub use timestamp::{parse_log_timestamp, TimestampError};
