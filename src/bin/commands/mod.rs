pub mod inspect_cmd;
pub mod query_cmd;
pub mod validate_cmd;

pub use inspect_cmd::cmd_inspect;
pub use query_cmd::cmd_query;
pub use validate_cmd::cmd_validate;
