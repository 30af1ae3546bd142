//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `db`      | `Db`             |
//! | `user`    | `User`           |
//! | `review`  | `Review`         |
//! | `session` | `Session`        |

pub mod db;
pub mod review;
pub mod serve;
pub mod session;
pub mod user;

pub use db::cmd_db;
pub use review::cmd_review;
pub use serve::cmd_serve;
pub use session::cmd_session;
pub use user::cmd_user;
