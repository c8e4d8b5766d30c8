//! Command implementations for infra-cli

pub mod apply;
pub mod destroy;
pub mod show;
pub mod validate;

pub use apply::run_apply;
pub use destroy::run_destroy;
pub use show::run_show;
pub use validate::run_validate;
