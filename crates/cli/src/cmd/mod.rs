mod install;
mod status;
mod uninstall;

pub use install::{InstallOptions, cmd_install};
pub use status::cmd_status;
pub use uninstall::cmd_uninstall;
