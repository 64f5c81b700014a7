pub mod commands;
pub mod profiles;

use clap::Args;

/// FTP login shared by every remote-touching subcommand.
#[derive(Args, Clone, Debug)]
pub struct LoginArgs {
    /// FTP user
    #[arg(long, env = "CARAVEL_FTP_USER", default_value = "anonymous")]
    pub user: String,
    /// FTP password
    #[arg(
        long,
        env = "CARAVEL_FTP_PASSWORD",
        default_value = "anonymous@",
        hide_env_values = true
    )]
    pub password: String,
}
