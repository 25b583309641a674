use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "hoist",
    version,
    about = "Deploy a Dockerized repository to a single Linux host over ssh, behind nginx.",
    after_help = "Answers may be preset with HOIST_REPO_URL, HOIST_TOKEN, HOIST_BRANCH, HOIST_SSH_USER, \
HOIST_SSH_HOST, HOIST_SSH_KEY and HOIST_APP_PORT (also read from .env).\n\
Exit codes: 0 ok, 10 input, 20 local repository, 30 connectivity, 40 provisioning, 50 deployment, 60 validation."
)]
pub(crate) struct Cli {
    /// Remove the container, image and nginx site of a previous deployment instead of deploying
    #[arg(long)]
    pub(crate) cleanup: bool,

    /// Colorize console output: auto|always|never
    #[arg(long = "color", value_enum)]
    pub(crate) color: Option<hoist::ColorMode>,
}
