use clap::{ArgAction, Parser, ValueEnum};
use layerbox_domain::{ImageSourceChoice, TargetPlatform};

pub const LAYERBOX_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nOptions:\n{options}\n{after-help}\n";

pub const LAYERBOX_BEFORE_HELP: &str = concat!(
    "layerbox ",
    env!("CARGO_PKG_VERSION"),
    " – Lambda-compatible build sandboxes for Python projects\n\n",
    "Opens an interactive shell in a container named after the current folder,\n",
    "with the folder mounted at /var/task and AWS credentials forwarded.\n",
    "Running it again from the same folder attaches to the running session.\n",
);

pub const LAYERBOX_AFTER_HELP: &str = concat!(
    "\x1b[1;36mExamples\x1b[0m\n",
    "  layerbox                                 Reuse or pull the default image\n",
    "  layerbox --image-source build            Build from .sandbox-layer.Dockerfile\n",
    "  layerbox --image myrepo:tag1             Use (or pull) a specific image\n",
    "  layerbox --dry-run --json                Show the plan without starting anything\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "layerbox",
    author,
    version,
    before_help = LAYERBOX_BEFORE_HELP,
    after_help = LAYERBOX_AFTER_HELP,
    help_template = LAYERBOX_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerboxCli {
    #[arg(
        long = "image-source",
        value_enum,
        default_value_t = ImageSourceArg::PullDefault,
        help = "Where the sandbox image comes from"
    )]
    pub image_source: ImageSourceArg,
    #[arg(
        long,
        value_enum,
        help = "Platform to build or pull the image for (sessions always run as linux/amd64)"
    )]
    pub platform: Option<PlatformArg>,
    #[arg(long, help = "Ask which image source to use before starting")]
    pub choose: bool,
    #[arg(
        long,
        value_name = "REPOSITORY:TAG",
        help = "Image to reuse or pull; implies --image-source pull"
    )]
    pub image: Option<String>,
    #[arg(long, help = "Never prompt; fall back to the defaults")]
    pub no_input: bool,
    #[arg(
        long,
        help = "Resolve everything and print the engine command without running it"
    )]
    pub dry_run: bool,
    #[arg(short, long, help = "Suppress human output (errors still print to stderr)")]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,code,details} JSON envelopes")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ImageSourceArg {
    /// Build from the project's generated Dockerfile.
    Build,
    /// Reuse or pull a named image.
    Pull,
    /// Reuse or pull the default image.
    #[value(name = "pull_default", alias = "pull-default")]
    PullDefault,
}

impl From<ImageSourceArg> for ImageSourceChoice {
    fn from(value: ImageSourceArg) -> Self {
        match value {
            ImageSourceArg::Build => Self::Build,
            ImageSourceArg::Pull => Self::PullNamed,
            ImageSourceArg::PullDefault => Self::PullDefault,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    #[value(name = "linux/amd64")]
    LinuxAmd64,
    #[value(name = "linux/arm64")]
    LinuxArm64,
    #[value(name = "linux/arm/v7")]
    LinuxArmV7,
}

impl From<PlatformArg> for TargetPlatform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::LinuxAmd64 => Self::LinuxAmd64,
            PlatformArg::LinuxArm64 => Self::LinuxArm64,
            PlatformArg::LinuxArmV7 => Self::LinuxArmV7,
        }
    }
}
