use anyhow::Context as _;
use clap::Args;
use opendeps_manifest::scaffold::scaffold_manifest;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct ScaffoldArgs {
    /// Directory containing `OpenAPI` documents [default: current directory]
    pub dir: Option<PathBuf>,

    /// Overwrite an existing `opendeps.yaml` instead of writing `opendeps-N.yaml`
    #[arg(short, long)]
    pub force_overwrite: bool,
}

pub fn run(args: &ScaffoldArgs) -> anyhow::Result<ExitCode> {
    let dir = match &args.dir {
        Some(dir) => std::path::absolute(dir)
            .with_context(|| format!("resolve directory {}", dir.display()))?,
        None => std::env::current_dir().context("read current directory")?,
    };
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    scaffold_manifest(&dir, args.force_overwrite)
        .with_context(|| format!("scaffold manifest in {}", dir.display()))?;
    Ok(ExitCode::SUCCESS)
}
