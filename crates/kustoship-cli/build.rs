extern crate vergen_gitcl;
use anyhow::Result;
use vergen_gitcl::*;

fn main() -> Result<()> {
    vergen()?;
    Ok(())
}

// Outside a git checkout the git values are emitted as placeholders and `ks info` falls back.
fn vergen() -> Result<()> {
    let build = BuildBuilder::all_build()?;
    let git = GitclBuilder::all_git()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&git)?
        .emit()?;

    Ok(())
}
