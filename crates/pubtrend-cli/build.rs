//! Embeds git and toolchain details for `pubtrend --version`.

use vergen_git2::{BuildBuilder, CargoBuilder, Emitter, Git2Builder, RustcBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let build_date = BuildBuilder::default().build_date(true).build()?;
    let target = CargoBuilder::default().target_triple(true).build()?;
    let commit = Git2Builder::default().sha(true).build()?;
    let rustc = RustcBuilder::default().semver(true).build()?;

    // a tarball build has no .git; vergen then emits defaults and a warning
    Emitter::default()
        .add_instructions(&build_date)?
        .add_instructions(&target)?
        .add_instructions(&commit)?
        .add_instructions(&rustc)?
        .emit()?;

    Ok(())
}
