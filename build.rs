use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use clap::CommandFactory;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=crates/mvextras-cli/src/lib.rs");

    // Generate manpage using clap_mangen
    let cmd = mvextras_cli::Args::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;

    let out_dir = PathBuf::from(
        env::var_os("OUT_DIR")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is not set"))?,
    );

    let dest_path = out_dir.join("mvextras.1");
    fs::write(&dest_path, &buffer)?;

    // In release mode, also write next to the binary.
    // OUT_DIR is target/release/build/<pkg>/out, three levels below target/release/
    if env::var("PROFILE").unwrap_or_default() == "release" {
        if let Some(release_dir) = out_dir.ancestors().nth(3) {
            fs::write(release_dir.join("mvextras.1"), &buffer)?;
        }
    }

    Ok(())
}
