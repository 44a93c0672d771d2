// Render the tasktime man page from the clap definition
//
// Usage: generate-man [OUTPUT_DIR]   (defaults to stdout)

use anyhow::{Context, Result};
use clap::CommandFactory;
use std::io::Write;
use std::path::PathBuf;
use tasktime::cli::Cli;

fn main() -> Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Vec::new();
    man.render(&mut buffer).context("Failed to render man page")?;

    match std::env::args().nth(1) {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            let path = dir.join("tasktime.1");
            std::fs::write(&path, &buffer)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            std::io::stdout().write_all(&buffer)?;
        }
    }
    Ok(())
}
