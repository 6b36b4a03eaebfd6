// src/request/command.rs

//! The merge tool's argv.

use crate::types::Accelerator;

/// File name the configuration is written under, inside the working directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Directory (relative to the working directory) the merge tool writes to.
pub const OUTPUT_DIR_NAME: &str = "merge";

/// Arguments passed after the command name.
///
/// Only the trailing flags depend on the accelerator. On CPU the tool's own
/// caches are pointed one level up, out of the working directory, so they are
/// not copied to the destination with the merged model.
pub fn command_args(accelerator: Accelerator) -> Vec<String> {
    let common = [CONFIG_FILE_NAME, OUTPUT_DIR_NAME, "--copy-tokenizer"];
    let trailing: &[&str] = match accelerator {
        Accelerator::Cuda => &["--cuda", "--low-cpu-memory"],
        Accelerator::Cpu => &[
            "--allow-crimes",
            "--out-shard-size",
            "1B",
            "--lazy-unpickle",
            "--transformers-cache",
            "../cache1",
            "--lora-merge-cache",
            "../cache",
        ],
    };

    common
        .iter()
        .chain(trailing.iter())
        .map(|s| s.to_string())
        .collect()
}
