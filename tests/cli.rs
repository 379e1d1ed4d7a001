use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    cargo_run!("imteach", "--help")
        .success()
        .stdout(predicate::str::contains("teach"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("admin"));
    Ok(())
}

#[test]
fn teach_requires_model_and_class() -> Result<()> {
    cargo_run!("imteach", "teach").failure();
    Ok(())
}

#[test]
fn classify_rejects_missing_image() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;

    cargo_run!("imteach", "-c", conf_dir.path(), "classify", "/no/such/image.jpg")
        .failure()
        .stderr(predicate::str::contains("image.jpg"));
    Ok(())
}
