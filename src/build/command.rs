// ABOUTME: Command and entrypoint assembly for container creation.
// ABOUTME: Multi-line commands become a mounted script; strings become exec form.

use crate::config::Command;
use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where a generated command script is mounted inside the container.
pub const SCRIPT_MOUNT: &str = "/usr/bin/@cmd";

/// Split a command line into arguments, honoring quotes and backslash escapes.
pub fn split_command(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_arg = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    in_arg = true;
                }
                c if c.is_whitespace() => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                c => {
                    current.push(c);
                    in_arg = true;
                }
            },
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Exec form of an entrypoint.
pub fn entrypoint_args(entrypoint: &Command) -> Vec<String> {
    match entrypoint {
        Command::Line(line) => split_command(line),
        Command::Exec(args) => args.clone(),
    }
}

/// Exec form of a string command: plain arguments when an entrypoint will
/// receive them, otherwise a shell invocation.
pub fn command_args(line: &str, has_entrypoint: bool) -> Vec<String> {
    if has_entrypoint {
        split_command(line)
    } else {
        vec!["/bin/sh".to_string(), "-c".to_string(), line.to_string()]
    }
}

pub fn is_script(line: &str) -> bool {
    line.contains('\n')
}

/// Write an inline script to `<dir>/cmd` with mode 755 and return its path.
pub fn write_script(dir: &Path, script: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("cmd");

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }
    let mut file = options.open(&path)?;
    file.write_all(script.as_bytes())?;

    // `mode` only applies on creation; an older script keeps its bits otherwise.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}
