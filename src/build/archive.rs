// ABOUTME: Build context archives for image builds.
// ABOUTME: Packs context directories and an optional inline Dockerfile into an in-memory tar.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Tar every context directory, in order, then the inline Dockerfile if given.
///
/// Later contexts overwrite files of earlier ones when the engine unpacks them.
pub fn pack(contexts: &[PathBuf], dockerfile: Option<&str>) -> Result<Vec<u8>> {
    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);

    for context in contexts {
        if !context.is_dir() {
            return Err(Error::Config(format!(
                "Build context \"{}\" not found.",
                context.display()
            )));
        }
        ar.append_dir_all("", context)?;
    }

    if let Some(content) = dockerfile {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        ar.append_data(&mut header, "Dockerfile", content.as_bytes())?;
    }

    Ok(ar.into_inner()?)
}
