//! Walking a staged tree: sizes, conffiles and md5sums

use std::{fs::File, io};

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use walkdir::WalkDir;

use crate::errors::DistResult;

/// Name of the metadata directory inside a staged root
pub const DEBIAN_DIR: &str = "DEBIAN";

/// Every regular file under `root`, as `/`-separated paths relative to `root`
///
/// Symlinks are not followed and not reported. The result is sorted bytewise.
pub fn regular_files(root: &Utf8Path) -> DistResult<Vec<Utf8PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(entry.into_path())?;
        let rel = path
            .strip_prefix(root)
            .map(ToOwned::to_owned)
            .unwrap_or(path);
        files.push(rel);
    }
    files.sort_by(|a, b| a.as_str().as_bytes().cmp(b.as_str().as_bytes()));
    Ok(files)
}

/// Total size in bytes of every regular file under `root`
pub fn dir_size(root: &Utf8Path) -> DistResult<u64> {
    let mut total = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// md5 of a file's contents, as lowercase hex
pub fn file_md5(path: &Utf8Path) -> DistResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Contents of `DEBIAN/md5sums` for a staged root
///
/// One `<md5>  <relative path>` line per regular file, sorted by path,
/// leaving out everything under `DEBIAN/`.
pub fn md5sums(root: &Utf8Path) -> DistResult<String> {
    let mut out = String::new();
    for rel in regular_files(root)? {
        if rel.starts_with(DEBIAN_DIR) {
            continue;
        }
        let hash = file_md5(&root.join(&rel))?;
        out.push_str(&format!("{hash}  {rel}\n"));
    }
    Ok(out)
}

/// Contents of `DEBIAN/conffiles` for a staged root
///
/// Returns `None` if there's no `etc` directory to scan. Otherwise every
/// regular file under it as an absolute path on the target system, one per
/// line, with the trailing newline dpkg-deb insists on.
pub fn conffiles(root: &Utf8Path) -> DistResult<Option<String>> {
    let etc = root.join("etc");
    if !etc.is_dir() {
        return Ok(None);
    }
    let mut out = String::new();
    for rel in regular_files(&etc)? {
        out.push_str(&format!("/etc/{rel}\n"));
    }
    Ok(Some(out))
}
