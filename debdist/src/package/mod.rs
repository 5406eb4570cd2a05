//! Assembling Debian packages
//!
//! Turns a staging prefix plus a [`PackageManifest`][] into a `.deb`:
//! run the install step into the prefix, write `DEBIAN/` metadata, checksum
//! everything, then hand the tree to the archiver.

use std::{fs::Permissions, os::unix::fs::PermissionsExt};

use axoasset::LocalAsset;
use axoprocess::Cmd;
use camino::{Utf8Path, Utf8PathBuf};
use debdist_schema::{ConffilesMode, PackageManifest, PackageReport};
use tracing::info;

use crate::{
    build::make::exit_code,
    config::PackageConfig,
    env::{AmbientEnv, ENV_PREFIX, ENV_SIZE_KB},
    errors::{DistError, DistResult},
    templates::expand,
    SortedMap,
};

pub mod checksums;
pub mod control;

use checksums::DEBIAN_DIR;

/// Mode maintainer scripts are written with
pub const SCRIPT_MODE: u32 = 0o775;

/// Where the archiver leaves its output for a given prefix (`<prefix>.deb`)
pub fn archive_path(prefix: &Utf8Path) -> DistResult<Utf8PathBuf> {
    let Some(name) = prefix.file_name() else {
        return Err(DistError::BadPrefix {
            prefix: prefix.to_owned(),
        });
    };
    Ok(prefix.with_file_name(format!("{name}.deb")))
}

/// Build a package from a resolved config
pub fn assemble(cfg: &PackageConfig) -> DistResult<PackageReport> {
    let prefix = &cfg.prefix;
    let manifest = &cfg.manifest;
    let archive = archive_path(prefix)?;

    info!("assembling {prefix} from {}", cfg.manifest_path);
    let debian_dir = prefix.join(DEBIAN_DIR);
    LocalAsset::create_dir_all(&debian_dir)?;

    run_install(manifest, prefix, &cfg.vars)?;

    let size_kb = match cfg.vars.get(ENV_SIZE_KB) {
        Some(size) => size.to_owned(),
        None => (checksums::dir_size(prefix)? / 1024).to_string(),
    };
    let vars = cfg.vars.overlay([(ENV_SIZE_KB, size_kb.as_str())]);

    let control = control::render_control(&manifest.control, &vars);
    LocalAsset::write_new(&control, debian_dir.join("control"))?;

    for (name, body) in manifest.scripts.iter() {
        write_script(&debian_dir, name, body)?;
    }

    write_conffiles(prefix, manifest.build.conffiles)?;

    let sums = checksums::md5sums(prefix)?;
    LocalAsset::write_new(&sums, debian_dir.join("md5sums"))?;

    let mut archiver = cfg.archiver.clone();
    archiver.extend(manifest.build.args.iter().cloned());
    archiver.push("--build".to_owned());
    archiver.push(prefix.to_string());
    run_tool(&archiver, vars.vars(), "archiver")?;
    if !archive.exists() {
        return Err(DistError::MissingArchive { path: archive });
    }

    let path = match &manifest.build.rename {
        Some(template) => {
            let final_name = expand(template, &vars);
            let dest = match prefix.parent() {
                Some(parent) => parent.join(&final_name),
                None => Utf8PathBuf::from(&final_name),
            };
            info!("renaming {archive} to {dest}");
            std::fs::rename(&archive, &dest)?;
            dest
        }
        None => archive,
    };

    Ok(PackageReport {
        path: path.to_string(),
        size_kb,
    })
}

/// Run the manifest's install step into the prefix
///
/// It sees the ambient variables, then the manifest's (expanded) install
/// env on top, then PREFIX on top of that.
fn run_install(
    manifest: &PackageManifest,
    prefix: &Utf8Path,
    ambient: &AmbientEnv,
) -> DistResult<()> {
    let mut vars = ambient.vars().clone();
    for (key, template) in manifest.build.install.env.iter() {
        vars.insert(key.to_owned(), expand(template, ambient));
    }
    vars.insert(ENV_PREFIX.to_owned(), prefix.to_string());
    run_tool(&manifest.build.install.command(), &vars, "install")
}

fn write_script(debian_dir: &Utf8Path, name: &str, body: &str) -> DistResult<()> {
    let path = debian_dir.join(name);
    info!("writing maintainer script {path}");
    LocalAsset::write_new(body, &path)?;
    std::fs::set_permissions(&path, Permissions::from_mode(SCRIPT_MODE))?;
    Ok(())
}

fn write_conffiles(prefix: &Utf8Path, mode: ConffilesMode) -> DistResult<()> {
    let path = prefix.join(DEBIAN_DIR).join("conffiles");
    let list = match mode {
        ConffilesMode::Disabled => None,
        _ => checksums::conffiles(prefix)?,
    };
    match list {
        Some(list) if !list.is_empty() => {
            LocalAsset::write_new(&list, &path)?;
            return Ok(());
        }
        Some(_) => info!("{prefix}/etc has no files, not writing conffiles"),
        None if mode == ConffilesMode::Required => {
            return Err(DistError::MissingEtc {
                prefix: prefix.to_owned(),
            });
        }
        None if mode == ConffilesMode::Auto => {
            info!("no etc directory under {prefix}, not writing conffiles");
        }
        None => {}
    }
    // A conffiles list from an earlier run on this prefix would name files that are gone
    if path.exists() {
        info!("removing stale {path}");
        LocalAsset::remove_file(&path)?;
    }
    Ok(())
}

/// Run an external tool with exactly the given environment
fn run_tool(
    argv: &[String],
    vars: &SortedMap<String, String>,
    what: &'static str,
) -> DistResult<()> {
    let (program, args) = argv
        .split_first()
        .ok_or(DistError::EmptyCommand { what })?;
    let mut cmd = Cmd::new(program, format!("run {what} step"));
    for arg in args {
        cmd.arg(arg);
    }
    cmd.env_clear();
    cmd.envs(vars);
    cmd.stdout_to_stderr();
    cmd.check(false);
    let status = cmd.status()?;
    match exit_code(status, what) {
        0 => Ok(()),
        code => Err(DistError::ToolFailed {
            tool: what.to_owned(),
            code,
        }),
    }
}
