//! The filesystem layer: a hashed `store/` tree keyed by the primary digest,
//! a `tmp/` directory for in-flight writes, and the settle/get/erase/prune
//! protocol.

use data_encoding::BASE32_NOPAD;
use tempfile::NamedTempFile;

use std::{
    fs,
    io::{self, Read, Seek, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::{digest::Digest, err_at, timestamp::Timestamp, Error, Result};

/// A handle to a blob that may be opened lazily. Returned instead of an
/// eagerly-opened file so a caller iterating a large result set (e.g.
/// `list`) doesn't exhaust file descriptors.
pub enum BlobHandle {
    /// Already open (used when the caller asked for `direct` access).
    Direct(fs::File),
    /// Opens on demand.
    Thunk(PathBuf),
}

impl BlobHandle {
    pub fn open(self) -> Result<fs::File> {
        match self {
            BlobHandle::Direct(f) => Ok(f),
            BlobHandle::Thunk(path) => err_at!(IOError, fs::File::open(&path), "{:?}", path),
        }
    }
}

/// Filesystem-backed blob storage rooted at `<dir>/store` and `<dir>/tmp`.
pub struct BlobStore {
    root: PathBuf,
    umask: u32,
}

fn dir_mode(umask: u32) -> u32 {
    0o777 & !umask
}

fn file_mode(umask: u32) -> u32 {
    0o444 & !umask
}

impl BlobStore {
    /// Create `store/` and `tmp/` under `dir`, if they don't already exist.
    /// Permission failures here are hard errors.
    pub fn setup(dir: impl Into<PathBuf>, umask: u32) -> Result<BlobStore> {
        let root: PathBuf = dir.into();
        let blobs = BlobStore { root, umask };
        blobs.ensure_dir(&blobs.store_dir())?;
        blobs.ensure_dir(&blobs.tmp_dir())?;
        Ok(blobs)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        err_at!(IOError, fs::create_dir_all(path), "{:?}", path)?;
        self.chmod_dir(path)?;
        Ok(())
    }

    #[cfg(unix)]
    fn chmod_dir(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mut mode = dir_mode(self.umask);
        // setgid, so files created underneath inherit the directory's group —
        // best-effort, not every filesystem honors it.
        mode |= 0o2000;
        err_at!(
            IOError,
            fs::set_permissions(path, fs::Permissions::from_mode(mode)),
            "{:?}",
            path
        )
    }

    #[cfg(not(unix))]
    fn chmod_dir(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn chmod_file(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mode = file_mode(self.umask);
        err_at!(
            IOError,
            fs::set_permissions(path, fs::Permissions::from_mode(mode)),
            "{:?}",
            path
        )
    }

    #[cfg(not(unix))]
    fn chmod_file(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Derive the path under `store/` for a primary digest: lower-case
    /// base32 (no padding), split into `[4, 4, 4, rest]` path segments.
    pub fn path_for(&self, primary: &Digest) -> PathBuf {
        let encoded = BASE32_NOPAD.encode(primary.as_bytes()).to_lowercase();
        let mut path = self.store_dir();
        let bytes = encoded.as_bytes();
        let mut offset = 0;
        for seg_len in [4usize, 4, 4] {
            if bytes.len() < offset + seg_len {
                break;
            }
            path.push(&encoded[offset..offset + seg_len]);
            offset += seg_len;
        }
        path.push(&encoded[offset.min(encoded.len())..]);
        path
    }

    /// Obtain a temp-file handle under `tmp/`, for a caller (the scanner) to
    /// write blob bytes into before the digest is fully known.
    pub fn create_temp(&self) -> Result<NamedTempFile> {
        err_at!(IOError, NamedTempFile::new_in(self.tmp_dir()))
    }

    /// Atomically finalize a temp-file write as the blob for `digest`.
    ///
    /// 1. flush and close the temp-file
    /// 2. ensure the target's parent directory chain exists
    /// 3. if the target exists and `overwrite` is false, discard the temp
    ///    file
    /// 4. otherwise atomically rename temp -> target, chmod, and set mtime
    pub fn settle(
        &self,
        primary: &Digest,
        mut tempfh: NamedTempFile,
        mtime: Timestamp,
        overwrite: bool,
    ) -> Result<()> {
        err_at!(IOError, tempfh.flush())?;
        err_at!(IOError, tempfh.as_file().sync_all())?;

        let target = self.path_for(primary);
        let parent = target.parent().ok_or_else(|| {
            Error::Fatal(format!("blob path has no parent: {:?}", target))
        })?;
        self.ensure_parent_chain(parent)?;

        if target.exists() && !overwrite {
            // tempfh drops here, removing the temp file.
            return Ok(());
        }

        err_at!(IOError, tempfh.persist(&target), "{:?}", target)?;
        self.chmod_file(&target)?;
        set_mtime(&target, mtime)?;
        Ok(())
    }

    fn ensure_parent_chain(&self, parent: &Path) -> Result<()> {
        if parent.is_dir() {
            return Ok(());
        }
        err_at!(IOError, fs::create_dir_all(parent), "{:?}", parent)?;
        // chmod every ancestor we just created, up to (not including)
        // store/.
        let mut cur = parent.to_path_buf();
        while cur.starts_with(&self.store_dir()) && cur != self.store_dir() {
            self.chmod_dir(&cur)?;
            match cur.parent() {
                Some(p) => cur = p.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }

    /// Open the blob for `digest`. Returns `None` if no blob is present
    /// (tombstone or never written). A path that exists but isn't a
    /// readable regular file is a [`Error::CorruptStateError`].
    pub fn get(&self, primary: &Digest, direct: bool) -> Result<Option<BlobHandle>> {
        let path = self.path_for(primary);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return err_at!(IOError, Err(err), "{:?}", path),
        };
        if !meta.is_file() {
            return err_at!(
                CorruptStateError,
                msg: "blob path {:?} exists but is not a regular file",
                path
            );
        }
        if direct {
            let f = err_at!(IOError, fs::File::open(&path), "{:?}", path)?;
            Ok(Some(BlobHandle::Direct(f)))
        } else {
            Ok(Some(BlobHandle::Thunk(path)))
        }
    }

    /// Unlink the blob for `digest`, returning an already-open read handle
    /// to its (about-to-vanish) contents, then prune now-empty ancestor
    /// directories beneath `store/`. Directory pruning is best-effort: any
    /// error while pruning is swallowed, since a concurrent insert
    /// recreating the directory is an expected race, not a failure.
    pub fn erase(&self, primary: &Digest) -> Result<Option<fs::File>> {
        let path = self.path_for(primary);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return err_at!(IOError, Err(err), "{:?}", path),
        };

        err_at!(IOError, fs::remove_file(&path), "{:?}", path)?;
        self.prune_ancestors(&path);

        Ok(Some(file))
    }

    fn prune_ancestors(&self, blob_path: &Path) {
        let store_dir = self.store_dir();
        let mut cur = match blob_path.parent() {
            Some(p) => p.to_path_buf(),
            None => return,
        };
        while cur.starts_with(&store_dir) && cur != store_dir {
            match fs::read_dir(&cur) {
                Ok(mut entries) if entries.next().is_none() => {
                    if fs::remove_dir(&cur).is_err() {
                        // Lost a race with a concurrent insert recreating the
                        // directory, or some other best-effort failure.
                        break;
                    }
                }
                _ => break,
            }
            match cur.parent() {
                Some(p) => cur = p.to_path_buf(),
                None => break,
            }
        }
    }
}

#[cfg(unix)]
fn set_mtime(path: &Path, mtime: Timestamp) -> Result<()> {
    let when = mtime.to_system_time();
    let secs = when
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let ts = libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: 0,
    };
    let times = [ts, ts];
    let c_path = err_at!(
        ArgumentError,
        std::ffi::CString::new(path.as_os_str().to_string_lossy().into_owned())
    )?;
    let ret = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) };
    if ret != 0 {
        return err_at!(IOError, Err(io::Error::last_os_error()), "{:?}", path);
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mtime(path: &Path, mtime: Timestamp) -> Result<()> {
    let f = err_at!(IOError, fs::OpenOptions::new().write(true).open(path))?;
    let when = mtime.to_system_time();
    err_at!(IOError, f.set_modified(when))
}

/// Read the entirety of a blob handle, for convenience in tests and small
/// callers.
pub fn read_all(mut f: fs::File) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    err_at!(IOError, f.seek(io::SeekFrom::Start(0)))?;
    err_at!(IOError, f.read_to_end(&mut buf))?;
    Ok(buf)
}

#[cfg(test)]
#[path = "blobstore_test.rs"]
mod blobstore_test;
