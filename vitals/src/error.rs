// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use thiserror::Error;

/// Possible errors returned by the registration surface and the mount
/// lifecycle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument")]
    /// A name contains characters outside `[A-Za-z0-9._-]`, a parent is not
    /// a directory, or an attribute mask is unsupported.
    InvalidArgument,
    #[error("not found")]
    /// The item is not reachable from the root, or no child has the
    /// requested name.
    NotFound,
    #[error("already exists")]
    /// The parent directory already has a child with the requested name.
    AlreadyExists,
    #[error("permission denied")]
    /// The open mode is not supported for this item.
    PermissionDenied,
    #[error("i/o error")]
    /// A write was directed at an item with no registered writer.
    Io,
    #[error("mount failed: {0}")]
    /// Mounting or running the filesystem session failed.
    Mount(#[from] std::io::Error),
}

impl Error {
    /// The errno this error maps to at the filesystem boundary.
    pub fn errno(&self) -> libc::c_int {
        match self {
            Error::InvalidArgument => libc::EINVAL,
            Error::NotFound => libc::ENOENT,
            Error::AlreadyExists => libc::EEXIST,
            Error::PermissionDenied => libc::EACCES,
            Error::Io => libc::EIO,
            Error::Mount(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
