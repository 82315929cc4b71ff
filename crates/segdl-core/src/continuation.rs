//! Follow-up sessions for completed transfer descriptors.
//!
//! A finished `.torrent` or `.metalink` file is itself a description of more
//! downloads. This module only recognizes them by name; expanding their
//! contents belongs to whoever schedules the returned descriptor.

use std::path::{Path, PathBuf};

use crate::session::{CompletedFileInfo, SessionOptions, UrlRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Torrent,
    Metalink,
}

impl DescriptorFormat {
    /// Priority order: the first enabled, matching format wins.
    pub const ALL: [DescriptorFormat; 2] = [DescriptorFormat::Torrent, DescriptorFormat::Metalink];

    pub fn suffix(self) -> &'static str {
        match self {
            DescriptorFormat::Torrent => ".torrent",
            DescriptorFormat::Metalink => ".metalink",
        }
    }

    fn enabled(self, options: &SessionOptions) -> bool {
        match self {
            DescriptorFormat::Torrent => options.follow_torrent && options.capabilities.bittorrent,
            DescriptorFormat::Metalink => options.follow_metalink && options.capabilities.metalink,
        }
    }

    fn descriptor(self, path: &Path) -> SessionDescriptor {
        let path = path.to_path_buf();
        match self {
            DescriptorFormat::Torrent => SessionDescriptor::Torrent { path },
            DescriptorFormat::Metalink => SessionDescriptor::Metalink { path },
        }
    }
}

/// One entry of the caller's request queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionDescriptor {
    Urls(UrlRequest),
    Torrent { path: PathBuf },
    Metalink { path: PathBuf },
}

/// At most one follow-up for `completed`; suffix match is case-sensitive.
pub fn next_session(
    completed: &CompletedFileInfo,
    options: &SessionOptions,
) -> Option<SessionDescriptor> {
    let name = completed.filename.to_string_lossy();
    let format = DescriptorFormat::ALL
        .into_iter()
        .find(|f| name.ends_with(f.suffix()) && f.enabled(options))?;
    tracing::info!(
        "{} is a {:?} descriptor; queueing follow-up session",
        completed.filename.display(),
        format
    );
    Some(format.descriptor(&completed.filename))
}
