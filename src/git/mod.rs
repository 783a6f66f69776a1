//! libgit2 wrapper for read-only repository access.
//!
//! git2::Repository is not Send/Sync, so this wrapper stores only the
//! repository path and opens a fresh Repository per operation. Every
//! operation here is read-only; the pipeline never mutates the object store
//! or the working tree.

use anyhow::{Context as _, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, DiffFormat, DiffOptions, ObjectType, Oid, Repository, Sort};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{ChangedFile, CommitInfo};
use crate::errors::PipelineError;

pub struct GitRepo {
    repo_path: PathBuf,
}

impl GitRepo {
    /// Open a repository, discovering the root from any subdirectory.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("failed to discover git repository at {}", path.display()))?;
        let repo_path = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());
        Ok(Self { repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn open_repo(&self) -> Result<Repository> {
        Repository::discover(&self.repo_path).with_context(|| {
            format!("failed to open repository at {}", self.repo_path.display())
        })
    }

    /// Resolve a revision reference to a commit id.
    ///
    /// An unresolvable reference is a structural precondition failure, so it
    /// maps to the typed `RefNotFound` error rather than a generic one.
    pub fn resolve_ref(&self, reference: &str) -> Result<Oid> {
        let repo = self.open_repo()?;
        let object = repo
            .revparse_single(reference)
            .map_err(|_| PipelineError::RefNotFound {
                reference: reference.to_string(),
            })?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| PipelineError::RefNotFound {
                reference: reference.to_string(),
            })?;
        Ok(commit.id())
    }

    /// Commits reachable from `new` but not `old`, ordered old -> new.
    pub fn commits_between(&self, old: Oid, new: Oid) -> Result<Vec<CommitInfo>> {
        let repo = self.open_repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push(new)?;
        revwalk.hide(old)?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            let author = commit.author();
            commits.push(CommitInfo {
                hash: oid.to_string(),
                summary: commit.summary().unwrap_or("").to_string(),
                author: author.name().unwrap_or("").to_string(),
                timestamp: Utc
                    .timestamp_opt(commit.time().seconds(), 0)
                    .single()
                    .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC),
            });
        }
        // Revwalk yields newest first.
        commits.reverse();
        Ok(commits)
    }

    /// Per-file added/deleted line counts between two commits, sorted by path.
    pub fn changed_files(&self, old: Oid, new: Oid) -> Result<Vec<ChangedFile>> {
        let repo = self.open_repo()?;
        let old_tree = repo.find_commit(old)?.tree()?;
        let new_tree = repo.find_commit(new)?.tree()?;
        let diff =
            repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut DiffOptions::new()))?;

        // Seed every delta up front so files with zero countable lines
        // (renames, mode changes) still appear; the foreach then only needs
        // the line callback borrowing `stats`.
        let mut stats: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for delta in diff.deltas() {
            if let Some(path) = delta_path(&delta) {
                stats.entry(path).or_insert((0, 0));
            }
        }

        diff.foreach(
            &mut |_, _| true,
            None,
            None,
            Some(&mut |delta, _hunk, line| {
                if let Some(path) = delta_path(&delta) {
                    let entry = stats.entry(path).or_insert((0, 0));
                    match line.origin() {
                        '+' => entry.0 += 1,
                        '-' => entry.1 += 1,
                        _ => {}
                    }
                }
                true
            }),
        )?;

        Ok(stats
            .into_iter()
            .map(|(path, (lines_added, lines_deleted))| ChangedFile {
                path,
                lines_added,
                lines_deleted,
            })
            .collect())
    }

    /// Unified diff text with zero context lines, as consumed by the
    /// breaking-API detector.
    pub fn zero_context_patch(&self, old: Oid, new: Oid) -> Result<String> {
        let repo = self.open_repo()?;
        let old_tree = repo.find_commit(old)?.tree()?;
        let new_tree = repo.find_commit(new)?.tree()?;
        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => patch.push(line.origin()),
                _ => {}
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(patch)
    }

    /// File content at a revision; `None` when the path does not exist there.
    pub fn blob_at(&self, rev: Oid, path: &str) -> Result<Option<Vec<u8>>> {
        let repo = self.open_repo()?;
        let tree = repo.find_commit(rev)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let object = entry.to_object(&repo)?;
        // Copy the bytes out before `object` (borrowing `repo`) goes away.
        let bytes = match object.peel(ObjectType::Blob) {
            Ok(peeled) => peeled.as_blob().map(|blob| blob.content().to_vec()),
            Err(_) => None,
        };
        Ok(bytes)
    }
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> Option<String> {
    let file = match delta.status() {
        Delta::Deleted => delta.old_file(),
        _ => delta.new_file(),
    };
    file.path().map(|p| p.to_string_lossy().into_owned())
}
