//! Shared test fixtures: scratch git repositories built with git2.

use git2::{IndexAddOption, Oid, Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct FixtureRepo {
    pub dir: TempDir,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create fixture dir");
        Repository::init(dir.path()).expect("init fixture repo");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the given files (deleting paths mapped to `None`), stage
    /// everything, and commit. Returns the commit id as a hex string usable
    /// as a revision reference.
    pub fn commit(&self, message: &str, files: &[(&str, Option<&str>)]) -> String {
        for (rel, content) in files {
            let path = self.dir.path().join(rel);
            match content {
                Some(content) => {
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(&path, content).unwrap();
                }
                None => {
                    let _ = fs::remove_file(&path);
                }
            }
        }

        let repo = Repository::open(self.dir.path()).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Fixture Author", "fixture@example.com").unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid: Oid = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
        oid.to_string()
    }
}
