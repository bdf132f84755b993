//! External reference resolution.
//!
//! Cells of a reference-typed member hold a path relative to the project
//! root or a bare asset name. The converter hands them to an
//! [`AssetResolver`] and never inspects storage itself.

use std::{
    cell::OnceCell,
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::debug;
use walkdir::WalkDir;

use crate::{data::AssetHandle, registry::TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(AssetHandle),
    NotFound,
    Ambiguous(Vec<AssetHandle>),
}

pub trait AssetResolver {
    fn resolve(&self, kind: &str, name_or_path: &str) -> Resolution;
}

/// Resolver that never finds anything; used when a run has no asset root.
pub struct NullResolver;

impl AssetResolver for NullResolver {
    fn resolve(&self, _kind: &str, _name_or_path: &str) -> Resolution {
        Resolution::NotFound
    }
}

/// In-memory resolver keyed by `(kind, name)`.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: BTreeMap<(String, String), Vec<AssetHandle>>,
}

impl StaticResolver {
    pub fn insert(&mut self, kind: &str, name: &str, path: &str) {
        self.entries
            .entry((kind.to_string(), name.to_string()))
            .or_default()
            .push(AssetHandle::new(kind, path));
    }
}

impl AssetResolver for StaticResolver {
    fn resolve(&self, kind: &str, name_or_path: &str) -> Resolution {
        match self.entries.get(&(kind.to_string(), name_or_path.to_string())) {
            None => Resolution::NotFound,
            Some(handles) => from_candidates(handles.clone()),
        }
    }
}

/// Resolves against files under a project directory.
///
/// An exact relative path wins. Otherwise every file whose stem equals the
/// stem of the requested name (and whose extension belongs to the reference
/// kind) is a candidate, in sorted path order. The directory is walked once,
/// on the first stem lookup.
pub struct DirectoryResolver {
    root: PathBuf,
    extensions: BTreeMap<String, Vec<String>>,
    stems: OnceCell<BTreeMap<String, Vec<PathBuf>>>,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>, registry: &TypeRegistry) -> Self {
        let extensions = registry
            .reference_kinds
            .iter()
            .map(|kind| {
                let exts = kind
                    .extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect();
                (kind.name.clone(), exts)
            })
            .collect();
        Self {
            root: root.into(),
            extensions,
            stems: OnceCell::new(),
        }
    }

    fn stems(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        self.stems.get_or_init(|| {
            let mut stems: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
            for entry in WalkDir::new(&self.root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                if let Some(stem) = entry.path().file_stem() {
                    stems
                        .entry(stem.to_string_lossy().into_owned())
                        .or_default()
                        .push(entry.into_path());
                }
            }
            debug!(
                "Indexed {} asset stem(s) under {:?}",
                stems.len(),
                self.root
            );
            stems
        })
    }

    fn accepts(&self, kind: &str, path: &Path) -> bool {
        match self.extensions.get(kind) {
            Some(exts) if !exts.is_empty() => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e))),
            _ => true,
        }
    }

    fn handle(&self, kind: &str, path: &Path) -> AssetHandle {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let display = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        AssetHandle::new(kind, display)
    }
}

impl AssetResolver for DirectoryResolver {
    fn resolve(&self, kind: &str, name_or_path: &str) -> Resolution {
        let direct = self.root.join(name_or_path);
        if direct.is_file() && self.accepts(kind, &direct) {
            return Resolution::Found(self.handle(kind, &direct));
        }

        let wanted = Path::new(name_or_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name_or_path.to_string());
        let mut matches = self
            .stems()
            .get(&wanted)
            .into_iter()
            .flatten()
            .filter(|path| self.accepts(kind, path))
            .map(|path| self.handle(kind, path))
            .collect::<Vec<_>>();
        matches.sort();
        debug!(
            "Resolved {kind} '{name_or_path}' to {} candidate(s) under {:?}",
            matches.len(),
            self.root
        );
        from_candidates(matches)
    }
}

fn from_candidates(mut handles: Vec<AssetHandle>) -> Resolution {
    match handles.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Found(handles.remove(0)),
        _ => Resolution::Ambiguous(handles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ReferenceKind;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::default();
        registry.register_reference_kind(ReferenceKind {
            name: "Sprite".into(),
            extensions: vec!["png".into()],
        });
        registry
    }

    #[test]
    fn directory_resolver_prefers_exact_paths() {
        let dir = tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("icons")).unwrap();
        fs::write(dir.path().join("icons/sword.png"), b"").unwrap();
        let resolver = DirectoryResolver::new(dir.path(), &registry());
        assert_eq!(
            resolver.resolve("Sprite", "icons/sword.png"),
            Resolution::Found(AssetHandle::new("Sprite", "icons/sword.png"))
        );
    }

    #[test]
    fn directory_resolver_searches_by_stem_and_extension() {
        let dir = tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/shield.png"), b"").unwrap();
        fs::write(dir.path().join("a/shield.txt"), b"").unwrap();
        fs::write(dir.path().join("b/shield.png"), b"").unwrap();
        fs::write(dir.path().join("a/bow.png"), b"").unwrap();
        let resolver = DirectoryResolver::new(dir.path(), &registry());

        assert_eq!(
            resolver.resolve("Sprite", "bow"),
            Resolution::Found(AssetHandle::new("Sprite", "a/bow.png"))
        );
        match resolver.resolve("Sprite", "shield") {
            Resolution::Ambiguous(handles) => {
                assert_eq!(handles.len(), 2);
                assert_eq!(handles[0].path, "a/shield.png");
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert_eq!(resolver.resolve("Sprite", "axe"), Resolution::NotFound);
    }

    #[test]
    fn directory_resolver_indexes_the_root_once() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("bow.png"), b"").unwrap();
        let resolver = DirectoryResolver::new(dir.path(), &registry());
        assert_eq!(
            resolver.resolve("Sprite", "bow"),
            Resolution::Found(AssetHandle::new("Sprite", "bow.png"))
        );

        fs::write(dir.path().join("axe.png"), b"").unwrap();
        assert_eq!(resolver.resolve("Sprite", "axe"), Resolution::NotFound);
        assert_eq!(
            resolver.resolve("Sprite", "axe.png"),
            Resolution::Found(AssetHandle::new("Sprite", "axe.png"))
        );
    }

    #[test]
    fn static_resolver_reports_duplicates_as_ambiguous() {
        let mut resolver = StaticResolver::default();
        resolver.insert("Sprite", "bow", "a/bow.png");
        resolver.insert("Sprite", "bow", "b/bow.png");
        assert!(matches!(
            resolver.resolve("Sprite", "bow"),
            Resolution::Ambiguous(ref handles) if handles.len() == 2
        ));
    }
}
