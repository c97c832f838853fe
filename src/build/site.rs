//! The site tree: directories indexed by URL path.
//!
//! Directories live in a flat arena and refer to their children by
//! [`DirId`]; a path index gives O(1) lookup by URL path. Pages are owned by
//! the directory whose path equals the page's `path`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use super::page::Page;
use crate::util::dir_path;

/// Title for directories without an index page.
pub const UNTITLED_DIRECTORY: &str = "No Title";

/// Handle to a directory in a [`SiteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(usize);

#[derive(Debug, Clone)]
pub struct Directory {
    /// Absolute URL path with leading and trailing slash.
    pub path: String,
    /// Set by [`SiteTree::analyze`].
    pub title: Option<String>,
    /// File name of the index page, set by [`SiteTree::analyze`].
    pub index_page: Option<String>,
    pub pages: BTreeMap<String, Page>,
    pub dirs: BTreeMap<String, DirId>,
}

impl Directory {
    pub fn from_path(path: &str) -> Self {
        Self {
            path: dir_path(path),
            title: None,
            index_page: None,
            pages: BTreeMap::new(),
            dirs: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> Option<&Page> {
        self.index_page.as_ref().and_then(|name| self.pages.get(name))
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED_DIRECTORY)
    }
}

#[derive(Debug, Clone)]
pub struct SiteTree {
    dirs: Vec<Directory>,
    by_path: HashMap<String, DirId>,
}

impl Default for SiteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteTree {
    pub const ROOT: DirId = DirId(0);

    /// An empty tree holding only the root directory `/`.
    pub fn new() -> Self {
        let root = Directory::from_path("/");
        let by_path = HashMap::from([(root.path.clone(), Self::ROOT)]);
        Self {
            dirs: vec![root],
            by_path,
        }
    }

    pub fn root(&self) -> &Directory {
        self.dir(Self::ROOT)
    }

    pub fn dir(&self, id: DirId) -> &Directory {
        &self.dirs[id.0]
    }

    /// Insert a page under the root. Returns `false` if the page's path is
    /// not under the tree.
    #[must_use]
    pub fn add_page(&mut self, page: Page) -> bool {
        self.add_page_to(Self::ROOT, page)
    }

    /// Insert a page at the correct depth below `id`, creating intermediate
    /// directories on demand. A page with the same file name is replaced.
    #[must_use]
    pub fn add_page_to(&mut self, id: DirId, page: Page) -> bool {
        let dir_path = &self.dirs[id.0].path;
        if !page.path.starts_with(dir_path.as_str()) {
            return false;
        }
        if page.path == *dir_path {
            self.dirs[id.0].pages.insert(page.filename.clone(), page);
            return true;
        }

        let Some(segment) = page.path[dir_path.len()..]
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
        else {
            return false;
        };
        let segment = segment.to_string();
        let child = match self.dirs[id.0].dirs.get(&segment) {
            Some(&child) => child,
            None => self.create_dir(id, &segment),
        };
        self.add_page_to(child, page)
    }

    fn create_dir(&mut self, parent: DirId, segment: &str) -> DirId {
        let path = format!("{}{segment}/", self.dirs[parent.0].path);
        let id = DirId(self.dirs.len());
        self.dirs.push(Directory::from_path(&path));
        self.by_path.insert(self.dirs[id.0].path.clone(), id);
        self.dirs[parent.0].dirs.insert(segment.to_string(), id);
        id
    }

    /// Find a directory by URL path; exact first, then case-insensitive.
    pub fn dir_id(&self, path: &str) -> Option<DirId> {
        let path = dir_path(path);
        if let Some(&id) = self.by_path.get(&path) {
            return Some(id);
        }
        self.by_path
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(&path))
            .map(|(_, &id)| id)
    }

    pub fn get_dir(&self, path: &str) -> Option<&Directory> {
        self.dir_id(path).map(|id| self.dir(id))
    }

    /// Find a page by link, case-insensitively. A link ending in `/` resolves
    /// to that directory's `index.html`.
    pub fn get_page(&self, link: &str) -> Option<&Page> {
        let mut link = if link.starts_with('/') {
            link.to_string()
        } else {
            format!("/{link}")
        };
        if link.ends_with('/') {
            link.push_str("index.html");
        }

        let (dir, filename) = link.rsplit_once('/')?;
        let dir = self.get_dir(dir)?;
        dir.pages.get(filename).or_else(|| {
            dir.pages
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(filename))
                .map(|(_, page)| page)
        })
    }

    /// Remove the page stored as `filename` in the directory at `path`.
    pub fn remove_page(&mut self, path: &str, filename: &str) -> Option<Page> {
        let id = self.dir_id(path)?;
        self.dirs[id.0].pages.remove(filename)
    }

    /// Resolve index pages and directory titles.
    ///
    /// `hook` runs on every page before its directory's title is taken, so it
    /// may adjust page metadata.
    pub fn analyze(&mut self, id: DirId, recursive: bool, hook: &mut dyn FnMut(&mut Page)) {
        let dir = &mut self.dirs[id.0];
        dir.index_page = None;
        dir.title = None;
        for (name, page) in dir.pages.iter_mut() {
            hook(page);
            if dir.index_page.is_none() && page.is_index() {
                dir.index_page = Some(name.clone());
                dir.title = Some(page.title.clone());
            }
        }
        if dir.title.is_none() {
            dir.title = Some(UNTITLED_DIRECTORY.to_string());
        }

        if recursive {
            let children: Vec<DirId> = dir.dirs.values().copied().collect();
            for child in children {
                self.analyze(child, recursive, hook);
            }
        }
    }

    /// Call `render` for every page in the directory, then its children.
    pub fn render_pages<E>(
        &self,
        id: DirId,
        recursive: bool,
        render: &mut dyn FnMut(&Page) -> Result<(), E>,
    ) -> Result<(), E> {
        let dir = self.dir(id);
        for page in dir.pages.values() {
            render(page)?;
        }
        if recursive {
            for &child in dir.dirs.values() {
                self.render_pages(child, recursive, render)?;
            }
        }
        Ok(())
    }

    /// Total number of pages in the tree.
    pub fn page_count(&self) -> usize {
        self.dirs.iter().map(|dir| dir.pages.len()).sum()
    }

    /// JSON view of the tree for templates:
    /// `{ path, title, index_page, pages: { name: page }, dirs: { segment: ... } }`.
    pub fn sitemap(&self) -> Value {
        self.sitemap_of(Self::ROOT)
    }

    fn sitemap_of(&self, id: DirId) -> Value {
        let dir = self.dir(id);
        let pages: Map<String, Value> = dir
            .pages
            .iter()
            .map(|(name, page)| {
                let value = serde_json::to_value(page).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        let dirs: Map<String, Value> = dir
            .dirs
            .iter()
            .map(|(segment, &child)| (segment.clone(), self.sitemap_of(child)))
            .collect();

        let mut map = Map::new();
        map.insert("path".into(), Value::String(dir.path.clone()));
        map.insert("title".into(), Value::String(dir.title().to_string()));
        map.insert(
            "index_page".into(),
            dir.index_page.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert("pages".into(), Value::Object(pages));
        map.insert("dirs".into(), Value::Object(dirs));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn page(name: &str, web_path: &str, content: &str) -> Page {
        Page::from_source(content, Path::new(name), Path::new("out"), web_path)
    }

    fn sample_tree() -> SiteTree {
        let mut tree = SiteTree::new();
        assert!(tree.add_page(page("index.md", "/", "---\ntitle: Home\n---\n")));
        assert!(tree.add_page(page("intro.md", "/docs", "x")));
        assert!(tree.add_page(page("index.md", "/docs", "# Documentation")));
        assert!(tree.add_page(page("methods.md", "/docs/api/v2", "x")));
        tree
    }

    #[test]
    fn test_from_path_normalizes() {
        assert_eq!(Directory::from_path("docs").path, "/docs/");
        assert_eq!(Directory::from_path("/docs/").path, "/docs/");
        assert_eq!(Directory::from_path("").path, "/");
    }

    #[test]
    fn test_get_page_round_trip() {
        let tree = sample_tree();
        for link in ["/index.html", "/docs/intro.html", "/docs/index.html", "/docs/api/v2/methods.html"] {
            let found = tree.get_page(link).unwrap();
            assert_eq!(found.link, link);
        }
        assert_eq!(tree.page_count(), 4);
    }

    #[test]
    fn test_get_page_index_and_case() {
        let tree = sample_tree();
        assert_eq!(tree.get_page("/docs/").unwrap().link, "/docs/index.html");
        assert_eq!(tree.get_page("/").unwrap().link, "/index.html");
        assert_eq!(tree.get_page("/DOCS/Intro.HTML").unwrap().link, "/docs/intro.html");
        assert!(tree.get_page("/docs/missing.html").is_none());
    }

    #[test]
    fn test_intermediate_directories_created() {
        let tree = sample_tree();
        let api = tree.get_dir("/docs/api").unwrap();
        assert!(api.pages.is_empty());
        assert_eq!(api.dirs.len(), 1);
        assert!(tree.get_dir("docs/api/v2/").is_some());
    }

    #[test]
    fn test_paths_are_prefixes() {
        let tree = sample_tree();
        for dir in &tree.dirs {
            for page in dir.pages.values() {
                assert!(page.path.starts_with(&dir.path));
            }
            for &child in dir.dirs.values() {
                assert!(tree.dir(child).path.starts_with(&dir.path));
            }
        }
        assert_eq!(tree.dirs.iter().filter(|d| d.path == "/").count(), 1);
    }

    #[test]
    fn test_add_page_rejects_foreign_path() {
        let mut tree = sample_tree();
        let docs = tree.dir_id("/docs").unwrap();
        assert!(!tree.add_page_to(docs, page("x.md", "/blog", "x")));
    }

    #[test]
    fn test_remove_page() {
        let mut tree = sample_tree();
        assert!(tree.get_page("/docs/intro.html").is_some());
        assert!(tree.remove_page("/docs", "intro.html").is_some());
        assert!(tree.get_page("/docs/intro.html").is_none());
        assert!(tree.remove_page("/docs", "intro.html").is_none());
        assert!(tree.remove_page("/missing", "intro.html").is_none());
    }

    #[test]
    fn test_add_page_replaces_same_filename() {
        let mut tree = sample_tree();
        assert!(tree.add_page(page("intro.md", "/docs", "---\ntitle: New\n---\n")));
        assert_eq!(tree.get_page("/docs/intro.html").unwrap().title, "New");
        assert_eq!(tree.page_count(), 4);
    }

    #[test]
    fn test_analyze_titles() {
        let mut tree = sample_tree();
        let mut seen = 0;
        tree.analyze(SiteTree::ROOT, true, &mut |_| seen += 1);
        assert_eq!(seen, 4);
        assert_eq!(tree.root().title(), "Home");
        assert_eq!(tree.get_dir("/docs").unwrap().title(), "Documentation");
        assert_eq!(tree.get_dir("/docs").unwrap().index_page.as_deref(), Some("index.html"));
        assert_eq!(tree.get_dir("/docs/api").unwrap().title(), UNTITLED_DIRECTORY);
    }

    #[test]
    fn test_analyze_non_recursive() {
        let mut tree = sample_tree();
        tree.analyze(SiteTree::ROOT, false, &mut |_| {});
        assert!(tree.get_dir("/docs").unwrap().title.is_none());
    }

    #[test]
    fn test_render_pages_visits_every_page() {
        let tree = sample_tree();
        let mut links = Vec::new();
        tree.render_pages::<()>(SiteTree::ROOT, true, &mut |page| {
            links.push(page.link.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            links,
            vec![
                "/index.html",
                "/docs/index.html",
                "/docs/intro.html",
                "/docs/api/v2/methods.html"
            ]
        );
    }

    #[test]
    fn test_sitemap_shape() {
        let mut tree = sample_tree();
        tree.analyze(SiteTree::ROOT, true, &mut |_| {});
        let sitemap = tree.sitemap();
        assert_eq!(sitemap["path"], "/");
        assert_eq!(sitemap["dirs"]["docs"]["title"], "Documentation");
        assert_eq!(sitemap["dirs"]["docs"]["pages"]["intro.html"]["link"], "/docs/intro.html");
    }
}
