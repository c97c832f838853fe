//! Per-page render context.
//!
//! A [`RenderContext`] is built fresh for every page render. Global state
//! (data, site info, sitemap) is borrowed; everything page-specific
//! (breadcrumb, siblings, content) is owned by the context and dropped with
//! it, so nothing carries over from one page to the next.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;
use tera::Context;

use super::page::Page;
use super::site::{DirId, SiteTree};

/// Site-wide values visible to every template as `site`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteInfo {
    /// Deployment sub-path (`/docs`), empty when served from the root.
    pub sub_path: String,
    /// Port of the live reload server when reload is enabled.
    pub live_reload_port: Option<u16>,
    pub generator: String,
}

/// A navigation entry inside a breadcrumb level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crumb {
    pub title: String,
    pub path: String,
    pub order: Option<f64>,
}

/// One ancestor directory of the current page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreadcrumbLevel {
    pub title: String,
    pub path: String,
    pub crumbs: Vec<Crumb>,
}

/// A page or child directory next to the current page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sibling {
    pub title: String,
    pub link: String,
    pub order: Option<f64>,
    pub notoc: bool,
    pub is_current_page: bool,
    pub is_dir: bool,
}

/// Everything a template sees while one page renders.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    pub data: &'a Value,
    pub site: &'a SiteInfo,
    pub sitemap: &'a Value,
    pub page: &'a Page,
    pub breadcrumb: Vec<BreadcrumbLevel>,
    pub siblings: Vec<Sibling>,
    /// Rendered page body; set once markdown has run.
    pub content: Option<String>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        tree: &SiteTree,
        page: &'a Page,
        data: &'a Value,
        site: &'a SiteInfo,
        sitemap: &'a Value,
    ) -> Self {
        let (breadcrumb, dir) = breadcrumb(tree, page);
        let siblings = dir.map(|dir| siblings(tree, dir, page)).unwrap_or_default();
        Self {
            data,
            site,
            sitemap,
            page,
            breadcrumb,
            siblings,
            content: None,
        }
    }

    pub fn to_tera(&self) -> Result<Context, tera::Error> {
        Context::from_serialize(self)
    }
}

/// Walk the page's path from the root, collecting one level per directory.
///
/// Also returns the page's own directory when the whole path resolved.
fn breadcrumb(tree: &SiteTree, page: &Page) -> (Vec<BreadcrumbLevel>, Option<DirId>) {
    let mut levels = Vec::new();
    let mut current = SiteTree::ROOT;

    for segment in page.path.split('/').filter(|s| !s.is_empty()) {
        let Some(&child) = tree.dir(current).dirs.get(segment) else {
            return (levels, None);
        };
        current = child;
        let dir = tree.dir(current);

        let mut crumbs: Vec<Crumb> = dir
            .pages
            .values()
            .filter(|p| !p.is_index() && !p.notoc)
            .map(|p| Crumb {
                title: p.title.clone(),
                path: p.link.clone(),
                order: p.order,
            })
            .collect();
        crumbs.extend(
            dir.dirs
                .values()
                .filter_map(|&id| tree.dir(id).index())
                .filter(|index| !index.notoc)
                .map(|index| Crumb {
                    title: index.title.clone(),
                    path: index.link.clone(),
                    order: index.order,
                }),
        );
        crumbs.sort_by(|a, b| by_order_then_title(a.order, &a.title, b.order, &b.title));

        levels.push(BreadcrumbLevel {
            title: dir.title().to_string(),
            path: dir.path.clone(),
            crumbs,
        });
    }

    if page.is_index() {
        levels.pop();
    }
    (levels, Some(current))
}

fn siblings(tree: &SiteTree, id: DirId, page: &Page) -> Vec<Sibling> {
    let dir = tree.dir(id);
    let mut siblings: Vec<Sibling> = dir
        .pages
        .values()
        .filter(|p| !p.is_index())
        .map(|p| Sibling {
            title: p.title.clone(),
            link: p.link.clone(),
            order: p.order,
            notoc: p.notoc,
            is_current_page: p.link == page.link,
            is_dir: false,
        })
        .collect();

    siblings.extend(dir.dirs.values().map(|&child| {
        let child = tree.dir(child);
        let index = child.index();
        Sibling {
            title: child.title().to_string(),
            link: child.path.clone(),
            order: index.and_then(|p| p.order),
            notoc: index.is_some_and(|p| p.notoc),
            is_current_page: false,
            is_dir: true,
        }
    }));

    siblings.sort_by(|a, b| by_order_then_title(a.order, &a.title, b.order, &b.title));
    siblings
}

/// Entries with an `order` come first, ascending; ties and unordered entries
/// sort by title.
fn by_order_then_title(a_order: Option<f64>, a_title: &str, b_order: Option<f64>, b_title: &str) -> Ordering {
    let by_order = match (a_order, b_order) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_order.then_with(|| a_title.cmp(b_title))
}
