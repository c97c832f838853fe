use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::task::JoinSet;

use crate::config::{Config, ConfigError, SourceDir, compile_pattern, compile_pattern_ignore_case};
use crate::util::dir_path;

use super::context::SiteInfo;
use super::data::gather_data;
use super::links::{CdnRewrite, LayoutRule, LinkRewriter};
use super::markdown::{MarkdownError, MarkdownRenderer};
use super::page::{Page, PageError};
use super::pipeline::{Pipeline, PipelineContext, PipelineError};
use super::site::SiteTree;
use super::styles::process_styles;
use super::templates::{TemplateError, TemplateSet, TemplateSources};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("markdown setup error: {0}")]
    Markdown(#[from] MarkdownError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse data file {path}: {message}")]
    Data { path: PathBuf, message: String },

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("failed to render {page}: {source}")]
    Render {
        page: String,
        #[source]
        source: PipelineError,
    },

    #[error("failed to process styles at {path}: {source}")]
    Style {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("style task failed: {0}")]
    StyleTask(#[from] tokio::task::JoinError),

    #[error("cannot rebuild {0}: the site has not been compiled")]
    NotCompiled(PathBuf),
}

/// Orchestrator stage currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    LoadingData,
    Compiling,
    Publishing,
    Watching,
}

/// Summary of a compile.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    pub pages: usize,
    pub style_files: usize,
    pub elapsed: Duration,
}

/// Everything produced by a successful compile. Replaced wholesale by the
/// next compile; incremental rebuilds only insert pages into `tree`.
struct Compiled {
    tree: SiteTree,
    templates: TemplateSet,
    sitemap: Value,
}

pub struct Builder {
    config: Config,
    state: BuildState,
    watching: bool,
    /// Number of compiles started.
    builds: u64,
    data: Value,
    site: SiteInfo,
    markdown: MarkdownRenderer,
    layout_rules: Vec<LayoutRule>,
    links: LinkRewriter,
    pipeline: Pipeline,
    compiled: Option<Compiled>,
}

impl Builder {
    /// Create a builder, compiling every pattern in the config.
    pub fn new(config: Config) -> Result<Self, BuildError> {
        let internal_links = config
            .internal_link_pattern
            .as_deref()
            .map(|pattern| compile_pattern("internal_link_pattern", pattern))
            .transpose()?;
        let markdown = MarkdownRenderer::new(&config.markdown, internal_links)?;

        let layout_rules = config
            .default_templates
            .iter()
            .map(|rule| {
                let web_path_regex = rule
                    .web_path_regex
                    .as_deref()
                    .map(|pattern| {
                        compile_pattern_ignore_case("default_templates.web_path_regex", pattern)
                    })
                    .transpose()?;
                Ok(LayoutRule {
                    web_path: rule.web_path.clone(),
                    web_path_regex,
                    template: rule.template.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let cdn = config
            .cdn
            .as_ref()
            .map(|cdn| {
                compile_pattern_ignore_case("cdn.pattern", &cdn.pattern).map(|pattern| CdnRewrite {
                    pattern,
                    uri: cdn.uri.clone(),
                })
            })
            .transpose()?;
        let links = LinkRewriter::new(config.site_subdir.clone(), cdn);
        let pipeline = Pipeline::default_pipeline();
        tracing::debug!(stages = ?pipeline.stage_names(), "render pipeline");

        let site = SiteInfo {
            sub_path: config.site_subdir.clone().unwrap_or_default(),
            live_reload_port: config.live_reload.enabled.then_some(config.live_reload.port),
            generator: format!("sitepile {}", env!("CARGO_PKG_VERSION")),
        };

        Ok(Self {
            config,
            state: BuildState::Idle,
            watching: false,
            builds: 0,
            data: Value::Object(Map::new()),
            site,
            markdown,
            layout_rules,
            links,
            pipeline,
            compiled: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Number of compiles started so far.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// The compiled site tree, if a compile has completed.
    pub fn tree(&self) -> Option<&SiteTree> {
        self.compiled.as_ref().map(|compiled| &compiled.tree)
    }

    /// Quiet period before a template change triggers a full rebuild;
    /// `None` when such rebuilds are disabled.
    pub fn quiet_period(&self) -> Option<Duration> {
        u64::try_from(self.config.rebuild_quiet_seconds)
            .ok()
            .map(Duration::from_secs)
    }

    pub(crate) fn set_watching(&mut self, watching: bool) {
        self.watching = watching;
        self.state = self.resting_state();
    }

    fn resting_state(&self) -> BuildState {
        if self.watching {
            BuildState::Watching
        } else {
            BuildState::Idle
        }
    }

    /// Data stage: load the global data files.
    ///
    /// Data is kept across compiles and only replaced by the next data stage.
    pub fn gather_data(&mut self) -> Result<(), BuildError> {
        tracing::info!("Stage: data");
        self.state = BuildState::LoadingData;
        let result = gather_data(&self.config.data_dirs);
        self.state = self.resting_state();

        let data = result?;
        tracing::info!(files = data.len(), "data loaded");
        self.data = Value::Object(data);
        Ok(())
    }

    /// Compile stage: rebuild the whole site from scratch.
    ///
    /// Templates are loaded before any content is read, and every template
    /// is compiled before the first page renders. A failure leaves pages
    /// already written on disk.
    pub async fn compile(&mut self) -> Result<BuildResult, BuildError> {
        tracing::info!("Stage: compile");
        self.state = BuildState::Compiling;
        self.builds += 1;
        let result = self.compile_inner().await;
        self.state = self.resting_state();
        result
    }

    async fn compile_inner(&mut self) -> Result<BuildResult, BuildError> {
        let started = Instant::now();
        self.compiled = None;
        self.prepare_output()?;

        let phase = Instant::now();
        let sources = TemplateSources::load(
            &self.config.template_dirs.layouts,
            &self.config.template_dirs.partials,
            &self.config.template_extension,
        )?;
        tracing::debug!(elapsed_ms = phase.elapsed().as_millis() as u64, "templates loaded");

        // Dropping the set on an early return aborts the copy.
        let mut styles = JoinSet::new();
        styles.spawn(process_styles(
            self.config.style_dirs.clone(),
            self.config.styles_output(),
        ));

        let phase = Instant::now();
        let mut tree = SiteTree::new();
        for dir in &self.config.content_dirs {
            self.load_content_dir(dir, &mut tree)?;
        }
        tree.analyze(SiteTree::ROOT, true, &mut |_| {});
        let sitemap = tree.sitemap();
        tracing::info!(
            pages = tree.page_count(),
            elapsed_ms = phase.elapsed().as_millis() as u64,
            "content loaded"
        );

        let phase = Instant::now();
        let templates = TemplateSet::compile(
            &sources,
            &self.config.template_extension,
            &self.data,
            &self.site,
        )?;
        tracing::debug!(elapsed_ms = phase.elapsed().as_millis() as u64, "templates compiled");

        let compiled = self.compiled.insert(Compiled {
            tree,
            templates,
            sitemap,
        });

        let phase = Instant::now();
        let ctx = PipelineContext {
            tree: &compiled.tree,
            templates: &compiled.templates,
            markdown: &self.markdown,
            layout_rules: &self.layout_rules,
            links: &self.links,
            data: &self.data,
            site: &self.site,
            sitemap: &compiled.sitemap,
        };
        let pipeline = &self.pipeline;
        compiled.tree.render_pages(SiteTree::ROOT, true, &mut |page| {
            pipeline
                .render_page(page, &ctx)
                .map(|_| ())
                .map_err(|source| BuildError::Render {
                    page: page.link.clone(),
                    source,
                })
        })?;
        let pages = compiled.tree.page_count();
        tracing::info!(
            pages,
            elapsed_ms = phase.elapsed().as_millis() as u64,
            "pages rendered"
        );

        let style_files = match styles.join_next().await {
            Some(result) => result??,
            None => 0,
        };
        let elapsed = started.elapsed();
        tracing::info!(
            pages,
            style_files,
            build = self.builds,
            elapsed_ms = elapsed.as_millis() as u64,
            "compile finished"
        );

        Ok(BuildResult {
            output_dir: self.config.output_dirs.content.clone(),
            pages,
            style_files,
            elapsed,
        })
    }

    /// Publish stage: report what the compile produced.
    pub fn publish(&mut self) -> Result<usize, BuildError> {
        tracing::info!("Stage: publish");
        self.state = BuildState::Publishing;
        let pages = self.tree().map_or(0, SiteTree::page_count);
        tracing::info!(
            pages,
            output = %self.config.output_dirs.content.display(),
            "site published"
        );
        self.state = self.resting_state();
        Ok(pages)
    }

    /// The configured content directory a source file belongs to.
    pub fn content_dir_for(&self, path: &Path) -> Option<&SourceDir> {
        self.config
            .content_dirs
            .iter()
            .find(|dir| relative_to(path, &dir.source).is_some())
    }

    /// Load one changed source file into the existing tree and render only
    /// that page. Returns the written output path, or `None` when the page
    /// was skipped.
    pub fn rebuild_page(&mut self, dir: &SourceDir, path: &Path) -> Result<Option<PathBuf>, BuildError> {
        let compiled = self
            .compiled
            .as_mut()
            .ok_or_else(|| BuildError::NotCompiled(path.to_path_buf()))?;

        let page = load_source(&self.config, dir, path)?;
        let link = page.link.clone();
        let dest = page.dest_path.clone();
        let web_path = page.path.clone();

        if page.has_flag(&self.config.ignore_flags) {
            if compiled.tree.remove_page(&web_path, &page.filename).is_some() {
                if let Some(id) = compiled.tree.dir_id(&web_path) {
                    compiled.tree.analyze(id, false, &mut |_| {});
                }
                compiled.sitemap = compiled.tree.sitemap();
                remove_output(&dest)?;
                tracing::info!(page = %link, "page now ignored, removed from site");
            }
            return Ok(None);
        }

        if !compiled.tree.add_page(page) {
            tracing::warn!(page = %link, "page does not fit the site tree, skipping");
            return Ok(None);
        }
        if let Some(id) = compiled.tree.dir_id(&web_path) {
            compiled.tree.analyze(id, false, &mut |_| {});
        }
        compiled.sitemap = compiled.tree.sitemap();

        let Some(page) = compiled.tree.get_page(&link) else {
            return Ok(None);
        };
        let ctx = PipelineContext {
            tree: &compiled.tree,
            templates: &compiled.templates,
            markdown: &self.markdown,
            layout_rules: &self.layout_rules,
            links: &self.links,
            data: &self.data,
            site: &self.site,
            sitemap: &compiled.sitemap,
        };
        self.pipeline
            .render_page(page, &ctx)
            .map_err(|source| BuildError::Render {
                page: link.clone(),
                source,
            })?;
        tracing::info!(page = %link, "page rebuilt");
        Ok(Some(dest))
    }

    fn prepare_output(&self) -> Result<(), BuildError> {
        let output = &self.config.output_dirs.content;
        if self.config.output_dirs.clear_on_build && output.exists() {
            tracing::debug!(path = %output.display(), "clearing output directory");
            std::fs::remove_dir_all(output).map_err(|source| BuildError::Io {
                path: output.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(output).map_err(|source| BuildError::Io {
            path: output.clone(),
            source,
        })
    }

    /// Walk one content directory, inserting every markdown file into `tree`.
    fn load_content_dir(&self, dir: &SourceDir, tree: &mut SiteTree) -> Result<(), BuildError> {
        if !dir.source.is_dir() {
            tracing::warn!(path = %dir.source.display(), "content directory not found, skipping");
            return Ok(());
        }

        let mut pending = vec![dir.source.clone()];
        while let Some(current) = pending.pop() {
            for path in sorted_entries(&current)? {
                if path.is_dir() {
                    if dir.recursive {
                        pending.push(path);
                    }
                    continue;
                }
                if !is_markdown(&path) {
                    continue;
                }
                let Some(page) = load_page(&self.config, dir, &path)? else {
                    continue;
                };
                let link = page.link.clone();
                if !tree.add_page(page) {
                    tracing::warn!(page = %link, "page does not fit the site tree, skipping");
                }
            }
        }
        Ok(())
    }
}

/// Load a page from a content directory, or `None` when an ignore flag is set.
fn load_page(config: &Config, dir: &SourceDir, path: &Path) -> Result<Option<Page>, BuildError> {
    let page = load_source(config, dir, path)?;
    if page.has_flag(&config.ignore_flags) {
        tracing::debug!(page = %page.link, "ignored by front matter flag");
        return Ok(None);
    }
    Ok(Some(page))
}

/// Load a page from a content directory, placing it by its relative path.
fn load_source(config: &Config, dir: &SourceDir, path: &Path) -> Result<Page, BuildError> {
    let relative_dir = path
        .parent()
        .and_then(|parent| relative_to(parent, &dir.source))
        .unwrap_or_default();
    let segments: Vec<String> = std::iter::once(dir.dest.trim_matches('/').to_string())
        .chain(
            relative_dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
        .filter(|segment| !segment.is_empty())
        .collect();

    let web_path = dir_path(&segments.join("/"));
    let dest_dir = segments
        .iter()
        .fold(config.output_dirs.content.clone(), |dest, segment| dest.join(segment));

    Page::load(path, &dest_dir, &web_path)
        .map_err(|PageError::Read { path, source }| BuildError::Io { path, source })
}

fn remove_output(dest: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(dest) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(BuildError::Io {
            path: dest.to_path_buf(),
            source: err,
        }),
        _ => Ok(()),
    }
}

/// `path` relative to `base`, also trying `base` canonicalized since
/// watchers report canonical paths.
fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Some(relative.to_path_buf());
    }
    let canonical = base.canonicalize().ok()?;
    path.strip_prefix(canonical).ok().map(Path::to_path_buf)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let io_error = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{OutputDirs, TemplateDirs};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    pub(crate) struct Site {
        pub dir: TempDir,
    }

    impl Site {
        pub fn new() -> Self {
            let site = Self {
                dir: TempDir::new().unwrap(),
            };
            site.write(
                "templates/layouts/default.html",
                "<h1>{{ page.title }}</h1>{% for c in breadcrumb %}[{{ c.title }}]{% endfor %}{{ content }}",
            );
            site.write("templates/partials/footer.html", "(c) {{ data.site.owner }}");
            site.write("data/site.yaml", "owner: ACME\n");
            site.write("content/index.md", "---\ntitle: Home\n---\nWelcome {{ partial(name=\"footer\") }}");
            site.write("content/guide/index.md", "# Guide\n\nStart here.");
            site.write("content/guide/setup.md", "---\norder: 1\n---\n[About](/about.html)");
            site.write("content/draft.md", "---\ndraft: true\n---\nhidden");
            site.write("styles/site.css", "body {}");
            site
        }

        pub fn path(&self, relative: &str) -> PathBuf {
            self.dir.path().join(relative)
        }

        pub fn write(&self, relative: &str, content: &str) {
            let path = self.path(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        pub fn read(&self, relative: &str) -> String {
            std::fs::read_to_string(self.path(relative)).unwrap()
        }

        pub fn config(&self) -> Config {
            Config {
                data_dirs: vec![self.path("data")],
                template_dirs: TemplateDirs {
                    layouts: vec![self.path("templates/layouts")],
                    partials: vec![self.path("templates/partials")],
                },
                template_extension: "html".to_string(),
                content_dirs: vec![SourceDir {
                    source: self.path("content"),
                    dest: String::new(),
                    recursive: true,
                }],
                style_dirs: vec![SourceDir {
                    source: self.path("styles"),
                    dest: String::new(),
                    recursive: true,
                }],
                output_dirs: OutputDirs {
                    content: self.path("build"),
                    styles: None,
                    clear_on_build: false,
                },
                site_subdir: Some("/docs".to_string()),
                internal_link_pattern: None,
                cdn: None,
                default_templates: Vec::new(),
                ignore_flags: vec!["draft".to_string()],
                rebuild_quiet_seconds: 0,
                markdown: Default::default(),
                live_reload: Default::default(),
                watch: Default::default(),
            }
        }
    }

    async fn compiled_builder(site: &Site) -> Builder {
        let mut builder = Builder::new(site.config()).unwrap();
        builder.gather_data().unwrap();
        builder.compile().await.unwrap();
        builder
    }

    #[tokio::test]
    async fn test_compile_renders_whole_site() {
        let site = Site::new();
        let mut builder = Builder::new(site.config()).unwrap();
        builder.gather_data().unwrap();
        let result = builder.compile().await.unwrap();

        assert_eq!(result.pages, 3);
        assert_eq!(result.style_files, 1);
        assert_eq!(builder.state(), BuildState::Idle);
        assert_eq!(builder.builds(), 1);

        assert_eq!(
            site.read("build/index.html"),
            "<h1>Home</h1><p>Welcome (c) ACME</p>\n"
        );
        let setup = site.read("build/guide/setup.html");
        assert!(setup.starts_with("<h1>Setup</h1>[Guide]<p>"));
        assert!(setup.contains("href=\"/docs/about.html\""));
        assert!(setup.contains("target=\"_blank\""));
        assert!(!site.path("build/draft.html").exists());
        assert!(site.path("build/styles/site.css").exists());

        let tree = builder.tree().unwrap();
        assert_eq!(tree.get_dir("/guide/").unwrap().title(), "Guide");
        assert!(tree.get_page("/guide/").is_some());
    }

    #[tokio::test]
    async fn test_compile_is_idempotent() {
        let site = Site::new();
        let mut builder = compiled_builder(&site).await;
        let first = site.read("build/guide/setup.html");
        builder.compile().await.unwrap();
        assert_eq!(site.read("build/guide/setup.html"), first);
    }

    #[tokio::test]
    async fn test_rebuild_page_touches_only_that_page() {
        let site = Site::new();
        let mut builder = compiled_builder(&site).await;
        let index_before = std::fs::metadata(site.path("build/index.html"))
            .unwrap()
            .modified()
            .unwrap();
        let guide_before = site.read("build/guide/index.html");

        site.write("content/guide/setup.md", "---\norder: 1\n---\nUpdated text");
        let changed = site.path("content/guide/setup.md");
        let dir = builder.content_dir_for(&changed).cloned().unwrap();
        let written = builder.rebuild_page(&dir, &changed).unwrap();

        assert_eq!(written, Some(site.path("build/guide/setup.html")));
        assert!(site.read("build/guide/setup.html").contains("<p>Updated text</p>"));
        assert_eq!(site.read("build/guide/index.html"), guide_before);
        let index_after = std::fs::metadata(site.path("build/index.html"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(index_after, index_before);
    }

    #[tokio::test]
    async fn test_rebuild_new_page_joins_tree() {
        let site = Site::new();
        let mut builder = compiled_builder(&site).await;

        site.write("content/guide/faq.md", "Questions");
        let changed = site.path("content/guide/faq.md");
        let dir = builder.content_dir_for(&changed).cloned().unwrap();
        builder.rebuild_page(&dir, &changed).unwrap();

        assert!(builder.tree().unwrap().get_page("/guide/faq.html").is_some());
        assert!(site.read("build/guide/faq.html").contains("<h1>Faq</h1>"));
    }

    #[tokio::test]
    async fn test_rebuild_ignored_page_removes_it() {
        let site = Site::new();
        let mut builder = compiled_builder(&site).await;
        assert!(site.path("build/guide/setup.html").exists());

        site.write("content/guide/setup.md", "---\ndraft: true\n---\nNot ready");
        let changed = site.path("content/guide/setup.md");
        let dir = builder.content_dir_for(&changed).cloned().unwrap();
        let written = builder.rebuild_page(&dir, &changed).unwrap();

        assert_eq!(written, None);
        assert!(builder.tree().unwrap().get_page("/guide/setup.html").is_none());
        assert!(!site.path("build/guide/setup.html").exists());
        assert!(site.path("build/guide/index.html").exists());
    }

    #[tokio::test]
    async fn test_rebuild_of_still_ignored_page_is_a_no_op() {
        let site = Site::new();
        let mut builder = compiled_builder(&site).await;

        let changed = site.path("content/draft.md");
        let dir = builder.content_dir_for(&changed).cloned().unwrap();

        assert_eq!(builder.rebuild_page(&dir, &changed).unwrap(), None);
        assert!(!site.path("build/draft.html").exists());
    }

    #[tokio::test]
    async fn test_template_load_failure_copies_no_styles() {
        let site = Site::new();
        let mut config = site.config();
        config.template_dirs.layouts = vec![site.path("templates/absent")];
        let mut builder = Builder::new(config).unwrap();

        let err = builder.compile().await.unwrap_err();

        assert!(matches!(err, BuildError::Template(TemplateError::Io { .. })));
        assert!(!site.path("build/styles/site.css").exists());
        assert_eq!(builder.state(), BuildState::Idle);
    }

    #[tokio::test]
    async fn test_compile_recovers_after_template_failure() {
        let site = Site::new();
        std::fs::remove_file(site.path("templates/layouts/default.html")).unwrap();
        let mut builder = Builder::new(site.config()).unwrap();

        assert!(builder.compile().await.is_err());

        site.write("templates/layouts/default.html", "{{ content }}");
        builder.gather_data().unwrap();
        let result = builder.compile().await.unwrap();
        assert_eq!(result.style_files, 1);
        assert_eq!(builder.builds(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_before_compile_fails() {
        let site = Site::new();
        let mut builder = Builder::new(site.config()).unwrap();
        let changed = site.path("content/index.md");
        let dir = builder.content_dir_for(&changed).cloned().unwrap();
        let result = builder.rebuild_page(&dir, &changed);
        assert!(matches!(result, Err(BuildError::NotCompiled(_))));
    }

    #[tokio::test]
    async fn test_template_error_aborts_but_keeps_written_pages() {
        let site = Site::new();
        site.write("content/zzz.md", "{{ nope.nothing }}");
        let mut builder = Builder::new(site.config()).unwrap();
        builder.gather_data().unwrap();

        let err = builder.compile().await.unwrap_err();

        assert!(matches!(err, BuildError::Render { ref page, .. } if page == "/zzz.html"));
        assert!(site.path("build/index.html").exists());
        assert_eq!(builder.state(), BuildState::Idle);
    }

    #[tokio::test]
    async fn test_missing_default_layout() {
        let site = Site::new();
        std::fs::remove_file(site.path("templates/layouts/default.html")).unwrap();
        let mut builder = Builder::new(site.config()).unwrap();

        let err = builder.compile().await.unwrap_err();

        assert!(matches!(err, BuildError::Template(TemplateError::MissingDefaultLayout)));
    }

    #[tokio::test]
    async fn test_clear_on_build_removes_stale_output() {
        let site = Site::new();
        site.write("build/stale.html", "old");
        let mut config = site.config();
        config.output_dirs.clear_on_build = true;
        let mut builder = Builder::new(config).unwrap();
        builder.gather_data().unwrap();

        builder.compile().await.unwrap();

        assert!(!site.path("build/stale.html").exists());
        assert!(site.path("build/index.html").exists());
    }

    #[test]
    fn test_layout_and_cdn_patterns_ignore_case() {
        let site = Site::new();
        let mut config = site.config();
        config.site_subdir = None;
        config.default_templates = vec![crate::config::DefaultTemplate {
            web_path: None,
            web_path_regex: Some("^/blog/".to_string()),
            template: "post".to_string(),
        }];
        config.cdn = Some(crate::config::CdnConfig {
            pattern: r#"(src=")()(/images/)"#.to_string(),
            uri: "https://cdn.example.com".to_string(),
        });
        let builder = Builder::new(config).unwrap();

        let page = Page::from_source("x", Path::new("p.md"), Path::new("out"), "/Blog");
        let layout = crate::build::links::select_layout(&page, &builder.layout_rules, |name| {
            name == "post" || name == "default"
        });
        assert_eq!(layout, "post");
        assert_eq!(
            builder.links.rewrite(r#"<IMG SRC="/Images/a.png">"#),
            r#"<IMG SRC="https://cdn.example.com/Images/a.png">"#
        );
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let site = Site::new();
        let mut config = site.config();
        config.internal_link_pattern = Some("(".to_string());
        assert!(matches!(
            Builder::new(config),
            Err(BuildError::Config(ConfigError::Pattern { .. }))
        ));
    }

    #[test]
    fn test_content_dir_for_unknown_path() {
        let site = Site::new();
        let builder = Builder::new(site.config()).unwrap();
        assert!(builder.content_dir_for(&site.path("elsewhere/x.md")).is_none());
    }

    #[test]
    fn test_quiet_period() {
        let site = Site::new();
        let mut config = site.config();
        config.rebuild_quiet_seconds = 30;
        assert_eq!(
            Builder::new(config.clone()).unwrap().quiet_period(),
            Some(Duration::from_secs(30))
        );
        config.rebuild_quiet_seconds = -1;
        assert_eq!(Builder::new(config).unwrap().quiet_period(), None);
    }
}
