//! Layout and partial templates.
//!
//! Template files are loaded into a [`TemplateSource`] tree that mirrors the
//! template directories. [`compile_templates`] flattens that tree into Tera
//! template names (`layouts/api/reference`, `partials/nav`) while building a
//! [`CompiledTemplate`] tree of the same shape, so layouts can be looked up
//! by their slash-separated path.
//!
//! Helper functions available in every template:
//! - `partial(name="a/b", args=[...], ...)` renders a partial with `data`,
//!   `site`, `args` and any other named arguments in its context
//! - `env(name="HOME")` reads an environment variable, empty when unset
//! - `split_and_get(value="a/b/c", sep="/", pos=1)` splits and indexes
//! - `livereload()` emits the live reload script when enabled
//! - `url(path="/a.html")` prefixes the deployment sub-path

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use regex::Regex;
use serde_json::Value;
use tera::{Context, Function, Tera};

use super::context::SiteInfo;

/// Name the page body is registered under while it renders.
const PAGE_BODY: &str = "__page_body__";

/// A partial with this name is imported into every page body as `macros::`.
const MACROS_PARTIAL: &str = "macros";

/// Directives right after a backtick are shown literally, e.g. `` `{{ page.title }}` ``.
static QUOTED_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\})").unwrap());

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("template error: {}", describe(.0))]
    Tera(#[from] tera::Error),

    #[error("failed to read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no 'default' layout found")]
    MissingDefaultLayout,
}

/// Tera keeps the useful part of a message in the error's source chain.
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Template source text, nested like the directories it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Group(BTreeMap<String, TemplateSource>),
    Template(String),
}

/// A compiled template tree; leaves hold the Tera template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledTemplate {
    Group(BTreeMap<String, CompiledTemplate>),
    Template(String),
}

/// Layout and partial sources for one compile.
#[derive(Debug, Clone, Default)]
pub struct TemplateSources {
    pub layouts: BTreeMap<String, TemplateSource>,
    pub partials: BTreeMap<String, TemplateSource>,
}

impl TemplateSources {
    /// Read every template from the given directories. Later directories
    /// override files of the same name in earlier ones.
    pub fn load(
        layout_dirs: &[PathBuf],
        partial_dirs: &[PathBuf],
        extension: &str,
    ) -> Result<Self, TemplateError> {
        let mut sources = Self::default();
        for dir in layout_dirs {
            load_template_dir(dir, extension, &mut sources.layouts)?;
        }
        for dir in partial_dirs {
            load_template_dir(dir, extension, &mut sources.partials)?;
        }
        Ok(sources)
    }
}

/// Recursively load template files with the given extension from `dir`.
pub fn load_template_dir(
    dir: &Path,
    extension: &str,
    target: &mut BTreeMap<String, TemplateSource>,
) -> Result<(), TemplateError> {
    let io_error = |source| TemplateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            let group = target
                .entry(name)
                .or_insert_with(|| TemplateSource::Group(BTreeMap::new()));
            if let TemplateSource::Group(children) = group {
                load_template_dir(&path, extension, children)?;
            }
        } else if path.extension().is_some_and(|ext| ext == extension) {
            let content = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "loaded template");
            target.insert(name, TemplateSource::Template(content));
        }
    }
    Ok(())
}

/// Compile a source tree into `dest`, mirroring its nesting.
///
/// Keys lose their `.{extension}` suffix. Each template is queued in
/// `compiled` under `{prefix}/{path}` for registration with Tera.
pub fn compile_templates(
    source: &BTreeMap<String, TemplateSource>,
    prefix: &str,
    extension: &str,
    dest: &mut BTreeMap<String, CompiledTemplate>,
    compiled: &mut Vec<(String, String)>,
) {
    let suffix = format!(".{extension}");
    for (key, node) in source {
        match node {
            TemplateSource::Group(children) => {
                let group = dest
                    .entry(key.clone())
                    .or_insert_with(|| CompiledTemplate::Group(BTreeMap::new()));
                if let CompiledTemplate::Group(group) = group {
                    compile_templates(children, &format!("{prefix}/{key}"), extension, group, compiled);
                }
            }
            TemplateSource::Template(text) => {
                let key = key.strip_suffix(&suffix).unwrap_or(key);
                let name = format!("{prefix}/{key}");
                tracing::debug!(template = %name, "compiling template");
                dest.insert(key.to_string(), CompiledTemplate::Template(name.clone()));
                compiled.push((name, text.clone()));
            }
        }
    }
}

/// Resolve a slash-separated name to a Tera template name.
fn lookup<'a>(tree: &'a BTreeMap<String, CompiledTemplate>, name: &str) -> Option<&'a str> {
    let mut parts = name.split('/').filter(|part| !part.is_empty());
    let mut node = tree.get(parts.next()?)?;
    for part in parts {
        match node {
            CompiledTemplate::Group(children) => node = children.get(part)?,
            CompiledTemplate::Template(_) => return None,
        }
    }
    match node {
        CompiledTemplate::Template(name) => Some(name),
        CompiledTemplate::Group(_) => None,
    }
}

/// Compiled layouts and partials, immutable until the next full compile.
pub struct TemplateSet {
    tera: Arc<Tera>,
    layouts: BTreeMap<String, CompiledTemplate>,
    partials: BTreeMap<String, CompiledTemplate>,
}

impl TemplateSet {
    /// Compile all sources and register the helper functions.
    ///
    /// `data` and `site` are what partials rendered through `partial()` see.
    pub fn compile(
        sources: &TemplateSources,
        extension: &str,
        data: &Value,
        site: &SiteInfo,
    ) -> Result<Self, TemplateError> {
        let mut compiled = Vec::new();
        let mut layouts = BTreeMap::new();
        let mut partials = BTreeMap::new();
        compile_templates(&sources.layouts, "layouts", extension, &mut layouts, &mut compiled);
        compile_templates(&sources.partials, "partials", extension, &mut partials, &mut compiled);

        if lookup(&layouts, "default").is_none() {
            return Err(TemplateError::MissingDefaultLayout);
        }

        let mut tera = Tera::default();
        tera.register_function("env", env_fn);
        tera.register_function("split_and_get", split_and_get_fn);
        tera.register_function("livereload", LiveReloadFn::new(site.live_reload_port));
        tera.register_function("url", UrlFn::new(&site.sub_path));
        tera.add_raw_templates(compiled)?;

        let mut globals = Context::new();
        globals.insert("data", data);
        globals.insert("site", site);

        let partial_names = partials.clone();
        let tera = Arc::new_cyclic(move |weak: &Weak<Tera>| {
            tera.register_function(
                "partial",
                PartialFn {
                    tera: weak.clone(),
                    partials: partial_names,
                    globals,
                },
            );
            tera
        });

        Ok(Self {
            tera,
            layouts,
            partials,
        })
    }

    pub fn has_layout(&self, name: &str) -> bool {
        lookup(&self.layouts, name).is_some()
    }

    pub fn has_partial(&self, name: &str) -> bool {
        lookup(&self.partials, name).is_some()
    }

    /// Render a layout. Callers are expected to have checked [`Self::has_layout`].
    pub fn render_layout(&self, name: &str, context: &Context) -> Result<String, TemplateError> {
        let template = lookup(&self.layouts, name).ok_or(TemplateError::MissingDefaultLayout)?;
        Ok(self.tera.render(template, context)?)
    }

    /// Expand template directives in a page body.
    ///
    /// The body is compiled as a one-off template next to the layouts and
    /// partials, so `{% include %}`, macros and helpers all work in it.
    pub fn render_body(&self, body: &str, context: &Context) -> Result<String, TemplateError> {
        let mut source = String::with_capacity(body.len() + 64);
        if self.has_partial(MACROS_PARTIAL) {
            source.push_str(&format!(
                "{{% import \"partials/{MACROS_PARTIAL}\" as macros %}}"
            ));
        }
        source.push_str(&quote_literal_directives(body));

        let mut tera = Tera::clone(&self.tera);
        tera.add_raw_template(PAGE_BODY, &source)?;
        Ok(tera.render(PAGE_BODY, context)?)
    }
}

/// Wrap directives that follow a backtick in `{% raw %}` so they print as written.
pub fn quote_literal_directives(body: &str) -> String {
    QUOTED_DIRECTIVE
        .replace_all(body, "`{% raw %}$1{% endraw %}")
        .into_owned()
}

struct PartialFn {
    tera: Weak<Tera>,
    partials: BTreeMap<String, CompiledTemplate>,
    globals: Context,
}

impl Function for PartialFn {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("partial() requires a `name` argument"))?;
        let template = lookup(&self.partials, name)
            .ok_or_else(|| tera::Error::msg(format!("unknown partial '{name}'")))?;
        let tera = self
            .tera
            .upgrade()
            .ok_or_else(|| tera::Error::msg("templates are no longer available"))?;

        let mut context = self.globals.clone();
        context.insert("args", args.get("args").unwrap_or(&Value::Array(Vec::new())));
        for (key, value) in args {
            if key != "name" && key != "args" {
                context.insert(key.as_str(), value);
            }
        }

        tera.render(template, &context).map(Value::String)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

fn env_fn(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let name = args
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("env() requires a `name` argument"))?;
    Ok(Value::String(std::env::var(name).unwrap_or_default()))
}

fn split_and_get_fn(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let value = args.get("value").and_then(Value::as_str).unwrap_or("");
    let sep = args
        .get("sep")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("split_and_get() requires a `sep` argument"))?;
    let pos = args.get("pos").and_then(Value::as_u64);
    Ok(Value::String(split_and_get(value, sep, pos).to_string()))
}

/// Split `value` on `sep` and take the part at `pos`, or the last part when
/// `pos` is missing, zero or out of range.
pub fn split_and_get<'a>(value: &'a str, sep: &str, pos: Option<u64>) -> &'a str {
    if value.is_empty() || sep.is_empty() {
        return value;
    }
    let parts: Vec<&str> = value.split(sep).collect();
    pos.filter(|&pos| pos > 0)
        .and_then(|pos| usize::try_from(pos).ok())
        .and_then(|pos| parts.get(pos).copied())
        .or_else(|| parts.last().copied())
        .unwrap_or("")
}

struct LiveReloadFn {
    snippet: String,
}

impl LiveReloadFn {
    fn new(port: Option<u16>) -> Self {
        let snippet = port
            .map(|port| {
                format!(
                    "<script>document.write('<script src=\"http://' + (location.host || 'localhost').split(':')[0] + ':{port}/livereload.js?snipver=1\"></' + 'script>');</script>"
                )
            })
            .unwrap_or_default();
        Self { snippet }
    }
}

impl Function for LiveReloadFn {
    fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        Ok(Value::String(self.snippet.clone()))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

struct UrlFn {
    sub_path: String,
}

impl UrlFn {
    fn new(sub_path: &str) -> Self {
        Self {
            sub_path: sub_path.to_string(),
        }
    }
}

impl Function for UrlFn {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("url() requires a `path` argument"))?;
        let url = if path.starts_with('/') && !path.starts_with("//") {
            format!("{}{path}", self.sub_path)
        } else {
            path.to_string()
        };
        Ok(Value::String(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(text: &str) -> TemplateSource {
        TemplateSource::Template(text.to_string())
    }

    fn sources(layouts: &[(&str, &str)], partials: &[(&str, &str)]) -> TemplateSources {
        let to_tree = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(name, text)| (format!("{name}.html"), template(text)))
                .collect()
        };
        TemplateSources {
            layouts: to_tree(layouts),
            partials: to_tree(partials),
        }
    }

    fn site() -> SiteInfo {
        SiteInfo {
            sub_path: "/docs".to_string(),
            live_reload_port: None,
            generator: "test".to_string(),
        }
    }

    fn compile(sources: &TemplateSources) -> TemplateSet {
        TemplateSet::compile(sources, "html", &serde_json::json!({ "product": "Widget" }), &site())
            .unwrap()
    }

    #[test]
    fn test_compile_mirrors_nesting() {
        let mut source = BTreeMap::new();
        source.insert("default.html".to_string(), template("d"));
        source.insert(
            "api".to_string(),
            TemplateSource::Group(BTreeMap::from([("reference.html".to_string(), template("r"))])),
        );

        let mut dest = BTreeMap::new();
        let mut compiled = Vec::new();
        compile_templates(&source, "layouts", "html", &mut dest, &mut compiled);

        assert_eq!(lookup(&dest, "default"), Some("layouts/default"));
        assert_eq!(lookup(&dest, "api/reference"), Some("layouts/api/reference"));
        assert_eq!(lookup(&dest, "api"), None);
        assert_eq!(compiled.len(), 2);
    }

    #[test]
    fn test_load_template_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("default.html"), "layout").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("nested/inner.html"), "inner").unwrap();

        let mut target = BTreeMap::new();
        load_template_dir(dir.path(), "html", &mut target).unwrap();

        assert_eq!(target.get("default.html"), Some(&template("layout")));
        assert!(!target.contains_key("notes.txt"));
        assert!(matches!(
            target.get("nested"),
            Some(TemplateSource::Group(children)) if children.contains_key("inner.html")
        ));
    }

    #[test]
    fn test_missing_default_layout() {
        let result = TemplateSet::compile(&sources(&[("api", "x")], &[]), "html", &Value::Null, &site());
        assert!(matches!(result, Err(TemplateError::MissingDefaultLayout)));
    }

    #[test]
    fn test_partial_function_with_args() {
        let set = compile(&sources(
            &[("default", "{{ partial(name=\"card\", args=[\"a\", 2], kind=\"note\") }}")],
            &[("card", "{{ data.product }}:{{ args.0 }}:{{ args.1 }}:{{ kind }}")],
        ));
        let html = set.render_layout("default", &Context::new()).unwrap();
        assert_eq!(html, "Widget:a:2:note");
    }

    #[test]
    fn test_include_sees_page_context() {
        let set = compile(&sources(
            &[("default", "{% include \"partials/title\" %}")],
            &[("title", "<h1>{{ page.title }}</h1>")],
        ));
        let mut context = Context::new();
        context.insert("page", &serde_json::json!({ "title": "Hi" }));
        assert_eq!(set.render_layout("default", &context).unwrap(), "<h1>Hi</h1>");
    }

    #[test]
    fn test_body_uses_macros_and_escape_rule() {
        let set = compile(&sources(
            &[("default", "{{ content }}")],
            &[("macros", "{% macro note(text) %}NOTE: {{ text }}{% endmacro note %}")],
        ));
        let body = "{{ macros::note(text=\"hi\") }} and `{{ page.title }}`";
        let html = set.render_body(body, &Context::new()).unwrap();
        assert_eq!(html, "NOTE: hi and `{{ page.title }}`");
    }

    #[test]
    fn test_quote_literal_directives() {
        assert_eq!(
            quote_literal_directives("`{% if x %}` {{ y }}"),
            "`{% raw %}{% if x %}{% endraw %}` {{ y }}"
        );
    }

    #[test]
    fn test_helpers() {
        let set = compile(&sources(
            &[(
                "default",
                "{{ split_and_get(value=\"a/b/c\", sep=\"/\", pos=1) }}|{{ split_and_get(value=\"a/b/c\", sep=\"/\") }}|{{ url(path=\"/x.html\") }}|{{ livereload() }}|{{ env(name=\"SITEPILE_SURELY_UNSET_VAR\") }}",
            )],
            &[],
        ));
        let html = set.render_layout("default", &Context::new()).unwrap();
        assert_eq!(html, "b|c|/docs/x.html||");
    }

    #[test]
    fn test_split_and_get() {
        assert_eq!(split_and_get("a.b.c", ".", Some(0)), "c");
        assert_eq!(split_and_get("a.b.c", ".", Some(1)), "b");
        assert_eq!(split_and_get("a.b.c", ".", Some(9)), "c");
        assert_eq!(split_and_get("a.b.c", ".", None), "c");
        assert_eq!(split_and_get("", ".", None), "");
    }

    #[test]
    fn test_livereload_enabled() {
        let snippet = LiveReloadFn::new(Some(35729))
            .call(&HashMap::new())
            .unwrap();
        assert!(snippet.as_str().unwrap().contains(":35729/livereload.js"));
    }
}
