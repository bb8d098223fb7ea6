//! Loading a site from its directory.
//!
//! Items come from `content/`, layouts from `layouts/` and code snippets
//! from `lib/`. An identifier is the file's path relative to its directory
//! with a leading `/`. Textual files may open with a `+++` fenced TOML
//! block holding the attributes.

use std::path::{Path, PathBuf};

use kiln_cache::Cache;
use kiln_common::Identifier;
use kiln_compiler::RuleSet;
use kiln_model::{Attributes, CodeSnippet, Content, Item, Layout, Site};

use crate::GlobalArgs;

/// Directory holding the items.
pub const CONTENT_DIR: &str = "content";
/// Directory holding the layouts.
pub const LAYOUTS_DIR: &str = "layouts";
/// Directory holding the code snippets.
pub const LIB_DIR: &str = "lib";
/// Cache directory, relative to the site directory.
pub const CACHE_DIR: &str = "tmp/kiln";

const FENCE: &str = "+++";

/// Result type used at the command boundary.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Everything a command needs to work on a site.
pub struct LoadedSite {
    /// Site directory.
    pub dir: PathBuf,
    /// The site.
    pub site: Site,
    /// Compilation rules.
    pub rules: RuleSet,
}

impl LoadedSite {
    /// Opens the persistent store of the site.
    pub fn open_cache(&self) -> Cache {
        Cache::load_or_create(&self.dir.join(CACHE_DIR), env!("CARGO_PKG_VERSION"))
    }
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_site_root(start: &Path) -> CliResult<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(kiln_config::CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {} in {} or any parent directory",
                kiln_config::CONFIG_FILE,
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the site directory: `--site` if given, otherwise the nearest
/// enclosing site.
pub fn resolve_site_dir(global: &GlobalArgs) -> CliResult<PathBuf> {
    match &global.site {
        Some(dir) => Ok(dir.clone()),
        None => find_site_root(&std::env::current_dir()?),
    }
}

/// Loads the configuration, documents and rules of the site in `dir`.
pub fn load(dir: &Path) -> CliResult<LoadedSite> {
    let site = load_site(dir)?;
    let kind = site.config.pattern_kind()?;
    let rules_file = kiln_config::load_rules(dir, kind)?;
    let rules = RuleSet::from_file(&rules_file, kind)?;
    Ok(LoadedSite {
        dir: dir.to_path_buf(),
        site,
        rules,
    })
}

/// Loads the configuration and documents of the site in `dir`.
pub fn load_site(dir: &Path) -> CliResult<Site> {
    let config = kiln_config::load_site_config(dir)?;
    let text_extensions = config.text_extensions();

    let items: Vec<Item> = read_documents(&dir.join(CONTENT_DIR), &text_extensions)?
        .into_iter()
        .map(|d| Item::new(d.content, d.attributes, d.identifier))
        .collect();
    let layouts: Vec<Layout> = read_documents(&dir.join(LAYOUTS_DIR), &text_extensions)?
        .into_iter()
        .map(|d| Layout::new(d.content, d.attributes, d.identifier))
        .collect();
    let snippets = read_snippets(dir)?;

    tracing::debug!(
        items = items.len(),
        layouts = layouts.len(),
        snippets = snippets.len(),
        "loaded site"
    );
    Ok(Site::new(config, items, layouts, snippets)?)
}

struct RawDocument {
    identifier: Identifier,
    content: Content,
    attributes: Attributes,
}

fn read_documents(root: &Path, text_extensions: &[String]) -> CliResult<Vec<RawDocument>> {
    let mut docs = Vec::new();
    for path in discover_files(root)? {
        let identifier = identifier_for(root, &path)?;
        let doc = if is_textual(&path, text_extensions) {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let (attributes, body) = split_front_matter(&text)
                .map_err(|e| format!("invalid front matter in {}: {e}", path.display()))?;
            RawDocument {
                identifier,
                content: Content::Textual(body.to_string()),
                attributes,
            }
        } else {
            RawDocument {
                identifier,
                content: Content::Binary(path),
                attributes: Attributes::new(),
            }
        };
        docs.push(doc);
    }
    docs.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(docs)
}

fn read_snippets(dir: &Path) -> CliResult<Vec<CodeSnippet>> {
    let root = dir.join(LIB_DIR);
    let mut snippets = Vec::new();
    for path in discover_files(&root)? {
        let data = std::fs::read_to_string(&path)?;
        let name = format!("{LIB_DIR}{}", identifier_for(&root, &path)?);
        snippets.push(CodeSnippet::new(data, name));
    }
    Ok(snippets)
}

/// Every file under `root`, sorted by path. A missing directory is empty.
fn discover_files(root: &Path) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if root.is_dir() {
        walk_dir(root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> CliResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn identifier_for(root: &Path, path: &Path) -> CliResult<Identifier> {
    let rel = path.strip_prefix(root)?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(Identifier::new(format!("/{}", parts.join("/")))?)
}

fn is_textual(path: &Path, text_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| text_extensions.iter().any(|t| t == ext))
}

/// Splits a leading `+++` block off `text` and parses it as TOML.
fn split_front_matter(text: &str) -> Result<(Attributes, &str), toml::de::Error> {
    let Some(rest) = text
        .strip_prefix("+++\n")
        .or_else(|| text.strip_prefix("+++\r\n"))
    else {
        return Ok((Attributes::new(), text));
    };
    let (header, after) = match rest.strip_prefix(FENCE) {
        Some(after) => ("", after),
        None => match rest.find("\n+++") {
            Some(end) => (&rest[..end], &rest[end + 1 + FENCE.len()..]),
            // No closing fence: the whole file is content.
            None => return Ok((Attributes::new(), text)),
        },
    };
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);
    Ok((toml::from_str(header)?, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_model::{Document, Value};
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn front_matter_is_split_off() {
        let (attrs, body) = split_front_matter("+++\ntitle = \"Hi\"\ndraft = true\n+++\nbody\n").unwrap();
        assert_eq!(attrs.get("title"), Some(&Value::from("Hi")));
        assert_eq!(attrs.get("draft"), Some(&Value::from(true)));
        assert_eq!(body, "body\n");
    }

    #[test]
    fn front_matter_edge_cases() {
        let (attrs, body) = split_front_matter("just text").unwrap();
        assert!(attrs.is_empty());
        assert_eq!(body, "just text");

        let (attrs, body) = split_front_matter("+++\n+++\nbody").unwrap();
        assert!(attrs.is_empty());
        assert_eq!(body, "body");

        let (attrs, body) = split_front_matter("+++\nnever closed").unwrap();
        assert!(attrs.is_empty());
        assert_eq!(body, "+++\nnever closed");

        assert!(split_front_matter("+++\nnot toml at all\n+++\n").is_err());
    }

    #[test]
    fn loads_site_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "kiln.toml", b"title = \"Blog\"\n");
        write(root, "content/index.md", b"+++\ntitle = \"Home\"\n+++\nWelcome");
        write(root, "content/about.md", b"About");
        write(root, "content/img/logo.png", &[0x89, 0x50, 0x4e, 0x47]);
        write(root, "layouts/default.html", b"<main>{{ yield }}</main>");
        write(root, "lib/helpers.rs", b"fn helper() {}");

        let site = load_site(root).unwrap();
        let ids: Vec<&str> = site.items.identifiers().map(Identifier::as_str).collect();
        assert_eq!(ids, vec!["/about.md", "/img/logo.png", "/index.md"]);

        let index = site.items.get(&Identifier::new("/index.md").unwrap()).unwrap();
        assert_eq!(index.content().as_text(), Some("Welcome"));
        assert_eq!(index.attribute("title"), Some(&Value::from("Home")));

        let logo = site
            .items
            .get(&Identifier::new("/img/logo.png").unwrap())
            .unwrap();
        assert!(logo.content().is_binary());

        assert!(site
            .layouts
            .contains(&Identifier::new("/default.html").unwrap()));
        assert_eq!(site.code_snippets.len(), 1);
        assert_eq!(site.config.get("title"), Some(&Value::from("Blog")));
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_site(dir.path()).is_err());
    }

    #[test]
    fn site_root_is_found_upwards() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "kiln.toml", b"");
        let nested = dir.path().join("content/posts");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_site_root(&nested).unwrap(), dir.path());
    }
}
