use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::{AuthorConfig, Config};
use crate::schema::PackageSchema;
use crate::writer::write_content;

/// Placeholder until the assembler wires up `tests.js`
pub const PLACEHOLDER_TEST_SCRIPT: &str = "echo \"Error: no test specified\" && exit 1";

#[derive(Debug, Serialize)]
struct PackageJson<'a> {
    name: &'a str,
    version: &'static str,
    description: &'a str,
    main: &'static str,
    scripts: Scripts,
    repository: Repository,
    keywords: Vec<String>,
    author: Author<'a>,
    license: &'static str,
    bugs: Bugs,
    homepage: String,
}

#[derive(Debug, Serialize)]
struct Scripts {
    test: String,
}

#[derive(Debug, Serialize)]
struct Repository {
    #[serde(rename = "type")]
    kind: &'static str,
    url: String,
}

#[derive(Debug, Serialize)]
struct Author<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct Bugs {
    url: String,
}

fn keywords(name: &str, prefix: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let candidates = std::iter::once(prefix).chain(name.split(['-', '.', '_']));
    for word in candidates {
        let word = word.trim().to_lowercase();
        if !word.is_empty() && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

pub fn render_package_json(schema: &PackageSchema, prefix: &str, config: &Config) -> Result<String> {
    let repo = config.github.repo_url(&schema.name);
    let manifest = PackageJson {
        name: &schema.name,
        version: "1.0.0",
        description: &schema.description,
        main: "index.js",
        scripts: Scripts {
            test: PLACEHOLDER_TEST_SCRIPT.to_string(),
        },
        repository: Repository {
            kind: "git",
            url: format!("git+{}.git", repo),
        },
        keywords: keywords(&schema.name, prefix),
        author: Author {
            name: &config.author.name,
            url: &config.author.url,
        },
        license: "MIT",
        bugs: Bugs {
            url: format!("{}/issues", repo),
        },
        homepage: format!("{}#readme", repo),
    };
    let mut json = serde_json::to_string_pretty(&manifest)?;
    json.push('\n');
    Ok(json)
}

fn credit_line(author: &AuthorConfig) -> Option<String> {
    let link = |name: &str, url: &str| {
        if url.is_empty() {
            name.to_string()
        } else {
            format!("[{}]({})", name, url)
        }
    };
    let mut parts = Vec::new();
    if !author.name.is_empty() {
        parts.push(link(&author.name, &author.url));
    }
    if !author.org_name.is_empty() {
        parts.push(link(&author.org_name, &author.org_url));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("Built by {}.", parts.join(" at ")))
    }
}

/// README for the functions that were actually written, in `written` order.
pub fn render_readme(schema: &PackageSchema, written: &[String], config: &Config) -> String {
    let functions: Vec<_> = written
        .iter()
        .filter_map(|name| schema.functions.iter().find(|f| &f.function_name == name))
        .collect();
    let names: Vec<&str> = functions.iter().map(|f| f.function_name.as_str()).collect();

    let mut readme = format!(
        "# {name}\n\n{description}\n\n## Installation\n\n```bash\nnpm install {name}\n```\n\n## Usage\n\n```js\nconst {{ {imports} }} = require(\"{name}\");\n```\n\n## Functions\n\n",
        name = schema.name,
        description = schema.description,
        imports = names.join(", "),
    );
    for function in &functions {
        readme.push_str(&format!(
            "- `{}`: {}\n",
            function.function_name, function.function_summary
        ));
    }
    if let Some(credit) = credit_line(&config.author) {
        readme.push_str(&format!("\n## Author\n\n{}\n", credit));
    }
    readme.push_str("\n## Tests\n");
    readme
}

/// Lay down `package.json` for a freshly proposed package.
pub fn scaffold_package(dir: &Path, schema: &PackageSchema, prefix: &str, config: &Config) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let package_json = dir.join("package.json");
    fs::write(&package_json, render_package_json(schema, prefix, config)?)
        .with_context(|| format!("Failed to write {}", package_json.display()))?;
    debug!("Wrote {}", package_json.display());
    Ok(())
}

/// Written once generation is over, so only functions that made it into the
/// package are documented. Test runs append their badges below.
pub fn write_readme(
    dir: &Path,
    schema: &PackageSchema,
    written: &[String],
    config: &Config,
) -> Result<()> {
    write_content(
        &dir.join("README.md"),
        &render_readme(schema, written, config),
        true,
    )
}
