//! TOML manifest loading
//!
//! A manifest lists resources as `[[resource]]` tables:
//!
//! ```toml
//! [[resource]]
//! name = "motd"
//! module = "file"
//! depends_on = "banner-dir"
//! delay = 1
//!
//! [resource.params]
//! path = "/etc/motd"
//! content = { watch = "banner._target.hash", format = "build {}" }
//! ```
//!
//! Any table whose only keys are `watch`, `format` and `default` (with
//! `watch` present) becomes a deferred reference to another resource.

use anyhow::{Context, Result};
use converge::{Param, Resource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Placeholder replaced by the watched value in `format`
const PLACEHOLDER: &str = "{}";

/// Problems in an otherwise well-formed TOML manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("resource `{resource}`: `watch` must be a string path")]
    WatchNotString { resource: String },

    #[error("resource `{resource}`: `format` must be a string")]
    FormatNotString { resource: String },

    #[error("resource `{resource}`: `{field}` must not be empty")]
    Empty {
        resource: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default, rename = "resource")]
    resources: Vec<ResourceSpec>,
}

/// One `[[resource]]` table
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceSpec {
    name: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    params: toml::Table,
    #[serde(default)]
    depends_on: Option<DependsOn>,
    #[serde(default)]
    includes: Vec<ResourceSpec>,
    #[serde(default)]
    skip: Option<toml::Value>,
    #[serde(default)]
    delay: Option<toml::Value>,
}

/// `depends_on` accepts a single name or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependsOn {
    One(String),
    Many(Vec<String>),
}

impl DependsOn {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        }
    }
}

/// Load resources from a manifest file
pub fn load(path: &Path) -> Result<Vec<Resource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let resources =
        parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))?;
    log::debug!(
        "Loaded {} top-level resources from {}",
        resources.len(),
        path.display()
    );
    Ok(resources)
}

/// Parse manifest text into resource definitions
pub fn parse(content: &str) -> Result<Vec<Resource>> {
    let file: ManifestFile = toml::from_str(content).context("Failed to parse TOML")?;
    file.resources
        .into_iter()
        .map(|spec| build(spec).map_err(anyhow::Error::from))
        .collect()
}

fn build(spec: ResourceSpec) -> std::result::Result<Resource, ManifestError> {
    if spec.name.trim().is_empty() {
        return Err(ManifestError::Empty {
            resource: spec.name,
            field: "name",
        });
    }

    let name = spec.name;
    let mut resource = Resource::new(name.as_str());

    if let Some(module) = spec.module {
        if module.trim().is_empty() {
            return Err(ManifestError::Empty {
                resource: name,
                field: "module",
            });
        }
        resource = resource.with_module(module);
    }

    let mut params = BTreeMap::new();
    for (key, value) in spec.params {
        params.insert(key, to_param(&name, value)?);
    }
    resource = resource.with_params(Param::Map(params));

    for dependency in spec.depends_on.map(DependsOn::into_vec).unwrap_or_default() {
        resource = resource.depends_on(dependency);
    }
    if let Some(skip) = spec.skip {
        resource = resource.with_skip(to_param(&name, skip)?);
    }
    if let Some(delay) = spec.delay {
        resource = resource.with_delay(to_param(&name, delay)?);
    }
    for child in spec.includes {
        resource = resource.include(build(child)?);
    }

    Ok(resource)
}

/// Convert a TOML value, turning reference tables into deferred values
fn to_param(resource: &str, value: toml::Value) -> std::result::Result<Param, ManifestError> {
    Ok(match value {
        toml::Value::String(s) => Param::String(s),
        toml::Value::Integer(i) => Param::Int(i),
        toml::Value::Float(f) => Param::Float(f),
        toml::Value::Boolean(b) => Param::Bool(b),
        toml::Value::Datetime(dt) => Param::String(dt.to_string()),
        toml::Value::Array(items) => Param::List(
            items
                .into_iter()
                .map(|v| to_param(resource, v))
                .collect::<std::result::Result<_, _>>()?,
        ),
        toml::Value::Table(table) if is_reference(&table) => reference(resource, table)?,
        toml::Value::Table(table) => Param::Map(
            table
                .into_iter()
                .map(|(k, v)| Ok((k, to_param(resource, v)?)))
                .collect::<std::result::Result<_, ManifestError>>()?,
        ),
    })
}

fn is_reference(table: &toml::Table) -> bool {
    table.contains_key("watch")
        && table
            .keys()
            .all(|k| matches!(k.as_str(), "watch" | "format" | "default"))
}

/// Build the deferred value for `{ watch = "...", format = "...", default = ... }`
fn reference(resource: &str, mut table: toml::Table) -> std::result::Result<Param, ManifestError> {
    let path = match table.remove("watch") {
        Some(toml::Value::String(path)) if !path.is_empty() => path,
        _ => {
            return Err(ManifestError::WatchNotString {
                resource: resource.to_string(),
            });
        }
    };
    let format = match table.remove("format") {
        None => None,
        Some(toml::Value::String(format)) => Some(format),
        Some(_) => {
            return Err(ManifestError::FormatNotString {
                resource: resource.to_string(),
            });
        }
    };
    let default = table
        .remove("default")
        .map(|v| to_param(resource, v))
        .transpose()?;

    Ok(Param::deferred(format!("watch({path})"), move |_, registry| {
        registry
            .lookup(&path)
            .map(|found| match &format {
                Some(format) => Param::String(format.replace(PLACEHOLDER, &found.to_string())),
                None => found,
            })
            .or_else(|| default.clone())
    }))
}
