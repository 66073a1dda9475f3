use crate::decompress;
use crate::versions::PkgVerCmp;
use reproducible_common::errors::*;
use reproducible_common::http::Client;
use std::collections::BTreeMap;
use std::fs;
use url::Url;

/// One source package as listed in a suite's `Sources` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub version: String,
}

impl SourceEntry {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> SourceEntry {
        SourceEntry {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Paragraph {
    package: Option<String>,
    version: Option<String>,
    extra_source_only: bool,
}

impl Paragraph {
    fn finish(self, out: &mut Vec<SourceEntry>) -> Result<()> {
        if self.extra_source_only {
            return Ok(());
        }
        match (self.package, self.version) {
            (None, None) => Ok(()),
            (Some(name), Some(version)) => {
                out.push(SourceEntry { name, version });
                Ok(())
            }
            (Some(name), None) => bail!("Missing version field for {:?}", name),
            (None, Some(_)) => bail!("Missing package field"),
        }
    }
}

/// Parse a deb822 `Sources` index into (name, version) pairs.
pub fn parse_sources(text: &str) -> Result<Vec<SourceEntry>> {
    let mut pkgs = Vec::new();
    let mut pkg = Paragraph::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            std::mem::take(&mut pkg).finish(&mut pkgs)?;
            continue;
        }
        // continuation lines of multi-line fields
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            match key {
                "Package" => pkg.package = Some(value.to_string()),
                "Version" => pkg.version = Some(value.to_string()),
                "Extra-Source-Only" => pkg.extra_source_only = value == "yes",
                _ => (),
            }
        }
    }
    pkg.finish(&mut pkgs)?;

    Ok(pkgs)
}

/// Collapse packages listed more than once to their greatest version.
pub fn dedup_greatest(pkgs: Vec<SourceEntry>) -> BTreeMap<String, SourceEntry> {
    let mut out = BTreeMap::<String, SourceEntry>::new();
    for pkg in pkgs {
        if let Some(existing) = out.get_mut(&pkg.name) {
            existing.bump_version(&pkg.version);
        } else {
            out.insert(pkg.name.clone(), pkg);
        }
    }
    out
}

/// Location of the `Sources.xz` index of a suite, either a url or a local path.
pub fn sources_location(mirror: &str, suite: &str, component: &str) -> Result<String> {
    if mirror.starts_with("https://") || mirror.starts_with("http://") {
        let mut base = Url::parse(mirror).with_context(|| anyhow!("Invalid mirror url: {:?}", mirror))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base.join(&format!("dists/{}/{}/source/Sources.xz", suite, component))?;
        Ok(url.to_string())
    } else {
        Ok(format!(
            "{}/dists/{}/{}/source/Sources.xz",
            mirror.trim_end_matches('/'),
            suite,
            component
        ))
    }
}

pub fn url_or_path(client: &Client, path: &str) -> Result<Vec<u8>> {
    let bytes = if path.starts_with("https://") || path.starts_with("http://") {
        info!("Downloading {:?}...", path);
        client
            .get(path)
            .send()?
            .error_for_status()?
            .bytes()?
            .to_vec()
    } else {
        info!("Reading {:?}...", path);
        fs::read(path).with_context(|| anyhow!("Failed to read {:?}", path))?
    };

    Ok(bytes)
}

/// Download and parse the source index of a suite.
pub fn fetch_sources(
    client: &Client,
    mirror: &str,
    component: &str,
    suite: &str,
) -> Result<Vec<SourceEntry>> {
    let location = sources_location(mirror, suite, component)?;
    let bytes = url_or_path(client, &location)?;

    info!("Decompressing...");
    let text = decompress::to_string(&bytes)?;
    let pkgs = parse_sources(&text)
        .with_context(|| anyhow!("Failed to parse source index {:?}", location))?;
    info!("Found {} source packages in {}", pkgs.len(), suite);
    Ok(pkgs)
}
