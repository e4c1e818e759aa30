//! Name extraction for the two map-editor plugin ecosystems.
//!
//! Plugins live under `<root>/entities/`, `<root>/triggers/` and
//! `<root>/effects/`. Only the registered names are extracted; the scripts
//! themselves are never interpreted.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveError, ArchiveHandle};

static AHORN_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@(?:mapdef|pardef)\s+\w+\s+"([^"]+)""#).expect("valid regex")
});

static LOENN_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*\w+\.name\s*=\s*"([^"]+)""#).expect("valid regex")
});

pub struct PluginEcosystem {
    /// Used in file names (`<file id>_<name>.yaml`).
    pub name: &'static str,
    /// Plugin root inside a mod archive.
    pub mod_root: &'static str,
    /// Plugin root inside the editor's own source archive, below its top directory.
    pub vanilla_root: &'static str,
    pub extension: &'static str,
    definition: &'static Lazy<Regex>,
}

impl std::fmt::Debug for PluginEcosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEcosystem")
            .field("name", &self.name)
            .finish()
    }
}

/// Ahorn (Julia).
pub static AHORN: PluginEcosystem = PluginEcosystem {
    name: "ahorn",
    mod_root: "Ahorn/",
    vanilla_root: "src/",
    extension: ".jl",
    definition: &AHORN_DEFINITION,
};

/// Lönn (Lua).
pub static LOENN: PluginEcosystem = PluginEcosystem {
    name: "loenn",
    mod_root: "Loenn/",
    vanilla_root: "src/",
    extension: ".lua",
    definition: &LOENN_DEFINITION,
};

pub static ECOSYSTEMS: [&PluginEcosystem; 2] = [&AHORN, &LOENN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluginKind {
    Entity,
    Trigger,
    Effect,
}

/// Names exposed by one archive (or the vanilla baseline) for one ecosystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntities {
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub triggers: BTreeSet<String>,
    #[serde(default)]
    pub effects: BTreeSet<String>,
}

impl PluginEntities {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.triggers.is_empty() && self.effects.is_empty()
    }

    fn bucket(&mut self, kind: PluginKind) -> &mut BTreeSet<String> {
        match kind {
            PluginKind::Entity => &mut self.entities,
            PluginKind::Trigger => &mut self.triggers,
            PluginKind::Effect => &mut self.effects,
        }
    }
}

impl PluginEcosystem {
    /// Whether any path of a listing belongs to this ecosystem.
    pub fn is_present<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        paths.iter().any(|p| p.as_ref().starts_with(self.mod_root))
    }

    fn classify(&self, path: &str, root: &str) -> Option<PluginKind> {
        let rest = path.strip_prefix(root)?;
        if !rest.ends_with(self.extension) {
            return None;
        }
        if rest.starts_with("entities/") {
            Some(PluginKind::Entity)
        } else if rest.starts_with("triggers/") {
            Some(PluginKind::Trigger)
        } else if rest.starts_with("effects/") {
            Some(PluginKind::Effect)
        } else {
            None
        }
    }

    /// Every name registered in one source file.
    pub fn extract_names(&self, source: &str) -> Vec<String> {
        self.definition
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Scan the plugin sources below `root` in an opened archive.
    pub fn scan(&self, handle: &mut ArchiveHandle, root: &str) -> Result<PluginEntities, ArchiveError> {
        let sources: Vec<(usize, PluginKind)> = handle
            .names()
            .iter()
            .enumerate()
            .filter_map(|(index, name)| self.classify(name, root).map(|kind| (index, kind)))
            .collect();

        let mut found = PluginEntities::default();
        for (index, kind) in sources {
            let bytes = handle.read_bytes(index)?;
            let source = String::from_utf8_lossy(&bytes);
            found.bucket(kind).extend(self.extract_names(&source));
        }
        Ok(found)
    }

    /// Plugin root of the editor's own source archive, e.g. `Ahorn-master/src/`.
    pub fn vanilla_root_of(&self, handle: &ArchiveHandle) -> Option<String> {
        let top = handle.names().first()?.split('/').next()?;
        Some(format!("{}/{}", top, self.vanilla_root))
    }
}
