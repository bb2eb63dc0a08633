//! WGSL shader sources, looked up by symbolic name and hot-reloaded from disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::backend::ShaderLibrary;

/// Shader sources bundled with the crate, used when no directory is given.
pub const BUILTIN: &[(&str, &str)] = &[
    (crate::dof::SHADER_NAME, include_str!("shaders/dof_hdr.wgsl")),
    (crate::vignette::SHADER_NAME, include_str!("shaders/vignetting.wgsl")),
    (
        crate::vignette::BLUR_SHADER_NAME,
        include_str!("shaders/separable_blur.wgsl"),
    ),
    (crate::visor::SHADER_NAME, include_str!("shaders/helmet_visor.wgsl")),
];

/// Look `name` up exactly, then by containment in either direction.
pub fn find_by_name<'a, T>(entries: &'a HashMap<String, T>, name: &str) -> Option<&'a T> {
    if let Some(entry) = entries.get(name) {
        return Some(entry);
    }
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();
    keys.into_iter()
        .find(|key| key.contains(name) || name.contains(key.as_str()))
        .and_then(|key| entries.get(key))
}

/// A shader source that can be hot-reloaded from disk.
pub struct ShaderSource {
    path: Option<PathBuf>,
    last_modified: Option<SystemTime>,
    source: String,
}

impl ShaderSource {
    /// Load a shader from the given file path.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let source = fs::read_to_string(&path)?;
        let last_modified = fs::metadata(&path)?.modified()?;

        Ok(Self {
            path: Some(path),
            last_modified: Some(last_modified),
            source,
        })
    }

    /// A shader that lives only in memory and never reloads.
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            path: None,
            last_modified: None,
            source: source.into(),
        }
    }

    /// Check if the shader file has been modified and reload if so.
    /// Returns `true` if the shader was reloaded.
    pub fn check_reload(&mut self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };

        if self.last_modified.is_some_and(|last| modified <= last) {
            return false;
        }
        match fs::read_to_string(path) {
            Ok(source) => {
                self.source = source;
                self.last_modified = Some(modified);
                true
            }
            Err(e) => {
                log::warn!("Could not re-read shader {:?}: {}", path, e);
                false
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Named shader sources.
#[derive(Default)]
pub struct ShaderRegistry {
    shaders: HashMap<String, ShaderSource>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled shaders.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, source) in BUILTIN {
            registry.insert(name, ShaderSource::inline(*source));
        }
        registry
    }

    /// Load every `*.wgsl` file in `dir`, named by file stem.
    ///
    /// Unreadable files are logged and skipped; only a missing directory is an error.
    pub fn load_dir(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut registry = Self::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wgsl") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match ShaderSource::load(&path) {
                Ok(source) => {
                    log::debug!("Loaded shader '{}' from {:?}", name, path);
                    registry.insert(&name, source);
                }
                Err(e) => log::warn!("Skipping shader {:?}: {}", path, e),
            }
        }
        if registry.shaders.is_empty() {
            log::warn!("No shaders found in {:?}", dir.as_ref());
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: &str, source: ShaderSource) {
        self.shaders.insert(name.to_string(), source);
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }

    /// Source registered under `name`, or under a name containing (or contained in) it.
    pub fn source(&self, name: &str) -> Option<&str> {
        find_by_name(&self.shaders, name).map(ShaderSource::source)
    }

    /// Reload changed files; returns the names of the shaders that changed.
    pub fn check_reload(&mut self) -> Vec<String> {
        let mut reloaded = Vec::new();
        for (name, shader) in &mut self.shaders {
            if shader.check_reload() {
                log::info!("Reloaded shader '{}'", name);
                reloaded.push(name.clone());
            }
        }
        reloaded
    }
}

impl ShaderLibrary<String> for ShaderRegistry {
    fn shader(&self, name: &str) -> Option<String> {
        let found = self.source(name).map(str::to_string);
        if found.is_none() {
            log::warn!("Shader not found: {}", name);
        }
        found
    }
}
