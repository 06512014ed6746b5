use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// WGSL preprocessor that resolves `#include` directives
///
/// Includes are looked up in the in-memory virtual files first, then next
/// to the including file, then in each include directory. A file is
/// inlined at most once per `process_file` call. The files read from disk
/// along the way are kept as the dependencies of the last processed file.
pub struct WgslPreprocessor {
    include_dirs: Vec<PathBuf>,
    virtual_files: HashMap<String, String>,
    processed_files: HashSet<String>,
    dependencies: Vec<PathBuf>,
}

impl WgslPreprocessor {
    pub fn new() -> Self {
        Self {
            include_dirs: vec![],
            virtual_files: HashMap::new(),
            processed_files: HashSet::new(),
            dependencies: Vec::new(),
        }
    }

    /// Add a directory to search for include files
    pub fn add_include_dir<P: AsRef<Path>>(&mut self, path: P) {
        self.include_dirs.push(path.as_ref().to_path_buf());
    }

    /// Serve `name` from memory instead of the file system
    pub fn add_virtual_file(&mut self, name: &str, content: String) {
        self.virtual_files.insert(name.to_string(), content);
    }

    /// Read and expand a WGSL file
    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<String> {
        let path = path.as_ref();
        self.processed_files.clear();
        self.dependencies.clear();
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        self.process_content(&content, path)
    }

    /// Expand the includes of already loaded WGSL content
    pub fn process_content(&mut self, content: &str, current_file: &Path) -> EngineResult<String> {
        let mut result = String::with_capacity(content.len());
        let parent_dir = current_file.parent();

        for line in content.lines() {
            let Some(include) = Self::parse_include_directive(line) else {
                result.push_str(line);
                result.push('\n');
                continue;
            };

            if !self.processed_files.insert(include.clone()) {
                result.push_str("// Skipped repeated include: ");
                result.push_str(&include);
                result.push('\n');
                continue;
            }

            let (included, resolved) = match self.virtual_files.get(&include) {
                Some(content) => (content.clone(), PathBuf::from(&include)),
                None => {
                    let resolved = self.resolve_include_path(&include, parent_dir)?;
                    let content = fs::read_to_string(&resolved)
                        .map_err(|e| EngineError::io(&resolved, e))?;
                    self.dependencies.push(resolved.clone());
                    (content, resolved)
                }
            };
            let processed = self.process_content(&included, &resolved)?;

            result.push_str("// Begin include: ");
            result.push_str(&include);
            result.push('\n');
            result.push_str(&processed);
            result.push_str("// End include: ");
            result.push_str(&include);
            result.push('\n');
        }

        Ok(result)
    }

    /// Include files read from disk, in the order they were inlined
    pub fn dependencies(&self) -> &[PathBuf] {
        &self.dependencies
    }

    /// Parse an #include directive from a line
    fn parse_include_directive(line: &str) -> Option<String> {
        let after_include = line.trim().strip_prefix("#include")?.trim();

        // Support both #include "file.wgsl" and #include <file.wgsl>
        if after_include.len() >= 2
            && ((after_include.starts_with('"') && after_include.ends_with('"'))
                || (after_include.starts_with('<') && after_include.ends_with('>')))
        {
            Some(after_include[1..after_include.len() - 1].to_string())
        } else {
            None
        }
    }

    fn resolve_include_path(
        &self,
        include_path: &str,
        current_dir: Option<&Path>,
    ) -> EngineResult<PathBuf> {
        let include = Path::new(include_path);

        current_dir
            .into_iter()
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(include))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| EngineError::ResourceNotFound {
                resource_type: "shader include".to_string(),
                id: include_path.to_string(),
            })
    }
}

impl Default for WgslPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
