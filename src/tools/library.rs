//! 演示文稿来源
//!
//! - DirectoryLibrary：列出目录下允许扩展名的文件；Markdown 文稿（`---` 分页）直接加载，
//!   pptx / pdf 交给外部 DeckLoader，未配置时报 UnsupportedFormat；
//! - InMemoryLibrary：内存中的文稿，供测试与演示使用。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::tools::{Deck, DeckError, PresentationLibrary};

/// 外部格式解析器（pptx / pdf 等）
pub trait DeckLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn Deck>, DeckError>;
}

/// 按页保存文本的文稿
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDeck {
    slides: Vec<String>,
}

impl StaticDeck {
    pub fn new<S: Into<String>>(slides: impl IntoIterator<Item = S>) -> Self {
        Self {
            slides: slides.into_iter().map(Into::into).collect(),
        }
    }

    /// 解析 Markdown 文稿：独占一行的 `---` 为分页符，空页忽略
    pub fn from_markdown(source: &str) -> Self {
        let mut slides = Vec::new();
        let mut current = String::new();
        for line in source.lines() {
            if line.trim() == "---" {
                push_slide(&mut slides, &mut current);
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        push_slide(&mut slides, &mut current);
        Self { slides }
    }
}

fn push_slide(slides: &mut Vec<String>, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        slides.push(text.to_string());
    }
    current.clear();
}

impl Deck for StaticDeck {
    fn slides_count(&self) -> usize {
        self.slides.len()
    }

    fn slide_text(&self, index: usize) -> String {
        self.slides.get(index).cloned().unwrap_or_default()
    }
}

/// 目录型文稿库
pub struct DirectoryLibrary {
    root: PathBuf,
    extensions: Vec<String>,
    loader: Option<Arc<dyn DeckLoader>>,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            loader: None,
        }
    }

    /// 注入 pptx / pdf 等格式的解析器
    pub fn with_loader(mut self, loader: Arc<dyn DeckLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    fn is_allowed(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

impl PresentationLibrary for DirectoryLibrary {
    fn list(&self) -> Result<Vec<String>, DeckError> {
        if !self.root.is_dir() {
            return Err(DeckError::DirectoryNotFound(self.root.clone()));
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && self.is_allowed(&path) {
                if let Some(name) = path.file_name() {
                    files.push(name.to_string_lossy().into_owned());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn resolve(&self, query: &str) -> Result<PathBuf, DeckError> {
        let candidate = Path::new(query);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        if path.is_file() {
            Ok(path)
        } else {
            Err(DeckError::NotFound(query.to_string()))
        }
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Deck>, DeckError> {
        match extension(path).as_deref() {
            Some("md") => {
                let source = std::fs::read_to_string(path)?;
                Ok(Box::new(StaticDeck::from_markdown(&source)))
            }
            ext => match &self.loader {
                Some(loader) => loader.load(path),
                None => Err(DeckError::UnsupportedFormat(ext.unwrap_or("").to_string())),
            },
        }
    }
}

/// 内存文稿库：文件名 -> 每页文本
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    decks: BTreeMap<String, StaticDeck>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deck<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        slides: impl IntoIterator<Item = S>,
    ) -> Self {
        self.decks.insert(name.into(), StaticDeck::new(slides));
        self
    }
}

impl PresentationLibrary for InMemoryLibrary {
    fn list(&self) -> Result<Vec<String>, DeckError> {
        Ok(self.decks.keys().cloned().collect())
    }

    fn resolve(&self, query: &str) -> Result<PathBuf, DeckError> {
        if self.decks.contains_key(query) {
            Ok(PathBuf::from(query))
        } else {
            Err(DeckError::NotFound(query.to_string()))
        }
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Deck>, DeckError> {
        let key = path.to_string_lossy();
        self.decks
            .get(key.as_ref())
            .map(|d| Box::new(d.clone()) as Box<dyn Deck>)
            .ok_or_else(|| DeckError::NotFound(key.into_owned()))
    }
}
