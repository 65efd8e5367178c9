//! 演示文稿句柄
//!
//! DeckController 独占查看器与当前打开的演示文稿；工具只能通过 `&mut DeckController` 操作它，
//! 同一时刻只有一个 ACT 步骤能持有该句柄（由 ToolExecutor 的锁保证）。
//! 文件格式解析（PresentationLibrary / Deck）与系统级放映控制（Viewer）都是外部协作方，
//! 这里只定义接口与最小实现。

use std::path::{Path, PathBuf};

use thiserror::Error;

/// 幻灯片操作错误（会被工具转换为 status=error 的结果，不会中止循环）
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("directory {0} not found")]
    DirectoryNotFound(PathBuf),

    #[error("file {0} not found")]
    NotFound(String),

    #[error("unsupported presentation format: {0}")]
    UnsupportedFormat(String),

    #[error("no presentation is open")]
    NoPresentationOpen,

    #[error("invalid slide number {requested} (presentation has {count} slides)")]
    SlideOutOfRange { requested: i64, count: usize },

    #[error("viewer error: {0}")]
    Viewer(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 已加载的演示文稿：页数与每页文本（index 从 0 开始）
pub trait Deck: Send + Sync {
    fn slides_count(&self) -> usize;
    fn slide_text(&self, index: usize) -> String;
}

/// 演示文稿来源：列出可用文件、解析文件名、加载内容
pub trait PresentationLibrary: Send + Sync {
    fn list(&self) -> Result<Vec<String>, DeckError>;
    fn resolve(&self, query: &str) -> Result<PathBuf, DeckError>;
    fn load(&self, path: &Path) -> Result<Box<dyn Deck>, DeckError>;
}

/// 放映窗口控制（index 从 0 开始）
pub trait Viewer: Send + Sync {
    fn open(&mut self, path: &Path) -> Result<(), DeckError>;
    fn start_show(&mut self) -> Result<(), DeckError>;
    fn goto_slide(&mut self, index: usize) -> Result<(), DeckError>;
    fn next_slide(&mut self) -> Result<(), DeckError>;
    fn previous_slide(&mut self) -> Result<(), DeckError>;
    fn close(&mut self) -> Result<(), DeckError>;
}

/// 打开成功后的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPresentation {
    pub name: String,
    pub slides_count: usize,
}

/// 某一页的编号（从 1 开始）与文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideView {
    pub number: usize,
    pub text: String,
}

struct OpenDeck {
    name: String,
    deck: Box<dyn Deck>,
    index: usize,
}

/// 单一所有者的演示文稿句柄
pub struct DeckController {
    library: Box<dyn PresentationLibrary>,
    viewer: Box<dyn Viewer>,
    open: Option<OpenDeck>,
}

impl DeckController {
    pub fn new(library: impl PresentationLibrary + 'static, viewer: impl Viewer + 'static) -> Self {
        Self {
            library: Box::new(library),
            viewer: Box::new(viewer),
            open: None,
        }
    }

    /// 当前打开的文稿名与页码（从 1 开始）
    pub fn current(&self) -> Option<(&str, usize)> {
        self.open.as_ref().map(|o| (o.name.as_str(), o.index + 1))
    }

    pub fn list_presentations(&self) -> Result<Vec<String>, DeckError> {
        self.library.list()
    }

    /// 打开演示文稿：先解析并加载新文稿，成功后才关闭当前文稿并放映。
    ///
    /// 返回 Err 时当前文稿保持不变；关闭旧文稿之后查看器的失败只记 warn，
    /// 追踪的是文稿本身，与查看器窗口无关。
    pub fn open_presentation(&mut self, query: &str) -> Result<OpenedPresentation, DeckError> {
        let path = self.library.resolve(query)?;
        let deck = self.library.load(&path)?;

        if self.open.take().is_some() {
            if let Err(e) = self.viewer.close() {
                tracing::warn!(error = %e, "failed to close previous presentation");
            }
        }
        if let Err(e) = self.viewer.open(&path).and_then(|()| self.viewer.start_show()) {
            tracing::warn!(error = %e, path = %path.display(), "viewer failed to start the show");
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| query.to_string());
        let slides_count = deck.slides_count();
        self.open = Some(OpenDeck {
            name: name.clone(),
            deck,
            index: 0,
        });
        tracing::info!(presentation = %name, slides_count, "presentation opened");
        Ok(OpenedPresentation { name, slides_count })
    }

    pub fn open_slide(&mut self, number: i64) -> Result<SlideView, DeckError> {
        let open = self.open.as_mut().ok_or(DeckError::NoPresentationOpen)?;
        let count = open.deck.slides_count();
        if number < 1 || number as u64 > count as u64 {
            return Err(DeckError::SlideOutOfRange { requested: number, count });
        }
        let index = (number - 1) as usize;
        if let Err(e) = self.viewer.goto_slide(index) {
            tracing::warn!(error = %e, index, "viewer failed to switch slide");
        }
        open.index = index;
        Ok(view(open))
    }

    pub fn next_slide(&mut self) -> Result<SlideView, DeckError> {
        let open = self.open.as_mut().ok_or(DeckError::NoPresentationOpen)?;
        let count = open.deck.slides_count();
        if open.index + 1 >= count {
            return Err(DeckError::SlideOutOfRange {
                requested: open.index as i64 + 2,
                count,
            });
        }
        if let Err(e) = self.viewer.next_slide() {
            tracing::warn!(error = %e, "viewer failed to advance slide");
        }
        open.index += 1;
        Ok(view(open))
    }

    pub fn previous_slide(&mut self) -> Result<SlideView, DeckError> {
        let open = self.open.as_mut().ok_or(DeckError::NoPresentationOpen)?;
        if open.index == 0 {
            return Err(DeckError::SlideOutOfRange {
                requested: 0,
                count: open.deck.slides_count(),
            });
        }
        if let Err(e) = self.viewer.previous_slide() {
            tracing::warn!(error = %e, "viewer failed to go back");
        }
        open.index -= 1;
        Ok(view(open))
    }

    pub fn list_slides(&self) -> Result<Vec<SlideView>, DeckError> {
        let open = self.open.as_ref().ok_or(DeckError::NoPresentationOpen)?;
        Ok((0..open.deck.slides_count())
            .map(|i| SlideView {
                number: i + 1,
                text: open.deck.slide_text(i),
            })
            .collect())
    }

    /// 关闭当前文稿，返回其名称
    pub fn close_presentation(&mut self) -> Result<String, DeckError> {
        let open = self.open.take().ok_or(DeckError::NoPresentationOpen)?;
        if let Err(e) = self.viewer.close() {
            tracing::warn!(error = %e, "viewer failed to close presentation");
        }
        tracing::info!(presentation = %open.name, "presentation closed");
        Ok(open.name)
    }
}

fn view(open: &OpenDeck) -> SlideView {
    SlideView {
        number: open.index + 1,
        text: open.deck.slide_text(open.index),
    }
}
