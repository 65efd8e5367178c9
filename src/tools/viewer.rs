//! 日志查看器：不驱动任何系统界面，只把放映操作写入日志并记录下来

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::tools::{DeckError, Viewer};

/// 查看器收到的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerAction {
    Open(PathBuf),
    StartShow,
    Goto(usize),
    Next,
    Previous,
    Close,
}

/// 记录操作的查看器；clone 共享同一份记录，便于在句柄交出后检查
#[derive(Debug, Clone, Default)]
pub struct LoggingViewer {
    actions: Arc<Mutex<Vec<ViewerAction>>>,
}

impl LoggingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<ViewerAction> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn record(&self, action: ViewerAction) -> Result<(), DeckError> {
        tracing::info!(?action, "viewer");
        self.actions
            .lock()
            .map_err(|e| DeckError::Viewer(e.to_string()))?
            .push(action);
        Ok(())
    }
}

impl Viewer for LoggingViewer {
    fn open(&mut self, path: &Path) -> Result<(), DeckError> {
        self.record(ViewerAction::Open(path.to_path_buf()))
    }

    fn start_show(&mut self) -> Result<(), DeckError> {
        self.record(ViewerAction::StartShow)
    }

    fn goto_slide(&mut self, index: usize) -> Result<(), DeckError> {
        self.record(ViewerAction::Goto(index))
    }

    fn next_slide(&mut self) -> Result<(), DeckError> {
        self.record(ViewerAction::Next)
    }

    fn previous_slide(&mut self) -> Result<(), DeckError> {
        self.record(ViewerAction::Previous)
    }

    fn close(&mut self) -> Result<(), DeckError> {
        self.record(ViewerAction::Close)
    }
}
